use alloy_primitives::B256;

/// The chain condition a check runs under.
///
/// A trigger without a [`LogTriggerExtension`] is conditional; with one it is
/// a log trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trigger {
    /// Block number the check is performed against.
    pub block_number: u64,
    /// Hash of the check block.
    pub block_hash: B256,
    /// Present for log-triggered upkeeps only.
    pub log: Option<LogTriggerExtension>,
}

impl Trigger {
    /// Creates a conditional trigger.
    pub const fn conditional(block_number: u64, block_hash: B256) -> Self {
        Self { block_number, block_hash, log: None }
    }

    /// Creates a log trigger.
    pub const fn log(block_number: u64, block_hash: B256, log: LogTriggerExtension) -> Self {
        Self { block_number, block_hash, log: Some(log) }
    }
}

/// The specific log a log-triggered check refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogTriggerExtension {
    /// Transaction that emitted the log.
    pub tx_hash: B256,
    /// Index of the log within the block.
    pub index: u32,
    /// Hash of the block the log was emitted in.
    pub block_hash: B256,
    /// Number of the block the log was emitted in.
    pub block_number: u64,
}

impl LogTriggerExtension {
    /// Bytes identifying the log independently of the check block.
    ///
    /// Feeds into the work id derivation, so the layout must stay stable.
    pub fn log_identifier(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(68);
        out.extend_from_slice(self.block_hash.as_slice());
        out.extend_from_slice(self.tx_hash.as_slice());
        out.extend_from_slice(&self.index.to_be_bytes());
        out
    }
}
