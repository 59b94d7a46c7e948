use alloy_primitives::{Address, Bytes, B256};

/// A raw chain log as surfaced by the log-indexing collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Log {
    /// Emitting contract.
    pub address: Address,
    /// Topic 0 is the event signature; the rest are indexed fields.
    pub topics: Vec<B256>,
    /// Unindexed event data.
    pub data: Bytes,
    /// Block the log was emitted in.
    pub block_number: u64,
    /// Hash of that block.
    pub block_hash: B256,
    /// Emitting transaction.
    pub tx_hash: B256,
    /// Index of the log within the block.
    pub log_index: u64,
}

impl Log {
    /// The event signature topic, if the log has any topics.
    pub fn signature(&self) -> Option<B256> {
        self.topics.first().copied()
    }

    /// Key identifying this log occurrence for de-duplication.
    pub fn dedup_key(&self) -> (B256, u64) {
        (self.tx_hash, self.log_index)
    }
}
