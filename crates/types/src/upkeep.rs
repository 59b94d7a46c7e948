use alloy_primitives::U256;

/// Byte range of an upkeep id that must be zero for new-style ids.
const RESERVED_RANGE: std::ops::Range<usize> = 4..15;

/// Byte offset holding the trigger-type tag.
const TRIGGER_TYPE_OFFSET: usize = 15;

/// The trigger kind an upkeep is checked under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum UpkeepType {
    /// Eligibility depends only on chain state at the check block.
    Conditional = 0,
    /// Eligibility is driven by a specific emitted log.
    LogTrigger = 1,
}

/// 256-bit upkeep identifier.
///
/// New-style ids structurally encode their trigger type: bytes 4..15 of the
/// big-endian representation are reserved and must be zero, and byte 15 holds
/// the [`UpkeepType`] tag. Ids with a non-zero reserved region predate the
/// tagging scheme and are treated as conditional for backward compatibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UpkeepId(pub U256);

impl UpkeepId {
    /// Wraps a raw id.
    pub const fn new(id: U256) -> Self {
        Self(id)
    }

    /// The id as 32 big-endian bytes.
    pub fn to_be_bytes(&self) -> [u8; 32] {
        self.0.to_be_bytes::<32>()
    }

    /// Decodes the trigger type tag.
    ///
    /// Any non-zero byte in the reserved region marks a legacy id, which is
    /// always conditional.
    pub fn trigger_type(&self) -> UpkeepType {
        let bytes = self.to_be_bytes();
        if bytes[RESERVED_RANGE].iter().any(|b| *b != 0) {
            return UpkeepType::Conditional;
        }
        match bytes[TRIGGER_TYPE_OFFSET] {
            1 => UpkeepType::LogTrigger,
            _ => UpkeepType::Conditional,
        }
    }
}

impl From<U256> for UpkeepId {
    fn from(id: U256) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for UpkeepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}
