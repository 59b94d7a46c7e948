use alloy_primitives::{Bytes, B256};
use upkeep_types::{BlockKey, UpkeepId};

/// Synchronous view of locally tracked chain state.
///
/// Implemented by the block-history tracker; the check pipeline uses it to
/// verify trigger blocks without touching the network first.
#[auto_impl::auto_impl(&, Arc)]
pub trait BlockSource: Send + Sync {
    /// The most recently observed head, if any.
    fn latest_block(&self) -> Option<BlockKey>;

    /// The tracked hash at `number`, if the number is inside the window.
    fn block_hash(&self, number: u64) -> Option<B256>;
}

/// Synchronous view of locally cached per-upkeep configuration.
///
/// Implemented by the registry orchestrator; the pipeline's gas gate reads
/// the cached offchain config instead of hitting the contract per check.
#[auto_impl::auto_impl(&, Arc)]
pub trait UpkeepConfigView: Send + Sync {
    /// The cached offchain configuration bytes, `None` when the upkeep is
    /// unknown or its config has not been fetched yet.
    fn offchain_config(&self, id: &UpkeepId) -> Option<Bytes>;
}
