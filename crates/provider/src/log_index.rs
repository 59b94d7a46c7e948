use crate::ProviderError;
use alloy_primitives::{Address, Bytes, B256};
use upkeep_types::{BlockKey, Log, UpkeepId};

/// Read access to the chain-log indexing engine.
///
/// The index is an external collaborator; the core only queries it and never
/// manages its storage.
#[async_trait::async_trait]
#[auto_impl::auto_impl(&, Arc)]
pub trait LogIndex: Send + Sync {
    /// The most recent block the index has processed.
    async fn latest_block(&self) -> Result<BlockKey, ProviderError>;

    /// Hashes for the given block numbers, in no particular order. Numbers
    /// unknown to the index are absent from the result.
    async fn blocks_in_range(&self, numbers: &[u64]) -> Result<Vec<BlockKey>, ProviderError>;

    /// Logs emitted by `address` with any of the given signature topics in
    /// the inclusive block range.
    async fn logs_with_signatures(
        &self,
        from_block: u64,
        to_block: u64,
        signatures: &[B256],
        address: Address,
    ) -> Result<Vec<Log>, ProviderError>;

    /// Logs emitted by `address` with signature `topic` whose indexed field
    /// at `field_position` matches any of `values`, at least `confirmations`
    /// blocks deep.
    async fn indexed_logs(
        &self,
        topic: B256,
        address: Address,
        field_position: usize,
        values: &[B256],
        confirmations: u64,
    ) -> Result<Vec<Log>, ProviderError>;
}

/// Filter registration for one log-triggered upkeep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilterOptions {
    /// The upkeep the filter belongs to.
    pub upkeep_id: UpkeepId,
    /// Raw on-chain trigger configuration the filter is derived from.
    pub trigger_config: Bytes,
    /// Block from which the filter takes effect.
    pub update_block: u64,
}

/// Lifecycle of log-trigger filters held by the indexing engine.
#[async_trait::async_trait]
#[auto_impl::auto_impl(&, Arc)]
pub trait UpkeepFilterStore: Send + Sync {
    /// Reconciles the store against the authoritative active set and returns
    /// the ids whose filters need (re)registration.
    async fn refresh_active_upkeeps(
        &self,
        ids: &[UpkeepId],
    ) -> Result<Vec<UpkeepId>, ProviderError>;

    /// Registers or replaces the filter for one upkeep.
    async fn register_filter(&self, opts: LogFilterOptions) -> Result<(), ProviderError>;

    /// Drops the filter for one upkeep.
    async fn unregister_filter(&self, id: UpkeepId) -> Result<(), ProviderError>;
}
