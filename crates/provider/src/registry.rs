use crate::ProviderError;
use alloy_primitives::{Address, Bytes, B256};
use upkeep_types::{Log, RegistryEvent, UpkeepId};

/// Registry-wide state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryState {
    /// Total number of upkeeps ever registered, the pagination bound for
    /// active-id reads.
    pub num_upkeeps: u64,
    /// Whether the registry is globally paused.
    pub paused: bool,
}

/// Per-upkeep registration data, as stored on-chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpkeepInfo {
    /// Contract the perform call targets.
    pub target: Address,
    /// Gas limit for the perform call.
    pub perform_gas: u64,
    /// Opaque offchain configuration (carries the optional gas-price
    /// ceiling).
    pub offchain_config: Bytes,
    /// Whether the upkeep is individually paused.
    pub paused: bool,
}

/// Read path of the registry contract.
#[async_trait::async_trait]
#[auto_impl::auto_impl(&, Arc)]
pub trait RegistryReader: Send + Sync {
    /// Address of the registry contract.
    fn address(&self) -> Address;

    /// Topic hashes of the lifecycle events, used to poll registry logs.
    fn event_signatures(&self) -> Vec<B256>;

    /// Registry-wide state.
    async fn get_state(&self) -> Result<RegistryState, ProviderError>;

    /// One page of the authoritative active-id list.
    async fn get_active_ids(
        &self,
        start: u64,
        max_count: u64,
    ) -> Result<Vec<UpkeepId>, ProviderError>;

    /// Current trigger configuration for one upkeep.
    async fn get_upkeep_trigger_config(&self, id: UpkeepId) -> Result<Bytes, ProviderError>;

    /// Current registration data for one upkeep.
    async fn get_upkeep(&self, id: UpkeepId) -> Result<UpkeepInfo, ProviderError>;

    /// Parses a raw registry log into a lifecycle event.
    ///
    /// Returns `Ok(None)` for registry logs that are not lifecycle events.
    fn parse_log(&self, log: &Log) -> Result<Option<RegistryEvent>, ProviderError>;
}
