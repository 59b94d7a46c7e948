//! In-memory mock collaborators for tests.

use crate::{
    BlockSource, EthCall, EvmRpc, GasEstimator, HeadFeed, LogFilterOptions, LogIndex,
    ProviderError, RegistryReader, RegistryState, RpcError, TxReceipt, UpkeepConfigView,
    UpkeepFilterStore, UpkeepInfo,
};
use alloy_primitives::{Address, Bytes, B256, U256};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use tokio::sync::mpsc;
use upkeep_types::{BlockKey, ChainHead, Log, RegistryEvent, UpkeepId};

/// Mock log index backed by a block map and a flat log list.
#[derive(Debug, Default)]
pub struct MockLogIndex {
    /// Known blocks by number.
    pub blocks: Mutex<BTreeMap<u64, B256>>,
    /// All indexed logs.
    pub logs: Mutex<Vec<Log>>,
    /// When set, `latest_block` and `blocks_in_range` fail with this error.
    pub fail_reads: Mutex<Option<ProviderError>>,
}

impl MockLogIndex {
    /// Seeds consecutive blocks `from..=to` with per-number marker hashes.
    pub fn seed_blocks(&self, from: u64, to: u64) {
        let mut blocks = self.blocks.lock();
        for number in from..=to {
            blocks.insert(number, B256::with_last_byte(number as u8));
        }
    }
}

#[async_trait::async_trait]
impl LogIndex for MockLogIndex {
    async fn latest_block(&self) -> Result<BlockKey, ProviderError> {
        if let Some(err) = self.fail_reads.lock().clone() {
            return Err(err);
        }
        let blocks = self.blocks.lock();
        let (&number, &hash) = blocks
            .last_key_value()
            .ok_or_else(|| ProviderError::ContractRead("no blocks seeded".into()))?;
        Ok(BlockKey::new(number, hash))
    }

    async fn blocks_in_range(&self, numbers: &[u64]) -> Result<Vec<BlockKey>, ProviderError> {
        if let Some(err) = self.fail_reads.lock().clone() {
            return Err(err);
        }
        let blocks = self.blocks.lock();
        Ok(numbers
            .iter()
            .filter_map(|n| blocks.get(n).map(|hash| BlockKey::new(*n, *hash)))
            .collect())
    }

    async fn logs_with_signatures(
        &self,
        from_block: u64,
        to_block: u64,
        signatures: &[B256],
        address: Address,
    ) -> Result<Vec<Log>, ProviderError> {
        Ok(self
            .logs
            .lock()
            .iter()
            .filter(|log| {
                log.address == address
                    && log.block_number >= from_block
                    && log.block_number <= to_block
                    && log.signature().is_some_and(|sig| signatures.contains(&sig))
            })
            .cloned()
            .collect())
    }

    async fn indexed_logs(
        &self,
        topic: B256,
        address: Address,
        field_position: usize,
        values: &[B256],
        _confirmations: u64,
    ) -> Result<Vec<Log>, ProviderError> {
        Ok(self
            .logs
            .lock()
            .iter()
            .filter(|log| {
                log.address == address
                    && log.signature() == Some(topic)
                    && log.topics.get(field_position).is_some_and(|v| values.contains(v))
            })
            .cloned()
            .collect())
    }
}

/// Mock filter store recording registrations.
#[derive(Debug, Default)]
pub struct MockFilterStore {
    /// Registered filters by upkeep id.
    pub registered: Mutex<HashMap<UpkeepId, LogFilterOptions>>,
    /// Ids that were explicitly unregistered.
    pub unregistered: Mutex<Vec<UpkeepId>>,
}

#[async_trait::async_trait]
impl UpkeepFilterStore for MockFilterStore {
    async fn refresh_active_upkeeps(
        &self,
        ids: &[UpkeepId],
    ) -> Result<Vec<UpkeepId>, ProviderError> {
        // Everything always needs a refresh in the mock.
        Ok(ids.to_vec())
    }

    async fn register_filter(&self, opts: LogFilterOptions) -> Result<(), ProviderError> {
        self.registered.lock().insert(opts.upkeep_id, opts);
        Ok(())
    }

    async fn unregister_filter(&self, id: UpkeepId) -> Result<(), ProviderError> {
        self.registered.lock().remove(&id);
        self.unregistered.lock().push(id);
        Ok(())
    }
}

/// A scripted response for one `batch_eth_call` invocation.
#[derive(Debug, Clone)]
pub enum BatchResponse {
    /// The transport itself fails.
    Transport(RpcError),
    /// Per-item results, matched to calls by position.
    Items(Vec<Result<Bytes, RpcError>>),
}

/// Mock RPC with scripted batch responses.
#[derive(Debug, Default)]
pub struct MockRpc {
    /// Canonical hashes by number.
    pub block_hashes: Mutex<HashMap<u64, B256>>,
    /// Receipts by transaction hash.
    pub receipts: Mutex<HashMap<B256, TxReceipt>>,
    /// When set, block/receipt lookups fail with this error.
    pub fail_lookups: Mutex<Option<RpcError>>,
    /// Responses consumed front-to-back, one per batch call.
    pub batch_responses: Mutex<VecDeque<BatchResponse>>,
    /// Every batch issued, for assertions.
    pub batches_seen: Mutex<Vec<Vec<EthCall>>>,
}

impl MockRpc {
    /// Queues a scripted batch response.
    pub fn push_batch(&self, response: BatchResponse) {
        self.batch_responses.lock().push_back(response);
    }
}

#[async_trait::async_trait]
impl EvmRpc for MockRpc {
    async fn block_hash_by_number(&self, number: u64) -> Result<Option<B256>, RpcError> {
        if let Some(err) = self.fail_lookups.lock().clone() {
            return Err(err);
        }
        Ok(self.block_hashes.lock().get(&number).copied())
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>, RpcError> {
        if let Some(err) = self.fail_lookups.lock().clone() {
            return Err(err);
        }
        Ok(self.receipts.lock().get(&tx_hash).cloned())
    }

    async fn batch_eth_call(
        &self,
        calls: &[EthCall],
    ) -> Result<Vec<Result<Bytes, RpcError>>, RpcError> {
        self.batches_seen.lock().push(calls.to_vec());
        match self.batch_responses.lock().pop_front() {
            Some(BatchResponse::Transport(err)) => Err(err),
            Some(BatchResponse::Items(items)) => Ok(items),
            None => Err(RpcError::Transport("no scripted batch response".into())),
        }
    }
}

/// Mock registry contract.
#[derive(Debug, Default)]
pub struct MockRegistry {
    /// Contract address.
    pub address: Address,
    /// Lifecycle event signatures.
    pub signatures: Vec<B256>,
    /// Registry-wide state.
    pub state: Mutex<RegistryState>,
    /// When set, `get_state` fails with this error.
    pub fail_state: Mutex<Option<ProviderError>>,
    /// Authoritative active ids, in pagination order.
    pub active_ids: Mutex<Vec<UpkeepId>>,
    /// Trigger configs by id.
    pub trigger_configs: Mutex<HashMap<UpkeepId, Bytes>>,
    /// Registration data by id.
    pub upkeeps: Mutex<HashMap<UpkeepId, UpkeepInfo>>,
    /// Scripted log parses keyed by (tx hash, log index).
    pub parsed: Mutex<HashMap<(B256, u64), RegistryEvent>>,
}

#[async_trait::async_trait]
impl RegistryReader for MockRegistry {
    fn address(&self) -> Address {
        self.address
    }

    fn event_signatures(&self) -> Vec<B256> {
        self.signatures.clone()
    }

    async fn get_state(&self) -> Result<RegistryState, ProviderError> {
        if let Some(err) = self.fail_state.lock().clone() {
            return Err(err);
        }
        Ok(*self.state.lock())
    }

    async fn get_active_ids(
        &self,
        start: u64,
        max_count: u64,
    ) -> Result<Vec<UpkeepId>, ProviderError> {
        let ids = self.active_ids.lock();
        let start = (start as usize).min(ids.len());
        let end = (start + max_count as usize).min(ids.len());
        Ok(ids[start..end].to_vec())
    }

    async fn get_upkeep_trigger_config(&self, id: UpkeepId) -> Result<Bytes, ProviderError> {
        Ok(self.trigger_configs.lock().get(&id).cloned().unwrap_or_default())
    }

    async fn get_upkeep(&self, id: UpkeepId) -> Result<UpkeepInfo, ProviderError> {
        self.upkeeps
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| ProviderError::ContractRead(format!("unknown upkeep {id}")))
    }

    fn parse_log(&self, log: &Log) -> Result<Option<RegistryEvent>, ProviderError> {
        Ok(self.parsed.lock().get(&log.dedup_key()).cloned())
    }
}

/// Mock head feed fanning pushed heads out to all subscribers.
#[derive(Debug, Default)]
pub struct MockHeadFeed {
    senders: Mutex<Vec<mpsc::UnboundedSender<ChainHead>>>,
}

impl MockHeadFeed {
    /// Pushes one head to every subscriber.
    pub fn push(&self, head: ChainHead) {
        self.senders.lock().retain(|tx| tx.send(head.clone()).is_ok());
    }
}

impl HeadFeed for MockHeadFeed {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<ChainHead> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().push(tx);
        rx
    }
}

/// Mock gas estimator returning a settable fee.
#[derive(Debug, Default)]
pub struct MockGasEstimator {
    /// The fee to return, in wei per gas.
    pub fee: Mutex<U256>,
    /// When set, `estimate` fails with this error.
    pub fail: Mutex<Option<RpcError>>,
}

#[async_trait::async_trait]
impl GasEstimator for MockGasEstimator {
    async fn estimate(&self) -> Result<U256, RpcError> {
        if let Some(err) = self.fail.lock().clone() {
            return Err(err);
        }
        Ok(*self.fee.lock())
    }
}

/// Mock block source backed by plain maps.
#[derive(Debug, Default)]
pub struct MockBlockSource {
    /// Latest head, if any.
    pub latest: Mutex<Option<BlockKey>>,
    /// Tracked hashes by number.
    pub hashes: Mutex<HashMap<u64, B256>>,
}

impl BlockSource for MockBlockSource {
    fn latest_block(&self) -> Option<BlockKey> {
        *self.latest.lock()
    }

    fn block_hash(&self, number: u64) -> Option<B256> {
        self.hashes.lock().get(&number).copied()
    }
}

/// Mock config view backed by a plain map.
#[derive(Debug, Default)]
pub struct MockConfigView {
    /// Offchain configs by id.
    pub configs: Mutex<HashMap<UpkeepId, Bytes>>,
}

impl UpkeepConfigView for MockConfigView {
    fn offchain_config(&self, id: &UpkeepId) -> Option<Bytes> {
        self.configs.lock().get(id).cloned()
    }
}
