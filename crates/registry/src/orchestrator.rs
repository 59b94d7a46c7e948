use crate::{active::ActiveUpkeepList, dedup::VisitedSet};
use alloy_primitives::{Bytes, B256};
use parking_lot::{Mutex, RwLock};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use upkeep_provider::{
    LogFilterOptions, LogIndex, ProviderError, RegistryReader, UpkeepConfigView, UpkeepFilterStore,
};
use upkeep_types::{Log, RegistryEvent, UpkeepId, UpkeepType};

/// Tuning for the orchestrator.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Full reconciliation interval; also the reconciliation timeout.
    pub refresh_interval: Duration,
    /// Lifecycle log polling interval.
    pub poll_interval: Duration,
    /// How far behind the tip a poll may look.
    pub poll_lookback: u64,
    /// Page size for authoritative active-id reads.
    pub page_size: u64,
    /// Log-trigger filters refreshed per batch during reconciliation.
    pub filter_batch_size: usize,
    /// Pause between filter refresh batches, bounding registry-side load.
    pub filter_batch_pause: Duration,
    /// Capacity of the processed-log de-dup set.
    pub dedup_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(15 * 60),
            poll_interval: Duration::from_secs(1),
            poll_lookback: 250,
            page_size: 1000,
            filter_batch_size: 32,
            filter_batch_pause: Duration::from_millis(200),
            dedup_capacity: 10_000,
        }
    }
}

/// Locally cached per-upkeep configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpkeepConfig {
    /// Opaque offchain configuration (gas-price ceiling lives here).
    pub offchain_config: Bytes,
    /// Gas limit for the perform call.
    pub perform_gas: u64,
}

#[derive(Debug)]
struct Inner<R, L, F> {
    config: RegistryConfig,
    registry: R,
    log_index: L,
    filters: F,
    active: ActiveUpkeepList,
    configs: RwLock<HashMap<UpkeepId, UpkeepConfig>>,
    /// Last block already polled for lifecycle logs; 0 before the first
    /// tick.
    last_poll_block: AtomicU64,
    visited: Mutex<VisitedSet>,
}

/// The registry orchestrator. Cheap to clone; all clones share state.
#[derive(Debug)]
pub struct Registry<R, L, F> {
    inner: Arc<Inner<R, L, F>>,
}

impl<R, L, F> Clone for Registry<R, L, F> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<R, L, F> Registry<R, L, F>
where
    R: RegistryReader,
    L: LogIndex,
    F: UpkeepFilterStore,
{
    /// Creates an orchestrator with an empty active set.
    pub fn new(config: RegistryConfig, registry: R, log_index: L, filters: F) -> Self {
        let dedup_capacity = config.dedup_capacity;
        Self {
            inner: Arc::new(Inner {
                config,
                registry,
                log_index,
                filters,
                active: ActiveUpkeepList::new(),
                configs: RwLock::new(HashMap::new()),
                last_poll_block: AtomicU64::new(0),
                visited: Mutex::new(VisitedSet::new(dedup_capacity)),
            }),
        }
    }

    /// The set of currently monitored upkeeps.
    pub fn active(&self) -> &ActiveUpkeepList {
        &self.inner.active
    }

    /// Pulls the authoritative active-id list, resets the local set, and
    /// re-registers log-trigger filters in bounded batches.
    ///
    /// Returns the authoritative set size. A contract-read failure leaves
    /// the existing set unchanged: stale-but-available over unavailable.
    pub async fn reconcile(&self) -> Result<usize, ProviderError> {
        let state = self.inner.registry.get_state().await?;
        let mut ids: Vec<UpkeepId> = Vec::with_capacity(state.num_upkeeps as usize);
        let mut start = 0u64;
        while (ids.len() as u64) < state.num_upkeeps {
            let page =
                self.inner.registry.get_active_ids(start, self.inner.config.page_size).await?;
            if page.is_empty() {
                break;
            }
            start += page.len() as u64;
            ids.extend(page);
        }

        self.inner.active.reset(ids.iter().copied());
        let keep: HashSet<UpkeepId> = ids.iter().copied().collect();
        self.inner.configs.write().retain(|id, _| keep.contains(id));

        let log_ids: Vec<UpkeepId> =
            ids.iter().copied().filter(|id| id.trigger_type() == UpkeepType::LogTrigger).collect();
        let stale = self.inner.filters.refresh_active_upkeeps(&log_ids).await?;
        for chunk in stale.chunks(self.inner.config.filter_batch_size.max(1)) {
            self.refresh_log_filters(chunk).await;
            if chunk.len() == self.inner.config.filter_batch_size {
                tokio::time::sleep(self.inner.config.filter_batch_pause).await;
            }
        }

        let missing: Vec<UpkeepId> = {
            let configs = self.inner.configs.read();
            ids.iter().copied().filter(|id| !configs.contains_key(id)).collect()
        };
        for id in missing {
            self.refresh_config(id).await;
        }

        tracing::debug!(target: "upkeep::registry", active = ids.len(), "reconciled active upkeeps");
        Ok(ids.len())
    }

    /// Reads new lifecycle logs since the last poll boundary and enqueues
    /// them for processing.
    ///
    /// The boundary only advances on success, so a failed poll is retried on
    /// the next tick.
    pub async fn poll_logs(
        &self,
        queue: &mpsc::UnboundedSender<Log>,
    ) -> Result<usize, ProviderError> {
        let latest = self.inner.log_index.latest_block().await?.number;
        let last = self.inner.last_poll_block.load(Ordering::Acquire);
        if last == 0 {
            // First tick only establishes the boundary.
            self.inner.last_poll_block.store(latest, Ordering::Release);
            return Ok(0);
        }
        if latest <= last {
            return Ok(0);
        }

        let from = (last + 1).max(latest.saturating_sub(self.inner.config.poll_lookback));
        let logs = self
            .inner
            .log_index
            .logs_with_signatures(
                from,
                latest,
                &self.inner.registry.event_signatures(),
                self.inner.registry.address(),
            )
            .await?;
        self.inner.last_poll_block.store(latest, Ordering::Release);

        let count = logs.len();
        for log in logs {
            let _ = queue.send(log);
        }
        Ok(count)
    }

    /// Dispatches one polled log, de-duplicated by (tx hash, log index).
    ///
    /// Per-event errors are logged and never halt other event classes.
    pub async fn process_log(&self, log: Log) {
        if !self.inner.visited.lock().insert(log.dedup_key()) {
            tracing::trace!(target: "upkeep::registry", tx = %log.tx_hash, index = log.log_index, "skipping already-processed log");
            return;
        }

        let event = match self.inner.registry.parse_log(&log) {
            Ok(Some(event)) => event,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(target: "upkeep::registry", %err, "failed to parse registry log");
                return;
            }
        };

        let id = event.upkeep_id();
        if event.is_deactivating() {
            let removed = self.inner.active.remove(&[id]);
            self.inner.configs.write().remove(&id);
            if id.trigger_type() == UpkeepType::LogTrigger {
                if let Err(err) = self.inner.filters.unregister_filter(id).await {
                    tracing::warn!(target: "upkeep::registry", %id, %err, "failed to unregister log filter");
                }
            }
            tracing::debug!(target: "upkeep::registry", %id, removed, ?event, "deactivated upkeep");
        } else if event.is_activating() {
            let added = self.inner.active.add(&[id]);
            self.refresh_config(id).await;
            if id.trigger_type() == UpkeepType::LogTrigger {
                self.register_log_filter(id, None, log.block_number).await;
            }
            tracing::debug!(target: "upkeep::registry", %id, added, ?event, "activated upkeep");
        } else if let RegistryEvent::TriggerConfigSet(id, config) = event {
            if self.inner.active.is_active(id) {
                self.refresh_config(id).await;
                if id.trigger_type() == UpkeepType::LogTrigger {
                    self.register_log_filter(id, Some(config), log.block_number).await;
                }
            }
        }
    }

    /// Spawns the reconciliation, polling and processing tasks.
    pub fn start(&self) -> RegistryHandle
    where
        R: Send + Sync + 'static,
        L: Send + Sync + 'static,
        F: Send + Sync + 'static,
    {
        let token = CancellationToken::new();
        let (queue_tx, mut queue_rx) = mpsc::unbounded_channel();

        let reconciler = self.clone();
        let child = token.clone();
        let reconcile_task = tokio::spawn(async move {
            let timeout = reconciler.inner.config.refresh_interval;
            let mut ticks = tokio::time::interval(timeout);
            ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticks.tick() => {
                        match tokio::time::timeout(timeout, reconciler.reconcile()).await {
                            Ok(Ok(_)) => {}
                            Ok(Err(err)) => {
                                tracing::warn!(target: "upkeep::registry", %err, "reconciliation failed, keeping previous active set");
                            }
                            Err(_) => {
                                tracing::warn!(target: "upkeep::registry", "reconciliation timed out");
                            }
                        }
                    }
                }
            }
        });

        let poller = self.clone();
        let child = token.clone();
        let poll_task = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(poller.inner.config.poll_interval);
            ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticks.tick() => {
                        if let Err(err) = poller.poll_logs(&queue_tx).await {
                            tracing::warn!(target: "upkeep::registry", %err, "log poll failed, retrying next tick");
                        }
                    }
                }
            }
        });

        let processor = self.clone();
        let child = token.clone();
        let process_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    log = queue_rx.recv() => match log {
                        Some(log) => processor.process_log(log).await,
                        None => break,
                    },
                }
            }
        });

        RegistryHandle { token, tasks: vec![reconcile_task, poll_task, process_task] }
    }

    /// Caches the current on-chain configuration for one upkeep.
    async fn refresh_config(&self, id: UpkeepId) {
        match self.inner.registry.get_upkeep(id).await {
            Ok(info) => {
                self.inner.configs.write().insert(
                    id,
                    UpkeepConfig {
                        offchain_config: info.offchain_config,
                        perform_gas: info.perform_gas,
                    },
                );
            }
            Err(err) => {
                tracing::warn!(target: "upkeep::registry", %id, %err, "failed to refresh upkeep config");
            }
        }
    }

    /// Re-registers filters for one batch of log upkeeps.
    async fn refresh_log_filters(&self, ids: &[UpkeepId]) {
        for &id in ids {
            match self.latest_config_event(id).await {
                Ok(Some((RegistryEvent::TriggerConfigSet(_, config), block))) => {
                    self.register_log_filter(id, Some(config), block).await;
                }
                Ok(Some((_, block))) => {
                    self.register_log_filter(id, None, block).await;
                }
                Ok(None) => {
                    // No event in the index; fall back to the current config
                    // with no start-block preference.
                    self.register_log_filter(id, None, 0).await;
                }
                Err(err) => {
                    tracing::warn!(target: "upkeep::registry", %id, %err, "failed to look up filter start block");
                }
            }
        }
    }

    /// The most recent trigger-config-set or unpaused event for `id`, with
    /// its block number.
    async fn latest_config_event(
        &self,
        id: UpkeepId,
    ) -> Result<Option<(RegistryEvent, u64)>, ProviderError> {
        let value = B256::from(id.to_be_bytes());
        let mut best: Option<(RegistryEvent, u64, u64)> = None;
        for signature in self.inner.registry.event_signatures() {
            let logs = self
                .inner
                .log_index
                .indexed_logs(signature, self.inner.registry.address(), 1, &[value], 1)
                .await?;
            for log in logs {
                let Ok(Some(event)) = self.inner.registry.parse_log(&log) else { continue };
                if event.upkeep_id() != id {
                    continue;
                }
                if !matches!(
                    event,
                    RegistryEvent::TriggerConfigSet(..) | RegistryEvent::Unpaused(_)
                ) {
                    continue;
                }
                let newer = best
                    .as_ref()
                    .map_or(true, |(_, block, index)| {
                        (log.block_number, log.log_index) > (*block, *index)
                    });
                if newer {
                    best = Some((event, log.block_number, log.log_index));
                }
            }
        }
        Ok(best.map(|(event, block, _)| (event, block)))
    }

    /// Registers the log filter for one upkeep, fetching the current trigger
    /// config when none is supplied.
    async fn register_log_filter(&self, id: UpkeepId, config: Option<Bytes>, update_block: u64) {
        let trigger_config = match config {
            Some(config) => config,
            None => match self.inner.registry.get_upkeep_trigger_config(id).await {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!(target: "upkeep::registry", %id, %err, "failed to fetch trigger config");
                    return;
                }
            },
        };
        let opts = LogFilterOptions { upkeep_id: id, trigger_config, update_block };
        if let Err(err) = self.inner.filters.register_filter(opts).await {
            tracing::warn!(target: "upkeep::registry", %id, %err, "failed to register log filter");
        }
    }
}

impl<R, L, F> UpkeepConfigView for Registry<R, L, F>
where
    R: Send + Sync,
    L: Send + Sync,
    F: Send + Sync,
{
    fn offchain_config(&self, id: &UpkeepId) -> Option<Bytes> {
        self.inner.configs.read().get(id).map(|config| config.offchain_config.clone())
    }
}

/// Join handle for the orchestrator's background tasks.
#[derive(Debug)]
pub struct RegistryHandle {
    token: CancellationToken,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl RegistryHandle {
    /// Signals all tasks to stop and waits for them to drain.
    pub async fn close(self) {
        self.token.cancel();
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;
    use upkeep_provider::{
        test_utils::{MockFilterStore, MockLogIndex, MockRegistry},
        RegistryState, UpkeepInfo,
    };

    fn id_with_type(tag: u8, tail: u8) -> UpkeepId {
        let mut bytes = [0u8; 32];
        bytes[15] = tag;
        bytes[31] = tail;
        UpkeepId::new(U256::from_be_bytes(bytes))
    }

    fn registry_with(
        ids: Vec<UpkeepId>,
        config: RegistryConfig,
    ) -> Registry<MockRegistry, MockLogIndex, MockFilterStore> {
        let contract = MockRegistry::default();
        *contract.state.lock() = RegistryState { num_upkeeps: ids.len() as u64, paused: false };
        {
            let mut upkeeps = contract.upkeeps.lock();
            for &id in &ids {
                upkeeps.insert(id, UpkeepInfo { perform_gas: 500_000, ..Default::default() });
            }
        }
        *contract.active_ids.lock() = ids;
        Registry::new(config, contract, MockLogIndex::default(), MockFilterStore::default())
    }

    #[tokio::test]
    async fn reconcile_pages_through_active_ids() {
        let ids =
            vec![id_with_type(0, 1), id_with_type(1, 2), id_with_type(0, 3), id_with_type(1, 4)];
        let registry = registry_with(
            ids.clone(),
            RegistryConfig { page_size: 3, ..Default::default() },
        );

        let count = registry.reconcile().await.unwrap();

        assert_eq!(count, 4);
        for id in &ids {
            assert!(registry.active().is_active(*id));
        }
        // Log-trigger filters re-registered, conditional ids untouched.
        let filters = registry.inner.filters.registered.lock();
        assert!(filters.contains_key(&id_with_type(1, 2)));
        assert!(filters.contains_key(&id_with_type(1, 4)));
        assert!(!filters.contains_key(&id_with_type(0, 1)));
    }

    #[tokio::test]
    async fn reconcile_populates_config_cache() {
        let id = id_with_type(0, 1);
        let registry = registry_with(vec![id], RegistryConfig::default());
        registry
            .inner
            .registry
            .upkeeps
            .lock()
            .insert(id, UpkeepInfo {
                perform_gas: 123,
                offchain_config: Bytes::from(vec![1, 2]),
                ..Default::default()
            });

        registry.reconcile().await.unwrap();

        assert_eq!(registry.offchain_config(&id), Some(Bytes::from(vec![1, 2])));
    }

    #[tokio::test]
    async fn reconcile_failure_keeps_previous_set() {
        let id = id_with_type(0, 1);
        let registry = registry_with(vec![id], RegistryConfig::default());
        registry.reconcile().await.unwrap();
        assert!(registry.active().is_active(id));

        *registry.inner.registry.fail_state.lock() =
            Some(ProviderError::ContractRead("rpc down".into()));
        assert!(registry.reconcile().await.is_err());
        assert!(registry.active().is_active(id));
    }

    #[tokio::test]
    async fn lifecycle_events_drive_membership() {
        let registry = registry_with(vec![], RegistryConfig::default());
        let id = id_with_type(1, 7);
        registry
            .inner
            .registry
            .upkeeps
            .lock()
            .insert(id, UpkeepInfo { perform_gas: 9, ..Default::default() });
        registry
            .inner
            .registry
            .trigger_configs
            .lock()
            .insert(id, Bytes::from(vec![0xaa]));

        let registered = Log {
            tx_hash: B256::with_last_byte(1),
            log_index: 0,
            block_number: 10,
            ..Default::default()
        };
        registry
            .inner
            .registry
            .parsed
            .lock()
            .insert(registered.dedup_key(), RegistryEvent::Registered(id));
        registry.process_log(registered).await;

        assert!(registry.active().is_active(id));
        assert!(registry.offchain_config(&id).is_some());
        let registered_filter =
            registry.inner.filters.registered.lock().get(&id).cloned().unwrap();
        assert_eq!(registered_filter.update_block, 10);
        assert_eq!(registered_filter.trigger_config, Bytes::from(vec![0xaa]));

        let paused = Log {
            tx_hash: B256::with_last_byte(2),
            log_index: 0,
            ..Default::default()
        };
        registry
            .inner
            .registry
            .parsed
            .lock()
            .insert(paused.dedup_key(), RegistryEvent::Paused(id));
        registry.process_log(paused).await;

        assert!(!registry.active().is_active(id));
        assert_eq!(registry.offchain_config(&id), None);
        assert_eq!(registry.inner.filters.unregistered.lock().as_slice(), &[id]);
    }

    #[tokio::test]
    async fn reprocessing_the_same_log_is_a_noop() {
        let registry = registry_with(vec![], RegistryConfig::default());
        let id = id_with_type(0, 5);
        registry
            .inner
            .registry
            .upkeeps
            .lock()
            .insert(id, UpkeepInfo::default());

        let log = Log { tx_hash: B256::with_last_byte(9), log_index: 3, ..Default::default() };
        registry
            .inner
            .registry
            .parsed
            .lock()
            .insert(log.dedup_key(), RegistryEvent::Registered(id));

        registry.process_log(log.clone()).await;
        assert!(registry.active().is_active(id));

        // Drop the id out-of-band; a replayed log must not re-add it.
        registry.active().remove(&[id]);
        registry.process_log(log).await;
        assert!(!registry.active().is_active(id));
    }

    #[tokio::test]
    async fn trigger_config_set_refreshes_only_active_ids() {
        let registry = registry_with(vec![], RegistryConfig::default());
        let id = id_with_type(1, 3);
        registry
            .inner
            .registry
            .upkeeps
            .lock()
            .insert(id, UpkeepInfo::default());

        let log = Log { tx_hash: B256::with_last_byte(4), log_index: 1, block_number: 77, ..Default::default() };
        registry
            .inner
            .registry
            .parsed
            .lock()
            .insert(log.dedup_key(), RegistryEvent::TriggerConfigSet(id, Bytes::from(vec![7])));

        // Inactive: ignored.
        registry.process_log(log.clone()).await;
        assert!(registry.inner.filters.registered.lock().is_empty());

        // Active: config refreshed and filter re-registered from the event.
        registry.active().add(&[id]);
        let replay = Log { tx_hash: B256::with_last_byte(5), ..log };
        registry
            .inner
            .registry
            .parsed
            .lock()
            .insert(replay.dedup_key(), RegistryEvent::TriggerConfigSet(id, Bytes::from(vec![7])));
        registry.process_log(replay).await;
        let filter = registry.inner.filters.registered.lock().get(&id).cloned().unwrap();
        assert_eq!(filter.trigger_config, Bytes::from(vec![7]));
        assert_eq!(filter.update_block, 77);
    }

    #[tokio::test]
    async fn poll_logs_establishes_then_advances_boundary() {
        let signature = B256::with_last_byte(0xee);
        let contract = MockRegistry { signatures: vec![signature], ..Default::default() };
        let index = MockLogIndex::default();
        index.seed_blocks(1, 20);
        let registry =
            Registry::new(RegistryConfig::default(), contract, index, MockFilterStore::default());

        let (tx, mut rx) = mpsc::unbounded_channel();

        // First tick: boundary only.
        assert_eq!(registry.poll_logs(&tx).await.unwrap(), 0);

        // New block with a matching log.
        registry.inner.log_index.blocks.lock().insert(21, B256::with_last_byte(21));
        registry.inner.log_index.logs.lock().push(Log {
            topics: vec![signature],
            block_number: 21,
            tx_hash: B256::with_last_byte(1),
            ..Default::default()
        });

        assert_eq!(registry.poll_logs(&tx).await.unwrap(), 1);
        assert!(rx.try_recv().is_ok());

        // Nothing new: no re-delivery.
        assert_eq!(registry.poll_logs(&tx).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn start_and_close_drain_tasks() {
        let registry = registry_with(vec![id_with_type(0, 1)], RegistryConfig {
            poll_interval: Duration::from_millis(10),
            ..Default::default()
        });
        registry.inner.log_index.seed_blocks(1, 5);

        let handle = registry.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.close().await;

        // Reconciliation ran at least once on startup.
        assert!(registry.active().is_active(id_with_type(0, 1)));
    }
}
