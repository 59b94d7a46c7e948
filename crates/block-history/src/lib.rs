//! Reorg-aware rolling block-history tracker.
//!
//! Consumes chain-head notifications, maintains a bounded number→hash map of
//! recent observations, and fans a fixed-length [`BlockHistory`] window out
//! to subscribers. Reorgs are resolved by walking every new head's parent
//! chain and overwriting the stored hash for each visited number: a short
//! reorg may only partially overwrite history through a shallow broadcast,
//! so the walk never stops at the first already-matching entry.

use alloy_primitives::B256;
use parking_lot::{Mutex, RwLock};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::Duration,
};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use upkeep_provider::{BlockSource, LogIndex};
use upkeep_types::{BlockHistory, BlockKey, ChainHead};

/// Tuning for the tracker.
#[derive(Debug, Clone)]
pub struct BlockHistoryConfig {
    /// How many blocks of history the map retains.
    pub window: u64,
    /// Length of the snapshot pushed to subscribers.
    pub history_size: u64,
    /// Chain finality depth; together with `window` it bounds the parent
    /// walk on each head.
    pub finality_depth: u64,
    /// Capacity of each subscriber's queue. A full queue drops the snapshot.
    pub channel_capacity: usize,
    /// How often stale map entries are garbage-collected.
    pub cleanup_interval: Duration,
}

impl Default for BlockHistoryConfig {
    fn default() -> Self {
        Self {
            window: 1024,
            history_size: 256,
            finality_depth: 64,
            channel_capacity: 16,
            cleanup_interval: Duration::from_secs(15),
        }
    }
}

/// Identifies one subscriber queue.
pub type SubscriptionId = u64;

#[derive(Debug)]
struct Inner<L> {
    config: BlockHistoryConfig,
    log_index: L,
    /// Last observed hash per block number. Last write wins under reorg.
    blocks: RwLock<BTreeMap<u64, B256>>,
    subscribers: RwLock<HashMap<SubscriptionId, mpsc::Sender<BlockHistory>>>,
    next_subscription: Mutex<SubscriptionId>,
    /// Highest block number already garbage-collected; advances
    /// monotonically.
    last_cleared: Mutex<u64>,
    /// Latest head, readable without taking the map lock.
    latest: watch::Sender<Option<BlockKey>>,
}

/// The tracker handle. Cheap to clone; all clones share state.
#[derive(Debug)]
pub struct BlockHistoryTracker<L> {
    inner: Arc<Inner<L>>,
}

impl<L> Clone for BlockHistoryTracker<L> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<L: LogIndex> BlockHistoryTracker<L> {
    /// Creates an empty tracker.
    pub fn new(config: BlockHistoryConfig, log_index: L) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                config,
                log_index,
                blocks: RwLock::new(BTreeMap::new()),
                subscribers: RwLock::new(HashMap::new()),
                next_subscription: Mutex::new(0),
                last_cleared: Mutex::new(0),
                latest,
            }),
        }
    }

    /// Seeds the map with the most recent window of blocks from the log
    /// index.
    ///
    /// A failed fetch is logged and leaves the map empty; the tracker
    /// self-heals as new heads arrive.
    pub async fn initialize(&self) {
        let latest = match self.inner.log_index.latest_block().await {
            Ok(latest) => latest,
            Err(err) => {
                tracing::warn!(target: "upkeep::block_history", %err, "initial latest-block fetch failed, starting empty");
                return;
            }
        };

        let start = (latest.number + 1).saturating_sub(self.inner.config.window);
        let numbers: Vec<u64> = (start..=latest.number).collect();
        let fetched = match self.inner.log_index.blocks_in_range(&numbers).await {
            Ok(fetched) => fetched,
            Err(err) => {
                tracing::warn!(target: "upkeep::block_history", %err, "initial block-range fetch failed, starting empty");
                return;
            }
        };

        {
            let mut blocks = self.inner.blocks.write();
            for block in &fetched {
                blocks.insert(block.number, block.hash);
            }
        }
        *self.inner.last_cleared.lock() = start.saturating_sub(1);
        self.inner.latest.send_replace(Some(latest));
        tracing::debug!(
            target: "upkeep::block_history",
            blocks = fetched.len(),
            latest = latest.number,
            "initialized block history"
        );
    }

    /// Records a new head and fans the fresh history window out.
    ///
    /// Walks the head's parent chain up to max(finality depth, window)
    /// ancestors, overwriting every visited number. Heads must be delivered
    /// in order; the caller (the run loop) is the only consumer of the head
    /// queue.
    pub fn on_head(&self, head: &ChainHead) {
        let depth = self.inner.config.finality_depth.max(self.inner.config.window) as usize;
        {
            let mut blocks = self.inner.blocks.write();
            for block in head.blocks().take(depth + 1) {
                blocks.insert(block.number, block.hash);
            }
        }
        self.inner.latest.send_replace(Some(head.block));

        let history = self.build_history(head.block.number);
        let subscribers = self.inner.subscribers.read();
        for (id, queue) in subscribers.iter() {
            if queue.try_send(history.clone()).is_err() {
                // Lossy by design: the subscriber must trust its latest
                // snapshot, not every intermediate one.
                tracing::trace!(target: "upkeep::block_history", subscription = id, "subscriber queue full, dropping snapshot");
            }
        }
    }

    /// Builds the most recent window ending at `latest`, descending,
    /// skipping numbers absent from the map.
    pub fn build_history(&self, latest: u64) -> BlockHistory {
        let blocks = self.inner.blocks.read();
        let keys = blocks
            .range(..=latest)
            .rev()
            .take(self.inner.config.history_size as usize)
            .map(|(&number, &hash)| BlockKey::new(number, hash))
            .collect();
        BlockHistory::new(keys)
    }

    /// Adds a subscriber queue and returns its id with the receiving end.
    pub fn subscribe(&self) -> (SubscriptionId, mpsc::Receiver<BlockHistory>) {
        let (tx, rx) = mpsc::channel(self.inner.config.channel_capacity);
        let mut next = self.inner.next_subscription.lock();
        let id = *next;
        *next += 1;
        self.inner.subscribers.write().insert(id, tx);
        (id, rx)
    }

    /// Removes a subscriber queue. Returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscribers.write().remove(&id).is_some()
    }

    /// Garbage-collects entries older than (latest − window), advancing the
    /// cleared boundary monotonically.
    pub fn cleanup(&self) {
        let Some(latest) = self.latest_block() else { return };
        let cutoff = latest.number.saturating_sub(self.inner.config.window);
        if cutoff == 0 {
            return;
        }
        let removed = {
            let mut blocks = self.inner.blocks.write();
            let keep = blocks.split_off(&cutoff);
            let removed = blocks.len();
            *blocks = keep;
            removed
        };
        let mut last_cleared = self.inner.last_cleared.lock();
        *last_cleared = (*last_cleared).max(cutoff - 1);
        if removed > 0 {
            tracing::trace!(target: "upkeep::block_history", removed, boundary = *last_cleared, "cleaned up block history");
        }
    }

    /// Highest block number already garbage-collected.
    pub fn last_cleared(&self) -> u64 {
        *self.inner.last_cleared.lock()
    }

    /// Spawns the run loop consuming `heads` and running periodic cleanup.
    pub fn start(&self, mut heads: mpsc::UnboundedReceiver<ChainHead>) -> TrackerHandle
    where
        L: Send + Sync + 'static,
    {
        let token = CancellationToken::new();
        let tracker = self.clone();
        let child = token.clone();
        let task = tokio::spawn(async move {
            let mut cleanup = tokio::time::interval(tracker.inner.config.cleanup_interval);
            cleanup.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    head = heads.recv() => match head {
                        Some(head) => tracker.on_head(&head),
                        None => break,
                    },
                    _ = cleanup.tick() => tracker.cleanup(),
                }
            }
            tracing::debug!(target: "upkeep::block_history", "block history run loop stopped");
        });
        TrackerHandle { token, task }
    }
}

impl<L: Send + Sync> BlockSource for BlockHistoryTracker<L> {
    fn latest_block(&self) -> Option<BlockKey> {
        *self.inner.latest.borrow()
    }

    fn block_hash(&self, number: u64) -> Option<B256> {
        self.inner.blocks.read().get(&number).copied()
    }
}

/// Join handle for the tracker's background task.
#[derive(Debug)]
pub struct TrackerHandle {
    token: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl TrackerHandle {
    /// Signals the run loop to stop and waits for it to drain.
    pub async fn close(self) {
        self.token.cancel();
        let _ = self.task.await;
    }
}
