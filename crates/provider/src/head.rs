use tokio::sync::mpsc;
use upkeep_types::ChainHead;

/// Chain-head broadcast.
///
/// Each notification carries the new head plus a bounded parent chain.
/// Dropping the receiver unsubscribes.
#[auto_impl::auto_impl(&, Arc)]
pub trait HeadFeed: Send + Sync {
    /// Subscribes to head notifications, delivered strictly in arrival order.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<ChainHead>;
}
