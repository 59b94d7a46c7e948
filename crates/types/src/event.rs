use crate::UpkeepId;
use alloy_primitives::Bytes;

/// Upkeep lifecycle events parsed from registry logs.
///
/// A closed set: the orchestrator dispatches on these to keep the active set
/// and per-upkeep configuration current between full reconciliations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A new upkeep was registered.
    Registered(UpkeepId),
    /// An upkeep was migrated in from another registry.
    Received(UpkeepId),
    /// A paused upkeep resumed.
    Unpaused(UpkeepId),
    /// An upkeep was paused.
    Paused(UpkeepId),
    /// An upkeep was canceled.
    Canceled(UpkeepId),
    /// An upkeep was migrated out to another registry.
    Migrated(UpkeepId),
    /// The trigger configuration of an upkeep changed.
    TriggerConfigSet(UpkeepId, Bytes),
}

impl RegistryEvent {
    /// The upkeep the event concerns.
    pub fn upkeep_id(&self) -> UpkeepId {
        match self {
            Self::Registered(id)
            | Self::Received(id)
            | Self::Unpaused(id)
            | Self::Paused(id)
            | Self::Canceled(id)
            | Self::Migrated(id)
            | Self::TriggerConfigSet(id, _) => *id,
        }
    }

    /// Whether the event activates the upkeep.
    pub fn is_activating(&self) -> bool {
        matches!(self, Self::Registered(_) | Self::Received(_) | Self::Unpaused(_))
    }

    /// Whether the event deactivates the upkeep.
    pub fn is_deactivating(&self) -> bool {
        matches!(self, Self::Paused(_) | Self::Canceled(_) | Self::Migrated(_))
    }
}
