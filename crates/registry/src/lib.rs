//! Active upkeep set and on-chain registry orchestrator.
//!
//! The orchestrator reconciles locally tracked state against the registry
//! contract's authoritative view on a timer, and keeps state current between
//! reconciliations by polling and dispatching upkeep lifecycle logs.

mod active;
mod dedup;
mod orchestrator;

pub use active::ActiveUpkeepList;
pub use orchestrator::{Registry, RegistryConfig, RegistryHandle, UpkeepConfig};
