//! Abstract interfaces to the collaborators the upkeep core depends on.
//!
//! Everything chain-facing goes through these traits: the log-indexing
//! engine, the head broadcast, the raw RPC transport, the registry contract
//! read path and the gas estimator. The core owns no persistence and no
//! transport; implementations live with the node integration.
//!
//! The `test-utils` feature exposes in-memory mocks used across the
//! workspace's tests.

mod blocks;
mod error;
mod gas;
mod head;
mod log_index;
mod registry;
mod rpc;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use blocks::{BlockSource, UpkeepConfigView};
pub use error::{ProviderError, RpcError};
pub use gas::GasEstimator;
pub use head::HeadFeed;
pub use log_index::{LogFilterOptions, LogIndex, UpkeepFilterStore};
pub use registry::{RegistryReader, RegistryState, UpkeepInfo};
pub use rpc::{EthCall, EvmRpc, TxReceipt};
