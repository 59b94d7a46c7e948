use crate::RpcError;
use alloy_primitives::U256;

/// Current gas fee estimate.
#[async_trait::async_trait]
#[auto_impl::auto_impl(&, Arc)]
pub trait GasEstimator: Send + Sync {
    /// Estimated execution price in wei per gas.
    async fn estimate(&self) -> Result<U256, RpcError>;
}
