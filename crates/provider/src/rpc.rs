use crate::RpcError;
use alloy_primitives::{Address, Bytes, B256};

/// One read-only contract call, executed at a specific block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EthCall {
    /// Target contract.
    pub to: Address,
    /// ABI-encoded calldata.
    pub data: Bytes,
    /// Block number to execute against.
    pub block: u64,
}

/// A transaction receipt, reduced to the fields the pipeline verifies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxReceipt {
    /// The transaction.
    pub tx_hash: B256,
    /// Block it was included in.
    pub block_number: u64,
    /// Hash of that block.
    pub block_hash: B256,
}

/// Raw RPC access to the chain.
///
/// `batch_eth_call` keeps per-item result slots: the outer `Result` is the
/// transport, the inner one is each sub-request. Callers must treat an outer
/// error as fatal to the whole batch and an inner error as attributable to a
/// single item.
#[async_trait::async_trait]
#[auto_impl::auto_impl(&, Arc)]
pub trait EvmRpc: Send + Sync {
    /// Canonical hash at `number`, `None` when the node does not know the
    /// block.
    async fn block_hash_by_number(&self, number: u64) -> Result<Option<B256>, RpcError>;

    /// Receipt for `tx_hash`, `None` when the transaction is not on the
    /// node's canonical chain.
    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>, RpcError>;

    /// Executes all calls as one batched request.
    ///
    /// The returned vector has exactly one slot per input call, in order.
    async fn batch_eth_call(
        &self,
        calls: &[EthCall],
    ) -> Result<Vec<Result<Bytes, RpcError>>, RpcError>;
}
