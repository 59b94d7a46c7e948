/// Errors surfaced by the raw RPC transport.
///
/// A `Transport` error means the batch or call itself failed and nothing in
/// it was answered; `Call` is a per-item failure inside an otherwise
/// successful batch. The distinction drives the fatal-vs-retryable split in
/// the check pipeline.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// The transport itself failed; no per-item results exist.
    #[error("rpc transport failure: {0}")]
    Transport(String),
    /// A single call inside a batch failed.
    #[error("rpc call failed: {0}")]
    Call(String),
    /// A response could not be decoded.
    #[error("rpc response decode failed: {0}")]
    Decode(String),
}

impl RpcError {
    /// Whether the error text indicates the queried block is missing or
    /// pruned on the serving node.
    ///
    /// Used to distinguish a legitimately-too-old check block from provider
    /// flakiness; matches the strings common execution clients emit.
    pub fn indicates_missing_block(&self) -> bool {
        let text = match self {
            Self::Transport(t) | Self::Call(t) | Self::Decode(t) => t,
        };
        let text = text.to_ascii_lowercase();
        ["header not found", "missing trie node", "block not found", "pruned"]
            .iter()
            .any(|needle| text.contains(needle))
    }
}

/// Errors from higher-level collaborators (contract reads, log index).
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// An underlying RPC failure.
    #[error(transparent)]
    Rpc(#[from] RpcError),
    /// A registry contract read failed.
    #[error("contract read failed: {0}")]
    ContractRead(String),
    /// A registry log could not be parsed.
    #[error("log parse failed: {0}")]
    LogParse(String),
    /// The log index rejected a filter operation.
    #[error("log filter operation failed: {0}")]
    Filter(String),
}
