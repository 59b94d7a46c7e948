//! ABI codec for the automation upkeep core.
//!
//! Two codec objects, constructed once at startup and passed by reference:
//! [`Packer`] handles per-item encodings (check/simulate calldata, trigger
//! structures, log trigger data, offchain config) and [`ReportEncoder`]
//! handles the aggregate report format.
//!
//! Trigger structures are packed through function-call encoding with the
//! 4-byte selector stripped. The selector is an artifact of using call
//! packing for a pure data structure; the stripped form is the canonical
//! wire format and unpacking expects it.

mod abi;
mod packer;
mod report;

pub use packer::{CheckResponse, Packer, SimulateResponse};
pub use report::{DecodedReport, ReportEncoder, ReportedUpkeep};

/// Errors raised while packing or unpacking.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// `encode` was handed zero results.
    #[error("cannot encode an empty set of results")]
    EmptyResults,
    /// A log upkeep's trigger is missing its log extension.
    #[error("log trigger extension missing for log upkeep")]
    MissingLogExtension,
    /// The report's parallel arrays disagree on length.
    #[error("report field arrays have mismatched lengths")]
    LengthMismatch,
    /// A block number does not fit the wire format's uint32.
    #[error("block number {0} overflows the trigger encoding")]
    BlockNumberOverflow(u64),
    /// The underlying ABI decode failed.
    #[error("abi decode failed: {0}")]
    Abi(String),
}

impl From<alloy_sol_types::Error> for EncodingError {
    fn from(err: alloy_sol_types::Error) -> Self {
        Self::Abi(err.to_string())
    }
}
