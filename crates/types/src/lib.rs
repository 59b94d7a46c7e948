//! Core data model shared across the upkeep workspace.
//!
//! These are plain value types: block observations, upkeep identifiers and
//! their trigger-type tagging, check triggers, work payloads and check
//! results. No I/O lives here.

mod block;
mod check;
mod event;
mod log;
mod trigger;
mod upkeep;
mod work;

pub use block::{BlockHistory, BlockKey, ChainHead};
pub use check::{CheckResult, IneligibilityReason, PipelineExecutionState};
pub use event::RegistryEvent;
pub use log::Log;
pub use trigger::{LogTriggerExtension, Trigger};
pub use upkeep::{UpkeepId, UpkeepType};
pub use work::{work_id, UpkeepPayload};
