use crate::{Trigger, UpkeepId, UpkeepPayload};
use alloy_primitives::{Bytes, B256, U256};

/// Where in the pipeline an item stopped, when it did not reach a clean
/// eligibility decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineExecutionState {
    /// The item flowed through every stage.
    #[default]
    NoError = 0,
    /// The check block trails the tip too far for the node to serve it.
    CheckBlockTooOld = 1,
    /// The check block is no longer canonical.
    CheckBlockInvalid = 2,
    /// A transient RPC failure; the caller should re-queue the item.
    RpcFlakyFailure = 3,
    /// A response could not be packed or unpacked.
    PackUnpackDecodeFailed = 4,
}

/// Why an item was found ineligible.
///
/// Values up to [`Self::RegistryPaused`] mirror the on-chain failure reason
/// enum returned by the check call; the remaining values are assigned by the
/// pipeline itself and start past the contract's range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum IneligibilityReason {
    /// Eligible, or not yet decided.
    #[default]
    None = 0,
    /// The upkeep was canceled on-chain.
    UpkeepCancelled = 1,
    /// The upkeep is paused on-chain.
    UpkeepPaused = 2,
    /// The target's check function reverted.
    TargetCheckReverted = 3,
    /// The target reported no work.
    UpkeepNotNeeded = 4,
    /// Perform data exceeds the registry limit.
    PerformDataExceedsLimit = 5,
    /// The upkeep balance cannot cover the perform.
    InsufficientBalance = 6,
    /// The trigger callback reverted.
    CallbackReverted = 7,
    /// Revert data exceeds the registry limit.
    RevertDataExceedsLimit = 8,
    /// The registry is paused.
    RegistryPaused = 9,
    /// The triggering transaction is no longer on the chain.
    TxHashNoLongerExists = 32,
    /// The triggering log was reorged to a different block.
    TxHashReorged = 33,
    /// The simulate-perform call did not succeed.
    SimulationFailed = 34,
    /// The current gas price exceeds the upkeep's configured ceiling.
    GasPriceTooHigh = 35,
}

impl IneligibilityReason {
    /// Maps a raw contract failure reason, `None` for values outside the
    /// contract's enum.
    pub fn from_contract(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::None,
            1 => Self::UpkeepCancelled,
            2 => Self::UpkeepPaused,
            3 => Self::TargetCheckReverted,
            4 => Self::UpkeepNotNeeded,
            5 => Self::PerformDataExceedsLimit,
            6 => Self::InsufficientBalance,
            7 => Self::CallbackReverted,
            8 => Self::RevertDataExceedsLimit,
            9 => Self::RegistryPaused,
            _ => return None,
        })
    }
}

/// The pipeline's decision for one work payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckResult {
    /// The upkeep that was checked.
    pub upkeep_id: UpkeepId,
    /// The trigger it was checked under.
    pub trigger: Trigger,
    /// Dedup key carried over from the payload.
    pub work_id: B256,
    /// Whether the work should be performed.
    pub eligible: bool,
    /// Why not, when ineligible.
    pub ineligibility_reason: IneligibilityReason,
    /// Pipeline stage outcome, when the item did not complete cleanly.
    pub pipeline_execution_state: PipelineExecutionState,
    /// Whether the caller should re-queue the item.
    pub retryable: bool,
    /// Calldata to perform with, for eligible items.
    pub perform_data: Bytes,
    /// Gas allocated for the perform.
    pub gas_allocated: u64,
    /// Fast gas price observed at check time, in wei.
    pub fast_gas_wei: U256,
    /// LINK/native exchange rate observed at check time.
    pub link_native: U256,
}

impl CheckResult {
    /// Seeds a pending result from a payload.
    pub fn from_payload(payload: &UpkeepPayload) -> Self {
        Self {
            upkeep_id: payload.upkeep_id,
            trigger: payload.trigger.clone(),
            work_id: payload.work_id,
            ..Default::default()
        }
    }

    /// Marks the result ineligible with the given classification.
    pub fn fail(
        &mut self,
        reason: IneligibilityReason,
        state: PipelineExecutionState,
        retryable: bool,
    ) {
        self.eligible = false;
        self.ineligibility_reason = reason;
        self.pipeline_execution_state = state;
        self.retryable = retryable;
    }
}
