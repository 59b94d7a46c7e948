//! `sol!` definitions for the wire formats this crate speaks.

use alloy_sol_types::sol;

sol! {
    /// Trigger payload for conditional upkeeps.
    struct ConditionalTriggerData {
        uint32 blockNum;
        bytes32 blockHash;
    }

    /// Trigger payload for log-triggered upkeeps.
    struct LogTriggerData {
        bytes32 logBlockHash;
        bytes32 txHash;
        uint32 logIndex;
        uint32 blockNum;
        bytes32 blockHash;
    }

    /// The raw log handed to a log upkeep's check call.
    struct TriggerLog {
        uint256 index;
        bytes32 txHash;
        uint256 blockNumber;
        bytes32 blockHash;
        address source;
        bytes32[] topics;
        bytes data;
    }

    /// The canonical report layout: parallel arrays plus batch-level fee
    /// observations.
    struct AutomationReport {
        uint256 fastGasWei;
        uint256 linkNative;
        uint256[] upkeepIds;
        uint256[] gasLimits;
        bytes[] triggers;
        bytes[] performDatas;
    }

    /// Carrier functions used purely for their argument packing; the
    /// selector is stripped after encoding.
    function validateConditionalTrigger(ConditionalTriggerData data) external;
    function validateLogTrigger(LogTriggerData data) external;
    function validateTriggerLog(TriggerLog log) external;

    /// Read surface of the registry contract the pipeline calls into.
    interface IAutomationRegistry {
        function checkUpkeep(uint256 id, bytes memory triggerData)
            external
            view
            returns (
                bool upkeepNeeded,
                bytes memory performData,
                uint8 upkeepFailureReason,
                uint256 gasUsed,
                uint256 gasLimit,
                uint256 fastGasWei,
                uint256 linkNative
            );

        function checkUpkeep(uint256 id)
            external
            view
            returns (
                bool upkeepNeeded,
                bytes memory performData,
                uint8 upkeepFailureReason,
                uint256 gasUsed,
                uint256 gasLimit,
                uint256 fastGasWei,
                uint256 linkNative
            );

        function simulatePerformUpkeep(uint256 id, bytes memory performData)
            external
            view
            returns (bool success, uint256 gasUsed);
    }
}

pub(crate) use IAutomationRegistry::{
    checkUpkeep_0Call, checkUpkeep_1Call, simulatePerformUpkeepCall,
};
