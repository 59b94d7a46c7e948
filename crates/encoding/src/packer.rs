use crate::{
    abi::{
        checkUpkeep_0Call, checkUpkeep_1Call, simulatePerformUpkeepCall, ConditionalTriggerData,
        LogTriggerData, TriggerLog, validateConditionalTriggerCall, validateLogTriggerCall,
        validateTriggerLogCall,
    },
    EncodingError,
};
use alloy_primitives::{Bytes, U256};
use alloy_sol_types::{SolCall, SolValue};
use upkeep_types::{Log, LogTriggerExtension, Trigger, UpkeepId, UpkeepPayload, UpkeepType};

/// Length of the function selector prefix stripped from trigger encodings.
const SELECTOR_LEN: usize = 4;

/// Decoded return of a check call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckResponse {
    /// Whether the target reported work.
    pub eligible: bool,
    /// Raw contract failure reason.
    pub failure_reason: u8,
    /// Calldata for the perform call.
    pub perform_data: Bytes,
    /// Gas the check call consumed.
    pub gas_used: U256,
    /// Gas limit registered for the upkeep.
    pub gas_limit: U256,
    /// Fast gas price at the check block, in wei.
    pub fast_gas_wei: U256,
    /// LINK/native rate at the check block.
    pub link_native: U256,
}

/// Decoded return of a simulate-perform call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulateResponse {
    /// Whether the simulated perform succeeded.
    pub success: bool,
    /// Gas the simulation consumed.
    pub gas_used: U256,
}

/// Per-item ABI packing.
///
/// Stateless; constructed once and passed by reference wherever calldata or
/// trigger bytes are produced or consumed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Packer;

impl Packer {
    /// Packs the check calldata for one payload, selecting the function
    /// overload by the upkeep's trigger type.
    pub fn pack_check_call(&self, payload: &UpkeepPayload) -> Bytes {
        let id = payload.upkeep_id.0;
        match payload.upkeep_id.trigger_type() {
            UpkeepType::LogTrigger => checkUpkeep_0Call {
                id,
                triggerData: payload.check_data.clone(),
            }
            .abi_encode()
            .into(),
            UpkeepType::Conditional => checkUpkeep_1Call { id }.abi_encode().into(),
        }
    }

    /// Unpacks a check call's return data.
    pub fn unpack_check_response(&self, data: &[u8]) -> Result<CheckResponse, EncodingError> {
        let ret = checkUpkeep_0Call::abi_decode_returns(data, true)?;
        Ok(CheckResponse {
            eligible: ret.upkeepNeeded,
            failure_reason: ret.upkeepFailureReason,
            perform_data: ret.performData,
            gas_used: ret.gasUsed,
            gas_limit: ret.gasLimit,
            fast_gas_wei: ret.fastGasWei,
            link_native: ret.linkNative,
        })
    }

    /// Packs check return data; the inverse of
    /// [`Self::unpack_check_response`], used by simulators and mocks.
    pub fn pack_check_response(&self, response: &CheckResponse) -> Bytes {
        checkUpkeep_0Call::abi_encode_returns(&(
            response.eligible,
            response.perform_data.clone(),
            response.failure_reason,
            response.gas_used,
            response.gas_limit,
            response.fast_gas_wei,
            response.link_native,
        ))
        .into()
    }

    /// Packs simulate return data; the inverse of
    /// [`Self::unpack_simulate_response`].
    pub fn pack_simulate_response(&self, response: &SimulateResponse) -> Bytes {
        simulatePerformUpkeepCall::abi_encode_returns(&(response.success, response.gas_used))
            .into()
    }

    /// Packs the simulate-perform calldata for one upkeep.
    pub fn pack_simulate_call(&self, id: UpkeepId, perform_data: Bytes) -> Bytes {
        simulatePerformUpkeepCall { id: id.0, performData: perform_data }.abi_encode().into()
    }

    /// Unpacks a simulate-perform call's return data.
    pub fn unpack_simulate_response(&self, data: &[u8]) -> Result<SimulateResponse, EncodingError> {
        let ret = simulatePerformUpkeepCall::abi_decode_returns(data, true)?;
        Ok(SimulateResponse { success: ret.success, gas_used: ret.gasUsed })
    }

    /// Packs a trigger structure, selected by the upkeep's trigger type.
    ///
    /// The 4-byte selector of the carrier function is stripped; the result is
    /// the canonical per-item trigger encoding inside a report.
    pub fn pack_trigger(&self, id: UpkeepId, trigger: &Trigger) -> Result<Bytes, EncodingError> {
        let block_num = u32::try_from(trigger.block_number)
            .map_err(|_| EncodingError::BlockNumberOverflow(trigger.block_number))?;
        let encoded = match id.trigger_type() {
            UpkeepType::Conditional => validateConditionalTriggerCall {
                data: ConditionalTriggerData {
                    blockNum: block_num,
                    blockHash: trigger.block_hash,
                },
            }
            .abi_encode(),
            UpkeepType::LogTrigger => {
                let log = trigger.log.as_ref().ok_or(EncodingError::MissingLogExtension)?;
                validateLogTriggerCall {
                    data: LogTriggerData {
                        logBlockHash: log.block_hash,
                        txHash: log.tx_hash,
                        logIndex: log.index,
                        blockNum: block_num,
                        blockHash: trigger.block_hash,
                    },
                }
                .abi_encode()
            }
        };
        Ok(encoded[SELECTOR_LEN..].to_vec().into())
    }

    /// Unpacks a trigger encoding produced by [`Self::pack_trigger`].
    ///
    /// The upkeep id selects which trigger layout to expect. The log
    /// extension's block number is not part of the wire format and is left
    /// zero; consumers verify the log by hash.
    pub fn unpack_trigger(&self, id: UpkeepId, data: &[u8]) -> Result<Trigger, EncodingError> {
        match id.trigger_type() {
            UpkeepType::Conditional => {
                let call = validateConditionalTriggerCall::abi_decode_raw(data, true)?;
                Ok(Trigger::conditional(u64::from(call.data.blockNum), call.data.blockHash))
            }
            UpkeepType::LogTrigger => {
                let call = validateLogTriggerCall::abi_decode_raw(data, true)?;
                Ok(Trigger::log(
                    u64::from(call.data.blockNum),
                    call.data.blockHash,
                    LogTriggerExtension {
                        tx_hash: call.data.txHash,
                        index: call.data.logIndex,
                        block_hash: call.data.logBlockHash,
                        block_number: 0,
                    },
                ))
            }
        }
    }

    /// Packs a raw log into the trigger data handed to a log upkeep's check
    /// call.
    pub fn pack_log_trigger_data(&self, log: &Log) -> Bytes {
        let encoded = validateTriggerLogCall {
            log: TriggerLog {
                index: U256::from(log.log_index),
                txHash: log.tx_hash,
                blockNumber: U256::from(log.block_number),
                blockHash: log.block_hash,
                source: log.address,
                topics: log.topics.clone(),
                data: log.data.clone(),
            },
        }
        .abi_encode();
        encoded[SELECTOR_LEN..].to_vec().into()
    }

    /// Decodes the gas-price ceiling from an upkeep's offchain config.
    ///
    /// Empty config means no ceiling is set.
    pub fn decode_max_gas_price(&self, config: &[u8]) -> Result<Option<U256>, EncodingError> {
        if config.is_empty() {
            return Ok(None);
        }
        Ok(Some(U256::abi_decode(config, true)?))
    }
}
