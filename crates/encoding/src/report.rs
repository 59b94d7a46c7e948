use crate::{abi::AutomationReport, EncodingError, Packer};
use alloy_primitives::{Bytes, B256, U256};
use alloy_sol_types::SolValue;
use upkeep_types::{work_id, CheckResult, Trigger, UpkeepId};

/// One work item recovered from a received report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportedUpkeep {
    /// The upkeep to perform.
    pub upkeep_id: UpkeepId,
    /// The trigger it was checked under.
    pub trigger: Trigger,
    /// Recomputed dedup key; never transmitted, always derived.
    pub work_id: B256,
    /// Gas limit for the perform call.
    pub gas_limit: U256,
    /// Calldata for the perform call.
    pub perform_data: Bytes,
}

/// A fully decoded report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedReport {
    /// Fast gas observation carried at report level.
    pub fast_gas_wei: U256,
    /// LINK/native observation carried at report level.
    pub link_native: U256,
    /// The reported work items, in report order.
    pub upkeeps: Vec<ReportedUpkeep>,
}

/// Encodes batches of eligible results into the canonical report format and
/// back.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportEncoder {
    packer: Packer,
}

impl ReportEncoder {
    /// Creates an encoder sharing the given packer.
    pub const fn new(packer: Packer) -> Self {
        Self { packer }
    }

    /// Encodes a non-empty batch of results.
    ///
    /// The report-level fee fields are taken from the result with the
    /// numerically highest trigger block number; ties keep the first-seen
    /// value.
    pub fn encode(&self, results: &[CheckResult]) -> Result<Bytes, EncodingError> {
        let first = results.first().ok_or(EncodingError::EmptyResults)?;

        let mut fee_source = first;
        for result in &results[1..] {
            if result.trigger.block_number > fee_source.trigger.block_number {
                fee_source = result;
            }
        }

        let mut report = AutomationReport {
            fastGasWei: fee_source.fast_gas_wei,
            linkNative: fee_source.link_native,
            upkeepIds: Vec::with_capacity(results.len()),
            gasLimits: Vec::with_capacity(results.len()),
            triggers: Vec::with_capacity(results.len()),
            performDatas: Vec::with_capacity(results.len()),
        };
        for result in results {
            report.upkeepIds.push(result.upkeep_id.0);
            report.gasLimits.push(U256::from(result.gas_allocated));
            report.triggers.push(self.packer.pack_trigger(result.upkeep_id, &result.trigger)?);
            report.performDatas.push(result.perform_data.clone());
        }
        Ok(report.abi_encode().into())
    }

    /// Decodes a report, recomputing each item's work id.
    pub fn decode(&self, data: &[u8]) -> Result<DecodedReport, EncodingError> {
        let report = AutomationReport::abi_decode(data, true)?;
        let len = report.upkeepIds.len();
        if report.gasLimits.len() != len
            || report.triggers.len() != len
            || report.performDatas.len() != len
        {
            return Err(EncodingError::LengthMismatch);
        }

        let mut upkeeps = Vec::with_capacity(len);
        for i in 0..len {
            let upkeep_id = UpkeepId::new(report.upkeepIds[i]);
            let trigger = self.packer.unpack_trigger(upkeep_id, &report.triggers[i])?;
            let work_id = work_id(&upkeep_id, &trigger);
            upkeeps.push(ReportedUpkeep {
                upkeep_id,
                trigger,
                work_id,
                gas_limit: report.gasLimits[i],
                perform_data: report.performDatas[i].clone(),
            });
        }
        Ok(DecodedReport {
            fast_gas_wei: report.fastGasWei,
            link_native: report.linkNative,
            upkeeps,
        })
    }
}
