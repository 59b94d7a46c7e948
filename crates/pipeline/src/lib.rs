//! Batched check/simulate eligibility pipeline.
//!
//! One invocation takes a batch of candidate work payloads and decides, per
//! item, whether the work is eligible right now under the currently tracked
//! chain tip. Per-item failures become fields of that item's [`CheckResult`]
//! and never abort the rest of the batch; only transport-level batch
//! failures and cancellation abort the invocation, in which case no partial
//! results are returned.

use alloy_primitives::Address;
use tokio_util::sync::CancellationToken;
use upkeep_encoding::Packer;
use upkeep_provider::{
    BlockSource, EthCall, EvmRpc, GasEstimator, RpcError, UpkeepConfigView,
};
use upkeep_types::{
    BlockKey, CheckResult, IneligibilityReason, LogTriggerExtension, PipelineExecutionState,
    Trigger, UpkeepPayload,
};

/// Tuning for the pipeline.
#[derive(Debug, Clone)]
pub struct CheckPipelineConfig {
    /// The registry contract the check and simulate calls target.
    pub registry_address: Address,
    /// How far behind the tip a check block may be before a missing-block
    /// RPC error is treated as "too old" rather than flaky.
    pub check_block_too_old_range: u64,
}

impl CheckPipelineConfig {
    /// Creates a config with the default staleness range.
    pub const fn new(registry_address: Address) -> Self {
        Self { registry_address, check_block_too_old_range: 128 }
    }
}

/// Fatal pipeline failures; everything else is per-item data.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The caller canceled the invocation before it completed.
    #[error("check pipeline canceled")]
    Canceled,
    /// The batch RPC transport failed; the whole invocation must be retried.
    #[error("batch rpc failure: {0}")]
    Rpc(#[from] RpcError),
}

/// A per-item verification failure: (reason, state, retryable).
type Verdict = (IneligibilityReason, PipelineExecutionState, bool);

/// The check pipeline.
#[derive(Debug)]
pub struct CheckPipeline<B, R, C, G> {
    config: CheckPipelineConfig,
    blocks: B,
    rpc: R,
    configs: C,
    gas: G,
    packer: Packer,
}

impl<B, R, C, G> CheckPipeline<B, R, C, G>
where
    B: BlockSource,
    R: EvmRpc,
    C: UpkeepConfigView,
    G: GasEstimator,
{
    /// Creates a pipeline over the given collaborators.
    pub const fn new(
        config: CheckPipelineConfig,
        blocks: B,
        rpc: R,
        configs: C,
        gas: G,
        packer: Packer,
    ) -> Self {
        Self { config, blocks, rpc, configs, gas, packer }
    }

    /// Decides eligibility for a batch of payloads, as one cancellable unit.
    ///
    /// On success the result vector has exactly one entry per input payload,
    /// in order. Cancellation and transport-level batch failures return an
    /// error and no results.
    pub async fn check_upkeeps(
        &self,
        token: &CancellationToken,
        payloads: Vec<UpkeepPayload>,
    ) -> Result<Vec<CheckResult>, PipelineError> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(PipelineError::Canceled),
            results = self.run(payloads) => results,
        }
    }

    async fn run(&self, payloads: Vec<UpkeepPayload>) -> Result<Vec<CheckResult>, PipelineError> {
        let mut results: Vec<CheckResult> =
            payloads.iter().map(CheckResult::from_payload).collect();
        if payloads.is_empty() {
            return Ok(results);
        }
        let latest = self.blocks.latest_block();

        // Stage 1+2: verify the check block, and the log for log triggers.
        let mut live = Vec::with_capacity(payloads.len());
        for (i, payload) in payloads.iter().enumerate() {
            match self.verify_payload(payload).await {
                None => live.push(i),
                Some((reason, state, retryable)) => results[i].fail(reason, state, retryable),
            }
        }
        if live.is_empty() {
            return Ok(results);
        }

        // Stage 3: one batched check call for everything still pending.
        let calls: Vec<EthCall> = live
            .iter()
            .map(|&i| EthCall {
                to: self.config.registry_address,
                data: self.packer.pack_check_call(&payloads[i]),
                block: payloads[i].trigger.block_number,
            })
            .collect();
        let responses = self.batch(&calls).await?;

        let mut eligible = Vec::with_capacity(live.len());
        for (&i, response) in live.iter().zip(responses) {
            match response {
                Err(err) => {
                    let (state, retryable) =
                        self.classify_check_error(latest, payloads[i].trigger.block_number, &err);
                    tracing::debug!(target: "upkeep::pipeline", id = %results[i].upkeep_id, %err, ?state, "check call failed");
                    results[i].fail(IneligibilityReason::None, state, retryable);
                }
                Ok(data) => match self.packer.unpack_check_response(&data) {
                    Err(err) => {
                        tracing::debug!(target: "upkeep::pipeline", id = %results[i].upkeep_id, %err, "check response unpack failed");
                        results[i].fail(
                            IneligibilityReason::None,
                            PipelineExecutionState::PackUnpackDecodeFailed,
                            false,
                        );
                    }
                    Ok(response) => {
                        results[i].fast_gas_wei = response.fast_gas_wei;
                        results[i].link_native = response.link_native;
                        results[i].gas_allocated =
                            response.gas_limit.try_into().unwrap_or(u64::MAX);
                        if response.eligible {
                            results[i].eligible = true;
                            results[i].perform_data = response.perform_data;
                            eligible.push(i);
                        } else {
                            match IneligibilityReason::from_contract(response.failure_reason) {
                                Some(reason) => results[i].fail(
                                    reason,
                                    PipelineExecutionState::NoError,
                                    false,
                                ),
                                None => results[i].fail(
                                    IneligibilityReason::None,
                                    PipelineExecutionState::PackUnpackDecodeFailed,
                                    false,
                                ),
                            }
                        }
                    }
                },
            }
        }
        if eligible.is_empty() {
            return Ok(results);
        }

        // Stage 4: gas-price gate. An estimator failure fails open; a
        // priced-out item never reaches simulation.
        match self.gas.estimate().await {
            Err(err) => {
                tracing::warn!(target: "upkeep::pipeline", %err, "fee estimate failed, skipping gas gate");
            }
            Ok(fee) => {
                eligible.retain(|&i| {
                    let Some(config) = self.configs.offchain_config(&results[i].upkeep_id) else {
                        return true;
                    };
                    match self.packer.decode_max_gas_price(&config) {
                        Ok(Some(ceiling)) if fee > ceiling => {
                            tracing::debug!(target: "upkeep::pipeline", id = %results[i].upkeep_id, %fee, %ceiling, "gas price above ceiling");
                            results[i].fail(
                                IneligibilityReason::GasPriceTooHigh,
                                PipelineExecutionState::NoError,
                                false,
                            );
                            false
                        }
                        Ok(_) => true,
                        Err(err) => {
                            // A malformed ceiling must not brick the upkeep.
                            tracing::debug!(target: "upkeep::pipeline", id = %results[i].upkeep_id, %err, "unreadable offchain config, gate disabled");
                            true
                        }
                    }
                });
            }
        }
        if eligible.is_empty() {
            return Ok(results);
        }

        // Stage 5: one batched simulate call for the remaining eligible set.
        let calls: Vec<EthCall> = eligible
            .iter()
            .map(|&i| EthCall {
                to: self.config.registry_address,
                data: self
                    .packer
                    .pack_simulate_call(results[i].upkeep_id, results[i].perform_data.clone()),
                block: results[i].trigger.block_number,
            })
            .collect();
        let responses = self.batch(&calls).await?;

        for (&i, response) in eligible.iter().zip(responses) {
            match response {
                Err(err) => {
                    tracing::debug!(target: "upkeep::pipeline", id = %results[i].upkeep_id, %err, "simulate call failed");
                    results[i].fail(
                        IneligibilityReason::None,
                        PipelineExecutionState::RpcFlakyFailure,
                        true,
                    );
                }
                Ok(data) => match self.packer.unpack_simulate_response(&data) {
                    Err(err) => {
                        tracing::debug!(target: "upkeep::pipeline", id = %results[i].upkeep_id, %err, "simulate response unpack failed");
                        results[i].fail(
                            IneligibilityReason::None,
                            PipelineExecutionState::PackUnpackDecodeFailed,
                            false,
                        );
                    }
                    Ok(simulation) if !simulation.success => {
                        results[i].fail(
                            IneligibilityReason::SimulationFailed,
                            PipelineExecutionState::NoError,
                            false,
                        );
                    }
                    Ok(_) => {}
                },
            }
        }
        Ok(results)
    }

    /// Issues one batch call, enforcing the one-slot-per-request contract.
    async fn batch(
        &self,
        calls: &[EthCall],
    ) -> Result<Vec<Result<alloy_primitives::Bytes, RpcError>>, PipelineError> {
        let responses = self.rpc.batch_eth_call(calls).await?;
        if responses.len() != calls.len() {
            return Err(PipelineError::Rpc(RpcError::Transport(format!(
                "batch returned {} results for {} calls",
                responses.len(),
                calls.len()
            ))));
        }
        Ok(responses)
    }

    /// Verifies the payload's trigger block, and for log triggers the log
    /// itself. `None` means the payload may proceed.
    async fn verify_payload(&self, payload: &UpkeepPayload) -> Option<Verdict> {
        if let Some(verdict) = self.verify_check_block(&payload.trigger).await {
            return Some(verdict);
        }
        if let Some(log) = &payload.trigger.log {
            // When the check block is the log's own block, the block
            // verification above already covered the log.
            if log.block_hash != payload.trigger.block_hash {
                if let Some(verdict) = self.verify_log(log).await {
                    return Some(verdict);
                }
            }
        }
        None
    }

    /// Checks the trigger's block against tracked history, falling back to a
    /// live chain query on mismatch or absence.
    async fn verify_check_block(&self, trigger: &Trigger) -> Option<Verdict> {
        if self.blocks.block_hash(trigger.block_number) == Some(trigger.block_hash) {
            return None;
        }
        match self.rpc.block_hash_by_number(trigger.block_number).await {
            Ok(Some(hash)) if hash == trigger.block_hash => None,
            Ok(_) => Some((
                IneligibilityReason::None,
                PipelineExecutionState::CheckBlockInvalid,
                false,
            )),
            Err(err) => {
                tracing::debug!(target: "upkeep::pipeline", block = trigger.block_number, %err, "check block query failed");
                Some((IneligibilityReason::None, PipelineExecutionState::RpcFlakyFailure, true))
            }
        }
    }

    /// Checks the log's block against tracked history, falling back to a
    /// receipt query.
    async fn verify_log(&self, log: &LogTriggerExtension) -> Option<Verdict> {
        if self.blocks.block_hash(log.block_number) == Some(log.block_hash) {
            return None;
        }
        match self.rpc.transaction_receipt(log.tx_hash).await {
            Ok(None) => Some((
                IneligibilityReason::TxHashNoLongerExists,
                PipelineExecutionState::NoError,
                false,
            )),
            Ok(Some(receipt)) if receipt.block_hash != log.block_hash => Some((
                IneligibilityReason::TxHashReorged,
                PipelineExecutionState::NoError,
                false,
            )),
            Ok(Some(_)) => None,
            Err(err) => {
                tracing::debug!(target: "upkeep::pipeline", tx = %log.tx_hash, %err, "receipt query failed");
                Some((IneligibilityReason::None, PipelineExecutionState::RpcFlakyFailure, true))
            }
        }
    }

    /// Classifies a per-item check-call error.
    ///
    /// "Too old" requires both the distance from the tip to exceed the
    /// configured range and the error text to indicate a missing or pruned
    /// block; everything else is flaky and retryable.
    fn classify_check_error(
        &self,
        latest: Option<BlockKey>,
        check_block: u64,
        err: &RpcError,
    ) -> (PipelineExecutionState, bool) {
        let too_old = latest.is_some_and(|tip| {
            tip.number.saturating_sub(check_block) > self.config.check_block_too_old_range
        });
        if too_old && err.indicates_missing_block() {
            (PipelineExecutionState::CheckBlockTooOld, false)
        } else {
            (PipelineExecutionState::RpcFlakyFailure, true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Bytes, B256, U256};
    use alloy_sol_types::SolValue;
    use assert_matches::assert_matches;
    use upkeep_encoding::{CheckResponse, SimulateResponse};
    use upkeep_provider::{
        test_utils::{BatchResponse, MockBlockSource, MockConfigView, MockGasEstimator, MockRpc},
        TxReceipt,
    };
    use upkeep_types::{LogTriggerExtension, UpkeepId};

    const ELIGIBLE_FAILURE_REASON: u8 = 0;
    const NOT_NEEDED_FAILURE_REASON: u8 = 4;

    fn tagged_id(tag: u8, tail: u8) -> UpkeepId {
        let mut bytes = [0u8; 32];
        bytes[15] = tag;
        bytes[31] = tail;
        UpkeepId::new(U256::from_be_bytes(bytes))
    }

    fn pipeline(
        blocks: MockBlockSource,
        rpc: MockRpc,
    ) -> CheckPipeline<MockBlockSource, MockRpc, MockConfigView, MockGasEstimator> {
        pipeline_with(blocks, rpc, MockConfigView::default(), MockGasEstimator::default())
    }

    fn pipeline_with(
        blocks: MockBlockSource,
        rpc: MockRpc,
        configs: MockConfigView,
        gas: MockGasEstimator,
    ) -> CheckPipeline<MockBlockSource, MockRpc, MockConfigView, MockGasEstimator> {
        CheckPipeline::new(
            CheckPipelineConfig::new(Address::with_last_byte(0xee)),
            blocks,
            rpc,
            configs,
            gas,
            Packer,
        )
    }

    /// A block source already tracking blocks `from..=to` with marker hashes.
    fn tracked_blocks(from: u64, to: u64) -> MockBlockSource {
        let blocks = MockBlockSource::default();
        {
            let mut hashes = blocks.hashes.lock();
            for number in from..=to {
                hashes.insert(number, B256::with_last_byte(number as u8));
            }
        }
        *blocks.latest.lock() = Some(BlockKey::new(to, B256::with_last_byte(to as u8)));
        blocks
    }

    fn conditional_payload(tail: u8, block: u64) -> UpkeepPayload {
        UpkeepPayload::new(
            tagged_id(0, tail),
            Trigger::conditional(block, B256::with_last_byte(block as u8)),
            Bytes::new(),
        )
    }

    fn log_payload(tail: u8, check_block: u64, log_block: u64) -> UpkeepPayload {
        UpkeepPayload::new(
            tagged_id(1, tail),
            Trigger::log(
                check_block,
                B256::with_last_byte(check_block as u8),
                LogTriggerExtension {
                    tx_hash: B256::with_last_byte(0xcc),
                    index: 3,
                    block_hash: B256::with_last_byte(log_block as u8),
                    block_number: log_block,
                },
            ),
            Bytes::from(vec![1, 2, 3]),
        )
    }

    fn eligible_response(perform_data: &[u8]) -> Bytes {
        Packer.pack_check_response(&CheckResponse {
            eligible: true,
            failure_reason: ELIGIBLE_FAILURE_REASON,
            perform_data: perform_data.to_vec().into(),
            gas_used: U256::from(30_000u64),
            gas_limit: U256::from(500_000u64),
            fast_gas_wei: U256::from(2_000_000_000u64),
            link_native: U256::from(7u64),
        })
    }

    fn simulate_ok() -> Bytes {
        Packer.pack_simulate_response(&SimulateResponse {
            success: true,
            gas_used: U256::from(25_000u64),
        })
    }

    #[tokio::test]
    async fn eligible_payload_flows_through_all_stages() {
        let rpc = MockRpc::default();
        rpc.push_batch(BatchResponse::Items(vec![Ok(eligible_response(&[9, 9]))]));
        rpc.push_batch(BatchResponse::Items(vec![Ok(simulate_ok())]));
        let pipeline = pipeline(tracked_blocks(90, 100), rpc);

        let results = pipeline
            .check_upkeeps(&CancellationToken::new(), vec![conditional_payload(1, 100)])
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].eligible);
        assert_eq!(results[0].perform_data, Bytes::from(vec![9, 9]));
        assert_eq!(results[0].gas_allocated, 500_000);
        assert_eq!(results[0].fast_gas_wei, U256::from(2_000_000_000u64));
        assert_eq!(results[0].pipeline_execution_state, PipelineExecutionState::NoError);
        assert_eq!(pipeline.rpc.batches_seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn stale_check_block_fails_before_any_batch() {
        let blocks = tracked_blocks(90, 100);
        let rpc = MockRpc::default();
        // The chain query also disagrees with the trigger hash.
        rpc.block_hashes.lock().insert(50, B256::with_last_byte(0xff));
        let pipeline = pipeline(blocks, rpc);

        let results = pipeline
            .check_upkeeps(&CancellationToken::new(), vec![conditional_payload(1, 50)])
            .await
            .unwrap();

        assert!(!results[0].eligible);
        assert!(!results[0].retryable);
        assert_eq!(
            results[0].pipeline_execution_state,
            PipelineExecutionState::CheckBlockInvalid
        );
        assert!(pipeline.rpc.batches_seen.lock().is_empty());
    }

    #[tokio::test]
    async fn chain_query_rescues_untracked_check_block() {
        let blocks = tracked_blocks(90, 100);
        let rpc = MockRpc::default();
        rpc.block_hashes.lock().insert(50, B256::with_last_byte(50));
        rpc.push_batch(BatchResponse::Items(vec![Ok(eligible_response(&[]))]));
        rpc.push_batch(BatchResponse::Items(vec![Ok(simulate_ok())]));
        let pipeline = pipeline(blocks, rpc);

        let results = pipeline
            .check_upkeeps(&CancellationToken::new(), vec![conditional_payload(1, 50)])
            .await
            .unwrap();
        assert!(results[0].eligible);
    }

    #[tokio::test]
    async fn reorged_log_is_rejected() {
        let blocks = tracked_blocks(90, 100);
        let rpc = MockRpc::default();
        // Receipt exists but in a different block than the trigger claims.
        rpc.receipts.lock().insert(
            B256::with_last_byte(0xcc),
            TxReceipt {
                tx_hash: B256::with_last_byte(0xcc),
                block_number: 42,
                block_hash: B256::with_last_byte(0xff),
            },
        );
        let pipeline = pipeline(blocks, rpc);

        // Log block 42 is outside tracked history, forcing the receipt path.
        let results = pipeline
            .check_upkeeps(&CancellationToken::new(), vec![log_payload(1, 95, 42)])
            .await
            .unwrap();

        assert_eq!(results[0].ineligibility_reason, IneligibilityReason::TxHashReorged);
        assert_eq!(results[0].pipeline_execution_state, PipelineExecutionState::NoError);
        assert!(!results[0].retryable);
    }

    #[tokio::test]
    async fn vanished_transaction_is_rejected() {
        let pipeline = pipeline(tracked_blocks(90, 100), MockRpc::default());

        let results = pipeline
            .check_upkeeps(&CancellationToken::new(), vec![log_payload(1, 95, 42)])
            .await
            .unwrap();

        assert_eq!(
            results[0].ineligibility_reason,
            IneligibilityReason::TxHashNoLongerExists
        );
        assert!(!results[0].retryable);
    }

    #[tokio::test]
    async fn tracked_log_block_skips_receipt_lookup() {
        let rpc = MockRpc::default();
        rpc.push_batch(BatchResponse::Items(vec![Ok(eligible_response(&[]))]));
        rpc.push_batch(BatchResponse::Items(vec![Ok(simulate_ok())]));
        // No receipt seeded; a receipt lookup would return NoLongerExists.
        let pipeline = pipeline(tracked_blocks(90, 100), rpc);

        let results = pipeline
            .check_upkeeps(&CancellationToken::new(), vec![log_payload(1, 95, 93)])
            .await
            .unwrap();
        assert!(results[0].eligible);
    }

    #[tokio::test]
    async fn per_item_check_failure_is_retryable() {
        let rpc = MockRpc::default();
        rpc.push_batch(BatchResponse::Items(vec![Err(RpcError::Call(
            "connection reset".into(),
        ))]));
        let pipeline = pipeline(tracked_blocks(90, 100), rpc);

        let results = pipeline
            .check_upkeeps(&CancellationToken::new(), vec![conditional_payload(1, 100)])
            .await
            .unwrap();

        assert_eq!(
            results[0].pipeline_execution_state,
            PipelineExecutionState::RpcFlakyFailure
        );
        assert!(results[0].retryable);
    }

    #[tokio::test]
    async fn old_missing_block_is_classified_too_old() {
        let rpc = MockRpc::default();
        rpc.push_batch(BatchResponse::Items(vec![Err(RpcError::Call(
            "header not found".into(),
        ))]));
        // Check block 800 trails the tip at 1000 by more than the range.
        let blocks = tracked_blocks(795, 1000);
        let pipeline = pipeline(blocks, rpc);

        let results = pipeline
            .check_upkeeps(&CancellationToken::new(), vec![conditional_payload(1, 800)])
            .await
            .unwrap();

        assert_eq!(
            results[0].pipeline_execution_state,
            PipelineExecutionState::CheckBlockTooOld
        );
        assert!(!results[0].retryable);
    }

    #[tokio::test]
    async fn recent_missing_block_stays_retryable() {
        let rpc = MockRpc::default();
        rpc.push_batch(BatchResponse::Items(vec![Err(RpcError::Call(
            "header not found".into(),
        ))]));
        let pipeline = pipeline(tracked_blocks(90, 100), rpc);

        let results = pipeline
            .check_upkeeps(&CancellationToken::new(), vec![conditional_payload(1, 95)])
            .await
            .unwrap();

        assert_eq!(
            results[0].pipeline_execution_state,
            PipelineExecutionState::RpcFlakyFailure
        );
        assert!(results[0].retryable);
    }

    #[tokio::test]
    async fn contract_failure_reason_maps_through() {
        let rpc = MockRpc::default();
        rpc.push_batch(BatchResponse::Items(vec![Ok(Packer.pack_check_response(
            &CheckResponse {
                eligible: false,
                failure_reason: NOT_NEEDED_FAILURE_REASON,
                ..Default::default()
            },
        ))]));
        let pipeline = pipeline(tracked_blocks(90, 100), rpc);

        let results = pipeline
            .check_upkeeps(&CancellationToken::new(), vec![conditional_payload(1, 100)])
            .await
            .unwrap();

        assert_eq!(results[0].ineligibility_reason, IneligibilityReason::UpkeepNotNeeded);
        assert!(!results[0].retryable);
        // Nothing eligible, so no simulate batch went out.
        assert_eq!(pipeline.rpc.batches_seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn undecodable_check_response_is_terminal() {
        let rpc = MockRpc::default();
        rpc.push_batch(BatchResponse::Items(vec![Ok(Bytes::from(vec![0xde, 0xad]))]));
        let pipeline = pipeline(tracked_blocks(90, 100), rpc);

        let results = pipeline
            .check_upkeeps(&CancellationToken::new(), vec![conditional_payload(1, 100)])
            .await
            .unwrap();

        assert_eq!(
            results[0].pipeline_execution_state,
            PipelineExecutionState::PackUnpackDecodeFailed
        );
        assert!(!results[0].retryable);
    }

    #[tokio::test]
    async fn gas_gate_prices_out_expensive_upkeeps() {
        let id = tagged_id(0, 1);
        let rpc = MockRpc::default();
        rpc.push_batch(BatchResponse::Items(vec![Ok(eligible_response(&[]))]));

        let configs = MockConfigView::default();
        configs
            .configs
            .lock()
            .insert(id, U256::from(1_000_000_000u64).abi_encode().into());
        let gas = MockGasEstimator::default();
        *gas.fee.lock() = U256::from(2_000_000_000u64);

        let pipeline = pipeline_with(tracked_blocks(90, 100), rpc, configs, gas);
        let results = pipeline
            .check_upkeeps(&CancellationToken::new(), vec![conditional_payload(1, 100)])
            .await
            .unwrap();

        assert_eq!(results[0].ineligibility_reason, IneligibilityReason::GasPriceTooHigh);
        assert!(!results[0].retryable);
        // Priced out before simulation.
        assert_eq!(pipeline.rpc.batches_seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn gas_gate_fails_open_on_estimator_error() {
        let id = tagged_id(0, 1);
        let rpc = MockRpc::default();
        rpc.push_batch(BatchResponse::Items(vec![Ok(eligible_response(&[]))]));
        rpc.push_batch(BatchResponse::Items(vec![Ok(simulate_ok())]));

        let configs = MockConfigView::default();
        configs.configs.lock().insert(id, U256::from(1u64).abi_encode().into());
        let gas = MockGasEstimator::default();
        *gas.fail.lock() = Some(RpcError::Transport("fee history unavailable".into()));

        let pipeline = pipeline_with(tracked_blocks(90, 100), rpc, configs, gas);
        let results = pipeline
            .check_upkeeps(&CancellationToken::new(), vec![conditional_payload(1, 100)])
            .await
            .unwrap();
        assert!(results[0].eligible);
    }

    #[tokio::test]
    async fn malformed_offchain_config_disables_the_gate() {
        let id = tagged_id(0, 1);
        let rpc = MockRpc::default();
        rpc.push_batch(BatchResponse::Items(vec![Ok(eligible_response(&[]))]));
        rpc.push_batch(BatchResponse::Items(vec![Ok(simulate_ok())]));

        let configs = MockConfigView::default();
        configs.configs.lock().insert(id, Bytes::from(vec![1, 2, 3]));
        let gas = MockGasEstimator::default();
        *gas.fee.lock() = U256::from(u64::MAX);

        let pipeline = pipeline_with(tracked_blocks(90, 100), rpc, configs, gas);
        let results = pipeline
            .check_upkeeps(&CancellationToken::new(), vec![conditional_payload(1, 100)])
            .await
            .unwrap();
        assert!(results[0].eligible);
    }

    #[tokio::test]
    async fn failed_simulation_is_terminal() {
        let rpc = MockRpc::default();
        rpc.push_batch(BatchResponse::Items(vec![Ok(eligible_response(&[]))]));
        rpc.push_batch(BatchResponse::Items(vec![Ok(Packer.pack_simulate_response(
            &SimulateResponse { success: false, gas_used: U256::ZERO },
        ))]));
        let pipeline = pipeline(tracked_blocks(90, 100), rpc);

        let results = pipeline
            .check_upkeeps(&CancellationToken::new(), vec![conditional_payload(1, 100)])
            .await
            .unwrap();

        assert_eq!(results[0].ineligibility_reason, IneligibilityReason::SimulationFailed);
        assert!(!results[0].eligible);
        assert!(!results[0].retryable);
    }

    #[tokio::test]
    async fn transport_failure_aborts_the_invocation() {
        let rpc = MockRpc::default();
        rpc.push_batch(BatchResponse::Transport(RpcError::Transport("rpc down".into())));
        let pipeline = pipeline(tracked_blocks(90, 100), rpc);

        let err = pipeline
            .check_upkeeps(&CancellationToken::new(), vec![conditional_payload(1, 100)])
            .await
            .unwrap_err();
        assert_matches!(err, PipelineError::Rpc(RpcError::Transport(_)));
    }

    #[tokio::test]
    async fn short_batch_response_is_fatal() {
        let rpc = MockRpc::default();
        rpc.push_batch(BatchResponse::Items(vec![]));
        let pipeline = pipeline(tracked_blocks(90, 100), rpc);

        let err = pipeline
            .check_upkeeps(&CancellationToken::new(), vec![conditional_payload(1, 100)])
            .await
            .unwrap_err();
        assert_matches!(err, PipelineError::Rpc(RpcError::Transport(_)));
    }

    #[tokio::test]
    async fn cancellation_yields_no_partial_results() {
        let pipeline = pipeline(tracked_blocks(90, 100), MockRpc::default());
        let token = CancellationToken::new();
        token.cancel();

        let err = pipeline
            .check_upkeeps(&token, vec![conditional_payload(1, 100)])
            .await
            .unwrap_err();
        assert_eq!(err, PipelineError::Canceled);
    }

    #[tokio::test]
    async fn mixed_batch_keeps_per_item_outcomes_independent() {
        let rpc = MockRpc::default();
        rpc.push_batch(BatchResponse::Items(vec![
            Ok(eligible_response(&[7])),
            Err(RpcError::Call("connection reset".into())),
        ]));
        rpc.push_batch(BatchResponse::Items(vec![Ok(simulate_ok())]));
        let pipeline = pipeline(tracked_blocks(90, 100), rpc);

        let results = pipeline
            .check_upkeeps(
                &CancellationToken::new(),
                vec![conditional_payload(1, 100), conditional_payload(2, 99)],
            )
            .await
            .unwrap();

        assert!(results[0].eligible);
        assert_eq!(results[0].perform_data, Bytes::from(vec![7]));
        assert!(!results[1].eligible);
        assert!(results[1].retryable);
        // Only the eligible item reached simulation.
        assert_eq!(pipeline.rpc.batches_seen.lock()[1].len(), 1);
    }
}
