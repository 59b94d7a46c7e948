use crate::{Trigger, UpkeepId};
use alloy_primitives::{keccak256, Bytes, B256};

/// Derives the idempotency key for one (upkeep, trigger) combination.
///
/// A pure function of the id and trigger: keccak256 of the id bytes, followed
/// by the log identifier when the trigger carries a log extension. Never
/// cached across triggers and never transmitted, only derived.
pub fn work_id(upkeep_id: &UpkeepId, trigger: &Trigger) -> B256 {
    let mut data = upkeep_id.to_be_bytes().to_vec();
    if let Some(log) = &trigger.log {
        data.extend_from_slice(&log.log_identifier());
    }
    keccak256(&data)
}

/// A unit of candidate work handed to the check pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpkeepPayload {
    /// The upkeep to check.
    pub upkeep_id: UpkeepId,
    /// The chain condition to check under.
    pub trigger: Trigger,
    /// Extra data passed into the check call for log-triggered upkeeps.
    pub check_data: Bytes,
    /// Derived dedup key, see [`work_id`].
    pub work_id: B256,
}

impl UpkeepPayload {
    /// Creates a payload, deriving its work id.
    pub fn new(upkeep_id: UpkeepId, trigger: Trigger, check_data: Bytes) -> Self {
        let work_id = work_id(&upkeep_id, &trigger);
        Self { upkeep_id, trigger, check_data, work_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LogTriggerExtension;
    use alloy_primitives::U256;

    #[test]
    fn work_id_is_deterministic() {
        let id = UpkeepId::new(U256::from(42u64));
        let trigger = Trigger::conditional(10, B256::with_last_byte(1));
        assert_eq!(work_id(&id, &trigger), work_id(&id, &trigger));
    }

    #[test]
    fn work_id_depends_on_log_identity() {
        let id = UpkeepId::new(U256::from(42u64));
        let base = LogTriggerExtension {
            tx_hash: B256::with_last_byte(1),
            index: 0,
            block_hash: B256::with_last_byte(2),
            block_number: 5,
        };
        let a = Trigger::log(10, B256::with_last_byte(3), base.clone());
        let b = Trigger::log(10, B256::with_last_byte(3), LogTriggerExtension { index: 1, ..base });
        assert_ne!(work_id(&id, &a), work_id(&id, &b));
    }

    #[test]
    fn work_id_ignores_check_block_for_conditionals() {
        // Conditional work identity is the upkeep itself; the check block is
        // not part of the key.
        let id = UpkeepId::new(U256::from(7u64));
        let a = Trigger::conditional(10, B256::with_last_byte(1));
        let b = Trigger::conditional(11, B256::with_last_byte(2));
        assert_eq!(work_id(&id, &a), work_id(&id, &b));
    }

    #[test]
    fn payload_derives_work_id() {
        let id = UpkeepId::new(U256::from(1u64));
        let trigger = Trigger::conditional(1, B256::ZERO);
        let payload = UpkeepPayload::new(id, trigger.clone(), Bytes::new());
        assert_eq!(payload.work_id, work_id(&id, &trigger));
    }
}
