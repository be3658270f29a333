//! Shared helpers for unit tests.

use crate::ClusterTopology;
use crate::HarnessSettings;

/// Settings for a small in-process cluster with everything optional turned
/// off.
pub fn test_settings(
    task_managers: usize,
    task_slots: usize,
) -> HarnessSettings {
    HarnessSettings {
        cluster: ClusterTopology {
            task_managers,
            task_slots,
        },
        ..Default::default()
    }
}

pub fn encode_i64s(values: &[i64]) -> Vec<Vec<u8>> {
    values
        .iter()
        .map(|v| bincode::serialize(v).expect("encode i64"))
        .collect()
}

pub fn decode_i64s(records: &[Vec<u8>]) -> Vec<i64> {
    records
        .iter()
        .map(|r| bincode::deserialize(r).expect("decode i64"))
        .collect()
}
