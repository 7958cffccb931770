use serde::{Deserialize, Serialize};

/// Commit time of a transaction that has not been assigned one yet.
pub const UNSET_COMMIT_TIME: i64 = -1;
pub const DEFAULT_COMMIT_LOWER_BOUND: i64 = 0;

pub const FIELD_STATUS: &[u8] = b"status";
pub const FIELD_COMMIT_TIME: &[u8] = b"commit_time";
pub const FIELD_COMMIT_LOWER_BOUND: &[u8] = b"commit_lower_bound";

/// Field order of a transaction entry as returned by the store.
pub const TX_ENTRY_FIELDS: [&[u8]; 3] = [FIELD_STATUS, FIELD_COMMIT_TIME, FIELD_COMMIT_LOWER_BOUND];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum TxStatus {
    Ongoing = 0,
    Committed = 1,
    Aborted = 2,
}

impl TxStatus {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(TxStatus::Ongoing),
            1 => Some(TxStatus::Committed),
            2 => Some(TxStatus::Aborted),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, TxStatus::Ongoing)
    }

    /// Ongoing may move to either terminal state; a terminal state only
    /// accepts itself again.
    pub fn can_transition_to(self, next: TxStatus) -> bool {
        match self {
            TxStatus::Ongoing => true,
            current => current == next,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxTableEntry {
    pub tx_id: i64,
    pub status: TxStatus,
    pub commit_time: i64,
    pub commit_lower_bound: i64,
}

impl TxTableEntry {
    pub fn new(tx_id: i64, status: TxStatus, commit_time: i64, commit_lower_bound: i64) -> Self {
        Self {
            tx_id,
            status,
            commit_time,
            commit_lower_bound,
        }
    }

    pub fn ongoing(tx_id: i64) -> Self {
        Self::new(
            tx_id,
            TxStatus::Ongoing,
            UNSET_COMMIT_TIME,
            DEFAULT_COMMIT_LOWER_BOUND,
        )
    }

    pub fn has_commit_time(&self) -> bool {
        self.commit_time != UNSET_COMMIT_TIME
    }

    /// Hash fields in the store layout, in [`TX_ENTRY_FIELDS`] order.
    pub fn to_fields(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        vec![
            (FIELD_STATUS.to_vec(), self.status.as_i32().to_le_bytes().to_vec()),
            (FIELD_COMMIT_TIME.to_vec(), self.commit_time.to_le_bytes().to_vec()),
            (
                FIELD_COMMIT_LOWER_BOUND.to_vec(),
                self.commit_lower_bound.to_le_bytes().to_vec(),
            ),
        ]
    }
}
