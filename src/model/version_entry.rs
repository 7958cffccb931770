use crate::model::record_key::RecordKey;
use serde::{Deserialize, Serialize};

/// End timestamp of a version that is still open.
pub const INFINITY_TIMESTAMP: i64 = i64::MAX;
/// Writer or reader slot that holds no transaction.
pub const EMPTY_TX_ID: i64 = -1;
/// Version key of the placeholder written when a version list is initialized.
pub const VERSION_KEY_START_INDEX: i64 = -1;
pub const DEFAULT_MAX_COMMIT_TS: i64 = 0;

const HEADER_BYTES: usize = 5 * 8;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionPrimaryKey {
    pub record_key: RecordKey,
    pub version_key: i64,
}

impl VersionPrimaryKey {
    pub fn new(record_key: impl Into<RecordKey>, version_key: i64) -> Self {
        Self {
            record_key: record_key.into(),
            version_key,
        }
    }
}

/// One version of one record.
///
/// `[begin_timestamp, end_timestamp)` is the logical validity interval. A
/// version whose `tx_id` is not [`EMPTY_TX_ID`] is tentative: its writer has
/// not committed yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub record_key: RecordKey,
    pub version_key: i64,
    pub begin_timestamp: i64,
    pub end_timestamp: i64,
    pub tx_id: i64,
    pub read_tx_id: i64,
    pub max_commit_ts: i64,
    pub record: Vec<u8>,
}

impl VersionEntry {
    pub fn new(
        record_key: impl Into<RecordKey>,
        version_key: i64,
        begin_timestamp: i64,
        end_timestamp: i64,
        tx_id: i64,
        record: Vec<u8>,
    ) -> Self {
        Self {
            record_key: record_key.into(),
            version_key,
            begin_timestamp,
            end_timestamp,
            tx_id,
            read_tx_id: EMPTY_TX_ID,
            max_commit_ts: DEFAULT_MAX_COMMIT_TS,
            record,
        }
    }

    /// The head entry written by version-list initialization.
    pub fn placeholder(record_key: impl Into<RecordKey>) -> Self {
        Self::new(
            record_key,
            VERSION_KEY_START_INDEX,
            -1,
            -1,
            EMPTY_TX_ID,
            Vec::new(),
        )
    }

    pub fn primary_key(&self) -> VersionPrimaryKey {
        VersionPrimaryKey {
            record_key: self.record_key.clone(),
            version_key: self.version_key,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.version_key == VERSION_KEY_START_INDEX
    }

    pub fn is_tentative(&self) -> bool {
        self.tx_id != EMPTY_TX_ID
    }

    pub fn is_open(&self) -> bool {
        self.end_timestamp == INFINITY_TIMESTAMP
    }

    /// Whether a reader at `timestamp` sees this version.
    pub fn is_visible_at(&self, timestamp: i64) -> bool {
        !self.is_tentative() && self.begin_timestamp <= timestamp && timestamp < self.end_timestamp
    }

    /// Encodes everything except the record and version keys, which the store
    /// keeps as the hash key and field.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_BYTES + self.record.len());
        out.extend_from_slice(&self.begin_timestamp.to_le_bytes());
        out.extend_from_slice(&self.end_timestamp.to_le_bytes());
        out.extend_from_slice(&self.tx_id.to_le_bytes());
        out.extend_from_slice(&self.read_tx_id.to_le_bytes());
        out.extend_from_slice(&self.max_commit_ts.to_le_bytes());
        out.extend_from_slice(&self.record);
        out
    }

    /// Returns `None` when `bytes` is shorter than the fixed header.
    pub fn deserialize(record_key: &RecordKey, version_key: i64, bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_BYTES {
            return None;
        }
        let field = |idx: usize| read_i64(&bytes[idx * 8..idx * 8 + 8]);
        Some(Self {
            record_key: record_key.clone(),
            version_key,
            begin_timestamp: field(0)?,
            end_timestamp: field(1)?,
            tx_id: field(2)?,
            read_tx_id: field(3)?,
            max_commit_ts: field(4)?,
            record: bytes[HEADER_BYTES..].to_vec(),
        })
    }
}

pub(crate) fn read_i64(bytes: &[u8]) -> Option<i64> {
    let arr: [u8; 8] = bytes.try_into().ok()?;
    Some(i64::from_le_bytes(arr))
}

pub(crate) fn read_i32(bytes: &[u8]) -> Option<i32> {
    let arr: [u8; 4] = bytes.try_into().ok()?;
    Some(i32::from_le_bytes(arr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_takes_keys_from_caller() {
        let entry = VersionEntry::new("k", 3, 10, INFINITY_TIMESTAMP, EMPTY_TX_ID, b"payload".to_vec());
        let bytes = entry.serialize();
        let decoded = VersionEntry::deserialize(&RecordKey::from("other"), 9, &bytes).expect("decode");
        assert_eq!(decoded.record_key, RecordKey::from("other"));
        assert_eq!(decoded.version_key, 9);
        assert_eq!(decoded.begin_timestamp, 10);
        assert_eq!(decoded.record, b"payload");
    }

    #[test]
    fn truncated_header_is_rejected() {
        let bytes = VersionEntry::placeholder("k").serialize();
        assert_eq!(bytes.len(), HEADER_BYTES);
        assert!(VersionEntry::deserialize(&RecordKey::from("k"), -1, &bytes[..HEADER_BYTES - 1]).is_none());
    }

    #[test]
    fn visibility_respects_interval_and_writer() {
        let mut entry = VersionEntry::new("k", 1, 5, 10, EMPTY_TX_ID, Vec::new());
        assert!(!entry.is_visible_at(4));
        assert!(entry.is_visible_at(5));
        assert!(entry.is_visible_at(9));
        assert!(!entry.is_visible_at(10));
        entry.tx_id = 77;
        assert!(entry.is_tentative());
        assert!(!entry.is_visible_at(6));
    }
}
