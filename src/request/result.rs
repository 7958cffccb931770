use crate::model::{TxTableEntry, VersionEntry};

/// Decoded outcome of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxResult {
    /// Acknowledgement or count; carries the kind's sentinel on failure.
    Count(i64),
    TxEntry(Option<TxTableEntry>),
    Version(Option<VersionEntry>),
    VersionList(Vec<VersionEntry>),
    /// Commit time or lower-bound answer.
    Timestamp(i64),
}

impl TxResult {
    pub fn as_count(&self) -> Option<i64> {
        match self {
            TxResult::Count(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<i64> {
        match self {
            TxResult::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    pub fn into_tx_entry(self) -> Option<TxTableEntry> {
        match self {
            TxResult::TxEntry(entry) => entry,
            _ => None,
        }
    }

    pub fn into_version(self) -> Option<VersionEntry> {
        match self {
            TxResult::Version(entry) => entry,
            _ => None,
        }
    }

    pub fn into_version_list(self) -> Vec<VersionEntry> {
        match self {
            TxResult::VersionList(list) => list,
            _ => Vec::new(),
        }
    }
}
