pub mod memory;
mod visitor;

pub use memory::{MemoryStore, MemoryStoreConfig};
pub use visitor::{BackendVisitor, BatchOutcome};

use crate::error::StoreError;
use crate::reply::RawReply;

/// Namespace of the transaction table in the store.
pub const TX_TABLE: &str = "tx_table";
/// Namespace holding table metadata.
pub const META_NAMESPACE: &str = "__meta__";
pub const META_TABLES_KEY: &[u8] = b"tables";

/// Commands of a hash-oriented key-value store. Every key holds a hash of
/// fields; `namespace` separates tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCommand {
    /// Bulk value or nil.
    HashGet {
        namespace: String,
        key: Vec<u8>,
        field: Vec<u8>,
    },
    /// Flat array of alternating field and value; empty when the key is absent.
    HashGetAll { namespace: String, key: Vec<u8> },
    /// One element per field (bulk or nil); empty when the key is absent.
    HashMultiGet {
        namespace: String,
        key: Vec<u8>,
        fields: Vec<Vec<u8>>,
    },
    /// Integer count of fields that did not exist before.
    HashSet {
        namespace: String,
        key: Vec<u8>,
        fields: Vec<(Vec<u8>, Vec<u8>)>,
    },
    /// Integer 1 when written, 0 when the field already existed.
    HashSetIfAbsent {
        namespace: String,
        key: Vec<u8>,
        field: Vec<u8>,
        value: Vec<u8>,
    },
    /// Integer 1 when removed, 0 otherwise.
    HashDelete {
        namespace: String,
        key: Vec<u8>,
        field: Vec<u8>,
    },
    /// Integer 1 when the key existed.
    Delete { namespace: String, key: Vec<u8> },
    Script(ScriptOp),
    /// Integer count of keys removed.
    FlushNamespace { namespace: String },
    /// Status OK.
    FlushAll,
}

/// Operations the store must run atomically on a single key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOp {
    /// Nil if the tx is absent; 1 when applied, 0 when the transition is not
    /// allowed.
    UpdateTxStatus {
        namespace: String,
        key: Vec<u8>,
        status: i32,
    },
    /// Nil if absent; `[old_commit_time, effective_commit_time]`. Assigns
    /// `max(proposed, lower_bound)` only when no commit time is set.
    SetAndGetCommitTime {
        namespace: String,
        key: Vec<u8>,
        proposed_commit_ts: i64,
    },
    /// Nil if absent; `[old_lower_bound, -1]` when the bound was recorded,
    /// `[lower_bound, commit_time]` when the tx already has a commit time.
    UpdateCommitLowerBound {
        namespace: String,
        key: Vec<u8>,
        lower_bound: i64,
    },
    /// Nil if the version is absent; `[1, new_entry]` when the current end
    /// timestamp matched, `[0, current_entry]` otherwise.
    ReplaceVersionEntry {
        namespace: String,
        key: Vec<u8>,
        version_key: i64,
        begin_timestamp: i64,
        end_timestamp: i64,
        tx_id: i64,
        read_tx_id: i64,
        expected_end_timestamp: i64,
    },
    /// Nil if absent; `[old_max_commit_ts, updated_entry]`.
    UpdateVersionMaxCommitTs {
        namespace: String,
        key: Vec<u8>,
        version_key: i64,
        commit_time: i64,
    },
    /// Integer 1 once written.
    ReplaceWholeVersion {
        namespace: String,
        key: Vec<u8>,
        version_key: i64,
        value: Vec<u8>,
    },
    /// Integer 1 when the placeholder was written into an empty chain.
    InitializeVersionList {
        namespace: String,
        key: Vec<u8>,
        placeholder: Vec<u8>,
    },
}

/// A key-value store that executes a batch of commands as one pipeline and
/// returns one reply per command, in order.
pub trait KvStore: Send + Sync {
    fn execute(&self, commands: Vec<StoreCommand>) -> Result<Vec<RawReply>, StoreError>;

    fn name(&self) -> &str {
        "kv"
    }
}

pub(crate) fn version_field(version_key: i64) -> Vec<u8> {
    version_key.to_le_bytes().to_vec()
}

pub(crate) fn tx_key(tx_id: i64) -> Vec<u8> {
    tx_id.to_le_bytes().to_vec()
}
