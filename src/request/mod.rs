mod result;

pub use result::TxResult;

use crate::error::StoreError;
use crate::model::{RecordKey, TxStatus, VersionEntry};
use crate::reply::RawReply;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestFamily {
    TxTable,
    VersionTable,
}

/// The closed set of operations the engine can queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    NewTxId {
        tx_id: i64,
    },
    InsertTxId {
        tx_id: i64,
    },
    GetTxEntry {
        tx_id: i64,
    },
    UpdateTxStatus {
        tx_id: i64,
        status: TxStatus,
    },
    SetCommitTs {
        tx_id: i64,
        proposed_commit_ts: i64,
    },
    UpdateCommitLowerBound {
        tx_id: i64,
        lower_bound: i64,
    },
    RecycleTx {
        tx_id: i64,
    },
    RemoveTx {
        tx_id: i64,
    },
    GetVersionList {
        record_key: RecordKey,
        /// Decoded entries are appended after whatever the caller put here.
        container: Vec<VersionEntry>,
    },
    InitiGetVersionList {
        record_key: RecordKey,
    },
    ReadVersion {
        record_key: RecordKey,
        version_key: i64,
    },
    ReplaceVersion {
        record_key: RecordKey,
        version_key: i64,
        begin_timestamp: i64,
        end_timestamp: i64,
        tx_id: i64,
        read_tx_id: i64,
        expected_end_timestamp: i64,
    },
    ReplaceWholeVersion {
        record_key: RecordKey,
        version_key: i64,
        entry: VersionEntry,
    },
    UploadVersion {
        record_key: RecordKey,
        version_key: i64,
        entry: VersionEntry,
    },
    UpdateVersionMaxCommitTs {
        record_key: RecordKey,
        version_key: i64,
        commit_time: i64,
    },
    DeleteVersion {
        record_key: RecordKey,
        version_key: i64,
    },
}

impl RequestKind {
    pub fn family(&self) -> RequestFamily {
        match self {
            RequestKind::NewTxId { .. }
            | RequestKind::InsertTxId { .. }
            | RequestKind::GetTxEntry { .. }
            | RequestKind::UpdateTxStatus { .. }
            | RequestKind::SetCommitTs { .. }
            | RequestKind::UpdateCommitLowerBound { .. }
            | RequestKind::RecycleTx { .. }
            | RequestKind::RemoveTx { .. } => RequestFamily::TxTable,
            _ => RequestFamily::VersionTable,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RequestKind::NewTxId { .. } => "new_tx_id",
            RequestKind::InsertTxId { .. } => "insert_tx_id",
            RequestKind::GetTxEntry { .. } => "get_tx_entry",
            RequestKind::UpdateTxStatus { .. } => "update_tx_status",
            RequestKind::SetCommitTs { .. } => "set_commit_ts",
            RequestKind::UpdateCommitLowerBound { .. } => "update_commit_lower_bound",
            RequestKind::RecycleTx { .. } => "recycle_tx",
            RequestKind::RemoveTx { .. } => "remove_tx",
            RequestKind::GetVersionList { .. } => "get_version_list",
            RequestKind::InitiGetVersionList { .. } => "initi_get_version_list",
            RequestKind::ReadVersion { .. } => "read_version",
            RequestKind::ReplaceVersion { .. } => "replace_version",
            RequestKind::ReplaceWholeVersion { .. } => "replace_whole_version",
            RequestKind::UploadVersion { .. } => "upload_version",
            RequestKind::UpdateVersionMaxCommitTs { .. } => "update_version_max_commit_ts",
            RequestKind::DeleteVersion { .. } => "delete_version",
        }
    }

    pub fn tx_id(&self) -> Option<i64> {
        match self {
            RequestKind::NewTxId { tx_id }
            | RequestKind::InsertTxId { tx_id }
            | RequestKind::GetTxEntry { tx_id }
            | RequestKind::UpdateTxStatus { tx_id, .. }
            | RequestKind::SetCommitTs { tx_id, .. }
            | RequestKind::UpdateCommitLowerBound { tx_id, .. }
            | RequestKind::RecycleTx { tx_id }
            | RequestKind::RemoveTx { tx_id } => Some(*tx_id),
            _ => None,
        }
    }

    pub fn record_key(&self) -> Option<&RecordKey> {
        match self {
            RequestKind::GetVersionList { record_key, .. }
            | RequestKind::InitiGetVersionList { record_key }
            | RequestKind::ReadVersion { record_key, .. }
            | RequestKind::ReplaceVersion { record_key, .. }
            | RequestKind::ReplaceWholeVersion { record_key, .. }
            | RequestKind::UploadVersion { record_key, .. }
            | RequestKind::UpdateVersionMaxCommitTs { record_key, .. }
            | RequestKind::DeleteVersion { record_key, .. } => Some(record_key),
            _ => None,
        }
    }
}

/// Lifecycle of a request's result slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultSlot {
    Unset,
    /// The backend stored its reply; decoding has not run yet.
    Raw(RawReply),
    Ready(TxResult),
}

/// One queued operation, shared between the caller waiting on it and the
/// partition that flushes it.
#[derive(Debug)]
pub struct TxRequest {
    kind: RequestKind,
    slot: Mutex<ResultSlot>,
    store_error: Mutex<Option<StoreError>>,
    ready: Condvar,
    notify: Notify,
}

impl TxRequest {
    pub fn new(kind: RequestKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            slot: Mutex::new(ResultSlot::Unset),
            store_error: Mutex::new(None),
            ready: Condvar::new(),
            notify: Notify::new(),
        })
    }

    pub fn kind(&self) -> &RequestKind {
        &self.kind
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.slot.lock(), ResultSlot::Ready(_))
    }

    pub fn slot(&self) -> ResultSlot {
        self.slot.lock().clone()
    }

    /// The decoded result, or `None` while the request is still pending.
    pub fn result(&self) -> Option<TxResult> {
        match &*self.slot.lock() {
            ResultSlot::Ready(result) => Some(result.clone()),
            _ => None,
        }
    }

    /// The error of the store batch this request was flushed in, if that
    /// batch failed. The decoded result is then the kind's sentinel.
    pub fn store_error(&self) -> Option<StoreError> {
        self.store_error.lock().clone()
    }

    pub(crate) fn record_store_error(&self, err: StoreError) {
        *self.store_error.lock() = Some(err);
    }

    pub(crate) fn set_raw(&self, reply: RawReply) {
        *self.slot.lock() = ResultSlot::Raw(reply);
    }

    /// Takes the raw reply for decoding; a slot that never received one reads
    /// as nil.
    pub(crate) fn take_raw(&self) -> RawReply {
        let mut slot = self.slot.lock();
        match std::mem::replace(&mut *slot, ResultSlot::Unset) {
            ResultSlot::Raw(reply) => reply,
            other => {
                *slot = other;
                RawReply::Nil
            }
        }
    }

    pub(crate) fn complete(&self, result: TxResult) {
        *self.slot.lock() = ResultSlot::Ready(result);
        self.ready.notify_all();
        self.notify.notify_waiters();
    }

    /// Blocks the calling thread until the request's partition is flushed.
    pub fn wait(&self) -> TxResult {
        let mut slot = self.slot.lock();
        loop {
            if let ResultSlot::Ready(result) = &*slot {
                return result.clone();
            }
            self.ready.wait(&mut slot);
        }
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Option<TxResult> {
        let mut slot = self.slot.lock();
        loop {
            if let ResultSlot::Ready(result) = &*slot {
                return Some(result.clone());
            }
            if self.ready.wait_for(&mut slot, timeout).timed_out() {
                return match &*slot {
                    ResultSlot::Ready(result) => Some(result.clone()),
                    _ => None,
                };
            }
        }
    }

    pub async fn wait_async(&self) -> TxResult {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(result) = self.result() {
                return result;
            }
            notified.await;
        }
    }
}
