//! Turns raw store replies into typed request results.
//!
//! Decoding never fails: a missing or malformed reply becomes the sentinel
//! documented for the request kind, and the caller holding the request
//! decides whether that is an application error.

use crate::model::version_entry::{read_i32, read_i64};
use crate::model::{RecordKey, TxStatus, TxTableEntry, VersionEntry};
use crate::reply::RawReply;
use crate::request::{RequestKind, TxRequest, TxResult};
use tracing::trace;

/// Returned by lower-bound updates when the store call itself failed.
pub const RETURN_ERROR_CODE: i64 = -2;
/// Failure sentinel of count-style acknowledgements.
pub const COUNT_FAILURE: i64 = 0;
/// Failure sentinel of status updates and whole-entry replacement.
pub const STATUS_FAILURE: i64 = -1;
/// Recycling has no failure reply and always reports success.
pub const RECYCLE_SUCCESS: i64 = 1;
pub const UNASSIGNED_COMMIT_TIME: i64 = -1;

#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseDecoder;

impl ResponseDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Stores `reply` as the request's raw result, then decodes it in place.
    pub fn invoke(&self, request: &TxRequest, reply: RawReply) {
        request.set_raw(reply);
        self.decode_in_place(request);
    }

    pub fn decode_in_place(&self, request: &TxRequest) {
        let raw = request.take_raw();
        let result = self.decode(request.kind(), raw);
        trace!(kind = request.kind().name(), ?result, "decoded reply");
        request.complete(result);
    }

    pub fn decode(&self, kind: &RequestKind, reply: RawReply) -> TxResult {
        match kind {
            RequestKind::DeleteVersion { .. }
            | RequestKind::InitiGetVersionList { .. }
            | RequestKind::NewTxId { .. }
            | RequestKind::InsertTxId { .. }
            | RequestKind::UploadVersion { .. } => {
                TxResult::Count(reply.as_integer().unwrap_or(COUNT_FAILURE))
            }
            RequestKind::UpdateTxStatus { .. } | RequestKind::ReplaceWholeVersion { .. } => {
                TxResult::Count(reply.as_integer().unwrap_or(STATUS_FAILURE))
            }
            RequestKind::RecycleTx { .. } => TxResult::Count(RECYCLE_SUCCESS),
            RequestKind::RemoveTx { .. } => TxResult::Count(decode_remove(&reply)),
            RequestKind::GetTxEntry { tx_id } => TxResult::TxEntry(decode_tx_entry(*tx_id, &reply)),
            RequestKind::ReadVersion {
                record_key,
                version_key,
            } => TxResult::Version(
                reply
                    .as_bulk()
                    .filter(|bytes| !bytes.is_empty())
                    .and_then(|bytes| VersionEntry::deserialize(record_key, *version_key, bytes)),
            ),
            RequestKind::ReplaceVersion {
                record_key,
                version_key,
                ..
            }
            | RequestKind::UpdateVersionMaxCommitTs {
                record_key,
                version_key,
                ..
            } => TxResult::Version(decode_second_entry(record_key, *version_key, &reply)),
            RequestKind::GetVersionList {
                record_key,
                container,
            } => {
                let mut list = container.clone();
                append_version_list(record_key, &reply, &mut list);
                TxResult::VersionList(list)
            }
            RequestKind::SetCommitTs { .. } => {
                TxResult::Timestamp(second_i64(&reply).unwrap_or(UNASSIGNED_COMMIT_TIME))
            }
            RequestKind::UpdateCommitLowerBound { .. } => {
                TxResult::Timestamp(second_i64(&reply).unwrap_or(RETURN_ERROR_CODE))
            }
        }
    }
}

fn decode_remove(reply: &RawReply) -> i64 {
    match reply {
        RawReply::Integer(v) => *v,
        RawReply::Bulk(bytes) => read_i64(bytes).unwrap_or(COUNT_FAILURE),
        _ => COUNT_FAILURE,
    }
}

// [status:i32][commit_time:i64][commit_lower_bound:i64]
fn decode_tx_entry(tx_id: i64, reply: &RawReply) -> Option<TxTableEntry> {
    let fields = reply.as_non_empty_array()?;
    if fields.len() < 3 {
        return None;
    }
    let status = TxStatus::from_i32(read_i32(fields[0].as_bulk()?)?)?;
    let commit_time = read_i64(fields[1].as_bulk()?)?;
    let commit_lower_bound = read_i64(fields[2].as_bulk()?)?;
    Some(TxTableEntry::new(tx_id, status, commit_time, commit_lower_bound))
}

// Element 0 is a side channel of the store script; element 1 is the answer.
fn second_element(reply: &RawReply) -> Option<&RawReply> {
    reply.as_non_empty_array()?.get(1)
}

fn second_i64(reply: &RawReply) -> Option<i64> {
    match second_element(reply)? {
        RawReply::Integer(v) => Some(*v),
        RawReply::Bulk(bytes) => read_i64(bytes),
        _ => None,
    }
}

fn decode_second_entry(record_key: &RecordKey, version_key: i64, reply: &RawReply) -> Option<VersionEntry> {
    let bytes = second_element(reply)?.as_bulk()?;
    VersionEntry::deserialize(record_key, version_key, bytes)
}

// Flat (version_key, entry) pairs. One malformed pair voids the whole reply.
fn append_version_list(record_key: &RecordKey, reply: &RawReply, out: &mut Vec<VersionEntry>) {
    let Some(items) = reply.as_non_empty_array() else {
        return;
    };
    if items.len() % 2 != 0 {
        return;
    }
    let decoded: Option<Vec<VersionEntry>> = items
        .chunks_exact(2)
        .map(|pair| {
            let version_key = pair[0].as_bulk().and_then(read_i64)?;
            let bytes = pair[1].as_bulk()?;
            VersionEntry::deserialize(record_key, version_key, bytes)
        })
        .collect();
    if let Some(entries) = decoded {
        out.extend(entries);
    }
}

#[cfg(test)]
mod tests;
