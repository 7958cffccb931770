use super::*;
use crate::model::{EMPTY_TX_ID, INFINITY_TIMESTAMP};
use crate::request::ResultSlot;

fn key() -> RecordKey {
    RecordKey::from("vertex:1")
}

fn entry(version_key: i64, begin: i64) -> VersionEntry {
    VersionEntry::new(key(), version_key, begin, INFINITY_TIMESTAMP, EMPTY_TX_ID, b"v".to_vec())
}

fn tx_fields(status: i32, commit: i64, lower: i64) -> RawReply {
    RawReply::Array(vec![
        RawReply::bulk(status.to_le_bytes().to_vec()),
        RawReply::bulk_i64(commit),
        RawReply::bulk_i64(lower),
    ])
}

fn all_kinds() -> Vec<RequestKind> {
    let record_key = key();
    vec![
        RequestKind::NewTxId { tx_id: 1 },
        RequestKind::InsertTxId { tx_id: 1 },
        RequestKind::GetTxEntry { tx_id: 1 },
        RequestKind::UpdateTxStatus {
            tx_id: 1,
            status: TxStatus::Committed,
        },
        RequestKind::SetCommitTs {
            tx_id: 1,
            proposed_commit_ts: 5,
        },
        RequestKind::UpdateCommitLowerBound {
            tx_id: 1,
            lower_bound: 5,
        },
        RequestKind::RecycleTx { tx_id: 1 },
        RequestKind::RemoveTx { tx_id: 1 },
        RequestKind::GetVersionList {
            record_key: record_key.clone(),
            container: Vec::new(),
        },
        RequestKind::InitiGetVersionList {
            record_key: record_key.clone(),
        },
        RequestKind::ReadVersion {
            record_key: record_key.clone(),
            version_key: 1,
        },
        RequestKind::ReplaceVersion {
            record_key: record_key.clone(),
            version_key: 1,
            begin_timestamp: 1,
            end_timestamp: 2,
            tx_id: 3,
            read_tx_id: EMPTY_TX_ID,
            expected_end_timestamp: INFINITY_TIMESTAMP,
        },
        RequestKind::ReplaceWholeVersion {
            record_key: record_key.clone(),
            version_key: 1,
            entry: entry(1, 0),
        },
        RequestKind::UploadVersion {
            record_key: record_key.clone(),
            version_key: 1,
            entry: entry(1, 0),
        },
        RequestKind::UpdateVersionMaxCommitTs {
            record_key: record_key.clone(),
            version_key: 1,
            commit_time: 9,
        },
        RequestKind::DeleteVersion {
            record_key,
            version_key: 1,
        },
    ]
}

fn sentinel_for(kind: &RequestKind) -> TxResult {
    match kind {
        RequestKind::UpdateTxStatus { .. } | RequestKind::ReplaceWholeVersion { .. } => {
            TxResult::Count(STATUS_FAILURE)
        }
        RequestKind::RecycleTx { .. } => TxResult::Count(RECYCLE_SUCCESS),
        RequestKind::GetTxEntry { .. } => TxResult::TxEntry(None),
        RequestKind::ReadVersion { .. }
        | RequestKind::ReplaceVersion { .. }
        | RequestKind::UpdateVersionMaxCommitTs { .. } => TxResult::Version(None),
        RequestKind::GetVersionList { .. } => TxResult::VersionList(Vec::new()),
        RequestKind::SetCommitTs { .. } => TxResult::Timestamp(UNASSIGNED_COMMIT_TIME),
        RequestKind::UpdateCommitLowerBound { .. } => TxResult::Timestamp(RETURN_ERROR_CODE),
        _ => TxResult::Count(COUNT_FAILURE),
    }
}

#[test]
fn nil_reply_decodes_to_sentinel_for_every_kind() {
    let decoder = ResponseDecoder::new();
    for kind in all_kinds() {
        assert_eq!(
            decoder.decode(&kind, RawReply::Nil),
            sentinel_for(&kind),
            "kind {}",
            kind.name()
        );
    }
}

#[test]
fn error_and_status_replies_decode_to_sentinel() {
    let decoder = ResponseDecoder::new();
    for kind in all_kinds() {
        for reply in [
            RawReply::Error("ERR wrong type".into()),
            RawReply::Status("QUEUED".into()),
            RawReply::Array(Vec::new()),
        ] {
            assert_eq!(
                decoder.decode(&kind, reply.clone()),
                sentinel_for(&kind),
                "kind {} reply {:?}",
                kind.name(),
                reply
            );
        }
    }
}

#[test]
fn count_kinds_pass_integers_through() {
    let decoder = ResponseDecoder::new();
    let kind = RequestKind::UploadVersion {
        record_key: key(),
        version_key: 1,
        entry: entry(1, 0),
    };
    assert_eq!(decoder.decode(&kind, RawReply::Integer(1)), TxResult::Count(1));
    assert_eq!(decoder.decode(&kind, RawReply::bulk_i64(1)), TxResult::Count(0));
}

#[test]
fn recycle_is_always_successful() {
    let decoder = ResponseDecoder::new();
    let kind = RequestKind::RecycleTx { tx_id: 4 };
    assert_eq!(decoder.decode(&kind, RawReply::Integer(0)), TxResult::Count(1));
    assert_eq!(decoder.decode(&kind, RawReply::ok()), TxResult::Count(1));
}

#[test]
fn remove_accepts_integer_or_eight_byte_bulk() {
    let decoder = ResponseDecoder::new();
    let kind = RequestKind::RemoveTx { tx_id: 4 };
    assert_eq!(decoder.decode(&kind, RawReply::Integer(1)), TxResult::Count(1));
    assert_eq!(decoder.decode(&kind, RawReply::bulk_i64(1)), TxResult::Count(1));
    assert_eq!(decoder.decode(&kind, RawReply::bulk(vec![1, 2])), TxResult::Count(0));
}

#[test]
fn tx_entry_decodes_fixed_field_order() {
    let decoder = ResponseDecoder::new();
    let kind = RequestKind::GetTxEntry { tx_id: 42 };
    let decoded = decoder.decode(&kind, tx_fields(1, 100, 90)).into_tx_entry();
    assert_eq!(
        decoded,
        Some(TxTableEntry::new(42, TxStatus::Committed, 100, 90))
    );
}

#[test]
fn tx_entry_with_bad_width_or_status_is_missing() {
    let decoder = ResponseDecoder::new();
    let kind = RequestKind::GetTxEntry { tx_id: 42 };
    let short_status = RawReply::Array(vec![
        RawReply::bulk(vec![1]),
        RawReply::bulk_i64(100),
        RawReply::bulk_i64(90),
    ]);
    assert_eq!(decoder.decode(&kind, short_status), TxResult::TxEntry(None));
    assert_eq!(decoder.decode(&kind, tx_fields(9, 1, 1)), TxResult::TxEntry(None));
    let missing_field = RawReply::Array(vec![RawReply::bulk(1i32.to_le_bytes().to_vec())]);
    assert_eq!(decoder.decode(&kind, missing_field), TxResult::TxEntry(None));
}

#[test]
fn commit_time_replies_use_second_element() {
    let decoder = ResponseDecoder::new();
    let set = RequestKind::SetCommitTs {
        tx_id: 1,
        proposed_commit_ts: 5,
    };
    let reply = RawReply::Array(vec![RawReply::Integer(-1), RawReply::Integer(12)]);
    assert_eq!(decoder.decode(&set, reply.clone()), TxResult::Timestamp(12));

    let bound = RequestKind::UpdateCommitLowerBound {
        tx_id: 1,
        lower_bound: 5,
    };
    assert_eq!(decoder.decode(&bound, reply), TxResult::Timestamp(12));
    let single = RawReply::Array(vec![RawReply::Integer(7)]);
    assert_eq!(decoder.decode(&bound, single), TxResult::Timestamp(RETURN_ERROR_CODE));
}

#[test]
fn replace_decodes_entry_from_second_element() {
    let decoder = ResponseDecoder::new();
    let kind = RequestKind::ReplaceVersion {
        record_key: key(),
        version_key: 3,
        begin_timestamp: 10,
        end_timestamp: INFINITY_TIMESTAMP,
        tx_id: EMPTY_TX_ID,
        read_tx_id: EMPTY_TX_ID,
        expected_end_timestamp: INFINITY_TIMESTAMP,
    };
    let stored = entry(3, 10);
    let reply = RawReply::Array(vec![RawReply::Integer(1), RawReply::bulk(stored.serialize())]);
    assert_eq!(decoder.decode(&kind, reply).into_version(), Some(stored));
}

#[test]
fn max_commit_ts_needs_two_elements() {
    let decoder = ResponseDecoder::new();
    let kind = RequestKind::UpdateVersionMaxCommitTs {
        record_key: key(),
        version_key: 3,
        commit_time: 7,
    };
    let lone = RawReply::Array(vec![RawReply::bulk(entry(3, 1).serialize())]);
    assert_eq!(decoder.decode(&kind, lone), TxResult::Version(None));
}

#[test]
fn version_list_appends_in_reply_order() {
    let decoder = ResponseDecoder::new();
    let existing = entry(0, 0);
    let kind = RequestKind::GetVersionList {
        record_key: key(),
        container: vec![existing.clone()],
    };
    let second = entry(2, 20);
    let first = entry(1, 10);
    let reply = RawReply::Array(vec![
        RawReply::bulk_i64(2),
        RawReply::bulk(second.serialize()),
        RawReply::bulk_i64(1),
        RawReply::bulk(first.serialize()),
    ]);
    let list = decoder.decode(&kind, reply).into_version_list();
    assert_eq!(list, vec![existing, second, first]);
}

#[test]
fn version_list_with_malformed_pair_is_empty() {
    let decoder = ResponseDecoder::new();
    let kind = RequestKind::GetVersionList {
        record_key: key(),
        container: Vec::new(),
    };
    let good = entry(1, 10);
    let short_entry = RawReply::Array(vec![
        RawReply::bulk_i64(1),
        RawReply::bulk(good.serialize()),
        RawReply::bulk_i64(2),
        RawReply::bulk(vec![0u8; 3]),
    ]);
    assert!(decoder.decode(&kind, short_entry).into_version_list().is_empty());

    let odd_length = RawReply::Array(vec![
        RawReply::bulk_i64(1),
        RawReply::bulk(good.serialize()),
        RawReply::bulk_i64(2),
    ]);
    assert!(decoder.decode(&kind, odd_length).into_version_list().is_empty());

    let bad_key = RawReply::Array(vec![
        RawReply::bulk(vec![1u8; 4]),
        RawReply::bulk(good.serialize()),
    ]);
    assert!(decoder.decode(&kind, bad_key).into_version_list().is_empty());
}

#[test]
fn malformed_version_list_keeps_only_caller_container() {
    let decoder = ResponseDecoder::new();
    let existing = VersionEntry::placeholder(key());
    let kind = RequestKind::GetVersionList {
        record_key: key(),
        container: vec![existing.clone()],
    };
    let reply = RawReply::Array(vec![
        RawReply::bulk_i64(1),
        RawReply::bulk(entry(1, 10).serialize()),
        RawReply::Nil,
        RawReply::bulk(entry(2, 20).serialize()),
    ]);
    assert_eq!(decoder.decode(&kind, reply).into_version_list(), vec![existing]);
}

#[test]
fn read_version_treats_empty_bulk_as_missing() {
    let decoder = ResponseDecoder::new();
    let kind = RequestKind::ReadVersion {
        record_key: key(),
        version_key: 1,
    };
    assert_eq!(decoder.decode(&kind, RawReply::bulk(Vec::new())), TxResult::Version(None));
    let stored = entry(1, 4);
    assert_eq!(
        decoder.decode(&kind, RawReply::bulk(stored.serialize())),
        TxResult::Version(Some(stored))
    );
}

#[test]
fn invoke_overwrites_raw_slot_with_decoded_result() {
    let decoder = ResponseDecoder::new();
    let request = TxRequest::new(RequestKind::DeleteVersion {
        record_key: key(),
        version_key: 1,
    });
    decoder.invoke(&request, RawReply::Integer(1));
    assert_eq!(request.slot(), ResultSlot::Ready(TxResult::Count(1)));
}
