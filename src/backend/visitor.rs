use super::{KvStore, ScriptOp, StoreCommand, tx_key, version_field};
use crate::error::StoreError;
use crate::model::VersionEntry;
use crate::model::tx_entry::{FIELD_STATUS, TX_ENTRY_FIELDS, TxStatus, TxTableEntry};
use crate::reply::RawReply;
use crate::request::{RequestKind, TxRequest};
use crate::response::ResponseDecoder;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchOutcome {
    pub flushed: usize,
    pub store_failed: bool,
}

/// Executes one partition's flush queue against the store and decodes every
/// reply back into its request.
pub struct BackendVisitor {
    namespace: String,
    partition: usize,
    store: Arc<dyn KvStore>,
    decoder: ResponseDecoder,
}

impl BackendVisitor {
    pub fn new(namespace: impl Into<String>, partition: usize, store: Arc<dyn KvStore>) -> Self {
        Self {
            namespace: namespace.into(),
            partition,
            store,
            decoder: ResponseDecoder::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn invoke(&self, batch: &[Arc<TxRequest>]) -> BatchOutcome {
        if batch.is_empty() {
            return BatchOutcome::default();
        }
        let commands = batch
            .iter()
            .map(|req| self.command_for(req.kind()))
            .collect::<Vec<_>>();
        let expected = commands.len();
        let replies = self.store.execute(commands).and_then(|replies| {
            if replies.len() == expected {
                Ok(replies)
            } else {
                Err(StoreError::ReplyCountMismatch {
                    expected,
                    actual: replies.len(),
                })
            }
        });
        let store_failed = match replies {
            Ok(replies) => {
                for (req, reply) in batch.iter().zip(replies) {
                    self.decoder.invoke(req, reply);
                }
                false
            }
            Err(err) => {
                warn!(
                    store = self.store.name(),
                    namespace = %self.namespace,
                    partition = self.partition,
                    batch = batch.len(),
                    error = %err,
                    "store batch failed, decoding as missing replies"
                );
                for req in batch {
                    req.record_store_error(err.clone());
                    self.decoder.invoke(req, RawReply::Nil);
                }
                true
            }
        };
        debug!(
            namespace = %self.namespace,
            partition = self.partition,
            flushed = batch.len(),
            "partition batch flushed"
        );
        BatchOutcome {
            flushed: batch.len(),
            store_failed,
        }
    }

    pub fn command_for(&self, kind: &RequestKind) -> StoreCommand {
        let namespace = self.namespace.clone();
        match kind {
            RequestKind::NewTxId { tx_id } => StoreCommand::HashSetIfAbsent {
                namespace,
                key: tx_key(*tx_id),
                field: FIELD_STATUS.to_vec(),
                value: TxStatus::Ongoing.as_i32().to_le_bytes().to_vec(),
            },
            RequestKind::InsertTxId { tx_id } | RequestKind::RecycleTx { tx_id } => {
                StoreCommand::HashSet {
                    namespace,
                    key: tx_key(*tx_id),
                    fields: TxTableEntry::ongoing(*tx_id).to_fields(),
                }
            }
            RequestKind::GetTxEntry { tx_id } => StoreCommand::HashMultiGet {
                namespace,
                key: tx_key(*tx_id),
                fields: TX_ENTRY_FIELDS.iter().map(|f| f.to_vec()).collect(),
            },
            RequestKind::UpdateTxStatus { tx_id, status } => {
                StoreCommand::Script(ScriptOp::UpdateTxStatus {
                    namespace,
                    key: tx_key(*tx_id),
                    status: status.as_i32(),
                })
            }
            RequestKind::SetCommitTs {
                tx_id,
                proposed_commit_ts,
            } => StoreCommand::Script(ScriptOp::SetAndGetCommitTime {
                namespace,
                key: tx_key(*tx_id),
                proposed_commit_ts: *proposed_commit_ts,
            }),
            RequestKind::UpdateCommitLowerBound { tx_id, lower_bound } => {
                StoreCommand::Script(ScriptOp::UpdateCommitLowerBound {
                    namespace,
                    key: tx_key(*tx_id),
                    lower_bound: *lower_bound,
                })
            }
            RequestKind::RemoveTx { tx_id } => StoreCommand::Delete {
                namespace,
                key: tx_key(*tx_id),
            },
            RequestKind::GetVersionList { record_key, .. } => StoreCommand::HashGetAll {
                namespace,
                key: record_key.as_slice().to_vec(),
            },
            RequestKind::InitiGetVersionList { record_key } => {
                StoreCommand::Script(ScriptOp::InitializeVersionList {
                    namespace,
                    key: record_key.as_slice().to_vec(),
                    placeholder: VersionEntry::placeholder(record_key.clone()).serialize(),
                })
            }
            RequestKind::ReadVersion {
                record_key,
                version_key,
            } => StoreCommand::HashGet {
                namespace,
                key: record_key.as_slice().to_vec(),
                field: version_field(*version_key),
            },
            RequestKind::ReplaceVersion {
                record_key,
                version_key,
                begin_timestamp,
                end_timestamp,
                tx_id,
                read_tx_id,
                expected_end_timestamp,
            } => StoreCommand::Script(ScriptOp::ReplaceVersionEntry {
                namespace,
                key: record_key.as_slice().to_vec(),
                version_key: *version_key,
                begin_timestamp: *begin_timestamp,
                end_timestamp: *end_timestamp,
                tx_id: *tx_id,
                read_tx_id: *read_tx_id,
                expected_end_timestamp: *expected_end_timestamp,
            }),
            RequestKind::ReplaceWholeVersion {
                record_key,
                version_key,
                entry,
            } => StoreCommand::Script(ScriptOp::ReplaceWholeVersion {
                namespace,
                key: record_key.as_slice().to_vec(),
                version_key: *version_key,
                value: entry.serialize(),
            }),
            RequestKind::UploadVersion {
                record_key,
                version_key,
                entry,
            } => StoreCommand::HashSetIfAbsent {
                namespace,
                key: record_key.as_slice().to_vec(),
                field: version_field(*version_key),
                value: entry.serialize(),
            },
            RequestKind::UpdateVersionMaxCommitTs {
                record_key,
                version_key,
                commit_time,
            } => StoreCommand::Script(ScriptOp::UpdateVersionMaxCommitTs {
                namespace,
                key: record_key.as_slice().to_vec(),
                version_key: *version_key,
                commit_time: *commit_time,
            }),
            RequestKind::DeleteVersion {
                record_key,
                version_key,
            } => StoreCommand::HashDelete {
                namespace,
                key: record_key.as_slice().to_vec(),
                field: version_field(*version_key),
            },
        }
    }
}
