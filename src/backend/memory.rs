use super::{KvStore, ScriptOp, StoreCommand, version_field};
use crate::error::StoreError;
use crate::model::tx_entry::{
    DEFAULT_COMMIT_LOWER_BOUND, FIELD_COMMIT_LOWER_BOUND, FIELD_COMMIT_TIME, FIELD_STATUS,
};
use crate::model::version_entry::{read_i32, read_i64};
use crate::model::{RecordKey, TxStatus, UNSET_COMMIT_TIME, VersionEntry};
use crate::reply::RawReply;
use parking_lot::RwLock;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

type Fields = BTreeMap<Vec<u8>, Vec<u8>>;
type Shard = HashMap<(String, Vec<u8>), Fields>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryStoreConfig {
    pub shards: usize,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self { shards: 16 }
    }
}

impl MemoryStoreConfig {
    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }
}

/// In-process hash store. Each command runs under its shard's write lock, so
/// scripts are atomic per key.
pub struct MemoryStore {
    shards: Vec<RwLock<Shard>>,
    available: AtomicBool,
    batches: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(MemoryStoreConfig::default())
    }
}

impl MemoryStore {
    pub fn new(config: MemoryStoreConfig) -> Self {
        let shards = config.shards.max(1);
        Self {
            shards: (0..shards).map(|_| RwLock::new(HashMap::new())).collect(),
            available: AtomicBool::new(true),
            batches: AtomicU64::new(0),
        }
    }

    /// While unavailable every batch fails with [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    pub fn batches_executed(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    pub fn key_count(&self, namespace: &str) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.read().keys().filter(|(ns, _)| ns == namespace).count())
            .sum()
    }

    fn shard_for(&self, namespace: &str, key: &[u8]) -> &RwLock<Shard> {
        let mut h = DefaultHasher::new();
        namespace.hash(&mut h);
        key.hash(&mut h);
        &self.shards[(h.finish() as usize) % self.shards.len()]
    }

    fn with_hash<R>(&self, namespace: &str, key: &[u8], f: impl FnOnce(Option<&Fields>) -> R) -> R {
        let shard = self.shard_for(namespace, key).read();
        f(shard.get(&(namespace.to_string(), key.to_vec())))
    }

    fn with_hash_mut<R>(
        &self,
        namespace: &str,
        key: &[u8],
        f: impl FnOnce(&mut Option<Fields>) -> R,
    ) -> R {
        let mut shard = self.shard_for(namespace, key).write();
        let id = (namespace.to_string(), key.to_vec());
        let mut slot = shard.remove(&id);
        let out = f(&mut slot);
        if let Some(fields) = slot
            && !fields.is_empty()
        {
            shard.insert(id, fields);
        }
        out
    }

    fn apply(&self, command: StoreCommand) -> RawReply {
        match command {
            StoreCommand::HashGet {
                namespace,
                key,
                field,
            } => self.with_hash(&namespace, &key, |hash| {
                RawReply::from(hash.and_then(|h| h.get(&field).cloned()))
            }),
            StoreCommand::HashGetAll { namespace, key } => {
                self.with_hash(&namespace, &key, |hash| {
                    let items: Vec<RawReply> = hash
                        .map(|h| {
                            h.iter()
                                .flat_map(|(f, v)| [RawReply::bulk(f.clone()), RawReply::bulk(v.clone())])
                                .collect()
                        })
                        .unwrap_or_default();
                    RawReply::Array(items)
                })
            }
            StoreCommand::HashMultiGet {
                namespace,
                key,
                fields,
            } => self.with_hash(&namespace, &key, |hash| match hash {
                Some(h) => RawReply::Array(
                    fields
                        .iter()
                        .map(|f| RawReply::from(h.get(f).cloned()))
                        .collect(),
                ),
                None => RawReply::Array(Vec::new()),
            }),
            StoreCommand::HashSet {
                namespace,
                key,
                fields,
            } => self.with_hash_mut(&namespace, &key, |slot| {
                let hash = slot.get_or_insert_with(BTreeMap::new);
                let added = fields
                    .into_iter()
                    .filter(|(f, v)| hash.insert(f.clone(), v.clone()).is_none())
                    .count();
                RawReply::Integer(added as i64)
            }),
            StoreCommand::HashSetIfAbsent {
                namespace,
                key,
                field,
                value,
            } => self.with_hash_mut(&namespace, &key, |slot| {
                let hash = slot.get_or_insert_with(BTreeMap::new);
                if hash.contains_key(&field) {
                    RawReply::Integer(0)
                } else {
                    hash.insert(field, value);
                    RawReply::Integer(1)
                }
            }),
            StoreCommand::HashDelete {
                namespace,
                key,
                field,
            } => self.with_hash_mut(&namespace, &key, |slot| {
                let removed = slot.as_mut().and_then(|h| h.remove(&field)).is_some();
                RawReply::Integer(removed as i64)
            }),
            StoreCommand::Delete { namespace, key } => {
                self.with_hash_mut(&namespace, &key, |slot| RawReply::Integer(slot.take().is_some() as i64))
            }
            StoreCommand::Script(op) => self.run_script(op),
            StoreCommand::FlushNamespace { namespace } => {
                let mut removed = 0usize;
                for shard in &self.shards {
                    let mut shard = shard.write();
                    let before = shard.len();
                    shard.retain(|(ns, _), _| ns != &namespace);
                    removed += before - shard.len();
                }
                debug!(namespace = %namespace, removed, "namespace flushed");
                RawReply::Integer(removed as i64)
            }
            StoreCommand::FlushAll => {
                for shard in &self.shards {
                    shard.write().clear();
                }
                RawReply::ok()
            }
        }
    }

    fn run_script(&self, op: ScriptOp) -> RawReply {
        match op {
            ScriptOp::UpdateTxStatus {
                namespace,
                key,
                status,
            } => {
                let Some(next) = TxStatus::from_i32(status) else {
                    return RawReply::Error(format!("ERR unknown tx status {status}"));
                };
                self.with_hash_mut(&namespace, &key, |slot| {
                    let Some(hash) = slot.as_mut() else {
                        return RawReply::Nil;
                    };
                    let Some(current) = hash
                        .get(FIELD_STATUS)
                        .and_then(|b| read_i32(b))
                        .and_then(TxStatus::from_i32)
                    else {
                        return RawReply::Nil;
                    };
                    if !current.can_transition_to(next) {
                        return RawReply::Integer(0);
                    }
                    hash.insert(FIELD_STATUS.to_vec(), next.as_i32().to_le_bytes().to_vec());
                    RawReply::Integer(1)
                })
            }
            ScriptOp::SetAndGetCommitTime {
                namespace,
                key,
                proposed_commit_ts,
            } => self.with_hash_mut(&namespace, &key, |slot| {
                let Some(hash) = slot.as_mut() else {
                    return RawReply::Nil;
                };
                let old = field_i64(hash, FIELD_COMMIT_TIME, UNSET_COMMIT_TIME);
                let effective = if old == UNSET_COMMIT_TIME {
                    let lower = field_i64(hash, FIELD_COMMIT_LOWER_BOUND, DEFAULT_COMMIT_LOWER_BOUND);
                    let assigned = proposed_commit_ts.max(lower);
                    hash.insert(FIELD_COMMIT_TIME.to_vec(), assigned.to_le_bytes().to_vec());
                    assigned
                } else {
                    old
                };
                RawReply::Array(vec![RawReply::Integer(old), RawReply::Integer(effective)])
            }),
            ScriptOp::UpdateCommitLowerBound {
                namespace,
                key,
                lower_bound,
            } => self.with_hash_mut(&namespace, &key, |slot| {
                let Some(hash) = slot.as_mut() else {
                    return RawReply::Nil;
                };
                let commit_time = field_i64(hash, FIELD_COMMIT_TIME, UNSET_COMMIT_TIME);
                let current = field_i64(hash, FIELD_COMMIT_LOWER_BOUND, DEFAULT_COMMIT_LOWER_BOUND);
                if commit_time != UNSET_COMMIT_TIME {
                    return RawReply::Array(vec![RawReply::Integer(current), RawReply::Integer(commit_time)]);
                }
                hash.insert(
                    FIELD_COMMIT_LOWER_BOUND.to_vec(),
                    current.max(lower_bound).to_le_bytes().to_vec(),
                );
                RawReply::Array(vec![
                    RawReply::Integer(current),
                    RawReply::Integer(UNSET_COMMIT_TIME),
                ])
            }),
            ScriptOp::ReplaceVersionEntry {
                namespace,
                key,
                version_key,
                begin_timestamp,
                end_timestamp,
                tx_id,
                read_tx_id,
                expected_end_timestamp,
            } => self.with_version(&namespace, &key, version_key, |current| {
                if current.end_timestamp != expected_end_timestamp {
                    return (None, RawReply::Integer(0), current.clone());
                }
                let mut updated = current.clone();
                updated.begin_timestamp = begin_timestamp;
                updated.end_timestamp = end_timestamp;
                updated.tx_id = tx_id;
                updated.read_tx_id = read_tx_id;
                (Some(updated.clone()), RawReply::Integer(1), updated)
            }),
            ScriptOp::UpdateVersionMaxCommitTs {
                namespace,
                key,
                version_key,
                commit_time,
            } => self.with_version(&namespace, &key, version_key, |current| {
                let mut updated = current.clone();
                updated.max_commit_ts = current.max_commit_ts.max(commit_time);
                (
                    Some(updated.clone()),
                    RawReply::Integer(current.max_commit_ts),
                    updated,
                )
            }),
            ScriptOp::ReplaceWholeVersion {
                namespace,
                key,
                version_key,
                value,
            } => self.with_hash_mut(&namespace, &key, |slot| {
                slot.get_or_insert_with(BTreeMap::new)
                    .insert(version_field(version_key), value);
                RawReply::Integer(1)
            }),
            ScriptOp::InitializeVersionList {
                namespace,
                key,
                placeholder,
            } => self.with_hash_mut(&namespace, &key, |slot| {
                if slot.as_ref().is_some_and(|h| !h.is_empty()) {
                    return RawReply::Integer(0);
                }
                let mut hash = BTreeMap::new();
                hash.insert(version_field(crate::model::VERSION_KEY_START_INDEX), placeholder);
                *slot = Some(hash);
                RawReply::Integer(1)
            }),
        }
    }

    /// Runs `f` against one stored version. `f` returns the entry to write
    /// back (if any), the first reply element, and the entry to reply with.
    fn with_version(
        &self,
        namespace: &str,
        key: &[u8],
        version_key: i64,
        f: impl FnOnce(&VersionEntry) -> (Option<VersionEntry>, RawReply, VersionEntry),
    ) -> RawReply {
        let record_key = RecordKey::from_bytes(key);
        let field = version_field(version_key);
        self.with_hash_mut(namespace, key, |slot| {
            let Some(hash) = slot.as_mut() else {
                return RawReply::Nil;
            };
            let Some(bytes) = hash.get(&field) else {
                return RawReply::Nil;
            };
            let Some(current) = VersionEntry::deserialize(&record_key, version_key, bytes) else {
                return RawReply::Error("ERR corrupt version entry".into());
            };
            let (write, first, reply_entry) = f(&current);
            if let Some(entry) = write {
                hash.insert(field, entry.serialize());
            }
            RawReply::Array(vec![first, RawReply::bulk(reply_entry.serialize())])
        })
    }
}

fn field_i64(hash: &Fields, field: &[u8], default: i64) -> i64 {
    hash.get(field).and_then(|b| read_i64(b)).unwrap_or(default)
}

impl KvStore for MemoryStore {
    fn execute(&self, commands: Vec<StoreCommand>) -> Result<Vec<RawReply>, StoreError> {
        if !self.available.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable("memory store marked unavailable".into()));
        }
        self.batches.fetch_add(1, Ordering::Relaxed);
        Ok(commands.into_iter().map(|c| self.apply(c)).collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
