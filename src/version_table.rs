use crate::backend::{KvStore, StoreCommand};
use crate::config::VersionDbConfig;
use crate::error::VersionDbError;
use crate::model::{RecordKey, VersionEntry, VersionPrimaryKey};
use crate::partition::{Partition, PartitionMetrics, PartitionRouting, build_partitions};
use crate::request::{RequestKind, TxRequest, TxResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Version chains of one table, partitioned by record key.
pub struct VersionTable {
    table_id: String,
    partitions: Vec<Partition>,
    routing: PartitionRouting,
    store: Arc<dyn KvStore>,
}

impl std::fmt::Debug for VersionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionTable")
            .field("table_id", &self.table_id)
            .field("partitions", &self.partitions.len())
            .finish_non_exhaustive()
    }
}

impl VersionTable {
    pub fn new(table_id: &str, config: &VersionDbConfig, store: Arc<dyn KvStore>) -> Self {
        Self {
            table_id: table_id.to_string(),
            partitions: build_partitions(
                table_id,
                config.partition_count,
                config.queue_capacity,
                &store,
            ),
            routing: config.physical_routing.clone(),
            store,
        }
    }

    pub fn table_id(&self) -> &str {
        &self.table_id
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn partition_of(&self, record_key: &RecordKey) -> usize {
        self.routing
            .partition_for(record_key.as_slice(), self.partitions.len())
    }

    /// Queues a version request on its record key's partition and returns the
    /// partition index. Nothing reaches the store until that partition is
    /// visited.
    pub fn enqueue_version_entry_request(
        &self,
        request: Arc<TxRequest>,
    ) -> Result<usize, VersionDbError> {
        let Some(record_key) = request.kind().record_key() else {
            return Err(VersionDbError::Unsupported(format!(
                "{} is not a version table request",
                request.kind().name()
            )));
        };
        let partition = self.partition_of(record_key);
        self.partitions[partition].enqueue(request);
        Ok(partition)
    }

    pub fn visit(&self, partition: usize) -> Result<usize, VersionDbError> {
        let Some(p) = self.partitions.get(partition) else {
            return Err(VersionDbError::PartitionOutOfRange {
                table_id: self.table_id.clone(),
                partition,
                partition_count: self.partitions.len(),
            });
        };
        Ok(p.visit())
    }

    pub fn visit_all(&self) -> usize {
        self.partitions.iter().map(Partition::visit).sum()
    }

    fn execute(&self, record_key: &RecordKey, kind: RequestKind) -> TxResult {
        let request = TxRequest::new(kind);
        let partition = &self.partitions[self.partition_of(record_key)];
        partition.enqueue(Arc::clone(&request));
        partition.visit_until_ready(&request);
        request.wait()
    }

    /// Every stored version of `record_key`, newest version key first. The
    /// placeholder written by initialization is included.
    pub fn get_version_list(&self, record_key: &RecordKey) -> Vec<VersionEntry> {
        let mut list = self
            .execute(record_key, RequestKind::GetVersionList {
                record_key: record_key.clone(),
                container: Vec::new(),
            })
            .into_version_list();
        list.sort_by(|a, b| b.version_key.cmp(&a.version_key));
        list
    }

    /// Writes the placeholder head into an empty chain, then reads the chain.
    pub fn initialize_and_get_version_list(&self, record_key: &RecordKey) -> Vec<VersionEntry> {
        self.execute(record_key, RequestKind::InitiGetVersionList {
            record_key: record_key.clone(),
        });
        self.get_version_list(record_key)
    }

    pub fn get_version_entry_by_key(
        &self,
        record_key: &RecordKey,
        version_key: i64,
    ) -> Option<VersionEntry> {
        self.execute(record_key, RequestKind::ReadVersion {
            record_key: record_key.clone(),
            version_key,
        })
        .into_version()
    }

    /// Reads many versions in one pass over the partitions. Pairs that are
    /// not stored are absent from the map.
    pub fn get_version_entries_by_key(
        &self,
        keys: &[VersionPrimaryKey],
    ) -> HashMap<VersionPrimaryKey, VersionEntry> {
        let requests: Vec<(usize, Arc<TxRequest>)> = keys
            .iter()
            .map(|key| {
                let request = TxRequest::new(RequestKind::ReadVersion {
                    record_key: key.record_key.clone(),
                    version_key: key.version_key,
                });
                let partition = self.partition_of(&key.record_key);
                self.partitions[partition].enqueue(Arc::clone(&request));
                (partition, request)
            })
            .collect();
        for (partition, request) in &requests {
            self.partitions[*partition].visit_until_ready(request);
        }
        requests
            .into_iter()
            .filter_map(|(_, request)| request.wait().into_version())
            .map(|entry| (entry.primary_key(), entry))
            .collect()
    }

    /// Replaces the timestamps and transaction slots of a version when its
    /// current end timestamp equals `expected_end_timestamp`. Returns the new
    /// entry on success, the unchanged stored entry on mismatch, and `None`
    /// when the version does not exist.
    #[allow(clippy::too_many_arguments)]
    pub fn replace_version_entry(
        &self,
        record_key: &RecordKey,
        version_key: i64,
        begin_timestamp: i64,
        end_timestamp: i64,
        tx_id: i64,
        read_tx_id: i64,
        expected_end_timestamp: i64,
    ) -> Option<VersionEntry> {
        self.execute(record_key, RequestKind::ReplaceVersion {
            record_key: record_key.clone(),
            version_key,
            begin_timestamp,
            end_timestamp,
            tx_id,
            read_tx_id,
            expected_end_timestamp,
        })
        .into_version()
    }

    pub fn replace_whole_version_entry(
        &self,
        record_key: &RecordKey,
        version_key: i64,
        entry: VersionEntry,
    ) -> bool {
        self.execute(record_key, RequestKind::ReplaceWholeVersion {
            record_key: record_key.clone(),
            version_key,
            entry,
        })
        .as_count()
            == Some(1)
    }

    /// Stores a new version; `false` if the pair already exists, in which
    /// case the stored entry is left as it was.
    pub fn upload_new_version_entry(
        &self,
        record_key: &RecordKey,
        version_key: i64,
        entry: VersionEntry,
    ) -> bool {
        self.execute(record_key, RequestKind::UploadVersion {
            record_key: record_key.clone(),
            version_key,
            entry,
        })
        .as_count()
            == Some(1)
    }

    pub fn update_version_max_commit_ts(
        &self,
        record_key: &RecordKey,
        version_key: i64,
        commit_time: i64,
    ) -> Option<VersionEntry> {
        self.execute(record_key, RequestKind::UpdateVersionMaxCommitTs {
            record_key: record_key.clone(),
            version_key,
            commit_time,
        })
        .into_version()
    }

    pub fn delete_version_entry(&self, record_key: &RecordKey, version_key: i64) -> bool {
        self.execute(record_key, RequestKind::DeleteVersion {
            record_key: record_key.clone(),
            version_key,
        })
        .as_count()
            == Some(1)
    }

    /// Drops every chain of this table. Returns the number of record keys
    /// removed.
    pub fn clear(&self) -> Result<usize, VersionDbError> {
        let removed = self
            .store
            .execute(vec![StoreCommand::FlushNamespace {
                namespace: self.table_id.clone(),
            }])?
            .pop()
            .and_then(|reply| reply.as_integer())
            .unwrap_or(0);
        info!(table = %self.table_id, removed, "version table cleared");
        Ok(removed.max(0) as usize)
    }

    pub fn metrics(&self) -> PartitionMetrics {
        self.partitions
            .iter()
            .map(Partition::metrics)
            .fold(PartitionMetrics::default(), PartitionMetrics::merge)
    }
}
