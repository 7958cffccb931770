//! The version database: a partitioned transaction table plus a registry of
//! version tables, all backed by one [`KvStore`].
//!
//! Every operation is a request queued on a partition. The synchronous
//! methods enqueue and then drive their own partition until the request is
//! complete; callers that want batching use the `enqueue_*` methods and let
//! someone else (usually [`crate::driver::PartitionPoller`]) call
//! [`VersionDb::visit`].

mod ddl;
mod tables;

use crate::backend::{KvStore, META_NAMESPACE, META_TABLES_KEY, StoreCommand, TX_TABLE};
use crate::config::VersionDbConfig;
use crate::error::VersionDbError;
use crate::model::{RecordKey, TxStatus, TxTableEntry};
use crate::partition::{Partition, PartitionMetrics, build_partitions};
use crate::reply::RawReply;
use crate::request::{RequestKind, TxRequest, TxResult};
use crate::version_table::VersionTable;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionDbMetrics {
    pub tx_table: PartitionMetrics,
    pub version_tables: PartitionMetrics,
    pub table_count: usize,
}

pub struct VersionDb {
    config: VersionDbConfig,
    store: Arc<dyn KvStore>,
    tx_partitions: Vec<Partition>,
    tables: RwLock<HashMap<String, Arc<VersionTable>>>,
}

impl VersionDb {
    /// Builds the transaction partitions and registers every table recorded
    /// in the store's metadata.
    pub fn new(config: VersionDbConfig, store: Arc<dyn KvStore>) -> Result<Self, VersionDbError> {
        config.validate()?;
        let tx_partitions = build_partitions(
            TX_TABLE,
            config.partition_count,
            config.queue_capacity,
            &store,
        );
        let db = Self {
            config,
            store,
            tx_partitions,
            tables: RwLock::new(HashMap::new()),
        };
        let loaded = db.load_tables()?;
        info!(
            store = db.store.name(),
            partitions = db.config.partition_count,
            tables = loaded,
            "version db opened"
        );
        Ok(db)
    }

    fn load_tables(&self) -> Result<usize, VersionDbError> {
        let reply = self
            .store
            .execute(vec![StoreCommand::HashGetAll {
                namespace: META_NAMESPACE.to_string(),
                key: META_TABLES_KEY.to_vec(),
            }])?
            .pop()
            .unwrap_or(RawReply::Nil);
        let Some(items) = reply.as_non_empty_array() else {
            return Ok(0);
        };
        let mut tables = self.tables.write();
        for pair in items.chunks(2) {
            let [RawReply::Bulk(name), RawReply::Bulk(recorded)] = pair else {
                warn!("skipping malformed table metadata entry");
                continue;
            };
            let Ok(table_id) = std::str::from_utf8(name) else {
                warn!("skipping table metadata with non utf-8 name");
                continue;
            };
            let recorded = crate::model::version_entry::read_i64(recorded);
            if recorded != Some(self.config.partition_count as i64) {
                warn!(
                    table = table_id,
                    recorded_partitions = ?recorded,
                    partitions = self.config.partition_count,
                    "table was created with a different partition count"
                );
            }
            tables.insert(
                table_id.to_string(),
                Arc::new(VersionTable::new(
                    table_id,
                    &self.config,
                    Arc::clone(&self.store),
                )),
            );
        }
        Ok(tables.len())
    }

    pub fn config(&self) -> &VersionDbConfig {
        &self.config
    }

    pub fn partition_count(&self) -> usize {
        self.tx_partitions.len()
    }

    pub fn tx_partition_of(&self, tx_id: i64) -> usize {
        self.config
            .physical_routing
            .partition_for_tx(tx_id, self.tx_partitions.len())
    }

    /// Partition a record key belongs to under the logical routing strategy.
    pub fn logical_partition_of(&self, record_key: &RecordKey) -> usize {
        self.config
            .logical_routing
            .partition_for(record_key.as_slice(), self.config.partition_count)
    }

    /// Queues a transaction-table request on the partition owning `tx_id`
    /// and returns that partition. No store I/O happens here.
    pub fn enqueue_tx_entry_request(&self, tx_id: i64, request: Arc<TxRequest>) -> usize {
        let partition = self.tx_partition_of(tx_id);
        self.tx_partitions[partition].enqueue(request);
        partition
    }

    /// Flushes one partition of `table_id` (the transaction table or a
    /// version table). Unknown tables flush nothing.
    pub fn visit(&self, table_id: &str, partition: usize) -> Result<usize, VersionDbError> {
        if table_id == TX_TABLE {
            let Some(p) = self.tx_partitions.get(partition) else {
                return Err(VersionDbError::PartitionOutOfRange {
                    table_id: table_id.to_string(),
                    partition,
                    partition_count: self.tx_partitions.len(),
                });
            };
            return Ok(p.visit());
        }
        match self.table(table_id) {
            Some(table) => table.visit(partition),
            None => {
                debug!(table = table_id, "visit on unknown table");
                Ok(0)
            }
        }
    }

    /// Flushes every partition of the transaction table and of every
    /// registered version table.
    pub fn visit_all(&self) -> usize {
        let tx: usize = self.tx_partitions.iter().map(Partition::visit).sum();
        let tables: Vec<_> = self.tables.read().values().cloned().collect();
        tx + tables.iter().map(|t| t.visit_all()).sum::<usize>()
    }

    fn submit_tx(&self, tx_id: i64, kind: RequestKind) -> Arc<TxRequest> {
        let request = TxRequest::new(kind);
        let partition = &self.tx_partitions[self.tx_partition_of(tx_id)];
        partition.enqueue(Arc::clone(&request));
        partition.visit_until_ready(&request);
        request
    }

    fn execute_tx(&self, tx_id: i64, kind: RequestKind) -> TxResult {
        self.submit_tx(tx_id, kind).wait()
    }

    /// Like [`Self::execute_tx`], but a failed store batch is an error instead
    /// of the kind's sentinel.
    fn try_execute_tx(&self, tx_id: i64, kind: RequestKind) -> Result<TxResult, VersionDbError> {
        let request = self.submit_tx(tx_id, kind);
        match request.store_error() {
            Some(err) => Err(err.into()),
            None => Ok(request.wait()),
        }
    }

    /// Registers a transaction and returns its id. Without `tx_id` a random
    /// positive id is drawn, retrying on collisions. A store failure is
    /// returned as [`VersionDbError::Store`] and leaves no entry behind when
    /// the cleanup write succeeds.
    pub fn insert_new_tx(&self, tx_id: Option<i64>) -> Result<i64, VersionDbError> {
        if let Some(tx_id) = tx_id {
            return if self.claim_tx_id(tx_id)? {
                Ok(tx_id)
            } else {
                Err(VersionDbError::TxAlreadyExists { tx_id })
            };
        }
        for attempt in 1..=self.config.tx_id_max_attempts {
            let candidate = random_tx_id();
            if self.claim_tx_id(candidate)? {
                return Ok(candidate);
            }
            debug!(tx_id = candidate, attempt, "transaction id collision");
        }
        Err(VersionDbError::TxIdExhausted {
            attempts: self.config.tx_id_max_attempts,
        })
    }

    // Ok(false) only when another transaction already owns the id.
    fn claim_tx_id(&self, tx_id: i64) -> Result<bool, VersionDbError> {
        let claimed = self.try_execute_tx(tx_id, RequestKind::NewTxId { tx_id })?;
        if claimed.as_count() != Some(1) {
            return Ok(false);
        }
        if let Err(err) = self.try_execute_tx(tx_id, RequestKind::InsertTxId { tx_id }) {
            if let Err(cleanup) = self.try_execute_tx(tx_id, RequestKind::RemoveTx { tx_id }) {
                warn!(tx_id, error = %cleanup, "half-written transaction entry left behind");
            }
            return Err(err);
        }
        Ok(true)
    }

    pub fn remove_tx(&self, tx_id: i64) -> bool {
        self.execute_tx(tx_id, RequestKind::RemoveTx { tx_id }).as_count() == Some(1)
    }

    /// Resets the entry to a fresh ongoing transaction. Always reports
    /// success.
    pub fn recycle_tx(&self, tx_id: i64) -> bool {
        self.execute_tx(tx_id, RequestKind::RecycleTx { tx_id }).as_count() == Some(1)
    }

    pub fn get_tx_table_entry(&self, tx_id: i64) -> Option<TxTableEntry> {
        self.execute_tx(tx_id, RequestKind::GetTxEntry { tx_id })
            .into_tx_entry()
    }

    /// `true` when the status was written. Terminal states only accept
    /// themselves again.
    pub fn update_tx_status(&self, tx_id: i64, status: TxStatus) -> bool {
        self.execute_tx(tx_id, RequestKind::UpdateTxStatus { tx_id, status })
            .as_count()
            == Some(1)
    }

    /// Assigns `max(proposed_commit_ts, commit_lower_bound)` as the commit
    /// time unless one is already set, and returns the commit time in effect.
    /// Returns -1 when the transaction is missing or the store failed.
    pub fn set_and_get_commit_time(&self, tx_id: i64, proposed_commit_ts: i64) -> i64 {
        self.execute_tx(
            tx_id,
            RequestKind::SetCommitTs {
                tx_id,
                proposed_commit_ts,
            },
        )
        .as_timestamp()
        .unwrap_or(crate::response::UNASSIGNED_COMMIT_TIME)
    }

    /// Raises the commit lower bound of a transaction without a commit time
    /// and returns -1. A transaction that already committed returns its
    /// commit time instead; -2 means the call failed.
    pub fn update_commit_lower_bound(&self, tx_id: i64, lower_bound: i64) -> i64 {
        self.execute_tx(tx_id, RequestKind::UpdateCommitLowerBound { tx_id, lower_bound })
            .as_timestamp()
            .unwrap_or(crate::response::RETURN_ERROR_CODE)
    }

    pub fn metrics(&self) -> VersionDbMetrics {
        let tx_table = self
            .tx_partitions
            .iter()
            .map(Partition::metrics)
            .fold(PartitionMetrics::default(), PartitionMetrics::merge);
        let tables = self.tables.read();
        let version_tables = tables
            .values()
            .map(|t| t.metrics())
            .fold(PartitionMetrics::default(), PartitionMetrics::merge);
        VersionDbMetrics {
            tx_table,
            version_tables,
            table_count: tables.len(),
        }
    }
}

fn random_tx_id() -> i64 {
    ((Uuid::new_v4().as_u128() as u64) & i64::MAX as u64) as i64
}
