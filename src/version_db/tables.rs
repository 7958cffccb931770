use super::VersionDb;
use crate::error::VersionDbError;
use crate::model::{RecordKey, VersionEntry, VersionPrimaryKey};
use crate::request::TxRequest;
use std::collections::HashMap;
use std::sync::Arc;

// Single-key reads and writes on a missing table read as "not found"; batch
// reads and raw enqueues report the missing table.
impl VersionDb {
    pub fn get_version_list(&self, table_id: &str, record_key: &RecordKey) -> Vec<VersionEntry> {
        self.table(table_id)
            .map(|t| t.get_version_list(record_key))
            .unwrap_or_default()
    }

    pub fn initialize_and_get_version_list(
        &self,
        table_id: &str,
        record_key: &RecordKey,
    ) -> Vec<VersionEntry> {
        self.table(table_id)
            .map(|t| t.initialize_and_get_version_list(record_key))
            .unwrap_or_default()
    }

    pub fn get_version_entry_by_key(
        &self,
        table_id: &str,
        record_key: &RecordKey,
        version_key: i64,
    ) -> Option<VersionEntry> {
        self.table(table_id)?
            .get_version_entry_by_key(record_key, version_key)
    }

    pub fn get_version_entries_by_key(
        &self,
        table_id: &str,
        keys: &[VersionPrimaryKey],
    ) -> Result<HashMap<VersionPrimaryKey, VersionEntry>, VersionDbError> {
        let table = self
            .table(table_id)
            .ok_or_else(|| VersionDbError::table_not_found(table_id))?;
        Ok(table.get_version_entries_by_key(keys))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn replace_version_entry(
        &self,
        table_id: &str,
        record_key: &RecordKey,
        version_key: i64,
        begin_timestamp: i64,
        end_timestamp: i64,
        tx_id: i64,
        read_tx_id: i64,
        expected_end_timestamp: i64,
    ) -> Option<VersionEntry> {
        self.table(table_id)?.replace_version_entry(
            record_key,
            version_key,
            begin_timestamp,
            end_timestamp,
            tx_id,
            read_tx_id,
            expected_end_timestamp,
        )
    }

    pub fn replace_whole_version_entry(
        &self,
        table_id: &str,
        record_key: &RecordKey,
        version_key: i64,
        entry: VersionEntry,
    ) -> bool {
        self.table(table_id)
            .is_some_and(|t| t.replace_whole_version_entry(record_key, version_key, entry))
    }

    pub fn upload_new_version_entry(
        &self,
        table_id: &str,
        record_key: &RecordKey,
        version_key: i64,
        entry: VersionEntry,
    ) -> bool {
        self.table(table_id)
            .is_some_and(|t| t.upload_new_version_entry(record_key, version_key, entry))
    }

    pub fn update_version_max_commit_ts(
        &self,
        table_id: &str,
        record_key: &RecordKey,
        version_key: i64,
        commit_time: i64,
    ) -> Option<VersionEntry> {
        self.table(table_id)?
            .update_version_max_commit_ts(record_key, version_key, commit_time)
    }

    pub fn delete_version_entry(
        &self,
        table_id: &str,
        record_key: &RecordKey,
        version_key: i64,
    ) -> bool {
        self.table(table_id)
            .is_some_and(|t| t.delete_version_entry(record_key, version_key))
    }

    /// Queues a version request on `table_id` and returns its partition.
    pub fn enqueue_version_entry_request(
        &self,
        table_id: &str,
        request: Arc<TxRequest>,
    ) -> Result<usize, VersionDbError> {
        self.table(table_id)
            .ok_or_else(|| VersionDbError::table_not_found(table_id))?
            .enqueue_version_entry_request(request)
    }
}
