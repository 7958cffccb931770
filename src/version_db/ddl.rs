use super::VersionDb;
use crate::backend::{META_NAMESPACE, META_TABLES_KEY, StoreCommand, TX_TABLE};
use crate::error::VersionDbError;
use crate::version_table::VersionTable;
use std::sync::Arc;
use tracing::info;

impl VersionDb {
    pub(crate) fn table(&self, table_id: &str) -> Option<Arc<VersionTable>> {
        self.tables.read().get(table_id).cloned()
    }

    /// Registered version table ids, sorted.
    pub fn get_all_tables(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tables.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn get_version_table(&self, table_id: &str) -> Option<Arc<VersionTable>> {
        self.table(table_id)
    }

    /// Creates and persists a version table. Creating an existing table
    /// returns the registered one.
    pub fn create_version_table(&self, table_id: &str) -> Result<Arc<VersionTable>, VersionDbError> {
        if table_id == TX_TABLE || table_id == META_NAMESPACE {
            return Err(VersionDbError::TableAlreadyExists {
                table_id: table_id.to_string(),
            });
        }
        let mut tables = self.tables.write();
        if let Some(existing) = tables.get(table_id) {
            return Ok(Arc::clone(existing));
        }
        self.store.execute(vec![StoreCommand::HashSet {
            namespace: META_NAMESPACE.to_string(),
            key: META_TABLES_KEY.to_vec(),
            fields: vec![(
                table_id.as_bytes().to_vec(),
                (self.config.partition_count as i64).to_le_bytes().to_vec(),
            )],
        }])?;
        let table = Arc::new(VersionTable::new(
            table_id,
            &self.config,
            Arc::clone(&self.store),
        ));
        tables.insert(table_id.to_string(), Arc::clone(&table));
        info!(table = table_id, partitions = table.partition_count(), "version table created");
        Ok(table)
    }

    /// Drops a table's metadata and data. `false` if it was not registered.
    pub fn delete_table(&self, table_id: &str) -> Result<bool, VersionDbError> {
        let mut tables = self.tables.write();
        if !tables.contains_key(table_id) {
            return Ok(false);
        }
        self.store.execute(vec![
            StoreCommand::HashDelete {
                namespace: META_NAMESPACE.to_string(),
                key: META_TABLES_KEY.to_vec(),
                field: table_id.as_bytes().to_vec(),
            },
            StoreCommand::FlushNamespace {
                namespace: table_id.to_string(),
            },
        ])?;
        tables.remove(table_id);
        info!(table = table_id, "version table deleted");
        Ok(true)
    }

    /// Removes every transaction, table and piece of metadata.
    pub fn clear(&self) -> Result<(), VersionDbError> {
        let mut tables = self.tables.write();
        self.store.execute(vec![StoreCommand::FlushAll])?;
        let dropped = tables.len();
        tables.clear();
        info!(tables = dropped, "version db cleared");
        Ok(())
    }

    /// Removes every transaction entry; version tables are untouched.
    pub fn clear_tx_table(&self) -> Result<usize, VersionDbError> {
        let removed = self
            .store
            .execute(vec![StoreCommand::FlushNamespace {
                namespace: TX_TABLE.to_string(),
            }])?
            .pop()
            .and_then(|reply| reply.as_integer())
            .unwrap_or(0);
        info!(removed, "transaction table cleared");
        Ok(removed.max(0) as usize)
    }
}
