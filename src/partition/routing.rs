use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Maps a key to a partition index. Results are reduced modulo the partition
/// count by the caller, so implementations may return any `usize`.
pub trait PartitionRouter: Send + Sync {
    fn route(&self, key: &[u8], partition_count: usize) -> usize;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HashRouter;

impl PartitionRouter for HashRouter {
    fn route(&self, key: &[u8], partition_count: usize) -> usize {
        let mut h = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut h);
        (h.finish() as usize) % partition_count.max(1)
    }
}

impl<F> PartitionRouter for F
where
    F: Fn(&[u8], usize) -> usize + Send + Sync,
{
    fn route(&self, key: &[u8], partition_count: usize) -> usize {
        self(key, partition_count)
    }
}

/// Routing strategy held by an engine instance.
#[derive(Clone)]
pub struct PartitionRouting {
    name: &'static str,
    router: Arc<dyn PartitionRouter>,
}

impl PartitionRouting {
    pub fn hash() -> Self {
        Self {
            name: "hash",
            router: Arc::new(HashRouter),
        }
    }

    pub fn custom(router: impl PartitionRouter + 'static) -> Self {
        Self {
            name: "custom",
            router: Arc::new(router),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn partition_for(&self, key: &[u8], partition_count: usize) -> usize {
        if partition_count <= 1 {
            return 0;
        }
        self.router.route(key, partition_count) % partition_count
    }

    pub fn partition_for_tx(&self, tx_id: i64, partition_count: usize) -> usize {
        self.partition_for(&tx_id.to_le_bytes(), partition_count)
    }
}

impl Default for PartitionRouting {
    fn default() -> Self {
        Self::hash()
    }
}

impl fmt::Debug for PartitionRouting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionRouting")
            .field("name", &self.name)
            .finish()
    }
}
