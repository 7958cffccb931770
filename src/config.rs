use crate::error::VersionDbError;
use crate::partition::PartitionRouting;
use std::time::Duration;

pub use crate::backend::MemoryStoreConfig;

/// Runtime configuration for a [`crate::VersionDb`] instance.
#[derive(Debug, Clone)]
pub struct VersionDbConfig {
    /// Partitions of the transaction table and of every version table.
    pub partition_count: usize,
    /// Initial capacity of each partition's queues.
    pub queue_capacity: usize,
    /// Attempts at drawing an unused transaction id before giving up.
    pub tx_id_max_attempts: u32,
    /// Routes a request to a partition (tx id bytes or record key bytes).
    pub physical_routing: PartitionRouting,
    /// Reported through `logical_partition_of`; not used for queueing.
    pub logical_routing: PartitionRouting,
}

impl Default for VersionDbConfig {
    fn default() -> Self {
        Self {
            partition_count: 4,
            queue_capacity: 1024,
            tx_id_max_attempts: 16,
            physical_routing: PartitionRouting::hash(),
            logical_routing: PartitionRouting::hash(),
        }
    }
}

impl VersionDbConfig {
    /// Everything flows through one partition per table. Useful when a single
    /// thread drives `visit`.
    pub fn single_partition() -> Self {
        Self {
            partition_count: 1,
            ..Self::default()
        }
    }

    pub fn high_concurrency() -> Self {
        Self {
            partition_count: 32,
            queue_capacity: 4096,
            ..Self::default()
        }
    }

    pub fn with_partition_count(mut self, partition_count: usize) -> Self {
        self.partition_count = partition_count;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_tx_id_max_attempts(mut self, attempts: u32) -> Self {
        self.tx_id_max_attempts = attempts;
        self
    }

    pub fn with_physical_routing(mut self, routing: PartitionRouting) -> Self {
        self.physical_routing = routing;
        self
    }

    pub fn with_logical_routing(mut self, routing: PartitionRouting) -> Self {
        self.logical_routing = routing;
        self
    }

    pub fn validate(&self) -> Result<(), VersionDbError> {
        if self.partition_count == 0 {
            return Err(VersionDbError::InvalidConfig {
                message: "partition_count must be at least 1".into(),
            });
        }
        if self.tx_id_max_attempts == 0 {
            return Err(VersionDbError::InvalidConfig {
                message: "tx_id_max_attempts must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Settings of the background partition poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1),
        }
    }
}

impl PollerConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn default_config_is_valid() {
        let config = VersionDbConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.partition_count, 4);
        assert_eq!(config.physical_routing.name(), "hash");
    }

    #[test]
    fn zero_partitions_is_rejected() {
        let err = VersionDbConfig::default()
            .with_partition_count(0)
            .validate()
            .expect_err("zero partitions");
        assert_eq!(err.code(), ErrorCode::InvalidConfig);
    }

    #[test]
    fn zero_id_attempts_is_rejected() {
        let err = VersionDbConfig::single_partition()
            .with_tx_id_max_attempts(0)
            .validate()
            .expect_err("zero attempts");
        assert!(err.to_string().contains("tx_id_max_attempts"));
    }

    #[test]
    fn profiles_override_partitioning() {
        assert_eq!(VersionDbConfig::single_partition().partition_count, 1);
        let high = VersionDbConfig::high_concurrency();
        assert_eq!(high.partition_count, 32);
        assert_eq!(high.tx_id_max_attempts, 16);
    }
}
