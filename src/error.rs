use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidConfig,
    TableNotFound,
    TableAlreadyExists,
    TxAlreadyExists,
    TxIdExhausted,
    PartitionOutOfRange,
    Unsupported,
    Store,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidConfig => "invalid_config",
            ErrorCode::TableNotFound => "table_not_found",
            ErrorCode::TableAlreadyExists => "table_already_exists",
            ErrorCode::TxAlreadyExists => "tx_already_exists",
            ErrorCode::TxIdExhausted => "tx_id_exhausted",
            ErrorCode::PartitionOutOfRange => "partition_out_of_range",
            ErrorCode::Unsupported => "unsupported",
            ErrorCode::Store => "store",
        }
    }
}

/// Failure reported by a key-value backend while executing a batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store rejected command: {0}")]
    Rejected(String),
    #[error("store returned {actual} replies for {expected} commands")]
    ReplyCountMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum VersionDbError {
    #[error("invalid config: {message}")]
    InvalidConfig { message: String },
    #[error("table '{table_id}' not found")]
    TableNotFound { table_id: String },
    #[error("table '{table_id}' already exists")]
    TableAlreadyExists { table_id: String },
    #[error("transaction {tx_id} already exists")]
    TxAlreadyExists { tx_id: i64 },
    #[error("no free transaction id after {attempts} attempts")]
    TxIdExhausted { attempts: u32 },
    #[error("partition {partition} out of range for table '{table_id}' ({partition_count} partitions)")]
    PartitionOutOfRange {
        table_id: String,
        partition: usize,
        partition_count: usize,
    },
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl VersionDbError {
    pub fn code(&self) -> ErrorCode {
        match self {
            VersionDbError::InvalidConfig { .. } => ErrorCode::InvalidConfig,
            VersionDbError::TableNotFound { .. } => ErrorCode::TableNotFound,
            VersionDbError::TableAlreadyExists { .. } => ErrorCode::TableAlreadyExists,
            VersionDbError::TxAlreadyExists { .. } => ErrorCode::TxAlreadyExists,
            VersionDbError::TxIdExhausted { .. } => ErrorCode::TxIdExhausted,
            VersionDbError::PartitionOutOfRange { .. } => ErrorCode::PartitionOutOfRange,
            VersionDbError::Unsupported(_) => ErrorCode::Unsupported,
            VersionDbError::Store(_) => ErrorCode::Store,
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code().as_str()
    }

    pub(crate) fn table_not_found(table_id: &str) -> Self {
        VersionDbError::TableNotFound {
            table_id: table_id.to_string(),
        }
    }
}
