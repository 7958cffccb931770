pub mod backend;
pub mod config;
pub mod driver;
pub mod error;
pub mod model;
pub mod partition;
pub mod reply;
pub mod request;
pub mod response;
pub mod version_db;
pub mod version_table;

pub use backend::{KvStore, MemoryStore, StoreCommand, TX_TABLE};
pub use config::{MemoryStoreConfig, PollerConfig, VersionDbConfig};
pub use driver::PartitionPoller;
pub use error::{ErrorCode, StoreError, VersionDbError};
pub use model::{
    EMPTY_TX_ID, INFINITY_TIMESTAMP, RecordKey, TxStatus, TxTableEntry, UNSET_COMMIT_TIME,
    VERSION_KEY_START_INDEX, VersionEntry, VersionPrimaryKey,
};
pub use partition::{PartitionMetrics, PartitionRouter, PartitionRouting};
pub use reply::RawReply;
pub use request::{RequestKind, TxRequest, TxResult};
pub use response::{RETURN_ERROR_CODE, ResponseDecoder};
pub use version_db::{VersionDb, VersionDbMetrics};
pub use version_table::VersionTable;
