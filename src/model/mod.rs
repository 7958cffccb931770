pub mod record_key;
pub mod tx_entry;
pub mod version_entry;

pub use record_key::RecordKey;
pub use tx_entry::{TxStatus, TxTableEntry, UNSET_COMMIT_TIME};
pub use version_entry::{
    EMPTY_TX_ID, INFINITY_TIMESTAMP, VERSION_KEY_START_INDEX, VersionEntry, VersionPrimaryKey,
};
