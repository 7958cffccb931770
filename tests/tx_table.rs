use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use versiondb::{
    ErrorCode, KvStore, MemoryStore, RETURN_ERROR_CODE, RawReply, StoreCommand, StoreError,
    TxStatus, UNSET_COMMIT_TIME, VersionDb, VersionDbConfig,
};

fn open() -> (Arc<VersionDb>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::default());
    let dyn_store: Arc<dyn KvStore> = store.clone();
    let db = VersionDb::new(VersionDbConfig::default(), dyn_store).expect("open");
    (Arc::new(db), store)
}

#[test]
fn inserted_tx_is_ongoing_without_commit_time() {
    let (db, _store) = open();
    let tx_id = db.insert_new_tx(None).expect("insert");
    let entry = db.get_tx_table_entry(tx_id).expect("entry");
    assert_eq!(entry.tx_id, tx_id);
    assert_eq!(entry.status, TxStatus::Ongoing);
    assert_eq!(entry.commit_time, UNSET_COMMIT_TIME);
    assert_eq!(entry.commit_lower_bound, 0);
}

#[test]
fn commit_time_is_assigned_once() {
    let (db, _store) = open();
    let tx_id = db.insert_new_tx(None).expect("insert");
    let first = db.set_and_get_commit_time(tx_id, 100);
    assert_eq!(first, 100);
    assert_eq!(db.set_and_get_commit_time(tx_id, 5), first);
    assert_eq!(db.set_and_get_commit_time(tx_id, 500), first);
    assert_eq!(db.get_tx_table_entry(tx_id).expect("entry").commit_time, 100);
}

#[test]
fn lower_bound_before_commit_pushes_commit_time_up() {
    let (db, _store) = open();
    let tx_id = db.insert_new_tx(None).expect("insert");
    assert_eq!(db.update_commit_lower_bound(tx_id, 80), UNSET_COMMIT_TIME);
    assert_eq!(db.update_commit_lower_bound(tx_id, 30), UNSET_COMMIT_TIME);

    let commit = db.set_and_get_commit_time(tx_id, 10);
    assert!(commit >= 80);
    assert_eq!(db.update_commit_lower_bound(tx_id, 200), commit);
}

#[test]
fn commit_operations_on_missing_tx_return_sentinels() {
    let (db, _store) = open();
    assert_eq!(db.set_and_get_commit_time(404, 10), -1);
    assert_eq!(db.update_commit_lower_bound(404, 10), RETURN_ERROR_CODE);
    assert!(!db.update_tx_status(404, TxStatus::Committed));
    assert!(db.get_tx_table_entry(404).is_none());
}

#[test]
fn status_moves_only_out_of_ongoing() {
    let (db, _store) = open();
    let tx_id = db.insert_new_tx(None).expect("insert");
    assert!(db.update_tx_status(tx_id, TxStatus::Committed));
    assert!(db.update_tx_status(tx_id, TxStatus::Committed));
    assert!(!db.update_tx_status(tx_id, TxStatus::Aborted));
    assert_eq!(
        db.get_tx_table_entry(tx_id).expect("entry").status,
        TxStatus::Committed
    );
}

#[test]
fn store_outage_surfaces_as_sentinels() {
    let (db, store) = open();
    let tx_id = db.insert_new_tx(Some(9)).expect("insert");
    store.set_available(false);
    assert!(db.get_tx_table_entry(tx_id).is_none());
    assert_eq!(db.set_and_get_commit_time(tx_id, 1), -1);
    assert_eq!(db.update_commit_lower_bound(tx_id, 1), RETURN_ERROR_CODE);
    assert!(db.recycle_tx(tx_id));
    store.set_available(true);
    assert_eq!(
        db.get_tx_table_entry(tx_id).expect("entry").status,
        TxStatus::Ongoing
    );
}

#[test]
fn concurrent_commit_time_races_agree() {
    let (db, _store) = open();
    let tx_id = db.insert_new_tx(None).expect("insert");
    let threads: Vec<_> = (0..8)
        .map(|i| {
            let db = Arc::clone(&db);
            std::thread::spawn(move || db.set_and_get_commit_time(tx_id, 10 + i))
        })
        .collect();
    let seen: Vec<i64> = threads
        .into_iter()
        .map(|t| t.join().expect("thread"))
        .collect();
    assert!(seen.windows(2).all(|w| w[0] == w[1]));
}

/// Memory store that fails chosen batches, counted from the moment they are
/// scheduled.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    batches: AtomicU64,
    failing: Mutex<Vec<u64>>,
}

impl FlakyStore {
    /// Fails the `nth` upcoming batches (1 is the next one).
    fn fail_upcoming(&self, nth: &[u64]) {
        let now = self.batches.load(Ordering::SeqCst);
        *self.failing.lock() = nth.iter().map(|n| now + n).collect();
    }
}

impl KvStore for FlakyStore {
    fn execute(&self, commands: Vec<StoreCommand>) -> Result<Vec<RawReply>, StoreError> {
        let batch = self.batches.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing.lock().contains(&batch) {
            return Err(StoreError::Unavailable(format!("batch {batch} dropped")));
        }
        self.inner.execute(commands)
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

fn open_flaky() -> (VersionDb, Arc<FlakyStore>) {
    let store = Arc::new(FlakyStore::default());
    let dyn_store: Arc<dyn KvStore> = store.clone();
    let db = VersionDb::new(VersionDbConfig::single_partition(), dyn_store).expect("open");
    (db, store)
}

#[test]
fn failed_entry_write_rolls_back_the_claim() {
    let (db, store) = open_flaky();
    // 1: claim the id, 2: write the entry (dropped), 3: roll back.
    store.fail_upcoming(&[2]);
    let err = db.insert_new_tx(Some(77)).expect_err("entry write dropped");
    assert_eq!(err.code(), ErrorCode::Store);
    assert!(db.get_tx_table_entry(77).is_none());

    assert_eq!(db.insert_new_tx(Some(77)).expect("retry"), 77);
    let entry = db.get_tx_table_entry(77).expect("entry");
    assert_eq!(entry.status, TxStatus::Ongoing);
    assert_eq!(entry.commit_time, UNSET_COMMIT_TIME);
}

#[test]
fn failed_claim_is_not_reported_as_duplicate() {
    let (db, store) = open_flaky();
    store.fail_upcoming(&[1]);
    let err = db.insert_new_tx(Some(5)).expect_err("claim dropped");
    assert_eq!(err.code(), ErrorCode::Store);
    assert_eq!(db.insert_new_tx(Some(5)).expect("retry"), 5);

    store.fail_upcoming(&[1]);
    let err = db.insert_new_tx(None).expect_err("claim dropped");
    assert_eq!(err.code(), ErrorCode::Store);
}

#[test]
fn inserted_tx_stays_ongoing_across_a_store_blip() {
    let (db, store) = open_flaky();
    let tx_id = db.insert_new_tx(None).expect("insert");

    store.fail_upcoming(&[1, 2]);
    assert!(db.get_tx_table_entry(tx_id).is_none());
    assert_eq!(db.set_and_get_commit_time(tx_id, 40), UNSET_COMMIT_TIME);

    let entry = db.get_tx_table_entry(tx_id).expect("entry");
    assert_eq!(entry.status, TxStatus::Ongoing);
    assert_eq!(entry.commit_time, UNSET_COMMIT_TIME);
    assert_eq!(db.set_and_get_commit_time(tx_id, 40), 40);
}
