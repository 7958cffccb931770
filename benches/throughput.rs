use criterion::{Criterion, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use versiondb::{
    EMPTY_TX_ID, INFINITY_TIMESTAMP, KvStore, MemoryStore, RecordKey, RequestKind, TX_TABLE,
    TxRequest, VersionDb, VersionDbConfig, VersionEntry,
};

const TABLE: &str = "bench";
const SEEDED_KEYS: i64 = 10_000;
const BATCH: i64 = 256;

fn setup_db(config: VersionDbConfig) -> VersionDb {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::default());
    let db = VersionDb::new(config, store).expect("open");
    db.create_version_table(TABLE).expect("create table");
    for id in 0..SEEDED_KEYS {
        let key = RecordKey::from(id);
        db.upload_new_version_entry(
            TABLE,
            &key,
            0,
            VersionEntry::new(key.clone(), 0, 1, INFINITY_TIMESTAMP, EMPTY_TX_ID, vec![0u8; 32]),
        );
    }
    db
}

fn bench_version_db_hot_paths(c: &mut Criterion) {
    let db = setup_db(VersionDbConfig::default());

    let mut next_key = 0_i64;
    c.bench_function("read_version_sync", |b| {
        b.iter(|| {
            let key = RecordKey::from(black_box(next_key));
            next_key = (next_key + 1) % SEEDED_KEYS;
            black_box(db.get_version_entry_by_key(TABLE, &key, 0));
        })
    });

    c.bench_function("tx_lifecycle_sync", |b| {
        b.iter(|| {
            let tx_id = db.insert_new_tx(None).expect("insert");
            db.set_and_get_commit_time(tx_id, black_box(10));
            db.remove_tx(tx_id);
        })
    });

    let single = setup_db(VersionDbConfig::single_partition());
    let mut next_tx = 0_i64;
    c.bench_function("enqueue_256_then_visit", |b| {
        b.iter(|| {
            for _ in 0..BATCH {
                next_tx += 1;
                single.enqueue_tx_entry_request(
                    next_tx,
                    TxRequest::new(RequestKind::GetTxEntry { tx_id: next_tx }),
                );
            }
            black_box(single.visit(TX_TABLE, 0).expect("visit"));
        })
    });
}

criterion_group!(benches, bench_version_db_hot_paths);
criterion_main!(benches);
