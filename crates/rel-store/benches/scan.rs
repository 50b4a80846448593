//! Prefix scan benchmarks over composite-key indexes.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rel_store::{composite_key, InMemoryStateStore, StateStore, Transaction};

fn seeded_store(owners: usize, per_owner: usize) -> Arc<dyn StateStore> {
    let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
    let mut txn = Transaction::new(store.clone(), "seed");
    for owner in 0..owners {
        let owner_id = format!("CUST_{owner:06}");
        for entity in 0..per_owner {
            let entity_id = format!("LOAN_{owner:06}_{entity:04}");
            let key = composite_key("LOAN_BY_CUSTOMER", &[&owner_id, &entity_id])
                .expect("valid composite key");
            txn.put(&key, entity_id.into_bytes()).expect("put");
        }
    }
    let batch = txn.into_batch().expect("no open cursors");
    store.commit(&batch).expect("seed commit");
    store
}

fn bench_owner_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("store/owner_scan");

    for per_owner in [1usize, 10, 100] {
        let store = seeded_store(1_000, per_owner);
        group.bench_with_input(
            BenchmarkId::from_parameter(per_owner),
            &store,
            |b, store| {
                b.iter(|| {
                    let txn = Transaction::new(store.clone(), "bench");
                    let hits = txn
                        .scan_prefix("LOAN_BY_CUSTOMER", &[black_box("CUST_000500")])
                        .expect("scan")
                        .count();
                    black_box(hits)
                });
            },
        );
    }

    group.finish();
}

fn bench_composite_key(c: &mut Criterion) {
    c.bench_function("store/composite_key", |b| {
        b.iter(|| {
            composite_key(
                black_box("HISTORY"),
                &[black_box("LOAN_00000000000000000001_0123456789abcdef"), black_box("HIST_1")],
            )
        });
    });
}

criterion_group!(benches, bench_owner_scan, bench_composite_key);
criterion_main!(benches);
