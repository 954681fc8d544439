use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;
use syncbridge_core::config::BridgeConfig;
use syncbridge_core::core_bridge::{
    client_tag, client_tag_hash, EntityChange, RecordSpecifics, RecordStore, SqliteRecordStore,
    SyncBridge,
};
use syncbridge_core::test_utils::{make_record, make_remote_add, RecordingProcessor};

const SIZES: [usize; 3] = [10, 100, 1000];

/// Store holding `local` records, half of which the remote side also has
fn seeded_bridge(local: usize) -> (Arc<SqliteRecordStore>, SyncBridge) {
    let store = Arc::new(SqliteRecordStore::in_memory().unwrap());
    for i in 0..local {
        store.add_record(&make_record(&format!("realm-{}", i))).unwrap();
    }
    let bridge =
        SyncBridge::new(Arc::new(RecordingProcessor::new()), store.clone(), BridgeConfig::default());
    (store, bridge)
}

fn remote_changes(count: usize) -> Vec<EntityChange> {
    (count / 2..count + count / 2).map(|i| make_remote_add(&format!("realm-{}", i))).collect()
}

fn bench_client_tag(c: &mut Criterion) {
    let specifics = RecordSpecifics::from(&make_record("https://accounts.example.com/"));

    c.bench_function("client_tag_hash", |b| {
        b.iter(|| client_tag_hash(&client_tag(black_box(&specifics))))
    });
}

fn bench_initial_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("initial_merge");
    group.measurement_time(Duration::from_secs(10));

    for size in SIZES {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || (seeded_bridge(size), remote_changes(size)),
                |((_store, bridge), remote)| {
                    let mut mcl = bridge.create_metadata_change_list();
                    black_box(bridge.merge_sync_data(&mut mcl, remote).unwrap())
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_incremental_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("incremental_apply");

    for size in SIZES {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || (seeded_bridge(0), remote_changes(size)),
                |((_store, bridge), changes)| {
                    let mut mcl = bridge.create_metadata_change_list();
                    black_box(bridge.apply_sync_changes(&mut mcl, changes).unwrap())
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_client_tag, bench_initial_merge, bench_incremental_apply);
criterion_main!(benches);
