//! Benchmarks for RookDB record storage and index operations

use std::io::Cursor;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rookdb::serializer::U32Serializer;
use rookdb::tree::NaturalOrder;
use rookdb::{Config, DiskTreeNodeManager, IndexTree, MemoryTreeNodeManager, RecordStorage};

fn memory_records() -> RecordStorage<Cursor<Vec<u8>>> {
    RecordStorage::open(Cursor::new(Vec::new()), &Config::default()).unwrap()
}

fn record_benchmarks(c: &mut Criterion) {
    let payload = vec![0xAB; 1000];

    c.bench_function("record_create_1k", |b| {
        b.iter_batched(
            memory_records,
            |records| {
                for _ in 0..100 {
                    black_box(records.create(&payload).unwrap());
                }
            },
            BatchSize::SmallInput,
        )
    });

    let records = memory_records();
    let ids: Vec<u32> = (0..500).map(|_| records.create(&payload).unwrap()).collect();
    c.bench_function("record_find_1k", |b| {
        let mut next = 0;
        b.iter(|| {
            let id = ids[next % ids.len()];
            next += 1;
            black_box(records.find(id).unwrap())
        })
    });
}

fn index_benchmarks(c: &mut Criterion) {
    c.bench_function("memory_index_insert_1000", |b| {
        b.iter(|| {
            let manager = MemoryTreeNodeManager::<u32, u32>::with_natural_order(16).unwrap();
            let mut tree = IndexTree::new(manager, false);
            for key in 0..1000u32 {
                tree.insert(key.wrapping_mul(2_654_435_761), key).unwrap();
            }
            black_box(tree)
        })
    });

    c.bench_function("disk_index_insert_1000", |b| {
        b.iter(|| {
            let config = Config::default();
            let records = RecordStorage::open(Cursor::new(Vec::new()), &config).unwrap();
            let manager =
                DiskTreeNodeManager::new(records, &config, U32Serializer, U32Serializer, NaturalOrder)
                    .unwrap();
            let mut tree = IndexTree::new(manager, false);
            for key in 0..1000u32 {
                tree.insert(key.wrapping_mul(2_654_435_761), key).unwrap();
            }
            black_box(tree.into_manager().close().unwrap())
        })
    });

    let mut tree = IndexTree::new(
        MemoryTreeNodeManager::<u32, u32>::with_natural_order(16).unwrap(),
        false,
    );
    for key in 0..10_000u32 {
        tree.insert(key, key).unwrap();
    }
    c.bench_function("memory_index_scan_10000", |b| {
        b.iter(|| black_box(tree.get_all(true).unwrap().count()))
    });
}

criterion_group!(benches, record_benchmarks, index_benchmarks);
criterion_main!(benches);
