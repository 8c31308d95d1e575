use criterion::{black_box, criterion_group, criterion_main, Criterion};

use warren_kernel::prelude::*;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Marker {
    meta: ComponentMeta,
    tag: u32,
}

warren_kernel::impl_component!(Marker, "marker", ["marked"]);

fn populated_store(components: u64) -> ComponentStore {
    let mut store = ComponentStore::new();
    store.register_component::<Marker>();
    for i in 0..components {
        store
            .insert(Marker {
                meta: ComponentMeta::new(EntityId::new(i / 4 + 1)),
                tag: i as u32,
            })
            .unwrap();
    }
    store
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("insert_1000_components", |b| {
        b.iter(|| {
            let mut store = ComponentStore::new();
            for i in 0..1000u64 {
                store
                    .insert(Marker {
                        meta: ComponentMeta::new(EntityId::new(i / 4 + 1)),
                        tag: i as u32,
                    })
                    .unwrap();
            }
            black_box(store.component_count())
        })
    });
}

fn bench_role_query(c: &mut Criterion) {
    let store = populated_store(10_000);
    c.bench_function("role_query_10k", |b| {
        b.iter(|| {
            let sum: u64 = store
                .components_with_role("marked")
                .map(|component| component.id().to_raw())
                .sum();
            black_box(sum)
        })
    });
}

fn bench_typed_query(c: &mut Criterion) {
    let store = populated_store(10_000);
    c.bench_function("typed_query_10k", |b| {
        b.iter(|| {
            let sum: u64 = store.query_by_type::<Marker>().map(|m| m.tag as u64).sum();
            black_box(sum)
        })
    });
}

fn bench_snapshot_capture(c: &mut Criterion) {
    let store = populated_store(5_000);
    let stash = Stash::new();
    c.bench_function("snapshot_capture_5k", |b| {
        b.iter(|| black_box(KernelSnapshot::capture(&store, &stash)))
    });
}

criterion_group!(
    benches,
    bench_insert,
    bench_role_query,
    bench_typed_query,
    bench_snapshot_capture
);
criterion_main!(benches);
