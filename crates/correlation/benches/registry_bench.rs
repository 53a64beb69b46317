//! Benchmarks for the correlation registry.

use std::time::Duration;

use common::RequestId;
use correlation::CorrelationRegistry;
use criterion::{Criterion, criterion_group, criterion_main};

fn bench_register_resolve(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();

    c.bench_function("register_resolve_roundtrip", |b| {
        let registry: CorrelationRegistry<u64> = CorrelationRegistry::new();
        b.to_async(&rt).iter(|| {
            let registry = registry.clone();
            async move {
                let id = RequestId::new();
                let waiter = registry.register(id, Duration::from_secs(5));
                registry.resolve(id, 1);
                waiter.wait().await
            }
        });
    });

    c.bench_function("resolve_unknown_id", |b| {
        let registry: CorrelationRegistry<u64> = CorrelationRegistry::new();
        b.iter(|| registry.resolve(RequestId::new(), 0));
    });
}

criterion_group!(benches, bench_register_resolve);
criterion_main!(benches);
