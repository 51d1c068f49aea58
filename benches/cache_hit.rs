use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::json;
use tokio::runtime::Runtime;
use tower::{Layer, Service, ServiceExt};
use tower_wrap::{callable_fn, with_ttl_cache, CallArgs};

fn bench_cache(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("uncached_call", |b| {
        let mut svc = callable_fn(|_args: CallArgs| async move { Ok(json!(42)) });
        b.iter(|| {
            rt.block_on(async {
                ServiceExt::ready(&mut svc)
                    .await
                    .unwrap()
                    .call(CallArgs::new().arg(1))
                    .await
                    .unwrap()
            })
        })
    });

    c.bench_function("cached_hit", |b| {
        let inner = callable_fn(|_args: CallArgs| async move { Ok(json!(42)) });
        let mut svc = with_ttl_cache(Duration::from_secs(3600)).layer(inner);
        rt.block_on(async {
            ServiceExt::ready(&mut svc)
                .await
                .unwrap()
                .call(CallArgs::new().arg(1))
                .await
                .unwrap()
        });
        b.iter(|| {
            rt.block_on(async {
                ServiceExt::ready(&mut svc)
                    .await
                    .unwrap()
                    .call(CallArgs::new().arg(1))
                    .await
                    .unwrap()
            })
        })
    });
}

criterion_group!(benches, bench_cache);
criterion_main!(benches);
