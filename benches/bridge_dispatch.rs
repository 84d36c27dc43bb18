// benches/bridge_dispatch.rs
//! Micro-benchmarks for the boundary hot paths: marshaling and proxied
//! call dispatch.

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use runtime_bridge::{
    marshal, BindingTable, BoundaryValue, GlobalScope, GuestError, GuestRuntime, RuntimeHandle,
};
use runtime_bridge::{LoaderConfig, RuntimeDistribution, RuntimeLoader};
use serde_json::json;
use std::sync::Arc;

struct NoopGuest;

#[async_trait]
impl GuestRuntime for NoopGuest {
    fn version(&self) -> &str {
        "noop 0.1"
    }

    fn execute(&self, _source: &str, _scope: &GlobalScope) -> Result<BoundaryValue, GuestError> {
        Ok(BoundaryValue::Null)
    }

    async fn load_package(&self, _name: &str) -> Result<(), GuestError> {
        Ok(())
    }
}

struct NoopDistribution;

#[async_trait]
impl RuntimeDistribution for NoopDistribution {
    async fn fetch(&self, _url: &str) -> Result<Box<dyn GuestRuntime>, GuestError> {
        Ok(Box::new(NoopGuest))
    }
}

fn ready_handle() -> RuntimeHandle {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("tokio runtime");
    rt.block_on(async {
        RuntimeLoader::new(Arc::new(NoopDistribution))
            .load(LoaderConfig::new("bench://noop"))
            .await
            .expect("load")
    })
}

fn bench_marshal_round_trip(c: &mut Criterion) {
    let payload = json!({
        "points": [[0, 0], [320, 240], [640, 0]],
        "style": {"color": "RdYlGn", "interpolation": "bilinear"},
        "extent": [-3.0, 3.0, -3.0, 3.0],
    });

    c.bench_function("marshal_round_trip", |b| {
        b.iter(|| {
            let crossed = marshal::to_guest(black_box(&payload)).unwrap();
            black_box(marshal::to_host(&crossed).unwrap())
        })
    });
}

fn bench_proxy_dispatch(c: &mut Criterion) {
    let handle = ready_handle();
    let table = BindingTable::new(&handle);
    table
        .bind_fn("double", |args: &[BoundaryValue]| {
            Ok(BoundaryValue::Int(args[0].as_int().unwrap_or(0) * 2))
        })
        .unwrap();

    let bound = table.lookup("double").unwrap().unwrap();
    let proxy = bound.as_callable().unwrap().clone();
    let args = [BoundaryValue::Int(21)];

    c.bench_function("proxy_dispatch", |b| {
        b.iter(|| proxy.invoke(black_box(&args)).unwrap())
    });
}

criterion_group!(benches, bench_marshal_round_trip, bench_proxy_dispatch);
criterion_main!(benches);
