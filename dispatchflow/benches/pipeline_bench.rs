//! Benchmarks for pipeline dispatch.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dispatchflow::prelude::*;
use dispatchflow::testing::echo_handler;
use serde_json::json;
use std::sync::Arc;

fn echo_pipeline(sampling_rate: f64) -> Pipeline {
    let registry = InMemoryHandlerRegistry::new();
    registry.register(echo_handler());
    registry.register(HandlerDescriptor::suspendable(
        "echo_async",
        ParameterSchema::new().required("text", ParamType::String),
        |parameters, _| async move { Ok::<_, anyhow::Error>(json!(parameters.get("text").cloned())) },
    ));
    PipelineBuilder::standard(
        PipelineConfig::default().with_sampling_rate(sampling_rate),
        Arc::new(registry),
    )
    .build()
    .expect("standard pipeline builds")
}

fn request(handler: &str) -> RequestContext {
    let mut parameters = Parameters::new();
    parameters.insert("text".to_string(), json!("hello"));
    RequestContext::new(handler, parameters).expect("valid request")
}

fn dispatch_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let unsampled = echo_pipeline(0.0);
    let sampled = echo_pipeline(1.0);

    c.bench_function("dispatch_blocking_unsampled", |b| {
        b.iter(|| runtime.block_on(unsampled.dispatch(black_box(request("echo")))));
    });

    c.bench_function("dispatch_async_unsampled", |b| {
        b.iter(|| runtime.block_on(unsampled.dispatch(black_box(request("echo_async")))));
    });

    c.bench_function("dispatch_async_sampled", |b| {
        b.iter(|| runtime.block_on(sampled.dispatch(black_box(request("echo_async")))));
    });

    c.bench_function("dispatch_routing_miss", |b| {
        b.iter(|| runtime.block_on(unsampled.dispatch(black_box(request("missing")))));
    });
}

fn validation_benchmark(c: &mut Criterion) {
    let schema = ParameterSchema::new()
        .required("text", ParamType::String)
        .optional("count", ParamType::Integer);
    let parameters = request("echo").parameters().clone();

    c.bench_function("validate_parameters", |b| {
        b.iter(|| validate_parameters(black_box(&schema), black_box(&parameters), false));
    });
}

criterion_group!(benches, dispatch_benchmark, validation_benchmark);
criterion_main!(benches);
