//! Criterion benchmarks for the per-call hot paths.
//!
//! Every command a target sends goes through `prepare_parameters`, and every
//! event it receives goes through `build_event_args` and envelope
//! classification.  These benches keep an eye on all three.
//!
//! Run with:
//! ```bash
//! cargo bench --package inspector-core --bench params_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use inspector_core::{
    build_event_args, prepare_parameters, CallArgs, EventSignature, InboundEnvelope,
    InboundMessage, ParamDescriptor, ParamType,
};
use serde_json::json;

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn empty_signature() -> Vec<ParamDescriptor> {
    Vec::new()
}

fn set_breakpoint_signature() -> Vec<ParamDescriptor> {
    vec![
        ParamDescriptor::required("lineNumber", ParamType::Number),
        ParamDescriptor::optional("url", ParamType::String),
        ParamDescriptor::optional("urlRegex", ParamType::String),
        ParamDescriptor::optional("columnNumber", ParamType::Number),
        ParamDescriptor::optional("condition", ParamType::String),
    ]
}

fn set_breakpoint_args() -> CallArgs {
    CallArgs::new()
        .with(42)
        .with("http://example.test/app.js")
        .undefined()
        .with(7)
        .with("x > 1")
}

fn request_will_be_sent() -> EventSignature {
    EventSignature {
        method: "Network.requestWillBeSent".to_string(),
        params: ["requestId", "frameId", "loaderId", "documentURL", "request", "timestamp"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    }
}

// ── Benchmark groups ──────────────────────────────────────────────────────────

/// Benchmarks `prepare_parameters` for a trivial and a mixed signature.
fn bench_prepare_parameters(c: &mut Criterion) {
    let mut group = c.benchmark_group("prepare_parameters");

    group.bench_function(BenchmarkId::new("signature", "Network.enable"), |b| {
        let signature = empty_signature();
        b.iter(|| prepare_parameters(black_box("Network.enable"), &signature, CallArgs::new()))
    });

    group.bench_function(BenchmarkId::new("signature", "Debugger.setBreakpointByUrl"), |b| {
        let signature = set_breakpoint_signature();
        b.iter_batched(
            set_breakpoint_args,
            |args| prepare_parameters(black_box("Debugger.setBreakpointByUrl"), &signature, args),
            criterion::BatchSize::SmallInput,
        )
    });

    group.finish();
}

/// Benchmarks mapping a notification's named params onto positional arguments.
fn bench_build_event_args(c: &mut Criterion) {
    let signature = request_will_be_sent();
    let params = json!({
        "requestId": "1000.1",
        "frameId": "F1",
        "loaderId": "L1",
        "documentURL": "http://example.test/",
        "request": {"url": "http://example.test/", "method": "GET", "headers": {}},
        "timestamp": 1234.5
    });
    let object = params.as_object().cloned();

    c.bench_function("build_event_args", |b| {
        b.iter(|| build_event_args(black_box(&signature), object.as_ref()))
    });
}

/// Benchmarks parsing and classifying an inbound response text.
fn bench_classify_inbound(c: &mut Criterion) {
    let text = r#"{"id":17,"result":{"body":"<html></html>","base64Encoded":false}}"#;

    c.bench_function("classify_inbound_response", |b| {
        b.iter(|| {
            let value = InboundMessage::from(black_box(text)).into_value();
            value.and_then(InboundEnvelope::from_value)
        })
    });
}

criterion_group!(
    benches,
    bench_prepare_parameters,
    bench_build_event_args,
    bench_classify_inbound
);
criterion_main!(benches);
