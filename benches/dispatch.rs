//! Bridge dispatch benchmark suite.
//!
//! Benchmarks the inbound pipeline and correlated round trips:
//! - Listener fan-out: 1, 10, 100 listeners per type
//! - Concurrent requests: 1, 10, 100 in flight
//!
//! Run with: cargo bench --bench dispatch
//! Results saved to: target/criterion/

use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use exode_miniapp::{Bridge, Envelope, MemoryChannel, MessageHandler, Source};
use serde_json::json;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Benchmark Parameters
// ============================================================================

const HOST_ORIGIN: &str = "https://exode.ru";
const APP_ORIGIN: &str = "https://quiz.exode.ru";

const LISTENER_COUNTS: &[usize] = &[1, 10, 100];
const IN_FLIGHT_COUNTS: &[usize] = &[1, 10, 100];

// ============================================================================
// Helpers
// ============================================================================

/// Installs a log subscriber filtered by `RUST_LOG` (silent by default).
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// Host and mini-app bridges over one in-memory channel.
fn bridges() -> (Bridge, Bridge) {
    let channel = MemoryChannel::new(HOST_ORIGIN, APP_ORIGIN);
    let host = Bridge::new(Arc::new(channel.host()), Source::Host, APP_ORIGIN);
    let app = Bridge::new(Arc::new(channel.app()), Source::MiniApp, HOST_ORIGIN);
    (host, app)
}

// ============================================================================
// Benchmark: Listener Fan-out
// ============================================================================

fn bench_fan_out(c: &mut Criterion) {
    init_tracing();
    let mut group = c.benchmark_group("fan_out");

    for &count in LISTENER_COUNTS {
        let (host, app) = bridges();
        let hits = Arc::new(AtomicUsize::new(0));

        for _ in 0..count {
            let hits = Arc::clone(&hits);
            let handler: MessageHandler = Arc::new(move |_: &Envelope| {
                hits.fetch_add(1, Ordering::Relaxed);
            });
            app.on("tick", handler);
        }

        group.bench_with_input(BenchmarkId::new("listeners", count), &count, |b, _| {
            b.iter(|| {
                host.send("tick", Some(json!({"n": 1})), None)
                    .expect("send");
            });
        });

        black_box(hits.load(Ordering::Relaxed));
    }

    group.finish();
}

// ============================================================================
// Benchmark: Correlated Requests
// ============================================================================

fn bench_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");

    let mut group = c.benchmark_group("round_trip");
    group.measurement_time(Duration::from_secs(10));

    for &count in IN_FLIGHT_COUNTS {
        let (host, app) = bridges();
        let responder = host.clone();
        host.on(
            "command:ping",
            Arc::new(move |envelope: &Envelope| {
                responder
                    .reply(envelope, Some(json!({"pong": true})))
                    .expect("reply");
            }),
        );

        group.bench_with_input(BenchmarkId::new("in_flight", count), &count, |b, &n| {
            b.to_async(&rt).iter(|| {
                let app = app.clone();
                async move {
                    let mut tasks = Vec::with_capacity(n);
                    for _ in 0..n {
                        let app = app.clone();
                        tasks.push(tokio::spawn(async move {
                            app.send_request("command:ping", None, Duration::from_secs(1))
                                .await
                        }));
                    }
                    for task in tasks {
                        black_box(task.await.expect("join").expect("request"));
                    }
                }
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Rejected Frames
// ============================================================================

fn bench_rejections(c: &mut Criterion) {
    let channel = MemoryChannel::new(HOST_ORIGIN, APP_ORIGIN);
    let app_port = channel.app();
    let app = Bridge::new(Arc::new(app_port.clone()), Source::MiniApp, HOST_ORIGIN);
    app.on("tick", Arc::new(|_: &Envelope| {}));

    let mut group = c.benchmark_group("rejections");

    group.bench_function("foreign_origin", |b| {
        b.iter(|| {
            app_port.deliver(
                "https://evil.example",
                json!({"type": "tick", "source": "exode-host"}),
            );
        });
    });

    group.bench_function("malformed", |b| {
        b.iter(|| app_port.deliver(HOST_ORIGIN, json!({"source": "exode-host"})));
    });

    group.bench_function("echo", |b| {
        b.iter(|| {
            app_port.deliver(
                HOST_ORIGIN,
                json!({"type": "tick", "source": "exode-miniapp"}),
            );
        });
    });

    group.finish();
}

criterion_group!(benches, bench_fan_out, bench_round_trip, bench_rejections);
criterion_main!(benches);
