//! End-to-end client-server benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use jsonwire_client::{Client, ClientConfig};
use jsonwire_core::EngineConfig;
use jsonwire_server::{Server, ServerConfig};
use serde_json::Number;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::runtime::Runtime;

struct TestSetup {
    server: Arc<Server>,
    client: Client,
}

fn engine() -> EngineConfig {
    EngineConfig::new().with_poll_interval(Duration::from_millis(1))
}

fn setup_server_and_client(rt: &Runtime) -> TestSetup {
    rt.block_on(async {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = Arc::new(Server::new(ServerConfig::new(addr).with_engine(engine())));
        let server_clone = server.clone();
        tokio::spawn(async move {
            let _ = server_clone.serve(listener).await;
        });

        let config = ClientConfig::new("127.0.0.1", addr.port()).with_engine(engine());
        let client = Client::connect(config).await.unwrap();

        TestSetup { server, client }
    })
}

fn bench_hypotenuse_latency(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let setup = setup_server_and_client(&rt);

    let mut group = c.benchmark_group("e2e_hypotenuse");
    group.throughput(Throughput::Elements(1));

    group.bench_function("request", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(
                setup
                    .client
                    .hypotenuse(Number::from(3), Number::from(4))
                    .await
                    .unwrap(),
            )
        });
    });

    group.finish();

    rt.block_on(setup.client.close());
    setup.server.shutdown();
}

criterion_group!(benches, bench_hypotenuse_latency);

criterion_main!(benches);
