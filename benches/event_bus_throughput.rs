//! Event bus publish throughput under a draining listener.

use criterion::{Criterion, criterion_group, criterion_main};

use warpline::event_bus::{Event, EventBus, EventKind, MemorySink};

fn publish_throughput(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("tokio runtime");

    c.bench_function("publish_1k_events", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let bus = EventBus::with_capacity_and_sinks(2048, vec![Box::new(MemorySink::new())]);
                bus.listen_for_events();
                for i in 0..1_000u64 {
                    let mut event = Event::new(EventKind::NodeMessage, "bench-run");
                    event.seq = i;
                    bus.publish(event);
                }
                bus.stop_listener().await;
            });
        });
    });
}

criterion_group!(benches, publish_throughput);
criterion_main!(benches);
