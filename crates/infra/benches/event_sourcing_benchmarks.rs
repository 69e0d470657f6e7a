use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use conduit_bus::{CommandBus, LoggingFilter, Next};
use conduit_core::{
    Aggregate, AggregateId, AggregateType, Command, DomainError, Envelope, Event, Message,
    MessageRef, Payload, PayloadType,
};
use conduit_events::{EventDispatcher, EventKey, EventRecord};
use conduit_infra::event_store::{EventStore, InMemoryEventStore};
use conduit_infra::repository::EventSourcedRepository;

#[derive(Debug, Clone, PartialEq)]
struct StockAdjusted {
    delta: i64,
}

impl Payload for StockAdjusted {
    fn payload_type(&self) -> PayloadType {
        PayloadType::from_static("inventory.stock_adjusted")
    }
}

impl Event for StockAdjusted {}

#[derive(Debug)]
struct AdjustStock {
    delta: i64,
}

impl Payload for AdjustStock {
    fn payload_type(&self) -> PayloadType {
        PayloadType::from_static("inventory.adjust_stock")
    }
}

impl Command for AdjustStock {}

#[derive(Debug, Default)]
struct StockItem {
    quantity: i64,
}

impl Aggregate for StockItem {
    type Command = AdjustStock;
    type Event = StockAdjusted;
    type Error = DomainError;

    fn aggregate_type() -> AggregateType {
        AggregateType::from_static("inventory.item")
    }

    fn apply(&mut self, event: &StockAdjusted) {
        self.quantity += event.delta;
    }

    fn handle(&self, command: &AdjustStock) -> Result<Vec<StockAdjusted>, DomainError> {
        if self.quantity + command.delta < 0 {
            return Err(DomainError::rejected("stock cannot go negative"));
        }
        Ok(vec![StockAdjusted {
            delta: command.delta,
        }])
    }
}

fn item_type() -> AggregateType {
    StockItem::aggregate_type()
}

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_store_append");

    group.bench_function("single_stream_sequential", |b| {
        let store: InMemoryEventStore<StockAdjusted> = InMemoryEventStore::new();
        let id = AggregateId::new();
        let mut next = 0u64;
        b.iter(|| {
            store
                .append(EventRecord::new(item_type(), id, next, StockAdjusted { delta: 1 }))
                .unwrap();
            next += 1;
        });
    });

    group.bench_function("fresh_stream_per_append", |b| {
        let store: InMemoryEventStore<StockAdjusted> = InMemoryEventStore::new();
        b.iter(|| {
            store
                .append(EventRecord::new(
                    item_type(),
                    AggregateId::new(),
                    0,
                    StockAdjusted { delta: 1 },
                ))
                .unwrap();
        });
    });

    for size in [10u64, 100, 1_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::new("read_full_stream", size), &size, |b, &size| {
            let store: InMemoryEventStore<StockAdjusted> = InMemoryEventStore::new();
            let id = AggregateId::new();
            for n in 0..size {
                store
                    .append(EventRecord::new(item_type(), id, n, StockAdjusted { delta: 1 }))
                    .unwrap();
            }
            b.iter(|| black_box(store.read_stream(&item_type(), id, None, None).unwrap()));
        });
    }

    group.finish();
}

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_dispatcher_fan_out");

    for listeners in [1usize, 10, 100] {
        group.throughput(Throughput::Elements(listeners as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(listeners),
            &listeners,
            |b, &listeners| {
                let hits = Arc::new(AtomicU64::new(0));
                let mut dispatcher = EventDispatcher::new();
                for i in 0..listeners {
                    let hits = Arc::clone(&hits);
                    let key = if i % 2 == 0 {
                        EventKey::of("inventory.stock_adjusted")
                    } else {
                        EventKey::Wildcard
                    };
                    dispatcher
                        .listen(key, i as i32, "counter", move |_: &Message| -> anyhow::Result<()> {
                            hits.fetch_add(1, Ordering::Relaxed);
                            Ok(())
                        })
                        .unwrap();
                }

                let envelope = Envelope::new(StockAdjusted { delta: 1 });
                b.iter(|| dispatcher.trigger(black_box(envelope.as_message())).unwrap());
            },
        );
    }

    group.finish();
}

fn bench_command_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("command_bus_dispatch");

    for filters in [0usize, 1, 5] {
        group.bench_with_input(BenchmarkId::new("filters", filters), &filters, |b, &filters| {
            let mut bus = CommandBus::new();
            bus.register::<AdjustStock, _>(
                PayloadType::from_static("inventory.adjust_stock"),
                |cmd: MessageRef<'_, AdjustStock>| -> anyhow::Result<()> {
                    black_box(cmd.delta);
                    Ok(())
                },
            )
            .unwrap();
            for _ in 0..filters {
                bus.add_filter(|m: &Message, next: Next<'_>| next.run(m));
            }

            b.iter(|| bus.execute(AdjustStock { delta: black_box(1) }).unwrap());
        });
    }

    group.bench_function("logging_filter", |b| {
        let mut bus = CommandBus::new();
        bus.register::<AdjustStock, _>(
            PayloadType::from_static("inventory.adjust_stock"),
            |_: MessageRef<'_, AdjustStock>| -> anyhow::Result<()> { Ok(()) },
        )
        .unwrap();
        bus.add_filter(LoggingFilter::new());

        b.iter(|| bus.execute(AdjustStock { delta: 1 }).unwrap());
    });

    group.finish();
}

fn bench_repository(c: &mut Criterion) {
    let mut group = c.benchmark_group("repository_execute");
    group.sample_size(50);

    for history in [0u64, 100, 1_000] {
        group.bench_with_input(
            BenchmarkId::new("with_history", history),
            &history,
            |b, &history| {
                let store: Arc<InMemoryEventStore<StockAdjusted>> = Arc::new(InMemoryEventStore::new());
                let repository = EventSourcedRepository::new(Arc::clone(&store), EventDispatcher::new());
                let id = AggregateId::new();
                for _ in 0..history {
                    repository
                        .execute(id, &AdjustStock { delta: 1 }, |_| StockItem::default())
                        .unwrap();
                }

                // each iteration replays the history plus everything appended so far
                b.iter(|| {
                    repository
                        .execute(id, &AdjustStock { delta: 1 }, |_| StockItem::default())
                        .unwrap()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_append,
    bench_fan_out,
    bench_command_dispatch,
    bench_repository
);
criterion_main!(benches);
