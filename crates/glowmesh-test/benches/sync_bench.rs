//! Benchmarks for glowmesh hot paths

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use glowmesh_core::{DisplayMode, MeshTime, NodeId, SyncConfig};
use glowmesh_sync::{elect, Coordinator, Inbound, MeshObservation, MembershipView};
use glowmesh_test::ScenarioBuilder;
use glowmesh_wire::{Envelope, ResyncBeacon};

fn bench_election(c: &mut Criterion) {
    let mut group = c.benchmark_group("election");

    for size in [4usize, 32, 256] {
        let snapshot: Vec<NodeId> = (0..size as u32).map(|i| NodeId::new(1_000 + i * 7)).collect();
        group.bench_function(format!("{}_peers", size), |b| {
            b.iter(|| {
                let view = MembershipView::from_snapshot(black_box(snapshot.clone()));
                black_box(elect(NodeId::new(5_000), &view))
            })
        });
    }

    group.finish();
}

fn bench_envelope_codec(c: &mut Criterion) {
    let beacon = Envelope::from(ResyncBeacon::new(NodeId::new(0xBEEF), MeshTime::from_micros(123_456)));
    let mode = Envelope::mode_update(NodeId::new(0xBEEF), MeshTime::from_micros(123_456), DisplayMode::Connected);
    let beacon_bytes = beacon.to_bytes();
    let mode_bytes = mode.to_bytes();

    let mut group = c.benchmark_group("envelope");
    group.throughput(Throughput::Elements(1));

    group.bench_function("encode_beacon", |b| b.iter(|| black_box(beacon.to_bytes())));
    group.bench_function("decode_beacon", |b| {
        b.iter(|| Envelope::decode(black_box(&beacon_bytes)).unwrap())
    });
    group.bench_function("decode_mode_update", |b| {
        b.iter(|| Envelope::decode(black_box(&mode_bytes)).unwrap())
    });

    group.finish();
}

fn bench_beacon_handling(c: &mut Criterion) {
    let mut coordinator = Coordinator::new(NodeId::new(5), SyncConfig::default(), Duration::ZERO).unwrap();
    coordinator.handle(
        Inbound::MembershipChanged(vec![NodeId::new(2), NodeId::new(9)]),
        MeshTime::ZERO,
    );
    let beacon = Envelope::from(ResyncBeacon::new(NodeId::new(2), MeshTime::from_micros(1_000_000)));
    let now = MeshTime::from_micros(1_050_000);

    c.bench_function("coordinator_handle_beacon", |b| {
        b.iter(|| black_box(coordinator.handle(Inbound::Message(black_box(beacon)), now)))
    });
}

fn bench_coordinator_tick(c: &mut Criterion) {
    let mut coordinator = Coordinator::new(NodeId::new(2), SyncConfig::default(), Duration::ZERO).unwrap();
    coordinator.handle(Inbound::MembershipChanged(vec![NodeId::new(5)]), MeshTime::ZERO);
    let mut now = Duration::ZERO;

    c.bench_function("coordinator_tick", |b| {
        b.iter(|| {
            now += Duration::from_millis(10);
            let mesh_now = MeshTime::from_micros(now.as_micros() as u32);
            black_box(coordinator.tick(now, mesh_now, MeshObservation::default))
        })
    });
}

fn bench_mesh_simulation(c: &mut Criterion) {
    c.bench_function("simulate_8_nodes_10s", |b| {
        b.iter(|| {
            let mut sim = ScenarioBuilder::new()
                .with_nodes(&[8, 1, 7, 2, 6, 3, 5, 4])
                .build()
                .unwrap();
            sim.run_for(Duration::from_secs(10));
            black_box(sim.phase_spread())
        })
    });
}

criterion_group!(
    benches,
    bench_election,
    bench_envelope_codec,
    bench_beacon_handling,
    bench_coordinator_tick,
    bench_mesh_simulation,
);
criterion_main!(benches);
