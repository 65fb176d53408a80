//! Session tick benchmarks
//!
//! Measures one full simulation tick at several live enemy counts.
//!
//! Run with: cargo bench --bench tick

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use horde_server::config::{GameDefinitions, ServerConfig};
use horde_server::game::definitions::ArchetypeId;
use horde_server::game::session::GameSession;
use horde_server::game::state::ItemKind;
use horde_server::util::vec2::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const CRAWLER: ArchetypeId = ArchetypeId(1);

/// Session with `players` players and `enemies` crawlers scattered around them
fn populated_session(players: usize, enemies: usize) -> GameSession {
    let config = ServerConfig {
        rng_seed: Some(42),
        ..ServerConfig::default()
    };
    let mut session = GameSession::new(Arc::new(GameDefinitions::builtin()), &config);
    for i in 0..players {
        session.add_player(format!("Player{}", i));
    }

    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..enemies {
        let angle = rng.gen_range(0.0..std::f32::consts::TAU);
        let radius = rng.gen_range(5.0..40.0);
        let position = Vec2::new(angle.cos() * radius, angle.sin() * radius);
        session.state_mut().spawn_enemy(CRAWLER, position, None);
    }
    session
}

/// Benchmark a full tick at various enemy counts
fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    group.sample_size(50);

    for count in [100, 250, 500, 1000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("swarm", count), &count, |b, &count| {
            b.iter_batched_ref(
                || populated_session(4, count),
                |session| black_box(session.tick()),
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

/// Benchmark ticks with a boss fight in progress
fn bench_boss_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("boss");
    group.sample_size(50);

    let mut session = populated_session(4, 0);
    let ids: Vec<_> = session.state().players.iter().map(|p| p.id).collect();
    session.grant_item(ids[0], ItemKind::BossSummon);
    session.submit_intent(ids[0], 0, horde_server::net::protocol::PlayerIntent::UseItem {
        item: ItemKind::BossSummon,
    });
    session.tick();

    group.bench_function("phased_boss", |b| {
        b.iter(|| black_box(session.tick()));
    });

    group.finish();
}

/// Benchmark the spatial rebuild on its own
fn bench_spatial(c: &mut Criterion) {
    let mut group = c.benchmark_group("spatial");

    for count in [250, 1000] {
        let mut session = populated_session(4, count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("rebuild", count), &count, |b, _| {
            b.iter(|| session.state_mut().rebuild_spatial());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tick, bench_boss_tick, bench_spatial);
criterion_main!(benches);
