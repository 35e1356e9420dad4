use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use realm_proto::{CellObject, CellState, EntityId, MobState, PlayerState, Stats};
use realm_sync::{plan_refresh, GameState};

fn crowded_state(players: usize, mobs: usize) -> GameState {
    let stats = Stats {
        hp: 50.0,
        max_hp: 50.0,
        ..Stats::default()
    };
    GameState {
        player: PlayerState {
            id: EntityId::new("viewer"),
            stats: stats.clone(),
            ..PlayerState::default()
        },
        cell: CellState {
            players: (0..players)
                .map(|idx| PlayerState {
                    id: EntityId::new(format!("player-{idx}")),
                    stats: stats.clone(),
                    ..PlayerState::default()
                })
                .collect(),
            objects: (0..mobs)
                .map(|idx| {
                    CellObject::Mob(MobState {
                        id: EntityId::new(format!("mob-{idx}")),
                        stats: stats.clone(),
                        ..MobState::default()
                    })
                })
                .collect(),
            ..CellState::default()
        },
        ..GameState::default()
    }
}

fn bench_plan_refresh(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_refresh");

    for size in [8usize, 32, 128] {
        group.bench_with_input(BenchmarkId::new("identical", size), &size, |b, &size| {
            let previous = crowded_state(size, size);
            let current = previous.clone();
            b.iter(|| plan_refresh(Some(&previous), &current));
        });

        group.bench_with_input(BenchmarkId::new("every_hp_moved", size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let previous = crowded_state(size, size);
                    let mut current = previous.clone();
                    for player in &mut current.cell.players {
                        player.stats.hp -= 1.0;
                    }
                    for object in &mut current.cell.objects {
                        if let CellObject::Mob(mob) = object {
                            mob.stats.hp -= 1.0;
                        }
                    }
                    (previous, current)
                },
                |(previous, current)| plan_refresh(Some(&previous), &current),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(refresh_benches, bench_plan_refresh);
criterion_main!(refresh_benches);
