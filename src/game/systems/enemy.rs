//! Swarm enemy behavior
//!
//! Re-targeting, movement, contact damage, ranged fire and the periodic
//! out-of-range despawn sweep. Bosses only take part in contact damage; their
//! movement belongs to the boss controller.

use tracing::debug;

use crate::game::constants::enemy as enemy_tuning;
use crate::game::definitions::ProjectileTemplate;
use crate::game::events::{DespawnReason, SimEvent};
use crate::game::health::DamageRouter;
use crate::game::spatial::EntityRef;
use crate::game::state::{EnemyRole, EntityId, GameState, PlayerId, ProjectileOwner, ProjectileSpec};
use crate::util::vec2::Vec2;

/// Alive player as seen by enemies this tick
#[derive(Debug, Clone, Copy)]
struct Quarry {
    id: PlayerId,
    position: Vec2,
    radius: f32,
}

pub struct EnemySystem {
    despawn_timer: f32,
}

impl EnemySystem {
    pub fn new() -> Self {
        Self {
            despawn_timer: enemy_tuning::DESPAWN_CHECK_INTERVAL,
        }
    }

    pub fn update(&mut self, state: &mut GameState, dt: f32) -> Vec<SimEvent> {
        let quarry: Vec<Quarry> = state
            .alive_players()
            .map(|p| Quarry {
                id: p.id,
                position: p.position,
                radius: p.radius,
            })
            .collect();

        let mut contacts: Vec<(PlayerId, f32)> = Vec::new();
        let mut shots: Vec<ProjectileSpec> = Vec::new();
        let shot_template = ProjectileTemplate::default();

        for (&id, instance) in state.enemies.iter_mut() {
            let enemy = &mut instance.body;
            if !instance.active || enemy.health.is_dead() {
                continue;
            }
            enemy.contact_cooldowns.advance(dt);

            if enemy.role == EnemyRole::Swarm {
                enemy.retarget_timer -= dt;
                let target_alive = enemy.target.map_or(false, |t| quarry.iter().any(|q| q.id == t));
                if enemy.retarget_timer <= 0.0 || !target_alive {
                    enemy.target = nearest(&quarry, enemy.position);
                    enemy.retarget_timer = enemy_tuning::TRACKING_REFRESH;
                }

                if let Some(target) = enemy.target.and_then(|t| quarry.iter().find(|q| q.id == t)) {
                    let distance = enemy.position.distance_to(target.position);
                    let direction = enemy.position.direction_to(target.position);

                    let mut holding = false;
                    if let Some(ranged) = enemy.ranged.as_mut() {
                        ranged.cooldown.tick(dt);
                        let profile = &ranged.profile;
                        if distance >= profile.min_range && distance <= profile.range {
                            holding = true;
                            if ranged.cooldown.is_ready() {
                                ranged.cooldown.trigger(profile.fire_interval);
                                shots.push(ProjectileSpec {
                                    owner: ProjectileOwner::Hostile(id),
                                    position: enemy.position,
                                    velocity: direction * profile.projectile_speed,
                                    radius: shot_template.radius,
                                    damage: profile.damage,
                                    lifetime: shot_template.lifetime,
                                    pierce: 0,
                                });
                            }
                        }
                    }

                    if !holding {
                        enemy.position += direction * (enemy.speed * dt).min(distance);
                    }
                }
            }

            for q in &quarry {
                let touching = enemy.position.distance_to(q.position) <= enemy.radius + q.radius;
                if touching && enemy.contact_cooldowns.try_consume(q.id, enemy_tuning::DAMAGE_INTERVAL) {
                    contacts.push((q.id, enemy.damage));
                }
            }
        }

        let mut events = Vec::with_capacity(shots.len());
        for spec in shots {
            let projectile = state.add_projectile(spec);
            events.push(SimEvent::ProjectileFired {
                projectile,
                position: spec.position,
                velocity: spec.velocity,
                hostile: true,
            });
        }
        for (player, damage) in contacts {
            DamageRouter::apply(state, EntityRef::Player(player), damage);
        }
        events
    }

    /// Every `DESPAWN_CHECK_INTERVAL` seconds, release swarm enemies farther
    /// than `DESPAWN_DISTANCE` from every alive player.
    pub fn despawn_sweep(&mut self, state: &mut GameState, dt: f32) -> Vec<SimEvent> {
        self.despawn_timer -= dt;
        if self.despawn_timer > 0.0 {
            return Vec::new();
        }
        self.despawn_timer = enemy_tuning::DESPAWN_CHECK_INTERVAL;

        let anchors: Vec<Vec2> = state.alive_players().map(|p| p.position).collect();
        if anchors.is_empty() {
            return Vec::new();
        }

        let limit_sq = enemy_tuning::DESPAWN_DISTANCE * enemy_tuning::DESPAWN_DISTANCE;
        let stray: Vec<EntityId> = state
            .enemies
            .values()
            .filter(|e| e.body.role == EnemyRole::Swarm)
            .filter(|e| anchors.iter().all(|a| a.distance_sq_to(e.body.position) > limit_sq))
            .map(|e| e.handle)
            .collect();

        let mut events = Vec::with_capacity(stray.len());
        for entity in stray {
            if state.despawn_enemy(entity).is_some() {
                events.push(SimEvent::EnemyDespawned {
                    entity,
                    reason: DespawnReason::OutOfRange,
                });
            }
        }
        if !events.is_empty() {
            debug!(count = events.len(), "Released out-of-range enemies");
        }
        events
    }
}

impl Default for EnemySystem {
    fn default() -> Self {
        Self::new()
    }
}

fn nearest(quarry: &[Quarry], position: Vec2) -> Option<PlayerId> {
    let mut best: Option<(PlayerId, f32)> = None;
    for q in quarry {
        let dist_sq = q.position.distance_sq_to(position);
        match best {
            Some((_, best_sq)) if dist_sq >= best_sq => {}
            _ => best = Some((q.id, dist_sq)),
        }
    }
    best.map(|(id, _)| id)
}
