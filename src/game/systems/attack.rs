//! AttackEngine: boss attack selection and multi-tick execution
//!
//! One `AttackInstance` per attack definition of the boss's current phase.
//! Each tick the engine ticks cooldowns, advances any windup/dash/warning
//! sequence by elapsed time, and, when nothing is in progress, picks one
//! ready in-range attack by selection weight.

use rand::Rng;
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::game::constants::boss as boss_tuning;
use crate::game::cooldown::Cooldown;
use crate::game::definitions::{AttackDefinition, AttackKind, BossPhase};
use crate::game::events::SimEvent;
use crate::game::health::DamageRouter;
use crate::game::selection::WeightedSelector;
use crate::game::spatial::{EntityRef, SpatialEntity, SpatialQuery};
use crate::game::state::{EntityId, GameState, ProjectileOwner, ProjectileSpec};
use crate::util::vec2::Vec2;

/// Stat multipliers of the active phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackModifiers {
    pub speed: f32,
    pub damage: f32,
    pub cooldown: f32,
}

impl AttackModifiers {
    pub fn from_phase(phase: Option<&BossPhase>) -> Self {
        match phase {
            Some(p) => Self {
                speed: p.speed_multiplier,
                damage: p.damage_multiplier,
                cooldown: p.cooldown_multiplier,
            },
            None => Self::default(),
        }
    }
}

impl Default for AttackModifiers {
    fn default() -> Self {
        Self {
            speed: 1.0,
            damage: 1.0,
            cooldown: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeStage {
    Windup,
    Dash,
}

/// Sequence state of an executing attack
#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    Idle,
    /// Direction is locked when the windup starts
    Charge {
        stage: ChargeStage,
        elapsed: f32,
        direction: Vec2,
        hits: SmallVec<[EntityRef; 4]>,
    },
    /// Impact point is locked when the warning starts
    Slam { elapsed: f32, center: Vec2 },
}

#[derive(Debug, Clone)]
pub struct AttackInstance {
    pub definition: AttackDefinition,
    cooldown: Cooldown,
    execution: Execution,
}

impl AttackInstance {
    pub fn new(definition: AttackDefinition) -> Self {
        Self {
            definition,
            cooldown: Cooldown::ready(),
            execution: Execution::Idle,
        }
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.cooldown.is_ready() && !self.is_executing()
    }

    #[inline]
    pub fn is_executing(&self) -> bool {
        !matches!(self.execution, Execution::Idle)
    }

    pub fn cooldown_remaining(&self) -> f32 {
        self.cooldown.remaining()
    }

    pub fn execution(&self) -> &Execution {
        &self.execution
    }
}

/// Attack instances of one boss for its current phase
#[derive(Debug, Clone)]
pub struct AttackEngine {
    boss: EntityId,
    instances: Vec<AttackInstance>,
    modifiers: AttackModifiers,
}

impl AttackEngine {
    pub fn new(boss: EntityId, attacks: &[AttackDefinition], modifiers: AttackModifiers) -> Self {
        Self {
            boss,
            instances: attacks.iter().cloned().map(AttackInstance::new).collect(),
            modifiers,
        }
    }

    pub fn boss(&self) -> EntityId {
        self.boss
    }

    pub fn instances(&self) -> &[AttackInstance] {
        &self.instances
    }

    pub fn modifiers(&self) -> AttackModifiers {
        self.modifiers
    }

    /// Whether any attack sequence is in progress
    pub fn is_busy(&self) -> bool {
        self.instances.iter().any(AttackInstance::is_executing)
    }

    /// Whether a charge currently drives the boss body
    pub fn is_charging(&self) -> bool {
        self.instances
            .iter()
            .any(|i| matches!(i.execution, Execution::Charge { .. }))
    }

    /// Pick among ready attacks whose range covers `distance`.
    ///
    /// `unit_draw` in `[0, 1)` is scaled by the total selection weight. Falls
    /// back to the first candidate in definition order.
    pub fn select_attack(&self, distance: f32, unit_draw: f32) -> Option<usize> {
        let candidates: Vec<usize> = self
            .instances
            .iter()
            .enumerate()
            .filter(|(_, inst)| inst.is_ready() && distance <= inst.definition.range)
            .map(|(index, _)| index)
            .collect();

        let weight = |i: &usize| self.instances[*i].definition.selection_weight;
        let draw = unit_draw * WeightedSelector::total_weight(&candidates, weight);
        WeightedSelector::pick_with_draw(&candidates, weight, draw).map(|choice| candidates[choice])
    }

    pub fn update<R: Rng>(&mut self, state: &mut GameState, rng: &mut R, dt: f32) -> Vec<SimEvent> {
        let mut events = Vec::new();

        for instance in &mut self.instances {
            instance.cooldown.tick(dt);
        }

        if boss_body(state, self.boss).is_none() {
            return events;
        }

        for index in 0..self.instances.len() {
            self.advance(index, state, dt, &mut events);
        }

        // One sequence at a time
        if self.is_busy() {
            return events;
        }

        let Some((origin, _)) = boss_body(state, self.boss) else {
            return events;
        };
        let Some(target) = state.nearest_alive_player(origin).map(|p| p.position) else {
            return events;
        };

        let unit_draw: f32 = rng.gen();
        if let Some(index) = self.select_attack(origin.distance_to(target), unit_draw) {
            self.execute(index, state, origin, target, &mut events);
        }
        events
    }

    /// Abandon every in-flight sequence with no pending side effect
    pub fn cancel_all(&mut self) -> Vec<SimEvent> {
        let mut events = Vec::new();
        for instance in &mut self.instances {
            if instance.is_executing() {
                instance.execution = Execution::Idle;
                events.push(SimEvent::AttackCancelled {
                    boss: self.boss,
                    attack: instance.definition.name.clone(),
                });
            }
        }
        events
    }

    fn execute(&mut self, index: usize, state: &mut GameState, origin: Vec2, target: Vec2, events: &mut Vec<SimEvent>) {
        let boss = self.boss;
        let modifiers = self.modifiers;
        let instance = &mut self.instances[index];
        let definition = &instance.definition;
        let damage = (definition.damage * modifiers.damage).round();

        // Cooldown is consumed even if the attack turns out to be a no-op
        instance.cooldown.trigger(definition.cooldown * modifiers.cooldown);
        debug!(boss, attack = %definition.name, kind = definition.kind.label(), "Boss attack");

        match definition.kind {
            AttackKind::Projectile {
                speed,
                count,
                spread_deg,
            } => {
                let Some((radius, lifetime)) = definition
                    .archetype
                    .and_then(|a| state.archetypes.projectile(a))
                    .map(|t| (t.radius, t.lifetime))
                else {
                    warn!(attack = %definition.name, "Projectile attack without a projectile archetype");
                    return;
                };

                let base = origin.direction_to(target).angle().to_degrees();
                let count = count.max(1);
                let (start, step) = if count > 1 {
                    (base - spread_deg / 2.0, spread_deg / (count - 1) as f32)
                } else {
                    (base, 0.0)
                };

                for i in 0..count {
                    let direction = Vec2::from_degrees(start + step * i as f32);
                    let position = origin + direction * boss_tuning::PROJECTILE_MUZZLE_OFFSET;
                    let velocity = direction * speed;
                    let projectile = state.add_projectile(ProjectileSpec {
                        owner: ProjectileOwner::Hostile(boss),
                        position,
                        velocity,
                        radius,
                        damage,
                        lifetime,
                        pierce: 0,
                    });
                    events.push(SimEvent::ProjectileFired {
                        projectile,
                        position,
                        velocity,
                        hostile: true,
                    });
                }
            }
            AttackKind::Charge { windup, .. } => {
                let direction = origin.direction_to(target);
                instance.execution = Execution::Charge {
                    stage: ChargeStage::Windup,
                    elapsed: 0.0,
                    direction,
                    hits: SmallVec::new(),
                };
                events.push(SimEvent::WindupStarted {
                    boss,
                    direction,
                    duration: windup,
                });
            }
            AttackKind::Slam { radius, delay } => {
                instance.execution = Execution::Slam {
                    elapsed: 0.0,
                    center: origin,
                };
                events.push(SimEvent::SlamWarning {
                    boss,
                    center: origin,
                    radius,
                    delay,
                });
            }
            AttackKind::Summon { count, radius } => {
                let Some(archetype) = definition.archetype else {
                    warn!(attack = %definition.name, "Summon attack without a minion archetype");
                    return;
                };

                let mut summoned = 0;
                for i in 0..count {
                    let angle = (360.0 / count as f32 * i as f32).to_radians();
                    let position = Vec2::on_circle(origin, radius, angle);
                    if let Some(entity) = state.spawn_enemy(archetype, position, None) {
                        if let Some(minion) = state.enemy_mut(entity) {
                            minion.body.summoned = true;
                        }
                        summoned += 1;
                        events.push(SimEvent::EnemySpawned {
                            entity,
                            archetype,
                            position,
                        });
                    }
                }
                events.push(SimEvent::Summoned { boss, count: summoned });
            }
        }
    }

    fn advance(&mut self, index: usize, state: &mut GameState, dt: f32, events: &mut Vec<SimEvent>) {
        let boss = self.boss;
        let modifiers = self.modifiers;
        let instance = &mut self.instances[index];
        let kind = instance.definition.kind;
        let damage = (instance.definition.damage * modifiers.damage).round();
        let mut finished = false;

        match (&mut instance.execution, kind) {
            (Execution::Idle, _) => return,
            (
                Execution::Charge {
                    stage,
                    elapsed,
                    direction,
                    hits,
                },
                AttackKind::Charge {
                    speed,
                    windup,
                    duration,
                },
            ) => {
                *elapsed += dt;
                match stage {
                    ChargeStage::Windup => {
                        if *elapsed >= windup {
                            *stage = ChargeStage::Dash;
                            *elapsed = 0.0;
                            events.push(SimEvent::ChargeStarted {
                                boss,
                                direction: *direction,
                            });
                        }
                    }
                    ChargeStage::Dash => {
                        let Some(body) = state.enemies.get_mut(&boss) else {
                            return;
                        };
                        body.body.position += *direction * (speed * modifiers.speed * dt);
                        let (position, radius) = (body.body.position, body.body.radius);

                        for target in state.grid.find_all(position, radius, &is_player) {
                            if !hits.contains(&target) {
                                hits.push(target);
                                DamageRouter::apply(state, target, damage);
                            }
                        }

                        if *elapsed >= duration {
                            events.push(SimEvent::ChargeEnded { boss });
                            finished = true;
                        }
                    }
                }
            }
            (Execution::Slam { elapsed, center }, AttackKind::Slam { radius, delay }) => {
                *elapsed += dt;
                if *elapsed >= delay {
                    // Single pass: each target at most once per impact
                    let struck = state.grid.find_all(*center, radius, &is_player);
                    let hits = struck
                        .into_iter()
                        .filter(|target| DamageRouter::apply(state, *target, damage).is_some())
                        .count() as u32;
                    events.push(SimEvent::SlamImpact {
                        boss,
                        center: *center,
                        radius,
                        hits,
                    });
                    finished = true;
                }
            }
            _ => {
                warn!(attack = %instance.definition.name, "Sequence does not match attack kind");
                finished = true;
            }
        }

        if finished {
            instance.execution = Execution::Idle;
        }
    }
}

fn is_player(entity: &SpatialEntity) -> bool {
    matches!(entity.id, EntityRef::Player(_))
}

/// Position and radius of a living boss body
fn boss_body(state: &GameState, boss: EntityId) -> Option<(Vec2, f32)> {
    state
        .enemy(boss)
        .filter(|e| e.active && !e.body.health.is_dead())
        .map(|e| (e.body.position, e.body.radius))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::tests::{add_player_at, test_state, GRUNT, ORB};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const DT: f32 = 1.0 / 30.0;

    fn attack(name: &str, kind: AttackKind, weight: f32) -> AttackDefinition {
        AttackDefinition {
            name: name.into(),
            kind,
            cooldown: 2.0,
            range: 20.0,
            selection_weight: weight,
            damage: 10.0,
            archetype: Some(ORB),
        }
    }

    fn volley(count: u32, spread_deg: f32) -> AttackKind {
        AttackKind::Projectile {
            speed: 8.0,
            count,
            spread_deg,
        }
    }

    fn setup() -> (GameState, EntityId) {
        let mut state = test_state();
        let boss = state.spawn_enemy(GRUNT, Vec2::ZERO, None).unwrap();
        (state, boss)
    }

    fn player_health(state: &GameState, index: usize) -> f32 {
        state.players[index].health.current()
    }

    #[test]
    fn test_weighted_pick_at_ninetieth_percentile() {
        let engine = AttackEngine::new(
            1,
            &[attack("light", volley(1, 0.0), 2.0), attack("heavy", volley(1, 0.0), 8.0)],
            AttackModifiers::default(),
        );
        assert_eq!(engine.select_attack(5.0, 0.9), Some(1));
        assert_eq!(engine.select_attack(5.0, 0.1), Some(0));
    }

    #[test]
    fn test_selection_falls_back_to_first_ready() {
        let engine = AttackEngine::new(
            1,
            &[attack("a", volley(1, 0.0), 0.0), attack("b", volley(1, 0.0), 0.0)],
            AttackModifiers::default(),
        );
        assert_eq!(engine.select_attack(5.0, 0.5), Some(0));
        // Out of every range
        assert_eq!(engine.select_attack(50.0, 0.5), None);
    }

    #[test]
    fn test_cooldown_blocks_refire() {
        let (mut state, boss) = setup();
        add_player_at(&mut state, Vec2::new(5.0, 0.0));
        let mut engine = AttackEngine::new(boss, &[attack("volley", volley(1, 0.0), 1.0)], AttackModifiers::default());
        let mut rng = StdRng::seed_from_u64(1);

        let dt = 0.016;
        let mut fire_times = Vec::new();
        for step in 0..200 {
            let events = engine.update(&mut state, &mut rng, dt);
            if events.iter().any(|e| matches!(e, SimEvent::ProjectileFired { .. })) {
                fire_times.push(step as f32 * dt);
            }
        }

        assert_eq!(fire_times[0], 0.0);
        assert!(fire_times.len() >= 2);
        for pair in fire_times.windows(2) {
            assert!(pair[1] - pair[0] >= 2.0 - 1e-3, "refired after {}", pair[1] - pair[0]);
        }
    }

    #[test]
    fn test_projectile_fan_spread() {
        let (mut state, boss) = setup();
        add_player_at(&mut state, Vec2::new(5.0, 0.0));
        let mut engine = AttackEngine::new(boss, &[attack("fan", volley(3, 30.0), 1.0)], AttackModifiers {
            damage: 1.5,
            ..AttackModifiers::default()
        });
        let mut rng = StdRng::seed_from_u64(1);

        engine.update(&mut state, &mut rng, DT);
        assert_eq!(state.projectiles.len(), 3);

        let angles: Vec<f32> = state.projectiles.iter().map(|p| p.velocity.angle().to_degrees()).collect();
        assert!((angles[0] + 15.0).abs() < 1e-3);
        assert!(angles[1].abs() < 1e-3);
        assert!((angles[2] - 15.0).abs() < 1e-3);
        assert!(state.projectiles.iter().all(|p| p.is_hostile() && p.damage == 15.0));
        assert!((state.projectiles[1].position.x - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_missing_projectile_archetype_is_noop_with_cooldown() {
        let (mut state, boss) = setup();
        add_player_at(&mut state, Vec2::new(5.0, 0.0));
        let mut definition = attack("volley", volley(1, 0.0), 1.0);
        definition.archetype = None;
        let mut engine = AttackEngine::new(boss, &[definition], AttackModifiers::default());
        let mut rng = StdRng::seed_from_u64(1);

        let events = engine.update(&mut state, &mut rng, DT);
        assert!(events.is_empty());
        assert!(state.projectiles.is_empty());
        assert!(engine.instances()[0].cooldown_remaining() > 0.0);
    }

    #[test]
    fn test_charge_locks_direction_and_hits_once() {
        let (mut state, boss) = setup();
        add_player_at(&mut state, Vec2::new(4.0, 0.0));
        let charge = AttackKind::Charge {
            speed: 10.0,
            windup: 0.5,
            duration: 1.0,
        };
        let mut engine = AttackEngine::new(boss, &[attack("charge", charge, 1.0)], AttackModifiers::default());
        let mut rng = StdRng::seed_from_u64(1);

        state.rebuild_spatial();
        let events = engine.update(&mut state, &mut rng, DT);
        assert!(matches!(events.as_slice(), [SimEvent::WindupStarted { direction, .. }] if direction.approx_eq(Vec2::RIGHT, 1e-5)));
        assert!(engine.is_charging());

        // Target steps off-axis during windup; the charge must not re-aim
        state.players[0].position = Vec2::new(4.0, 0.2);
        let mut saw_start = false;
        let mut saw_end = false;
        for _ in 0..60 {
            state.rebuild_spatial();
            for event in engine.update(&mut state, &mut rng, DT) {
                match event {
                    SimEvent::ChargeStarted { .. } => saw_start = true,
                    SimEvent::ChargeEnded { .. } => saw_end = true,
                    _ => {}
                }
            }
            if saw_end {
                break;
            }
        }

        assert!(saw_start && saw_end);
        let boss_position = state.enemy(boss).unwrap().body.position;
        assert!(boss_position.y.abs() < 1e-5);
        assert!(boss_position.x > 9.0);
        assert_eq!(player_health(&state, 0), 90.0);
    }

    #[test]
    fn test_slam_hits_at_locked_point() {
        let (mut state, boss) = setup();
        add_player_at(&mut state, Vec2::new(2.0, 0.0));
        add_player_at(&mut state, Vec2::new(0.0, 2.5));
        let slam = AttackKind::Slam { radius: 3.0, delay: 0.5 };
        let mut engine = AttackEngine::new(boss, &[attack("slam", slam, 1.0)], AttackModifiers::default());
        let mut rng = StdRng::seed_from_u64(1);

        state.rebuild_spatial();
        engine.update(&mut state, &mut rng, DT);

        // Boss drifts and the second player escapes during the warning
        state.enemy_mut(boss).unwrap().body.position = Vec2::new(20.0, 0.0);
        state.players[1].position = Vec2::new(0.0, 8.0);

        let mut impact = None;
        for _ in 0..30 {
            state.rebuild_spatial();
            for event in engine.update(&mut state, &mut rng, DT) {
                if let SimEvent::SlamImpact { center, hits, .. } = event {
                    impact = Some((center, hits));
                }
            }
        }

        assert_eq!(impact, Some((Vec2::ZERO, 1)));
        assert_eq!(player_health(&state, 0), 90.0);
        assert_eq!(player_health(&state, 1), 100.0);
    }

    #[test]
    fn test_cancel_abandons_pending_slam() {
        let (mut state, boss) = setup();
        add_player_at(&mut state, Vec2::new(1.0, 0.0));
        let slam = AttackKind::Slam { radius: 3.0, delay: 0.5 };
        let mut engine = AttackEngine::new(boss, &[attack("slam", slam, 1.0)], AttackModifiers::default());
        let mut rng = StdRng::seed_from_u64(1);

        state.rebuild_spatial();
        engine.update(&mut state, &mut rng, DT);
        assert!(engine.is_busy());

        let cancelled = engine.cancel_all();
        assert!(matches!(cancelled.as_slice(), [SimEvent::AttackCancelled { attack, .. }] if attack == "slam"));
        for _ in 0..30 {
            engine.update(&mut state, &mut rng, DT);
        }
        assert!(state.damage_log.is_empty());
        assert_eq!(player_health(&state, 0), 100.0);
    }

    #[test]
    fn test_summon_ring() {
        let (mut state, boss) = setup();
        add_player_at(&mut state, Vec2::new(5.0, 0.0));
        let mut definition = attack("summon", AttackKind::Summon { count: 4, radius: 3.0 }, 1.0);
        definition.archetype = Some(GRUNT);
        let mut engine = AttackEngine::new(boss, &[definition], AttackModifiers::default());
        let mut rng = StdRng::seed_from_u64(1);

        let events = engine.update(&mut state, &mut rng, DT);
        assert!(events.iter().any(|e| matches!(e, SimEvent::Summoned { count: 4, .. })));
        assert_eq!(state.live_enemy_count(), 5);
        assert_eq!(state.enemies.values().filter(|e| e.body.summoned).count(), 4);

        let minions: Vec<Vec2> = state
            .enemies
            .values()
            .filter(|e| e.handle != boss)
            .map(|e| e.body.position)
            .collect();
        assert!(minions.iter().all(|p| (p.length() - 3.0).abs() < 1e-4));
        assert!(minions.iter().any(|p| p.approx_eq(Vec2::new(3.0, 0.0), 1e-4)));
        assert!(minions.iter().any(|p| p.approx_eq(Vec2::new(0.0, 3.0), 1e-4)));
    }

    #[test]
    fn test_no_target_in_range() {
        let (mut state, boss) = setup();
        add_player_at(&mut state, Vec2::new(40.0, 0.0));
        let mut engine = AttackEngine::new(boss, &[attack("volley", volley(1, 0.0), 1.0)], AttackModifiers::default());
        let mut rng = StdRng::seed_from_u64(1);

        assert!(engine.update(&mut state, &mut rng, DT).is_empty());
        assert!(engine.instances()[0].is_ready());
    }
}
