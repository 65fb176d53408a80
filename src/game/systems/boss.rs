//! Boss phase tracking and per-boss control
//!
//! `BossPhaseMachine` maps the boss health fraction to a phase using the
//! tightest-fit rule: among phases whose threshold is at or above the fraction,
//! the lowest threshold wins. Transitions are forward-only unless reversal is
//! enabled, so healing never re-equips an earlier attack set.

use rand::Rng;
use tracing::{debug, info};

use crate::game::constants::boss as boss_tuning;
use crate::game::definitions::{BossDefinition, BossPhase};
use crate::game::events::SimEvent;
use crate::game::state::{EntityId, GameState};
use crate::game::systems::attack::{AttackEngine, AttackModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTransition {
    pub from: Option<usize>,
    pub to: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct BossPhaseMachine {
    thresholds: Vec<f32>,
    /// `None` while no phase matches; the default attack set applies
    current: Option<usize>,
    allow_reversal: bool,
}

impl BossPhaseMachine {
    /// New machine, already evaluated at full health
    pub fn new(phases: &[BossPhase], allow_reversal: bool) -> Self {
        let thresholds: Vec<f32> = phases.iter().map(|p| p.threshold).collect();
        let current = Self::select_phase(&thresholds, boss_tuning::INITIAL_HEALTH_FRACTION);
        Self {
            thresholds,
            current,
            allow_reversal,
        }
    }

    #[inline]
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Tightest-fit phase for `fraction`. Equal thresholds go to the earlier phase.
    pub fn select_phase(thresholds: &[f32], fraction: f32) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (index, &threshold) in thresholds.iter().enumerate() {
            if threshold < fraction {
                continue;
            }
            match best {
                Some((_, best_threshold)) if threshold >= best_threshold => {}
                _ => best = Some((index, threshold)),
            }
        }
        best.map(|(index, _)| index)
    }

    /// Re-evaluate after a health change. Returns the transition, if any.
    pub fn evaluate(&mut self, fraction: f32) -> Option<PhaseTransition> {
        if fraction.is_nan() {
            return None;
        }

        let target = Self::select_phase(&self.thresholds, fraction.clamp(0.0, 1.0));
        if target == self.current {
            return None;
        }
        if !self.allow_reversal && self.rank(target) > self.rank(self.current) {
            return None;
        }

        let transition = PhaseTransition {
            from: self.current,
            to: target,
        };
        self.current = target;
        Some(transition)
    }

    /// Threshold of `phase`; no phase ranks above every real one
    fn rank(&self, phase: Option<usize>) -> f32 {
        phase
            .and_then(|index| self.thresholds.get(index).copied())
            .unwrap_or(f32::INFINITY)
    }
}

/// Drives one live boss: phase changes, approach movement and attacks
#[derive(Debug, Clone)]
pub struct BossController {
    entity: EntityId,
    definition: BossDefinition,
    machine: BossPhaseMachine,
    engine: AttackEngine,
}

impl BossController {
    pub fn new(entity: EntityId, definition: BossDefinition, allow_reversal: bool) -> Self {
        let machine = BossPhaseMachine::new(&definition.phases, allow_reversal);
        let engine = build_engine(entity, &definition, machine.current());
        Self {
            entity,
            definition,
            machine,
            engine,
        }
    }

    #[inline]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn phase(&self) -> Option<usize> {
        self.machine.current()
    }

    pub fn engine(&self) -> &AttackEngine {
        &self.engine
    }

    /// Apply a boss health update. A phase change cancels every in-flight
    /// sequence and replaces the attack set before returning.
    pub fn on_health_fraction(&mut self, fraction: f32) -> Vec<SimEvent> {
        let Some(transition) = self.machine.evaluate(fraction) else {
            return Vec::new();
        };

        let mut events = self.engine.cancel_all();
        self.engine = build_engine(self.entity, &self.definition, transition.to);

        info!(
            boss = self.entity,
            name = %self.definition.name,
            from = ?transition.from,
            to = ?transition.to,
            "Boss phase changed"
        );
        events.push(SimEvent::PhaseChanged {
            boss: self.entity,
            from: transition.from,
            to: transition.to,
        });
        events
    }

    pub fn update<R: Rng>(&mut self, state: &mut GameState, rng: &mut R, dt: f32) -> Vec<SimEvent> {
        if !self.engine.is_charging() {
            self.approach(state, dt);
        }
        self.engine.update(state, rng, dt)
    }

    /// Close in on the nearest player until within the preferred distance
    fn approach(&self, state: &mut GameState, dt: f32) {
        let Some(origin) = state.enemy(self.entity).map(|e| e.body.position) else {
            return;
        };
        let Some(target) = state.nearest_alive_player(origin).map(|p| p.position) else {
            return;
        };

        let gap = origin.distance_to(target) - self.definition.preferred_distance;
        if gap <= 0.0 {
            return;
        }

        let speed = self.definition.move_speed * self.engine.modifiers().speed;
        let step = (speed * dt).min(gap);
        if let Some(boss) = state.enemy_mut(self.entity) {
            boss.body.position += origin.direction_to(target) * step;
        }
    }
}

fn build_engine(entity: EntityId, definition: &BossDefinition, phase: Option<usize>) -> AttackEngine {
    let modifiers = AttackModifiers::from_phase(phase.and_then(|index| definition.phases.get(index)));
    let attacks = definition.attacks_for(phase);
    debug!(boss = entity, phase = ?phase, attacks = attacks.len(), "Attack set built");
    AttackEngine::new(entity, attacks, modifiers)
}
