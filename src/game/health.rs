//! Health records and the damage router
//!
//! Every hit in the simulation goes through `DamageRouter`, which mutates the
//! target's `HealthRecord` and appends a `HealthChange` to the state's log.
//! The session drains that log after each damaging stage to run death handling
//! and boss phase re-evaluation.

use serde::{Deserialize, Serialize};

use crate::game::spatial::EntityRef;
use crate::game::state::GameState;

/// Current and maximum health of one entity.
///
/// `0 <= current <= max` holds after every mutation. Reaching zero is terminal:
/// the kill is reported exactly once and further damage or healing is ignored
/// until `reset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    current: f32,
    max: f32,
    dead: bool,
}

/// Result of a single `take_damage` call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageOutcome {
    /// Health actually removed
    pub applied: f32,
    /// True only for the hit that brought health to zero
    pub killed: bool,
}

impl DamageOutcome {
    const NONE: DamageOutcome = DamageOutcome {
        applied: 0.0,
        killed: false,
    };
}

impl HealthRecord {
    pub fn new(max: f32) -> Self {
        let max = sanitize(max);
        Self {
            current: max,
            max,
            dead: max <= 0.0,
        }
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.current
    }

    #[inline]
    pub fn max(&self) -> f32 {
        self.max
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Current health as a fraction of max in `[0, 1]`
    pub fn fraction(&self) -> f32 {
        if self.max <= 0.0 {
            0.0
        } else {
            (self.current / self.max).clamp(0.0, 1.0)
        }
    }

    pub fn take_damage(&mut self, amount: f32) -> DamageOutcome {
        let amount = sanitize(amount);
        if self.dead || amount == 0.0 {
            return DamageOutcome::NONE;
        }

        let applied = amount.min(self.current);
        self.current -= applied;
        if self.current <= 0.0 {
            self.current = 0.0;
            self.dead = true;
            return DamageOutcome {
                applied,
                killed: true,
            };
        }

        DamageOutcome {
            applied,
            killed: false,
        }
    }

    /// Restore up to `amount` health, never above max. Returns the amount healed.
    pub fn heal(&mut self, amount: f32) -> f32 {
        let amount = sanitize(amount);
        if self.dead {
            return 0.0;
        }
        let healed = amount.min(self.max - self.current);
        self.current += healed;
        healed
    }

    /// Raise max health by `amount`; a living entity gains the same amount of current health
    pub fn increase_max(&mut self, amount: f32) {
        let amount = sanitize(amount);
        self.max += amount;
        if !self.dead {
            self.current = (self.current + amount).min(self.max);
        }
    }

    /// Back to full health and alive
    pub fn reset(&mut self) {
        self.current = self.max;
        self.dead = self.max <= 0.0;
    }

    /// Replace max health and refill
    pub fn set_max(&mut self, max: f32) {
        self.max = sanitize(max);
        self.reset();
    }
}

impl Default for HealthRecord {
    fn default() -> Self {
        Self::new(crate::game::constants::player::MAX_HEALTH)
    }
}

#[inline]
fn sanitize(amount: f32) -> f32 {
    if amount.is_finite() && amount > 0.0 {
        amount
    } else {
        0.0
    }
}

/// One health mutation made through the router
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthChange {
    pub target: EntityRef,
    /// Negative for damage, positive for healing
    pub delta: f32,
    pub fraction_after: f32,
    pub killed: bool,
}

/// Routes damage and healing to whatever entity a reference resolves to
pub struct DamageRouter;

impl DamageRouter {
    /// Apply `amount` damage to `target`.
    ///
    /// A target that no longer exists or is already dead is a miss and returns `None`.
    pub fn apply(state: &mut GameState, target: EntityRef, amount: f32) -> Option<HealthChange> {
        let health = state.health_mut(target)?;
        if health.is_dead() {
            return None;
        }

        let outcome = health.take_damage(amount);
        let change = HealthChange {
            target,
            delta: -outcome.applied,
            fraction_after: health.fraction(),
            killed: outcome.killed,
        };
        state.damage_log.push(change);
        Some(change)
    }

    /// Heal `target` by up to `amount`
    pub fn heal(state: &mut GameState, target: EntityRef, amount: f32) -> Option<HealthChange> {
        let health = state.health_mut(target)?;
        let healed = health.heal(amount);
        if healed <= 0.0 {
            return None;
        }

        let change = HealthChange {
            target,
            delta: healed,
            fraction_after: health.fraction(),
            killed: false,
        };
        state.damage_log.push(change);
        Some(change)
    }
}
