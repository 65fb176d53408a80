//! WeaponEngine: player-owned weapons
//!
//! Discrete weapons fire automatically at the nearest hostile target whenever
//! their cooldown is ready; the cooldown is only consumed when a target was
//! found. Orbit weapons have no fire event: their orbitals revolve every tick
//! and damage on contact, throttled per target.

use smallvec::SmallVec;
use thiserror::Error;
use tracing::warn;

use crate::game::constants::weapon as weapon_tuning;
use crate::game::cooldown::{Cooldown, CooldownScheduler};
use crate::game::definitions::{WeaponDefinition, WeaponKind};
use crate::game::events::SimEvent;
use crate::game::health::DamageRouter;
use crate::game::spatial::{EntityRef, SpatialEntity, SpatialQuery};
use crate::game::state::{GameState, PlayerId, ProjectileOwner, ProjectileSpec};
use crate::util::vec2::Vec2;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FireError {
    #[error("no weapon in slot {0}")]
    NoSlot(usize),
    #[error("weapon on cooldown for {remaining:.2}s")]
    OnCooldown { remaining: f32 },
    #[error("no target in range")]
    NoTarget,
    #[error("orbit weapons fire continuously")]
    Continuous,
}

#[derive(Debug, Clone)]
pub struct OrbitState {
    /// Angle of the first orbital in degrees
    pub angle_deg: f32,
    /// Shared by every orbital of the weapon
    hit_cooldowns: CooldownScheduler<EntityRef>,
}

#[derive(Debug, Clone)]
pub struct WeaponInstance {
    pub definition: WeaponDefinition,
    cooldown: Cooldown,
    orbit: Option<OrbitState>,
}

impl WeaponInstance {
    pub fn new(definition: WeaponDefinition) -> Self {
        let orbit = match definition.kind {
            WeaponKind::Orbit { .. } => Some(OrbitState {
                angle_deg: 0.0,
                hit_cooldowns: CooldownScheduler::new(),
            }),
            _ => None,
        };
        Self {
            definition,
            cooldown: Cooldown::ready(),
            orbit,
        }
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.cooldown.is_ready()
    }

    pub fn cooldown_remaining(&self) -> f32 {
        self.cooldown.remaining()
    }

    /// Current orbital centers around `origin`; empty for discrete weapons
    pub fn orbital_positions(&self, origin: Vec2) -> SmallVec<[Vec2; 8]> {
        match (&self.orbit, self.definition.kind) {
            (Some(orbit), WeaponKind::Orbit { count, .. }) => {
                let count = count.max(1);
                (0..count)
                    .map(|i| {
                        let angle = orbit.angle_deg + 360.0 / count as f32 * i as f32;
                        Vec2::on_circle(origin, self.definition.range, angle.to_radians())
                    })
                    .collect()
            }
            _ => SmallVec::new(),
        }
    }
}

/// Every weapon a player holds, plus the upgrade-driven damage multiplier
#[derive(Debug, Clone)]
pub struct WeaponLoadout {
    owner: PlayerId,
    weapons: Vec<WeaponInstance>,
    /// Only ever increases
    damage_multiplier: f32,
}

impl WeaponLoadout {
    pub fn new(owner: PlayerId) -> Self {
        Self {
            owner,
            weapons: Vec::new(),
            damage_multiplier: 1.0,
        }
    }

    pub fn owner(&self) -> PlayerId {
        self.owner
    }

    pub fn weapons(&self) -> &[WeaponInstance] {
        &self.weapons
    }

    pub fn damage_multiplier(&self) -> f32 {
        self.damage_multiplier
    }

    pub fn add_weapon(&mut self, definition: WeaponDefinition) {
        self.weapons.push(WeaponInstance::new(definition));
    }

    /// Raise the damage multiplier. Non-positive amounts are ignored.
    pub fn increase_damage_multiplier(&mut self, amount: f32) {
        if amount > 0.0 && amount.is_finite() {
            self.damage_multiplier += amount;
        }
    }

    pub fn update(&mut self, state: &mut GameState, dt: f32) -> Vec<SimEvent> {
        let mut events = Vec::new();
        let Some(origin) = owner_position(state, self.owner) else {
            return events;
        };

        for index in 0..self.weapons.len() {
            self.weapons[index].cooldown.tick(dt);
            match self.weapons[index].definition.kind {
                WeaponKind::Orbit { .. } => self.revolve(index, state, origin, dt),
                _ if self.weapons[index].is_ready() => {
                    if self.attack(index, state, origin, &mut events) {
                        let weapon = &mut self.weapons[index];
                        weapon.cooldown.trigger(weapon.definition.cooldown);
                    }
                }
                _ => {}
            }
        }
        events
    }

    /// Fire the weapon in `slot` on request, if it is ready and has a target
    pub fn fire(&mut self, slot: usize, state: &mut GameState) -> Result<Vec<SimEvent>, FireError> {
        let weapon = self.weapons.get(slot).ok_or(FireError::NoSlot(slot))?;
        if matches!(weapon.definition.kind, WeaponKind::Orbit { .. }) {
            return Err(FireError::Continuous);
        }
        if !weapon.is_ready() {
            return Err(FireError::OnCooldown {
                remaining: weapon.cooldown_remaining(),
            });
        }
        let origin = owner_position(state, self.owner).ok_or(FireError::NoTarget)?;

        let mut events = Vec::new();
        if !self.attack(slot, state, origin, &mut events) {
            return Err(FireError::NoTarget);
        }
        let weapon = &mut self.weapons[slot];
        weapon.cooldown.trigger(weapon.definition.cooldown);
        Ok(events)
    }

    /// One discrete attack. Returns whether the attack happened.
    fn attack(&self, index: usize, state: &mut GameState, origin: Vec2, events: &mut Vec<SimEvent>) -> bool {
        let definition = &self.weapons[index].definition;
        let hostile = hostile_filter(self.owner, state.pvp_active);
        // The grid may still list bodies killed earlier in this stage
        let live = |entity: &SpatialEntity| hostile(entity) && state.is_targetable(entity.id);
        let Some(target) = state.grid.find_nearest(origin, definition.range, &live) else {
            return false;
        };
        let Some(target_position) = state.position_of(target) else {
            return false;
        };
        let damage = definition.damage * self.damage_multiplier;

        let pierce = match definition.kind {
            WeaponKind::Area => {
                DamageRouter::apply(state, target, damage);
                return true;
            }
            WeaponKind::Piercing { pierce } => pierce,
            WeaponKind::Projectile => 0,
            WeaponKind::Orbit { .. } => return false,
        };

        let Some((radius, lifetime)) = definition
            .projectile
            .and_then(|a| state.archetypes.projectile(a))
            .map(|t| (t.radius, t.lifetime))
        else {
            // Counted as fired so a broken weapon does not retry every tick
            warn!(weapon = %definition.name, "Weapon without a projectile archetype");
            return true;
        };

        let position = origin;
        let velocity = origin.direction_to(target_position) * definition.projectile_speed;
        let projectile = state.add_projectile(ProjectileSpec {
            owner: ProjectileOwner::Player(self.owner),
            position,
            velocity,
            radius,
            damage,
            lifetime,
            pierce,
        });
        events.push(SimEvent::ProjectileFired {
            projectile,
            position,
            velocity,
            hostile: false,
        });
        true
    }

    fn revolve(&mut self, index: usize, state: &mut GameState, origin: Vec2, dt: f32) {
        let damage = self.weapons[index].definition.damage * self.damage_multiplier;
        let hostile = hostile_filter(self.owner, state.pvp_active);
        let weapon = &mut self.weapons[index];
        let WeaponKind::Orbit { angular_speed_deg, .. } = weapon.definition.kind else {
            return;
        };

        if let Some(orbit) = weapon.orbit.as_mut() {
            orbit.hit_cooldowns.advance(dt);
            orbit.angle_deg = (orbit.angle_deg + angular_speed_deg * dt).rem_euclid(360.0);
        }

        for position in weapon.orbital_positions(origin) {
            let Some(orbit) = weapon.orbit.as_mut() else {
                return;
            };
            for target in state.grid.find_all(position, weapon_tuning::ORBITAL_RADIUS, &hostile) {
                if !state.is_targetable(target) {
                    continue;
                }
                if orbit.hit_cooldowns.try_consume(target, weapon_tuning::ORBIT_HIT_COOLDOWN) {
                    DamageRouter::apply(state, target, damage);
                }
            }
        }
    }
}

/// Enemies always; other players only while PvP is active, never the owner
fn hostile_filter(owner: PlayerId, pvp_active: bool) -> impl Fn(&SpatialEntity) -> bool {
    move |entity: &SpatialEntity| match entity.id {
        EntityRef::Enemy(_) => true,
        EntityRef::Player(id) => pvp_active && id != owner,
    }
}

fn owner_position(state: &GameState, owner: PlayerId) -> Option<Vec2> {
    state.get_player(owner).filter(|p| p.alive).map(|p| p.position)
}
