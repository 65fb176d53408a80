//! Read-only content definitions
//!
//! Archetypes, waves, boss phases, attacks, weapons and upgrades. Everything in
//! here is loaded once at session start and never mutated afterwards.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::game::constants::enemy;

/// Identifier of a spawnable kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArchetypeId(pub u32);

impl std::fmt::Display for ArchetypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A registered spawnable template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Archetype {
    pub id: ArchetypeId,
    pub name: String,
    pub kind: ArchetypeKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchetypeKind {
    /// Hostile body (swarm units, summons and bosses)
    Enemy(EnemyTemplate),
    /// Projectile body fired by attacks and weapons
    Projectile(ProjectileTemplate),
}

/// Base stats of a hostile body before difficulty scaling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnemyTemplate {
    pub max_health: f32,
    /// Contact damage per hit
    pub damage: f32,
    pub speed: f32,
    pub radius: f32,
    #[serde(default)]
    pub ranged: Option<RangedProfile>,
}

/// Ranged behavior for enemies that keep their distance and shoot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RangedProfile {
    pub range: f32,
    /// Below this distance the enemy keeps closing in instead of firing
    pub min_range: f32,
    pub fire_interval: f32,
    pub projectile_speed: f32,
    pub damage: f32,
}

impl Default for RangedProfile {
    fn default() -> Self {
        Self {
            range: 8.0,
            min_range: 2.0,
            fire_interval: 2.0,
            projectile_speed: 5.0,
            damage: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectileTemplate {
    pub radius: f32,
    pub lifetime: f32,
}

impl Default for ProjectileTemplate {
    fn default() -> Self {
        Self {
            radius: 0.25,
            lifetime: enemy::PROJECTILE_LIFETIME,
        }
    }
}

/// Lookup table of every archetype known to a session
#[derive(Debug, Clone, Default)]
pub struct ArchetypeRegistry {
    archetypes: HashMap<ArchetypeId, Archetype>,
}

impl ArchetypeRegistry {
    pub fn new(archetypes: &[Archetype]) -> Self {
        Self {
            archetypes: archetypes.iter().map(|a| (a.id, a.clone())).collect(),
        }
    }

    pub fn get(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(&id)
    }

    /// Enemy template for `id`, if registered as an enemy
    pub fn enemy(&self, id: ArchetypeId) -> Option<&EnemyTemplate> {
        match self.archetypes.get(&id).map(|a| &a.kind) {
            Some(ArchetypeKind::Enemy(template)) => Some(template),
            _ => None,
        }
    }

    /// Projectile template for `id`, if registered as a projectile
    pub fn projectile(&self, id: ArchetypeId) -> Option<&ProjectileTemplate> {
        match self.archetypes.get(&id).map(|a| &a.kind) {
            Some(ArchetypeKind::Projectile(template)) => Some(template),
            _ => None,
        }
    }

    /// All enemy archetypes with their templates
    pub fn enemies(&self) -> impl Iterator<Item = (ArchetypeId, &EnemyTemplate)> {
        self.archetypes.values().filter_map(|a| match &a.kind {
            ArchetypeKind::Enemy(template) => Some((a.id, template)),
            ArchetypeKind::Projectile(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }
}

/// A spawn wave, active within a window of elapsed minutes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveDefinition {
    pub name: String,
    pub start_minute: f32,
    /// Open-ended when absent
    #[serde(default)]
    pub end_minute: Option<f32>,
    pub archetypes: Vec<ArchetypeId>,
    pub spawn_weight: f32,
    #[serde(default = "one")]
    pub health_multiplier: f32,
    #[serde(default = "one")]
    pub damage_multiplier: f32,
}

impl WaveDefinition {
    /// Whether the window `[start_minute, end_minute]` contains `minutes`
    pub fn is_active_at(&self, minutes: f32) -> bool {
        self.start_minute <= minutes && self.end_minute.map_or(true, |end| minutes <= end)
    }
}

/// Boss attack kinds with their kind-specific parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackKind {
    /// Fan of `count` projectiles spread over `spread_deg` around the aim
    Projectile { speed: f32, count: u32, spread_deg: f32 },
    /// Locked-direction dash after a windup
    Charge { speed: f32, windup: f32, duration: f32 },
    /// Area impact after a warning delay
    Slam { radius: f32, delay: f32 },
    /// Ring of minions around the boss
    Summon { count: u32, radius: f32 },
}

impl AttackKind {
    pub fn label(&self) -> &'static str {
        match self {
            AttackKind::Projectile { .. } => "projectile",
            AttackKind::Charge { .. } => "charge",
            AttackKind::Slam { .. } => "slam",
            AttackKind::Summon { .. } => "summon",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackDefinition {
    pub name: String,
    pub kind: AttackKind,
    pub cooldown: f32,
    pub range: f32,
    #[serde(default = "one")]
    pub selection_weight: f32,
    pub damage: f32,
    /// Projectile archetype for `Projectile`, minion archetype for `Summon`
    #[serde(default)]
    pub archetype: Option<ArchetypeId>,
}

/// One boss configuration, active below its health threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BossPhase {
    /// Health fraction in `[0, 1]` at or below which this phase applies
    pub threshold: f32,
    #[serde(default)]
    pub attacks: Vec<AttackDefinition>,
    #[serde(default = "one")]
    pub speed_multiplier: f32,
    #[serde(default = "one")]
    pub damage_multiplier: f32,
    #[serde(default = "one")]
    pub cooldown_multiplier: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BossDefinition {
    pub name: String,
    /// Enemy archetype providing the boss body and health
    pub archetype: ArchetypeId,
    pub move_speed: f32,
    /// The boss stops approaching once this close to its target
    pub preferred_distance: f32,
    pub phases: Vec<BossPhase>,
    /// Used when no phase matches, or when the matched phase has no attacks
    #[serde(default)]
    pub default_attacks: Vec<AttackDefinition>,
}

impl BossDefinition {
    /// Attacks for `phase`, falling back to the default set
    pub fn attacks_for(&self, phase: Option<usize>) -> &[AttackDefinition] {
        match phase.and_then(|index| self.phases.get(index)) {
            Some(p) if !p.attacks.is_empty() => &p.attacks,
            _ => &self.default_attacks,
        }
    }
}

/// Player weapon kinds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    /// Single projectile at the nearest target
    Projectile,
    /// Projectile that passes through `pierce` extra targets
    Piercing { pierce: u32 },
    /// Instant hit on the nearest target
    Area,
    /// Orbitals revolving around the owner with per-target contact cooldown
    Orbit { count: u32, angular_speed_deg: f32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponDefinition {
    pub name: String,
    pub kind: WeaponKind,
    pub cooldown: f32,
    /// Targeting range, or orbit radius for `Orbit`
    pub range: f32,
    pub damage: f32,
    #[serde(default)]
    pub projectile_speed: f32,
    #[serde(default)]
    pub projectile: Option<ArchetypeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeEffect {
    /// Adds to the owner's global damage multiplier
    DamageMultiplier(f32),
    /// Adds the named weapon to the owner's loadout
    AddWeapon(String),
    MaxHealth(f32),
    Heal(f32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeDefinition {
    pub name: String,
    pub effect: UpgradeEffect,
}

fn one() -> f32 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave(start: f32, end: Option<f32>) -> WaveDefinition {
        WaveDefinition {
            name: "w".into(),
            start_minute: start,
            end_minute: end,
            archetypes: vec![ArchetypeId(1)],
            spawn_weight: 1.0,
            health_multiplier: 1.0,
            damage_multiplier: 1.0,
        }
    }

    #[test]
    fn test_wave_window_inclusive() {
        let w = wave(1.0, Some(3.0));
        assert!(!w.is_active_at(0.99));
        assert!(w.is_active_at(1.0));
        assert!(w.is_active_at(3.0));
        assert!(!w.is_active_at(3.01));
    }

    #[test]
    fn test_wave_open_ended() {
        let w = wave(2.0, None);
        assert!(w.is_active_at(500.0));
        assert!(!w.is_active_at(1.0));
    }

    #[test]
    fn test_registry_kind_lookup() {
        let registry = ArchetypeRegistry::new(&[
            Archetype {
                id: ArchetypeId(1),
                name: "grunt".into(),
                kind: ArchetypeKind::Enemy(EnemyTemplate {
                    max_health: 10.0,
                    damage: 1.0,
                    speed: 1.0,
                    radius: 0.5,
                    ranged: None,
                }),
            },
            Archetype {
                id: ArchetypeId(2),
                name: "orb".into(),
                kind: ArchetypeKind::Projectile(ProjectileTemplate::default()),
            },
        ]);

        assert!(registry.enemy(ArchetypeId(1)).is_some());
        assert!(registry.enemy(ArchetypeId(2)).is_none());
        assert!(registry.projectile(ArchetypeId(2)).is_some());
        assert!(registry.get(ArchetypeId(3)).is_none());
        assert_eq!(registry.enemies().count(), 1);
    }

    #[test]
    fn test_boss_attacks_fall_back_to_default() {
        let attack = AttackDefinition {
            name: "volley".into(),
            kind: AttackKind::Projectile { speed: 8.0, count: 1, spread_deg: 30.0 },
            cooldown: 3.0,
            range: 10.0,
            selection_weight: 1.0,
            damage: 20.0,
            archetype: None,
        };
        let boss = BossDefinition {
            name: "b".into(),
            archetype: ArchetypeId(9),
            move_speed: 2.0,
            preferred_distance: 5.0,
            phases: vec![BossPhase {
                threshold: 1.0,
                attacks: vec![],
                speed_multiplier: 1.0,
                damage_multiplier: 1.0,
                cooldown_multiplier: 1.0,
            }],
            default_attacks: vec![attack],
        };

        assert_eq!(boss.attacks_for(Some(0)).len(), 1);
        assert_eq!(boss.attacks_for(None).len(), 1);
        assert_eq!(boss.attacks_for(Some(7)).len(), 1);
    }
}
