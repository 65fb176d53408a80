use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::game::constants::{encounter, intent, loot, pool, sim, spawn, weapon as weapon_tuning};
use crate::game::definitions::{
    Archetype, ArchetypeId, ArchetypeKind, AttackDefinition, AttackKind, BossDefinition, BossPhase,
    EnemyTemplate, ProjectileTemplate, RangedProfile, UpgradeDefinition, UpgradeEffect, WaveDefinition,
    WeaponDefinition, WeaponKind,
};
use crate::game::state::ItemKind;
use crate::util::vec2::Vec2;

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse definitions: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("unknown archetype {archetype} referenced by {context}")]
    UnknownArchetype { archetype: ArchetypeId, context: String },
    #[error("unknown weapon '{name}' referenced by {context}")]
    UnknownWeapon { name: String, context: String },
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Snapshots broadcast per second
    pub snapshot_rate: u32,
    /// Optional JSON definitions file; builtin content when absent
    pub definitions_path: Option<PathBuf>,
    /// Fixed RNG seed for reproducible sessions
    pub rng_seed: Option<u64>,
    /// Port for the Prometheus endpoint
    pub metrics_port: u16,
    /// Capacity of the observer intent queue
    pub intent_buffer_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: sim::TICK_RATE,
            snapshot_rate: sim::SNAPSHOT_RATE,
            definitions_path: None,
            rng_seed: None,
            metrics_port: 9090,
            intent_buffer_capacity: intent::BUFFER_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(rate) = std::env::var("TICK_RATE") {
            match rate.parse::<u32>() {
                Ok(parsed) if (1..=240).contains(&parsed) => config.tick_rate = parsed,
                Ok(_) => tracing::warn!("TICK_RATE must be 1-240, using default"),
                Err(_) => tracing::warn!("Invalid TICK_RATE '{}', using default", rate),
            }
        }

        if let Ok(rate) = std::env::var("SNAPSHOT_RATE") {
            match rate.parse::<u32>() {
                Ok(parsed) if parsed > 0 => config.snapshot_rate = parsed,
                Ok(_) => tracing::warn!("SNAPSHOT_RATE must be > 0, using default"),
                Err(_) => tracing::warn!("Invalid SNAPSHOT_RATE '{}', using default", rate),
            }
        }

        if let Ok(path) = std::env::var("DEFINITIONS_PATH") {
            if !path.is_empty() {
                config.definitions_path = Some(PathBuf::from(path));
            }
        }

        if let Ok(seed) = std::env::var("RNG_SEED") {
            if let Ok(parsed) = seed.parse::<u64>() {
                config.rng_seed = Some(parsed);
            } else {
                tracing::warn!("Invalid RNG_SEED '{}', using random seed", seed);
            }
        }

        if let Ok(port) = std::env::var("METRICS_PORT") {
            match port.parse::<u16>() {
                Ok(parsed) if parsed > 0 => config.metrics_port = parsed,
                Ok(_) => tracing::warn!("METRICS_PORT must be > 0, using default"),
                Err(_) => tracing::warn!("Invalid METRICS_PORT '{}', using default", port),
            }
        }

        if let Ok(capacity) = std::env::var("INTENT_BUFFER_CAPACITY") {
            match capacity.parse::<usize>() {
                Ok(parsed) if parsed > 0 => config.intent_buffer_capacity = parsed,
                Ok(_) => tracing::warn!("INTENT_BUFFER_CAPACITY must be > 0, using default"),
                Err(_) => tracing::warn!("Invalid INTENT_BUFFER_CAPACITY '{}', using default", capacity),
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::Invalid("tick_rate cannot be 0".into()));
        }
        if self.snapshot_rate == 0 {
            return Err(ConfigError::Invalid("snapshot_rate cannot be 0".into()));
        }
        if self.snapshot_rate > self.tick_rate {
            return Err(ConfigError::Invalid("snapshot_rate cannot exceed tick_rate".into()));
        }
        if self.intent_buffer_capacity == 0 {
            return Err(ConfigError::Invalid("intent_buffer_capacity must be at least 1".into()));
        }
        Ok(())
    }

    /// Ticks between snapshots
    pub fn snapshot_interval(&self) -> u64 {
        (self.tick_rate / self.snapshot_rate.max(1)).max(1) as u64
    }

    /// Seconds per tick
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }
}

/// Where spawned units are placed relative to their assigned player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SpawnPlacement {
    /// Random angle on a circle of `radius`
    Ring { radius: f32 },
    /// Random point just outside a reference view rectangle
    ViewEdge {
        half_height: f32,
        aspect: f32,
        buffer: f32,
    },
}

/// SpawnDirector tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    pub interval: f32,
    pub initial_delay: f32,
    pub base_burst: u32,
    pub difficulty_multiplier: f32,
    pub base_max_enemies: u32,
    pub extra_cap_per_minute: f32,
    pub absolute_max_enemies: u32,
    pub placement: SpawnPlacement,
    pub clamp_to_map: bool,
    pub map_half_extents: Vec2,
    pub map_padding: f32,
    /// Used when no wave is active at the current minute
    pub fallback_archetype: Option<ArchetypeId>,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            interval: spawn::INTERVAL,
            initial_delay: spawn::INITIAL_DELAY,
            base_burst: spawn::BASE_BURST,
            difficulty_multiplier: spawn::DIFFICULTY_MULTIPLIER,
            base_max_enemies: spawn::BASE_MAX_ENEMIES,
            extra_cap_per_minute: spawn::EXTRA_CAP_PER_MINUTE,
            absolute_max_enemies: spawn::ABSOLUTE_MAX_ENEMIES,
            placement: SpawnPlacement::Ring {
                radius: spawn::RING_RADIUS,
            },
            clamp_to_map: true,
            map_half_extents: Vec2::new(spawn::MAP_HALF_EXTENT, spawn::MAP_HALF_EXTENT),
            map_padding: spawn::MAP_PADDING,
            fallback_archetype: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrewarmEntry {
    pub archetype: ArchetypeId,
    pub count: usize,
}

/// EntityPool tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_pool_size: usize,
    pub prewarm: Vec<PrewarmEntry>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_pool_size: pool::MAX_POOL_SIZE,
            prewarm: Vec::new(),
        }
    }
}

/// Boss and PvP encounter tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncounterConfig {
    /// Session seconds before the boss arrives on its own; never when absent
    pub boss_timer: Option<f32>,
    /// Session seconds before PvP is forced; never when absent
    pub pvp_timer: Option<f32>,
    /// Boss definition name; the first boss when absent
    pub boss: Option<String>,
    pub boss_arena: Vec2,
    pub pvp_arena: Vec2,
    pub pvp_radius: f32,
}

impl Default for EncounterConfig {
    fn default() -> Self {
        Self {
            boss_timer: Some(encounter::BOSS_TIMER),
            pvp_timer: Some(encounter::PVP_TIMER),
            boss: None,
            boss_arena: Vec2::ZERO,
            pvp_arena: Vec2::ZERO,
            pvp_radius: encounter::PVP_TELEPORT_RADIUS,
        }
    }
}

/// Loot tables and the coin economy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LootConfig {
    pub coin_value: u32,
    pub drop_chance: f32,
    pub rare_drop_chance: f32,
    /// Items a rare drop picks from; no rare drops when empty
    pub rare_items: Vec<ItemKind>,
    pub pickup_radius: f32,
    pub magnet_radius: f32,
    pub magnet_speed: f32,
    /// Coins for the first upgrade offer
    pub upgrade_cost: u32,
    /// Added to the cost after every offer
    pub upgrade_cost_growth: u32,
}

impl Default for LootConfig {
    fn default() -> Self {
        Self {
            coin_value: loot::COIN_VALUE,
            drop_chance: loot::DROP_CHANCE,
            rare_drop_chance: loot::RARE_DROP_CHANCE,
            rare_items: vec![ItemKind::BossSummon],
            pickup_radius: loot::PICKUP_RADIUS,
            magnet_radius: loot::MAGNET_RADIUS,
            magnet_speed: loot::MAGNET_SPEED,
            upgrade_cost: loot::UPGRADE_COST,
            upgrade_cost_growth: loot::UPGRADE_COST_GROWTH,
        }
    }
}

/// All session content, loaded once and shared read-only
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameDefinitions {
    pub archetypes: Vec<Archetype>,
    pub waves: Vec<WaveDefinition>,
    pub bosses: Vec<BossDefinition>,
    pub weapons: Vec<WeaponDefinition>,
    pub upgrades: Vec<UpgradeDefinition>,
    /// Weapon every player starts with
    pub starting_weapon: Option<String>,
    pub spawn: SpawnConfig,
    pub pool: PoolConfig,
    pub encounter: EncounterConfig,
    pub loot: LootConfig,
    /// When false, healing never moves a boss back to an earlier phase
    pub allow_phase_reversal: bool,
}

impl GameDefinitions {
    /// Parse and validate a JSON definitions file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let definitions = Self::from_json(&raw)?;
        tracing::info!(
            "Loaded definitions from {}: {} archetypes, {} waves, {} bosses, {} weapons",
            path.display(),
            definitions.archetypes.len(),
            definitions.waves.len(),
            definitions.bosses.len(),
            definitions.weapons.len()
        );
        Ok(definitions)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let definitions: Self = serde_json::from_str(raw)?;
        definitions.validate()?;
        Ok(definitions)
    }

    pub fn weapon(&self, name: &str) -> Option<&WeaponDefinition> {
        self.weapons.iter().find(|w| w.name == name)
    }

    pub fn boss(&self, name: &str) -> Option<&BossDefinition> {
        self.bosses.iter().find(|b| b.name == name)
    }

    /// The boss used by the boss encounter
    pub fn encounter_boss(&self) -> Option<&BossDefinition> {
        match &self.encounter.boss {
            Some(name) => self.boss(name),
            None => self.bosses.first(),
        }
    }

    fn archetype_kind(&self, id: ArchetypeId) -> Option<&ArchetypeKind> {
        self.archetypes.iter().find(|a| a.id == id).map(|a| &a.kind)
    }

    fn require_enemy(&self, id: ArchetypeId, context: &str) -> Result<(), ConfigError> {
        match self.archetype_kind(id) {
            Some(ArchetypeKind::Enemy(_)) => Ok(()),
            _ => Err(ConfigError::UnknownArchetype {
                archetype: id,
                context: context.to_string(),
            }),
        }
    }

    fn require_projectile(&self, id: ArchetypeId, context: &str) -> Result<(), ConfigError> {
        match self.archetype_kind(id) {
            Some(ArchetypeKind::Projectile(_)) => Ok(()),
            _ => Err(ConfigError::UnknownArchetype {
                archetype: id,
                context: context.to_string(),
            }),
        }
    }

    fn validate_attack(&self, attack: &AttackDefinition, context: &str) -> Result<(), ConfigError> {
        if attack.cooldown < 0.0 || attack.range < 0.0 || attack.selection_weight < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "{}: attack '{}' has negative cooldown, range or weight",
                context, attack.name
            )));
        }
        if let Some(archetype) = attack.archetype {
            let context = format!("{} attack '{}'", context, attack.name);
            match attack.kind {
                AttackKind::Projectile { .. } => self.require_projectile(archetype, &context)?,
                AttackKind::Summon { .. } => self.require_enemy(archetype, &context)?,
                AttackKind::Charge { .. } | AttackKind::Slam { .. } => {}
            }
        }
        Ok(())
    }

    /// Check value ranges and cross references
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = hashbrown::HashSet::new();
        for archetype in &self.archetypes {
            if !seen.insert(archetype.id) {
                return Err(ConfigError::Invalid(format!("duplicate archetype {}", archetype.id)));
            }
        }

        let spawn = &self.spawn;
        if spawn.interval <= 0.0 {
            return Err(ConfigError::Invalid("spawn.interval must be > 0".into()));
        }
        if spawn.absolute_max_enemies < spawn.base_max_enemies {
            return Err(ConfigError::Invalid(
                "spawn.absolute_max_enemies cannot be below base_max_enemies".into(),
            ));
        }
        if spawn.difficulty_multiplier < 0.0 || spawn.extra_cap_per_minute < 0.0 {
            return Err(ConfigError::Invalid("spawn growth rates cannot be negative".into()));
        }
        if let Some(fallback) = spawn.fallback_archetype {
            self.require_enemy(fallback, "spawn.fallback_archetype")?;
        }

        for entry in &self.pool.prewarm {
            self.require_enemy(entry.archetype, "pool.prewarm")?;
        }

        for wave in &self.waves {
            if wave.spawn_weight < 0.0 {
                return Err(ConfigError::Invalid(format!("wave '{}' has negative weight", wave.name)));
            }
            if let Some(end) = wave.end_minute {
                if end < wave.start_minute {
                    return Err(ConfigError::Invalid(format!("wave '{}' ends before it starts", wave.name)));
                }
            }
            for archetype in &wave.archetypes {
                self.require_enemy(*archetype, &format!("wave '{}'", wave.name))?;
            }
        }

        for boss_def in &self.bosses {
            let context = format!("boss '{}'", boss_def.name);
            self.require_enemy(boss_def.archetype, &context)?;
            for phase in &boss_def.phases {
                if !(0.0..=1.0).contains(&phase.threshold) {
                    return Err(ConfigError::Invalid(format!(
                        "{}: phase threshold {} outside [0, 1]",
                        context, phase.threshold
                    )));
                }
                for attack in &phase.attacks {
                    self.validate_attack(attack, &context)?;
                }
            }
            for attack in &boss_def.default_attacks {
                self.validate_attack(attack, &context)?;
            }
        }

        for weapon in &self.weapons {
            if weapon.cooldown < 0.0 || weapon.range < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "weapon '{}' has negative cooldown or range",
                    weapon.name
                )));
            }
            if let Some(projectile) = weapon.projectile {
                self.require_projectile(projectile, &format!("weapon '{}'", weapon.name))?;
            }
        }

        for upgrade in &self.upgrades {
            if let UpgradeEffect::AddWeapon(name) = &upgrade.effect {
                if self.weapon(name).is_none() {
                    return Err(ConfigError::UnknownWeapon {
                        name: name.clone(),
                        context: format!("upgrade '{}'", upgrade.name),
                    });
                }
            }
        }

        if let Some(name) = &self.starting_weapon {
            if self.weapon(name).is_none() {
                return Err(ConfigError::UnknownWeapon {
                    name: name.clone(),
                    context: "starting_weapon".into(),
                });
            }
        }

        let loot = &self.loot;
        if !(0.0..=1.0).contains(&loot.drop_chance) || !(0.0..=1.0).contains(&loot.rare_drop_chance) {
            return Err(ConfigError::Invalid("loot drop chances must be within [0, 1]".into()));
        }
        if loot.pickup_radius < 0.0 || loot.magnet_radius < 0.0 || loot.magnet_speed < 0.0 {
            return Err(ConfigError::Invalid("loot radii and speed cannot be negative".into()));
        }
        if loot.upgrade_cost == 0 {
            return Err(ConfigError::Invalid("loot.upgrade_cost must be at least 1".into()));
        }

        if let Some(name) = &self.encounter.boss {
            if self.boss(name).is_none() {
                return Err(ConfigError::Invalid(format!("encounter.boss '{}' is not defined", name)));
            }
        }

        Ok(())
    }

    /// Complete default content so the server runs without a definitions file
    pub fn builtin() -> Self {
        const CRAWLER: ArchetypeId = ArchetypeId(1);
        const BRUTE: ArchetypeId = ArchetypeId(2);
        const SPITTER: ArchetypeId = ArchetypeId(3);
        const WARDEN: ArchetypeId = ArchetypeId(10);
        const EMBER: ArchetypeId = ArchetypeId(100);
        const BOLT: ArchetypeId = ArchetypeId(101);

        let enemy = |id, name: &str, template| Archetype {
            id,
            name: name.to_string(),
            kind: ArchetypeKind::Enemy(template),
        };
        let projectile = |id, name: &str, radius, lifetime| Archetype {
            id,
            name: name.to_string(),
            kind: ArchetypeKind::Projectile(ProjectileTemplate { radius, lifetime }),
        };

        let archetypes = vec![
            enemy(
                CRAWLER,
                "crawler",
                EnemyTemplate {
                    max_health: 20.0,
                    damage: 5.0,
                    speed: 3.0,
                    radius: 0.5,
                    ranged: None,
                },
            ),
            enemy(
                BRUTE,
                "brute",
                EnemyTemplate {
                    max_health: 60.0,
                    damage: 12.0,
                    speed: 2.0,
                    radius: 0.8,
                    ranged: None,
                },
            ),
            enemy(
                SPITTER,
                "spitter",
                EnemyTemplate {
                    max_health: 15.0,
                    damage: 4.0,
                    speed: 2.5,
                    radius: 0.5,
                    ranged: Some(RangedProfile::default()),
                },
            ),
            enemy(
                WARDEN,
                "warden",
                EnemyTemplate {
                    max_health: 2000.0,
                    damage: 20.0,
                    speed: 2.5,
                    radius: 2.0,
                    ranged: None,
                },
            ),
            projectile(EMBER, "ember", 0.4, 5.0),
            projectile(BOLT, "bolt", 0.2, 3.0),
        ];

        let wave = |name: &str, start, end, archetypes: Vec<ArchetypeId>, weight, health| WaveDefinition {
            name: name.to_string(),
            start_minute: start,
            end_minute: end,
            archetypes,
            spawn_weight: weight,
            health_multiplier: health,
            damage_multiplier: 1.0,
        };
        let waves = vec![
            wave("opening", 0.0, Some(3.0), vec![CRAWLER], 1.0, 1.0),
            wave("pressure", 2.0, None, vec![CRAWLER, BRUTE], 2.0, 1.2),
            wave("artillery", 4.0, None, vec![SPITTER], 1.0, 1.0),
        ];

        let attack = |name: &str, kind, cooldown, range, weight, damage, archetype| AttackDefinition {
            name: name.to_string(),
            kind,
            cooldown,
            range,
            selection_weight: weight,
            damage,
            archetype,
        };
        let volley = attack(
            "volley",
            AttackKind::Projectile {
                speed: 8.0,
                count: 1,
                spread_deg: 30.0,
            },
            3.0,
            12.0,
            1.0,
            20.0,
            Some(EMBER),
        );
        let fan = attack(
            "fan",
            AttackKind::Projectile {
                speed: 8.0,
                count: 5,
                spread_deg: 60.0,
            },
            3.0,
            12.0,
            2.0,
            15.0,
            Some(EMBER),
        );
        let charge = attack(
            "charge",
            AttackKind::Charge {
                speed: 15.0,
                windup: 0.5,
                duration: 1.0,
            },
            5.0,
            14.0,
            1.0,
            25.0,
            None,
        );
        let slam = attack(
            "slam",
            AttackKind::Slam { radius: 4.0, delay: 0.8 },
            4.0,
            5.0,
            2.0,
            30.0,
            None,
        );
        let summon = attack(
            "summon",
            AttackKind::Summon { count: 3, radius: 3.0 },
            8.0,
            20.0,
            1.0,
            0.0,
            Some(CRAWLER),
        );

        let phase = |threshold, attacks, speed, damage, cooldown| BossPhase {
            threshold,
            attacks,
            speed_multiplier: speed,
            damage_multiplier: damage,
            cooldown_multiplier: cooldown,
        };
        let bosses = vec![BossDefinition {
            name: "warden".to_string(),
            archetype: WARDEN,
            move_speed: 2.5,
            preferred_distance: 6.0,
            phases: vec![
                phase(1.0, vec![volley.clone(), slam.clone()], 1.0, 1.0, 1.0),
                phase(0.5, vec![volley.clone(), charge.clone(), slam.clone()], 1.2, 1.2, 0.9),
                phase(0.25, vec![fan, charge, slam, summon], 1.4, 1.5, 0.75),
            ],
            default_attacks: vec![volley],
        }];

        let weapon = |name: &str, kind, cooldown, range, damage, speed, projectile| WeaponDefinition {
            name: name.to_string(),
            kind,
            cooldown,
            range,
            damage,
            projectile_speed: speed,
            projectile,
        };
        let weapons = vec![
            weapon("bolt_caster", WeaponKind::Projectile, 1.0, 10.0, 10.0, 12.0, Some(BOLT)),
            weapon("lance", WeaponKind::Piercing { pierce: 2 }, 1.5, 12.0, 14.0, 14.0, Some(BOLT)),
            weapon("shock", WeaponKind::Area, 2.0, 6.0, 18.0, 0.0, None),
            weapon(
                "orbitals",
                WeaponKind::Orbit {
                    count: 3,
                    angular_speed_deg: weapon_tuning::ORBIT_ANGULAR_SPEED_DEG,
                },
                0.0,
                2.5,
                8.0,
                0.0,
                None,
            ),
        ];

        let upgrade = |name: &str, effect| UpgradeDefinition {
            name: name.to_string(),
            effect,
        };
        let upgrades = vec![
            upgrade("sharpened", UpgradeEffect::DamageMultiplier(0.25)),
            upgrade("lance", UpgradeEffect::AddWeapon("lance".into())),
            upgrade("shock", UpgradeEffect::AddWeapon("shock".into())),
            upgrade("orbitals", UpgradeEffect::AddWeapon("orbitals".into())),
            upgrade("vitality", UpgradeEffect::MaxHealth(20.0)),
            upgrade("mend", UpgradeEffect::Heal(30.0)),
        ];

        Self {
            archetypes,
            waves,
            bosses,
            weapons,
            upgrades,
            starting_weapon: Some("bolt_caster".to_string()),
            spawn: SpawnConfig::default(),
            pool: PoolConfig {
                max_pool_size: pool::MAX_POOL_SIZE,
                prewarm: vec![PrewarmEntry {
                    archetype: CRAWLER,
                    count: 20,
                }],
            },
            encounter: EncounterConfig::default(),
            loot: LootConfig::default(),
            allow_phase_reversal: false,
        }
    }

    /// Definitions from `path` when given, builtin content otherwise
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let definitions = Self::builtin();
                definitions.validate()?;
                Ok(definitions)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.tick_rate, 30);
        assert_eq!(config.snapshot_rate, 10);
        assert_eq!(config.snapshot_interval(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_or_default() {
        let config = ServerConfig::load_or_default();
        assert!(config.tick_rate > 0);
    }

    #[test]
    fn test_validate_rejects_zero_rates() {
        let config = ServerConfig {
            snapshot_rate: 0,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builtin_definitions_validate() {
        let definitions = GameDefinitions::builtin();
        definitions.validate().unwrap();
        assert!(definitions.encounter_boss().is_some());
        assert!(definitions.weapon("bolt_caster").is_some());
    }

    #[test]
    fn test_json_roundtrip_of_builtin() {
        let json = serde_json::to_string(&GameDefinitions::builtin()).unwrap();
        let parsed = GameDefinitions::from_json(&json).unwrap();
        assert_eq!(parsed.waves.len(), 3);
        assert_eq!(parsed.bosses[0].phases.len(), 3);
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let parsed = GameDefinitions::from_json("{}").unwrap();
        assert_eq!(parsed.spawn.base_max_enemies, 20);
        assert_eq!(parsed.spawn.absolute_max_enemies, 50);
        assert_eq!(parsed.pool.max_pool_size, 50);
        assert_eq!(parsed.loot.upgrade_cost, 50);
        assert!(!parsed.allow_phase_reversal);
    }

    #[test]
    fn test_loot_json_and_ranges() {
        let json = r#"{"loot": {"drop_chance": 1.0, "rare_items": ["PvpTrigger"], "upgrade_cost": 30}}"#;
        let parsed = GameDefinitions::from_json(json).unwrap();
        assert_eq!(parsed.loot.rare_items, vec![ItemKind::PvpTrigger]);
        assert_eq!(parsed.loot.upgrade_cost, 30);
        assert_eq!(parsed.loot.coin_value, 10);

        let mut definitions = GameDefinitions::builtin();
        definitions.loot.drop_chance = 1.5;
        assert!(matches!(definitions.validate(), Err(ConfigError::Invalid(_))));

        let mut definitions = GameDefinitions::builtin();
        definitions.loot.upgrade_cost = 0;
        assert!(matches!(definitions.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_placement_json() {
        let json = r#"{"spawn": {"placement": {"mode": "view_edge", "half_height": 10.0, "aspect": 1.777, "buffer": 2.0}}}"#;
        let parsed = GameDefinitions::from_json(json).unwrap();
        assert!(matches!(parsed.spawn.placement, SpawnPlacement::ViewEdge { .. }));
    }

    #[test]
    fn test_dangling_wave_archetype_rejected() {
        let mut definitions = GameDefinitions::builtin();
        definitions.waves[0].archetypes.push(ArchetypeId(404));
        assert!(matches!(
            definitions.validate(),
            Err(ConfigError::UnknownArchetype { .. })
        ));
    }

    #[test]
    fn test_unknown_upgrade_weapon_rejected() {
        let mut definitions = GameDefinitions::builtin();
        definitions.upgrades.push(UpgradeDefinition {
            name: "ghost".into(),
            effect: UpgradeEffect::AddWeapon("nope".into()),
        });
        assert!(matches!(
            definitions.validate(),
            Err(ConfigError::UnknownWeapon { .. })
        ));
    }

    #[test]
    fn test_phase_threshold_range_checked() {
        let mut definitions = GameDefinitions::builtin();
        definitions.bosses[0].phases[0].threshold = 1.5;
        assert!(matches!(definitions.validate(), Err(ConfigError::Invalid(_))));
    }
}
