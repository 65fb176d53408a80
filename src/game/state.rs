//! World state of one session
//!
//! Players, live enemies, projectiles, the enemy pool and the archetype
//! registry. Enemies are keyed in a `BTreeMap` so every system iterates them
//! in the same order each tick.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::PoolConfig;
use crate::game::constants::{player, scaling};
use crate::game::cooldown::{Cooldown, CooldownScheduler};
use crate::game::definitions::{ArchetypeId, ArchetypeRegistry, EnemyTemplate, RangedProfile};
use crate::game::health::{HealthChange, HealthRecord};
use crate::game::pool::{EntityPool, Poolable, PooledInstance, ReleaseOutcome};
use crate::game::spatial::{EntityHandle, EntityRef, EntityResolver, SpatialEntity, SpatialGrid};
use crate::util::vec2::Vec2;

/// Unique player identifier
pub type PlayerId = Uuid;

/// Entity identifier for non-player entities
pub type EntityId = u64;

/// Encounter items a player can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    BossSummon,
    PvpTrigger,
}

/// Indices into the upgrade definitions offered for one choice
pub type UpgradeOffer = SmallVec<[usize; 3]>;

#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub position: Vec2,
    /// Last requested movement direction (length <= 1)
    pub move_direction: Vec2,
    pub speed: f32,
    pub radius: f32,
    pub health: HealthRecord,
    pub alive: bool,
    pub inventory: SmallVec<[ItemKind; player::INVENTORY_INLINE]>,
    pub pending_upgrades: VecDeque<UpgradeOffer>,
    /// Coins collected over the session
    pub coins: u32,
    /// Upgrade offers earned so far
    pub level: u32,
    /// Coins counted toward the next offer
    pub upgrade_progress: u32,
}

impl Player {
    pub fn new(id: PlayerId, name: String, position: Vec2) -> Self {
        Self {
            id,
            name,
            position,
            move_direction: Vec2::ZERO,
            speed: player::SPEED,
            radius: player::RADIUS,
            health: HealthRecord::new(player::MAX_HEALTH),
            alive: true,
            inventory: SmallVec::new(),
            pending_upgrades: VecDeque::new(),
            coins: 0,
            level: 0,
            upgrade_progress: 0,
        }
    }

    pub fn has_item(&self, item: ItemKind) -> bool {
        self.inventory.contains(&item)
    }

    /// Remove one `item` from the inventory; false if not held
    pub fn take_item(&mut self, item: ItemKind) -> bool {
        match self.inventory.iter().position(|held| *held == item) {
            Some(index) => {
                self.inventory.remove(index);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnemyRole {
    /// Regular spawned or summoned unit
    Swarm,
    /// Driven by a boss controller instead of swarm behavior
    Boss,
}

#[derive(Debug, Clone)]
pub struct RangedState {
    pub profile: RangedProfile,
    pub cooldown: Cooldown,
}

/// A hostile body
#[derive(Debug, Clone)]
pub struct Enemy {
    pub position: Vec2,
    pub radius: f32,
    pub speed: f32,
    /// Contact damage per hit
    pub damage: f32,
    pub health: HealthRecord,
    pub role: EnemyRole,
    /// Called in by a boss attack; outside the spawner's population cap
    pub summoned: bool,
    pub target: Option<PlayerId>,
    pub retarget_timer: f32,
    pub contact_cooldowns: CooldownScheduler<PlayerId>,
    pub ranged: Option<RangedState>,
    /// Scales the coins this enemy drops
    pub loot_multiplier: f32,
}

/// Difficulty scaling applied to a freshly acquired enemy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemyScaling {
    pub difficulty: f32,
    pub health_multiplier: f32,
    pub damage_multiplier: f32,
}

impl Poolable for Enemy {
    type Template = EnemyTemplate;

    fn allocate(template: &EnemyTemplate) -> Self {
        Self {
            position: Vec2::ZERO,
            radius: template.radius,
            speed: template.speed,
            damage: template.damage,
            health: HealthRecord::new(template.max_health),
            role: EnemyRole::Swarm,
            summoned: false,
            target: None,
            retarget_timer: 0.0,
            contact_cooldowns: CooldownScheduler::new(),
            ranged: template.ranged.clone().map(|profile| RangedState {
                profile,
                cooldown: Cooldown::ready(),
            }),
            loot_multiplier: 1.0,
        }
    }

    fn reset(&mut self, template: &EnemyTemplate, position: Vec2) {
        self.position = position;
        self.radius = template.radius;
        self.speed = template.speed;
        self.damage = template.damage;
        self.health.set_max(template.max_health);
        self.role = EnemyRole::Swarm;
        self.summoned = false;
        self.target = None;
        self.retarget_timer = 0.0;
        self.contact_cooldowns.clear();
        self.ranged = template.ranged.clone().map(|profile| RangedState {
            profile,
            cooldown: Cooldown::ready(),
        });
        self.loot_multiplier = 1.0;
    }
}

impl Enemy {
    /// Scale template stats by difficulty and wave multipliers
    pub fn apply_scaling(&mut self, template: &EnemyTemplate, scaling: EnemyScaling) {
        let d = scaling.difficulty.max(0.0);
        let bonus_health = (d * scaling::HEALTH_PER_DIFFICULTY * scaling.health_multiplier).round();
        self.health.set_max(template.max_health + bonus_health);

        let damage_factor = (1.0 + d * scaling::DAMAGE_PER_DIFFICULTY) * scaling.damage_multiplier;
        self.damage = (template.damage * damage_factor).round();
        if let Some(ranged) = &mut self.ranged {
            ranged.profile.damage = (ranged.profile.damage * damage_factor).round();
        }

        self.speed = template.speed / (1.0 + d * scaling::SPEED_LOSS_PER_DIFFICULTY);
        self.loot_multiplier = d;
    }
}

/// Who fired a projectile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectileOwner {
    Player(PlayerId),
    /// Fired by an enemy or boss; hits players only
    Hostile(EntityId),
}

#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: EntityId,
    pub owner: ProjectileOwner,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub damage: f32,
    /// Remaining lifetime in seconds
    pub lifetime: f32,
    /// Extra targets this projectile may pass through
    pub pierce_remaining: u32,
    /// Targets already hit; never hit twice
    pub hits: SmallVec<[EntityRef; 4]>,
}

impl Projectile {
    pub fn is_expired(&self) -> bool {
        self.lifetime <= 0.0
    }

    pub fn is_hostile(&self) -> bool {
        matches!(self.owner, ProjectileOwner::Hostile(_))
    }
}

/// What a pickup grants on contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickupKind {
    Coins(u32),
    Item(ItemKind),
}

/// Loot lying in the world until a player touches it
#[derive(Debug, Clone, Copy)]
pub struct Pickup {
    pub id: EntityId,
    pub position: Vec2,
    pub kind: PickupKind,
}

/// Parameters for a new projectile
#[derive(Debug, Clone, Copy)]
pub struct ProjectileSpec {
    pub owner: ProjectileOwner,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub damage: f32,
    pub lifetime: f32,
    pub pierce: u32,
}

/// Complete world state
pub struct GameState {
    pub tick: u64,
    /// Session seconds since start
    pub elapsed: f32,
    pub players: Vec<Player>,
    pub enemies: BTreeMap<EntityId, PooledInstance<Enemy>>,
    pub projectiles: Vec<Projectile>,
    pub pickups: Vec<Pickup>,
    pub pool: EntityPool<Enemy>,
    pub archetypes: ArchetypeRegistry,
    /// Rebuilt before every stage that runs proximity queries
    pub grid: SpatialGrid,
    /// Health changes not yet processed by the session
    pub damage_log: Vec<HealthChange>,
    pub pvp_active: bool,
    next_entity_id: EntityId,
}

impl GameState {
    /// Build the world and register every enemy archetype with the pool
    pub fn new(archetypes: ArchetypeRegistry, pool_config: &PoolConfig) -> Self {
        let mut pool = EntityPool::new(pool_config.max_pool_size);
        for (id, _) in archetypes.enemies() {
            pool.register(id);
        }
        for entry in &pool_config.prewarm {
            match archetypes.enemy(entry.archetype) {
                Some(template) => pool.prewarm(entry.archetype, template, entry.count),
                None => warn!(archetype = %entry.archetype, "Prewarm skipped: not an enemy archetype"),
            }
        }

        Self {
            tick: 0,
            elapsed: 0.0,
            players: Vec::new(),
            enemies: BTreeMap::new(),
            projectiles: Vec::new(),
            pickups: Vec::new(),
            pool,
            archetypes,
            grid: SpatialGrid::default(),
            damage_log: Vec::new(),
            pvp_active: false,
            next_entity_id: 1,
        }
    }

    /// Generate a new unique entity ID
    pub fn next_entity_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    pub fn get_player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn get_player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn alive_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.alive)
    }

    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.alive).count()
    }

    pub fn add_player(&mut self, player: Player) {
        self.players.push(player);
    }

    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        let index = self.players.iter().position(|p| p.id == id)?;
        Some(self.players.remove(index))
    }

    pub fn enemy(&self, id: EntityId) -> Option<&PooledInstance<Enemy>> {
        self.enemies.get(&id)
    }

    pub fn enemy_mut(&mut self, id: EntityId) -> Option<&mut PooledInstance<Enemy>> {
        self.enemies.get_mut(&id)
    }

    /// Live population as seen by the pool
    #[inline]
    pub fn live_enemy_count(&self) -> usize {
        self.pool.active_count()
    }

    /// Enemies counted against the spawner's cap: swarm units it placed itself.
    /// Bosses and boss summons are excluded.
    pub fn swarm_population(&self) -> usize {
        self.enemies
            .values()
            .filter(|e| e.active && e.body.role == EnemyRole::Swarm && !e.body.summoned)
            .count()
    }

    /// Acquire an enemy of `archetype` from the pool and place it in the world.
    ///
    /// Returns `None` (after logging) when the archetype is not a registered enemy.
    pub fn spawn_enemy(
        &mut self,
        archetype: ArchetypeId,
        position: Vec2,
        owner: Option<PlayerId>,
    ) -> Option<EntityId> {
        let Some(template) = self.archetypes.enemy(archetype) else {
            warn!(archetype = %archetype, "Spawn skipped: no enemy template");
            return None;
        };
        let handle = self.next_entity_id;
        self.next_entity_id += 1;

        let instance = self.pool.acquire(archetype, template, position, handle, owner);
        self.enemies.insert(handle, instance);
        debug!(entity = handle, archetype = %archetype, "Enemy spawned");
        Some(handle)
    }

    /// Remove an enemy from the world and hand it back to the pool
    pub fn despawn_enemy(&mut self, id: EntityId) -> Option<ReleaseOutcome> {
        let instance = self.enemies.remove(&id)?;
        Some(self.pool.release(instance))
    }

    pub fn add_projectile(&mut self, spec: ProjectileSpec) -> EntityId {
        let id = self.next_entity_id();
        self.projectiles.push(Projectile {
            id,
            owner: spec.owner,
            position: spec.position,
            velocity: spec.velocity,
            radius: spec.radius,
            damage: spec.damage,
            lifetime: spec.lifetime,
            pierce_remaining: spec.pierce,
            hits: SmallVec::new(),
        });
        id
    }

    /// Health record behind `target`, if it still exists
    pub fn health_mut(&mut self, target: EntityRef) -> Option<&mut HealthRecord> {
        match target {
            EntityRef::Player(id) => self.get_player_mut(id).map(|p| &mut p.health),
            EntityRef::Enemy(id) => self.enemies.get_mut(&id).map(|e| &mut e.body.health),
        }
    }

    /// Whether `target` exists and can still take damage
    pub fn is_targetable(&self, target: EntityRef) -> bool {
        self.resolve(target).map_or(false, |handle| handle.alive)
    }

    pub fn position_of(&self, target: EntityRef) -> Option<Vec2> {
        self.resolve(target).map(|handle| handle.position)
    }

    /// Rebuild the proximity grid from living players and enemies
    pub fn rebuild_spatial(&mut self) {
        let players = self
            .players
            .iter()
            .filter(|p| p.alive)
            .map(|p| SpatialEntity {
                id: EntityRef::Player(p.id),
                position: p.position,
                radius: p.radius,
            });
        let enemies = self
            .enemies
            .values()
            .filter(|e| e.active && !e.body.health.is_dead())
            .map(|e| SpatialEntity {
                id: EntityRef::Enemy(e.handle),
                position: e.body.position,
                radius: e.body.radius,
            });
        self.grid.rebuild(players.chain(enemies));
    }

    /// Alive player closest to `position`, ties going to the earlier player
    pub fn nearest_alive_player(&self, position: Vec2) -> Option<&Player> {
        let mut best: Option<(&Player, f32)> = None;
        for player in self.alive_players() {
            let dist_sq = player.position.distance_sq_to(position);
            match best {
                Some((_, best_sq)) if dist_sq >= best_sq => {}
                _ => best = Some((player, dist_sq)),
            }
        }
        best.map(|(player, _)| player)
    }
}

impl EntityResolver for GameState {
    fn resolve(&self, id: EntityRef) -> Option<EntityHandle> {
        match id {
            EntityRef::Player(player_id) => self.get_player(player_id).map(|p| EntityHandle {
                id,
                position: p.position,
                radius: p.radius,
                alive: p.alive && !p.health.is_dead(),
            }),
            EntityRef::Enemy(entity_id) => self.enemies.get(&entity_id).map(|e| EntityHandle {
                id,
                position: e.body.position,
                radius: e.body.radius,
                alive: e.active && !e.body.health.is_dead(),
            }),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::game::definitions::{Archetype, ArchetypeKind, ProjectileTemplate};

    pub const GRUNT: ArchetypeId = ArchetypeId(1);
    pub const SPITTER: ArchetypeId = ArchetypeId(2);
    pub const ORB: ArchetypeId = ArchetypeId(50);

    pub fn grunt_template() -> EnemyTemplate {
        EnemyTemplate {
            max_health: 20.0,
            damage: 5.0,
            speed: 3.0,
            radius: 0.5,
            ranged: None,
        }
    }

    /// Small registry shared by system tests
    pub fn test_registry() -> ArchetypeRegistry {
        ArchetypeRegistry::new(&[
            Archetype {
                id: GRUNT,
                name: "grunt".into(),
                kind: ArchetypeKind::Enemy(grunt_template()),
            },
            Archetype {
                id: SPITTER,
                name: "spitter".into(),
                kind: ArchetypeKind::Enemy(EnemyTemplate {
                    ranged: Some(RangedProfile::default()),
                    ..grunt_template()
                }),
            },
            Archetype {
                id: ORB,
                name: "orb".into(),
                kind: ArchetypeKind::Projectile(ProjectileTemplate::default()),
            },
        ])
    }

    pub fn test_state() -> GameState {
        GameState::new(test_registry(), &PoolConfig::default())
    }

    pub fn add_player_at(state: &mut GameState, position: Vec2) -> PlayerId {
        let id = Uuid::new_v4();
        state.add_player(Player::new(id, "tester".into(), position));
        id
    }

    #[test]
    fn test_spawn_and_despawn_roundtrip_pool() {
        let mut state = test_state();
        let id = state.spawn_enemy(GRUNT, Vec2::new(1.0, 2.0), None).unwrap();
        assert_eq!(state.live_enemy_count(), 1);
        assert_eq!(state.enemy(id).unwrap().body.position, Vec2::new(1.0, 2.0));

        assert_eq!(state.despawn_enemy(id), Some(ReleaseOutcome::Retained));
        assert_eq!(state.live_enemy_count(), 0);
        assert!(state.enemy(id).is_none());
        assert_eq!(state.despawn_enemy(id), None);
    }

    #[test]
    fn test_spawn_rejects_projectile_archetype() {
        let mut state = test_state();
        assert!(state.spawn_enemy(ORB, Vec2::ZERO, None).is_none());
        assert!(state.spawn_enemy(ArchetypeId(999), Vec2::ZERO, None).is_none());
        assert_eq!(state.live_enemy_count(), 0);
    }

    #[test]
    fn test_failed_spawn_keeps_entity_ids_dense() {
        let mut state = test_state();
        let first = state.spawn_enemy(GRUNT, Vec2::ZERO, None).unwrap();
        assert!(state.spawn_enemy(ArchetypeId(999), Vec2::ZERO, None).is_none());
        assert!(state.spawn_enemy(ORB, Vec2::ZERO, None).is_none());
        let second = state.spawn_enemy(GRUNT, Vec2::ZERO, None).unwrap();
        assert_eq!(second, first + 1);
    }

    #[test]
    fn test_swarm_population_excludes_bosses_and_summons() {
        let mut state = test_state();
        state.spawn_enemy(GRUNT, Vec2::ZERO, None);
        let boss = state.spawn_enemy(GRUNT, Vec2::ZERO, None).unwrap();
        state.enemy_mut(boss).unwrap().body.role = EnemyRole::Boss;
        let minion = state.spawn_enemy(GRUNT, Vec2::ZERO, None).unwrap();
        state.enemy_mut(minion).unwrap().body.summoned = true;

        assert_eq!(state.live_enemy_count(), 3);
        assert_eq!(state.swarm_population(), 1);

        // A recycled summon comes back as a regular swarm unit
        state.despawn_enemy(minion);
        let reused = state.spawn_enemy(GRUNT, Vec2::ZERO, None).unwrap();
        assert!(!state.enemy(reused).unwrap().body.summoned);
        assert_eq!(state.swarm_population(), 2);
    }

    #[test]
    fn test_reused_enemy_gets_fresh_handle_and_health() {
        let mut state = test_state();
        let first = state.spawn_enemy(GRUNT, Vec2::ZERO, None).unwrap();
        state.enemy_mut(first).unwrap().body.health.take_damage(15.0);
        state.despawn_enemy(first);

        let second = state.spawn_enemy(GRUNT, Vec2::ZERO, None).unwrap();
        assert_ne!(first, second);
        assert_eq!(state.enemy(second).unwrap().body.health.current(), 20.0);
        assert!(!state.is_targetable(EntityRef::Enemy(first)));
    }

    #[test]
    fn test_apply_scaling() {
        let template = grunt_template();
        let mut enemy = Enemy::allocate(&template);
        enemy.apply_scaling(
            &template,
            EnemyScaling {
                difficulty: 2.0,
                health_multiplier: 1.5,
                damage_multiplier: 1.0,
            },
        );
        // 20 + round(2 * 10 * 1.5)
        assert_eq!(enemy.health.max(), 50.0);
        // round(5 * 1.4)
        assert_eq!(enemy.damage, 7.0);
        assert!((enemy.speed - 3.0 / 1.2).abs() < 1e-5);
        assert_eq!(enemy.loot_multiplier, 2.0);
    }

    #[test]
    fn test_nearest_alive_player_skips_dead() {
        let mut state = test_state();
        let near = add_player_at(&mut state, Vec2::new(1.0, 0.0));
        let far = add_player_at(&mut state, Vec2::new(5.0, 0.0));
        assert_eq!(state.nearest_alive_player(Vec2::ZERO).map(|p| p.id), Some(near));

        state.get_player_mut(near).unwrap().alive = false;
        assert_eq!(state.nearest_alive_player(Vec2::ZERO).map(|p| p.id), Some(far));
    }

    #[test]
    fn test_take_item() {
        let mut player = Player::new(Uuid::new_v4(), "p".into(), Vec2::ZERO);
        player.inventory.push(ItemKind::BossSummon);
        assert!(!player.take_item(ItemKind::PvpTrigger));
        assert!(player.take_item(ItemKind::BossSummon));
        assert!(!player.has_item(ItemKind::BossSummon));
    }
}
