//! Authoritative game session
//!
//! Owns the world and every system, and advances them in a fixed order each
//! tick: intents, movement, encounter timers, spawning, enemies, bosses,
//! weapons, projectiles, loot, the despawn sweep and finally the PvP check. Damage
//! logged by one stage is resolved before the next stage runs, so a boss
//! switches phase in the same tick its health crosses a threshold.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{GameDefinitions, ServerConfig};
use crate::game::constants::{intent, player as player_tuning};
use crate::game::definitions::{ArchetypeRegistry, UpgradeEffect};
use crate::game::events::SimEvent;
use crate::game::health::DamageRouter;
use crate::game::input_buffer::{IntentBuffer, IntentMessage, IntentSender};
use crate::game::pool::PoolStats;
use crate::game::spatial::EntityRef;
use crate::game::state::{EnemyRole, EntityId, GameState, ItemKind, Player, PlayerId};
use crate::game::systems::boss::BossController;
use crate::game::systems::encounter::{EncounterDirector, EncounterTrigger};
use crate::game::systems::enemy::EnemySystem;
use crate::game::systems::loot;
use crate::game::systems::projectile;
use crate::game::systems::spawn::SpawnDirector;
use crate::game::systems::weapon::{FireError, WeaponLoadout};
use crate::net::protocol::{
    BossSnapshot, EnemySnapshot, GameSnapshot, PickupSnapshot, PlayerIntent, PlayerSnapshot, ProjectileSnapshot,
};
use crate::util::vec2::Vec2;

/// Why an intent was dropped without effect
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntentRejection {
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
    #[error("player is dead")]
    Dead,
    #[error("intent from tick {sent} is stale at tick {now}")]
    Stale { sent: u64, now: u64 },
    #[error("item {0:?} not held")]
    ItemNotHeld(ItemKind),
    #[error("encounter unavailable")]
    EncounterUnavailable,
    #[error("no pending upgrade offer")]
    NoPendingUpgrade,
    #[error("upgrade choice {0} out of range")]
    InvalidChoice(u8),
    #[error(transparent)]
    Fire(#[from] FireError),
}

/// Counters sampled by the stats logger and the metrics endpoint
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub tick: u64,
    pub players: usize,
    pub alive_players: usize,
    pub enemies: usize,
    pub bosses: usize,
    pub projectiles: usize,
    pub pickups: usize,
    pub spawner_running: bool,
    pub pvp_active: bool,
    pub rejected_intents: u64,
    pub pool: PoolStats,
}

pub struct GameSession {
    definitions: Arc<GameDefinitions>,
    state: GameState,
    spawner: SpawnDirector,
    bosses: Vec<BossController>,
    loadouts: BTreeMap<PlayerId, WeaponLoadout>,
    enemy_system: EnemySystem,
    encounters: EncounterDirector,
    intents: IntentBuffer,
    rng: StdRng,
    dt: f32,
    rejected_intents: u64,
}

impl GameSession {
    /// Build a session with the spawn director already running
    pub fn new(definitions: Arc<GameDefinitions>, config: &ServerConfig) -> Self {
        let registry = ArchetypeRegistry::new(&definitions.archetypes);
        let state = GameState::new(registry, &definitions.pool);

        let mut spawner = SpawnDirector::new(definitions.spawn.clone());
        spawner.start();

        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        info!(
            archetypes = definitions.archetypes.len(),
            waves = definitions.waves.len(),
            bosses = definitions.bosses.len(),
            weapons = definitions.weapons.len(),
            "Game session created"
        );

        Self {
            encounters: EncounterDirector::new(definitions.encounter.clone()),
            definitions,
            state,
            spawner,
            bosses: Vec::new(),
            loadouts: BTreeMap::new(),
            enemy_system: EnemySystem::new(),
            intents: IntentBuffer::new(config.intent_buffer_capacity),
            rng,
            dt: config.dt(),
            rejected_intents: 0,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Mutable world access for tooling and tests
    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn spawner(&self) -> &SpawnDirector {
        &self.spawner
    }

    pub fn bosses(&self) -> &[BossController] {
        &self.bosses
    }

    pub fn loadout(&self, player_id: PlayerId) -> Option<&WeaponLoadout> {
        self.loadouts.get(&player_id)
    }

    pub fn tick_count(&self) -> u64 {
        self.state.tick
    }

    pub fn rejected_intents(&self) -> u64 {
        self.rejected_intents
    }

    /// Sender handle for a connection handler
    pub fn intent_sender(&self) -> IntentSender {
        self.intents.sender()
    }

    /// Queue an intent for the next tick. False when the queue is full.
    pub fn submit_intent(&self, player_id: PlayerId, tick: u64, intent: PlayerIntent) -> bool {
        self.intents.try_submit(player_id, tick, intent)
    }

    /// Add a player with a fresh id and the starting weapon
    pub fn add_player(&mut self, name: String) -> PlayerId {
        let id = Uuid::new_v4();
        self.add_player_with_id(id, name);
        id
    }

    pub fn add_player_with_id(&mut self, id: PlayerId, name: String) {
        info!("Adding player {} ({}) to game session", name, id);

        let mut loadout = WeaponLoadout::new(id);
        if let Some(starting) = &self.definitions.starting_weapon {
            match self.definitions.weapon(starting) {
                Some(definition) => loadout.add_weapon(definition.clone()),
                None => warn!(weapon = %starting, "Starting weapon not defined"),
            }
        }

        self.state.add_player(Player::new(id, name, Vec2::ZERO));
        self.loadouts.insert(id, loadout);
    }

    pub fn remove_player(&mut self, player_id: PlayerId) {
        info!("Removing player {} from game session", player_id);
        self.state.remove_player(player_id);
        self.loadouts.remove(&player_id);
    }

    /// Hand an encounter item to a player
    pub fn grant_item(&mut self, player_id: PlayerId, item: ItemKind) -> bool {
        match self.state.get_player_mut(player_id) {
            Some(player) => {
                player.inventory.push(item);
                true
            }
            None => false,
        }
    }

    /// Queue an offer of distinct random upgrades and return their names
    pub fn grant_upgrade_choice(&mut self, player_id: PlayerId) -> Option<Vec<String>> {
        let total = self.definitions.upgrades.len();
        let count = total.min(player_tuning::UPGRADE_CHOICES);
        if count == 0 || self.state.get_player(player_id).is_none() {
            return None;
        }

        let picks = rand::seq::index::sample(&mut self.rng, total, count).into_vec();
        let names = picks
            .iter()
            .map(|&i| self.definitions.upgrades[i].name.clone())
            .collect();

        let player = self.state.get_player_mut(player_id)?;
        player.pending_upgrades.push_back(picks.into_iter().collect());
        Some(names)
    }

    /// Advance the simulation by one fixed step
    pub fn tick(&mut self) -> Vec<SimEvent> {
        let dt = self.dt;
        let mut events = Vec::new();

        self.state.tick += 1;
        self.state.elapsed += dt;
        self.state.rebuild_spatial();

        for message in self.intents.drain() {
            if let Err(reason) = self.apply_intent(message, &mut events) {
                self.rejected_intents += 1;
                debug!(player = %message.player_id, %reason, "Intent rejected");
            }
        }
        self.resolve_damage(&mut events);

        self.move_players(dt);

        for trigger in self.encounters.poll_timers(self.state.elapsed) {
            match trigger {
                EncounterTrigger::Boss => self.start_boss(&mut events),
                EncounterTrigger::Pvp => self.start_pvp(&mut events),
            }
        }

        let definitions = Arc::clone(&self.definitions);
        events.extend(
            self.spawner
                .update(&mut self.state, &definitions.waves, &mut self.rng, dt),
        );

        self.state.rebuild_spatial();
        events.extend(self.enemy_system.update(&mut self.state, dt));
        self.resolve_damage(&mut events);

        for boss in &mut self.bosses {
            events.extend(boss.update(&mut self.state, &mut self.rng, dt));
        }
        self.resolve_damage(&mut events);

        self.state.rebuild_spatial();
        for loadout in self.loadouts.values_mut() {
            events.extend(loadout.update(&mut self.state, dt));
        }
        self.resolve_damage(&mut events);

        self.state.rebuild_spatial();
        projectile::update(&mut self.state, dt);
        self.resolve_damage(&mut events);

        events.extend(loot::update(&mut self.state, &definitions.loot, dt));
        self.offer_level_ups(&mut events);

        events.extend(self.enemy_system.despawn_sweep(&mut self.state, dt));
        self.prune_bosses();

        self.encounters.check_pvp_winner(&mut self.state, &mut events);

        events
    }

    /// Continuous state for observers
    pub fn snapshot(&self) -> GameSnapshot {
        let state = &self.state;
        GameSnapshot {
            tick: state.tick,
            elapsed: state.elapsed,
            spawner_running: self.spawner.is_running(),
            pvp_active: state.pvp_active,
            players: state
                .players
                .iter()
                .map(|p| PlayerSnapshot::from_player(p, self.loadouts.get(&p.id)))
                .collect(),
            enemies: state
                .enemies
                .values()
                .filter(|e| e.body.role == EnemyRole::Swarm)
                .map(EnemySnapshot::from_enemy)
                .collect(),
            bosses: self
                .bosses
                .iter()
                .filter_map(|boss| {
                    let body = &state.enemy(boss.entity())?.body;
                    Some(BossSnapshot {
                        id: boss.entity(),
                        name: boss.name().to_string(),
                        phase: boss.phase().map(|p| p as u32),
                        health_fraction: body.health.fraction(),
                        charging: boss.engine().is_charging(),
                    })
                })
                .collect(),
            projectiles: state
                .projectiles
                .iter()
                .map(ProjectileSnapshot::from_projectile)
                .collect(),
            pickups: state.pickups.iter().map(PickupSnapshot::from_pickup).collect(),
        }
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            tick: self.state.tick,
            players: self.state.players.len(),
            alive_players: self.state.alive_count(),
            enemies: self.state.live_enemy_count(),
            bosses: self.bosses.len(),
            projectiles: self.state.projectiles.len(),
            pickups: self.state.pickups.len(),
            spawner_running: self.spawner.is_running(),
            pvp_active: self.state.pvp_active,
            rejected_intents: self.rejected_intents,
            pool: self.state.pool.stats(),
        }
    }

    fn apply_intent(&mut self, message: IntentMessage, events: &mut Vec<SimEvent>) -> Result<(), IntentRejection> {
        let now = self.state.tick;
        if now.saturating_sub(message.tick) > intent::MAX_INTENT_AGE_TICKS {
            return Err(IntentRejection::Stale {
                sent: message.tick,
                now,
            });
        }

        let player_id = message.player_id;
        let player = self
            .state
            .get_player(player_id)
            .ok_or(IntentRejection::UnknownPlayer(player_id))?;
        if !player.alive {
            return Err(IntentRejection::Dead);
        }

        match message.intent {
            PlayerIntent::Move { direction } => {
                let direction = if !direction.is_finite() {
                    Vec2::ZERO
                } else if direction.length_sq() > 1.0 {
                    direction.normalize()
                } else {
                    direction
                };
                if let Some(player) = self.state.get_player_mut(player_id) {
                    player.move_direction = direction;
                }
            }
            PlayerIntent::UseItem { item } => {
                if !player.has_item(item) {
                    return Err(IntentRejection::ItemNotHeld(item));
                }
                if !self.encounter_available(item) {
                    return Err(IntentRejection::EncounterUnavailable);
                }
                if let Some(player) = self.state.get_player_mut(player_id) {
                    player.take_item(item);
                }
                info!(player = %player_id, ?item, "Encounter item used");
                match item {
                    ItemKind::BossSummon => self.start_boss(events),
                    ItemKind::PvpTrigger => self.start_pvp(events),
                }
            }
            PlayerIntent::RequestFire { slot } => {
                let loadout = self
                    .loadouts
                    .get_mut(&player_id)
                    .ok_or(IntentRejection::UnknownPlayer(player_id))?;
                events.extend(loadout.fire(slot as usize, &mut self.state)?);
            }
            PlayerIntent::ChooseUpgrade { index } => {
                let offer = player
                    .pending_upgrades
                    .front()
                    .ok_or(IntentRejection::NoPendingUpgrade)?;
                let upgrade = *offer
                    .get(index as usize)
                    .ok_or(IntentRejection::InvalidChoice(index))?;
                if let Some(player) = self.state.get_player_mut(player_id) {
                    player.pending_upgrades.pop_front();
                }
                self.apply_upgrade(player_id, upgrade, events);
            }
        }
        Ok(())
    }

    fn encounter_available(&self, item: ItemKind) -> bool {
        match item {
            ItemKind::BossSummon => {
                !self.encounters.boss_active()
                    && !self.state.pvp_active
                    && self.definitions.encounter_boss().is_some()
            }
            ItemKind::PvpTrigger => !self.state.pvp_active && self.state.alive_count() >= 2,
        }
    }

    fn apply_upgrade(&mut self, player_id: PlayerId, index: usize, events: &mut Vec<SimEvent>) {
        let definitions = Arc::clone(&self.definitions);
        let Some(upgrade) = definitions.upgrades.get(index) else {
            warn!(index, "Upgrade index out of range");
            return;
        };

        match &upgrade.effect {
            UpgradeEffect::DamageMultiplier(amount) => {
                if let Some(loadout) = self.loadouts.get_mut(&player_id) {
                    loadout.increase_damage_multiplier(*amount);
                }
            }
            UpgradeEffect::AddWeapon(name) => match (definitions.weapon(name), self.loadouts.get_mut(&player_id)) {
                (Some(weapon), Some(loadout)) => loadout.add_weapon(weapon.clone()),
                (None, _) => warn!(weapon = %name, "Upgrade references unknown weapon"),
                _ => {}
            },
            UpgradeEffect::MaxHealth(amount) => {
                if let Some(player) = self.state.get_player_mut(player_id) {
                    player.health.increase_max(*amount);
                }
            }
            UpgradeEffect::Heal(amount) => {
                DamageRouter::heal(&mut self.state, EntityRef::Player(player_id), *amount);
            }
        }

        debug!(player = %player_id, upgrade = %upgrade.name, "Upgrade applied");
        events.push(SimEvent::UpgradeApplied {
            player: player_id,
            upgrade: upgrade.name.clone(),
        });
    }

    fn move_players(&mut self, dt: f32) {
        let bounds = self.definitions.spawn.map_half_extents;
        for player in self.state.players.iter_mut().filter(|p| p.alive) {
            let next = player.position + player.move_direction * (player.speed * dt);
            player.position = next.clamp_to_bounds(bounds, player.radius);
        }
    }

    fn start_boss(&mut self, events: &mut Vec<SimEvent>) {
        let definitions = Arc::clone(&self.definitions);
        let Some(definition) = definitions.encounter_boss() else {
            warn!("Boss encounter requested but no boss is defined");
            return;
        };
        if let Some(controller) = self.encounters.start_boss(
            &mut self.state,
            &mut self.spawner,
            definition,
            definitions.allow_phase_reversal,
            events,
        ) {
            self.bosses.push(controller);
        }
    }

    fn start_pvp(&mut self, events: &mut Vec<SimEvent>) {
        self.encounters.start_pvp(&mut self.state, &mut self.spawner, events);
        self.prune_bosses();
    }

    /// Apply the consequences of every health change logged since the last call
    fn resolve_damage(&mut self, events: &mut Vec<SimEvent>) {
        let changes = std::mem::take(&mut self.state.damage_log);
        for change in changes {
            match change.target {
                EntityRef::Enemy(id) => {
                    if change.killed {
                        self.kill_enemy(id, events);
                    } else if let Some(boss) = self.bosses.iter_mut().find(|b| b.entity() == id) {
                        events.extend(boss.on_health_fraction(change.fraction_after));
                    }
                }
                EntityRef::Player(id) => {
                    if !change.killed {
                        continue;
                    }
                    if let Some(player) = self.state.get_player_mut(id) {
                        player.alive = false;
                        player.move_direction = Vec2::ZERO;
                        info!(player = %id, "Player died");
                        events.push(SimEvent::Died { target: change.target });
                    }
                }
            }
        }
    }

    fn kill_enemy(&mut self, id: EntityId, events: &mut Vec<SimEvent>) {
        let drop = self
            .state
            .enemy(id)
            .filter(|e| e.body.role == EnemyRole::Swarm)
            .map(|e| (e.body.position, e.body.loot_multiplier));
        if self.state.despawn_enemy(id).is_none() {
            return;
        }
        events.push(SimEvent::Died {
            target: EntityRef::Enemy(id),
        });

        if let Some((position, multiplier)) = drop {
            events.extend(loot::drop_loot(
                &mut self.state,
                &self.definitions.loot,
                position,
                multiplier,
                &mut self.rng,
            ));
        }

        if let Some(index) = self.bosses.iter().position(|b| b.entity() == id) {
            self.bosses.remove(index);
            self.encounters
                .on_boss_defeated(&self.state, &mut self.spawner, id, events);
        }
    }

    /// Turn coins past each upgrade threshold into queued upgrade offers
    fn offer_level_ups(&mut self, events: &mut Vec<SimEvent>) {
        let definitions = Arc::clone(&self.definitions);
        let ids: Vec<PlayerId> = self.state.players.iter().map(|p| p.id).collect();
        for id in ids {
            let Some(player) = self.state.get_player_mut(id) else {
                continue;
            };
            let gained = loot::take_level_ups(player, &definitions.loot);
            let reached = player.level;
            for level in (reached + 1 - gained)..=reached {
                if let Some(choices) = self.grant_upgrade_choice(id) {
                    debug!(player = %id, level, "Upgrade offered");
                    events.push(SimEvent::UpgradeOffered {
                        player: id,
                        level,
                        choices,
                    });
                }
            }
        }
    }

    /// Drop controllers whose boss left the world without dying
    fn prune_bosses(&mut self) {
        let before = self.bosses.len();
        let state = &self.state;
        self.bosses.retain(|b| state.enemy(b.entity()).is_some());
        if self.bosses.len() < before && self.bosses.is_empty() {
            self.encounters.on_boss_removed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::sim;
    use crate::game::definitions::ArchetypeId;

    fn session() -> GameSession {
        let config = ServerConfig {
            rng_seed: Some(7),
            ..ServerConfig::default()
        };
        GameSession::new(Arc::new(GameDefinitions::builtin()), &config)
    }

    fn collect(session: &mut GameSession, ticks: usize) -> Vec<SimEvent> {
        (0..ticks).flat_map(|_| session.tick()).collect()
    }

    fn boss_id(session: &GameSession) -> EntityId {
        session.bosses()[0].entity()
    }

    #[test]
    fn test_new_player_gets_starting_weapon() {
        let mut session = session();
        let id = session.add_player("p1".into());

        let loadout = session.loadout(id).unwrap();
        assert_eq!(loadout.weapons().len(), 1);
        assert_eq!(loadout.weapons()[0].definition.name, "bolt_caster");
        assert!(session.spawner().is_running());

        session.remove_player(id);
        assert!(session.loadout(id).is_none());
        assert!(session.state().get_player(id).is_none());
    }

    #[test]
    fn test_spawning_starts_after_initial_delay() {
        let mut session = session();
        session.add_player("p1".into());

        let events = collect(&mut session, sim::TICK_RATE as usize * 5);
        assert!(events.iter().any(|e| matches!(e, SimEvent::EnemySpawned { .. })));
        assert!(session.state().live_enemy_count() > 0);
    }

    #[test]
    fn test_move_intent_is_clamped() {
        let mut session = session();
        let id = session.add_player("p1".into());

        assert!(session.submit_intent(
            id,
            0,
            PlayerIntent::Move {
                direction: Vec2::new(30.0, 40.0)
            }
        ));
        session.tick();

        let player = session.state().get_player(id).unwrap();
        assert!((player.move_direction.length() - 1.0).abs() < 1e-5);
        let expected = player.speed * session.dt;
        assert!((player.position.length() - expected).abs() < 1e-4);
    }

    #[test]
    fn test_stale_and_unknown_intents_rejected() {
        let mut session = session();
        let id = session.add_player("p1".into());
        collect(&mut session, 100);

        session.submit_intent(id, 1, PlayerIntent::RequestFire { slot: 0 });
        session.submit_intent(Uuid::new_v4(), 100, PlayerIntent::RequestFire { slot: 0 });
        session.submit_intent(id, 100, PlayerIntent::RequestFire { slot: 5 });
        session.tick();

        assert_eq!(session.rejected_intents(), 3);
    }

    #[test]
    fn test_item_required_for_encounter() {
        let mut session = session();
        let id = session.add_player("p1".into());

        session.submit_intent(
            id,
            0,
            PlayerIntent::UseItem {
                item: ItemKind::BossSummon,
            },
        );
        session.tick();
        assert_eq!(session.rejected_intents(), 1);
        assert!(session.bosses().is_empty());
    }

    #[test]
    fn test_boss_summon_and_defeat_resumes_spawning() {
        let mut session = session();
        let id = session.add_player("p1".into());
        assert!(session.grant_item(id, ItemKind::BossSummon));

        session.submit_intent(
            id,
            0,
            PlayerIntent::UseItem {
                item: ItemKind::BossSummon,
            },
        );
        let events = session.tick();
        assert!(events
            .iter()
            .any(|e| matches!(e, SimEvent::BossEncounterStarted { .. })));
        assert!(!session.spawner().is_running());
        assert!(!session.state().get_player(id).unwrap().has_item(ItemKind::BossSummon));
        assert_eq!(session.bosses()[0].phase(), Some(0));

        let boss = boss_id(&session);
        DamageRouter::apply(session.state_mut(), EntityRef::Enemy(boss), 1e6);
        let events = session.tick();

        assert!(events.contains(&SimEvent::BossDefeated { boss }));
        assert!(events.contains(&SimEvent::SpawnerStateChanged { running: true }));
        assert!(session.bosses().is_empty());
        assert!(session.state().enemy(boss).is_none());
        assert!(session.spawner().is_running());
    }

    #[test]
    fn test_boss_changes_phase_on_damage() {
        let mut session = session();
        let id = session.add_player("p1".into());
        session.grant_item(id, ItemKind::BossSummon);
        session.submit_intent(
            id,
            0,
            PlayerIntent::UseItem {
                item: ItemKind::BossSummon,
            },
        );
        session.tick();

        let boss = boss_id(&session);
        let max = session.state().enemy(boss).unwrap().body.health.max();
        DamageRouter::apply(session.state_mut(), EntityRef::Enemy(boss), max * 0.6);
        let events = session.tick();

        assert!(events.contains(&SimEvent::PhaseChanged {
            boss,
            from: Some(0),
            to: Some(1),
        }));
        assert_eq!(session.bosses()[0].phase(), Some(1));
        assert_eq!(session.snapshot().bosses[0].phase, Some(1));
    }

    #[test]
    fn test_upgrade_choice_applies_effect() {
        let mut session = session();
        let id = session.add_player("p1".into());

        let names = session.grant_upgrade_choice(id).unwrap();
        assert_eq!(names.len(), player_tuning::UPGRADE_CHOICES);
        let mut distinct = names.clone();
        distinct.sort();
        distinct.dedup();
        assert_eq!(distinct.len(), names.len());

        session.submit_intent(id, 0, PlayerIntent::ChooseUpgrade { index: 0 });
        let events = session.tick();
        assert!(events.contains(&SimEvent::UpgradeApplied {
            player: id,
            upgrade: names[0].clone(),
        }));
        assert!(session.state().get_player(id).unwrap().pending_upgrades.is_empty());

        session.submit_intent(id, 1, PlayerIntent::ChooseUpgrade { index: 0 });
        session.tick();
        assert_eq!(session.rejected_intents(), 1);
    }

    #[test]
    fn test_kill_drops_coins_and_offers_upgrade() {
        let mut definitions = GameDefinitions::builtin();
        definitions.loot.drop_chance = 1.0;
        definitions.loot.rare_drop_chance = 0.0;
        definitions.loot.upgrade_cost = 10;
        let config = ServerConfig {
            rng_seed: Some(7),
            ..ServerConfig::default()
        };
        let mut session = GameSession::new(Arc::new(definitions), &config);
        let id = session.add_player("p1".into());

        let crawler = session
            .state_mut()
            .spawn_enemy(ArchetypeId(1), Vec2::new(0.5, 0.0), None)
            .unwrap();
        DamageRouter::apply(session.state_mut(), EntityRef::Enemy(crawler), 1e6);
        let events = session.tick();

        assert!(events.contains(&SimEvent::Died {
            target: EntityRef::Enemy(crawler)
        }));
        assert!(events
            .iter()
            .any(|e| matches!(e, SimEvent::CoinsCollected { player, .. } if *player == id)));
        assert!(events
            .iter()
            .any(|e| matches!(e, SimEvent::UpgradeOffered { player, level: 1, .. } if *player == id)));

        let player = session.state().get_player(id).unwrap();
        assert_eq!(player.level, 1);
        assert_eq!(player.pending_upgrades.len(), 1);
        assert_eq!(session.snapshot().players[0].pending_upgrades, 1);
    }

    #[test]
    fn test_pvp_round_ends_with_winner() {
        let mut session = session();
        let a = session.add_player("a".into());
        let b = session.add_player("b".into());
        session.grant_item(a, ItemKind::PvpTrigger);

        session.submit_intent(
            a,
            0,
            PlayerIntent::UseItem {
                item: ItemKind::PvpTrigger,
            },
        );
        let events = session.tick();
        assert!(events.contains(&SimEvent::PvpStarted));
        assert!(session.state().pvp_active);
        assert_eq!(session.state().live_enemy_count(), 0);

        DamageRouter::apply(session.state_mut(), EntityRef::Player(b), 1e6);
        let events = session.tick();
        assert!(events.contains(&SimEvent::Died {
            target: EntityRef::Player(b)
        }));
        assert!(events.contains(&SimEvent::PvpEnded { winner: Some(a) }));
        assert!(!session.state().pvp_active);
        assert!(!session.spawner().is_running());
    }

    #[test]
    fn test_same_seed_same_world() {
        let id = Uuid::new_v4();
        let run = || {
            let mut session = session();
            session.add_player_with_id(id, "p1".into());
            collect(&mut session, sim::TICK_RATE as usize * 20);
            session
                .state()
                .enemies
                .values()
                .map(|e| (e.handle, e.archetype, e.body.position))
                .collect::<Vec<_>>()
        };
        let first = run();
        assert!(!first.is_empty());
        assert_eq!(first, run());
    }
}
