//! Boss and PvP encounters
//!
//! Both encounters suspend the spawn director. A boss encounter spawns the
//! configured boss at the arena point and hands back its controller; normal
//! spawning resumes once the boss dies. PvP clears every enemy, gathers the
//! survivors around the PvP arena and lasts until at most one player is left.

use std::f32::consts::TAU;

use tracing::{debug, info, warn};

use crate::config::EncounterConfig;
use crate::game::constants::boss as boss_tuning;
use crate::game::definitions::BossDefinition;
use crate::game::events::{DespawnReason, SimEvent};
use crate::game::state::{EnemyRole, EntityId, GameState};
use crate::game::systems::boss::BossController;
use crate::game::systems::spawn::SpawnDirector;
use crate::util::vec2::Vec2;

/// Encounter due because its session timer elapsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncounterTrigger {
    Boss,
    Pvp,
}

pub struct EncounterDirector {
    config: EncounterConfig,
    boss_timer_fired: bool,
    pvp_timer_fired: bool,
    boss_active: bool,
}

impl EncounterDirector {
    pub fn new(config: EncounterConfig) -> Self {
        Self {
            config,
            boss_timer_fired: false,
            pvp_timer_fired: false,
            boss_active: false,
        }
    }

    pub fn boss_active(&self) -> bool {
        self.boss_active
    }

    /// Timers that came due at session time `elapsed`. The boss timer fires
    /// once; the PvP timer stays due until PvP actually starts.
    pub fn poll_timers(&mut self, elapsed: f32) -> Vec<EncounterTrigger> {
        let mut due = Vec::new();
        if !self.boss_timer_fired && self.config.boss_timer.map_or(false, |t| elapsed >= t) {
            self.boss_timer_fired = true;
            due.push(EncounterTrigger::Boss);
        }
        if !self.pvp_timer_fired && self.config.pvp_timer.map_or(false, |t| elapsed >= t) {
            due.push(EncounterTrigger::Pvp);
        }
        due
    }

    /// Start a boss fight. Ignored while a boss is alive or PvP is running.
    pub fn start_boss(
        &mut self,
        state: &mut GameState,
        spawner: &mut SpawnDirector,
        definition: &BossDefinition,
        allow_phase_reversal: bool,
        events: &mut Vec<SimEvent>,
    ) -> Option<BossController> {
        if self.boss_active || state.pvp_active {
            info!(boss = %definition.name, "Boss encounter request ignored");
            return None;
        }

        let position = self.config.boss_arena + Vec2::new(0.0, boss_tuning::SPAWN_OFFSET_Y);
        let Some(entity) = state.spawn_enemy(definition.archetype, position, None) else {
            warn!(boss = %definition.name, archetype = %definition.archetype, "Boss archetype missing");
            return None;
        };
        if let Some(body) = state.enemy_mut(entity) {
            body.body.role = EnemyRole::Boss;
        }

        stop_spawner(spawner, events);
        self.boss_active = true;
        info!(boss = %definition.name, entity, "Boss encounter started");

        events.push(SimEvent::EnemySpawned {
            entity,
            archetype: definition.archetype,
            position,
        });
        events.push(SimEvent::BossEncounterStarted {
            boss: entity,
            name: definition.name.clone(),
        });
        Some(BossController::new(entity, definition.clone(), allow_phase_reversal))
    }

    /// The boss died; resume spawning unless PvP took over
    pub fn on_boss_defeated(
        &mut self,
        state: &GameState,
        spawner: &mut SpawnDirector,
        boss: EntityId,
        events: &mut Vec<SimEvent>,
    ) {
        self.boss_active = false;
        events.push(SimEvent::BossDefeated { boss });
        info!(boss, "Boss defeated");

        if !state.pvp_active && spawner.start() {
            events.push(SimEvent::SpawnerStateChanged { running: true });
        }
    }

    /// The boss left the world without dying (PvP cleared it)
    pub fn on_boss_removed(&mut self) {
        self.boss_active = false;
    }

    /// Start PvP. Ignored when already running or fewer than two players are
    /// alive. Returns whether PvP started.
    pub fn start_pvp(
        &mut self,
        state: &mut GameState,
        spawner: &mut SpawnDirector,
        events: &mut Vec<SimEvent>,
    ) -> bool {
        if state.pvp_active {
            return false;
        }
        let alive = state.alive_count();
        if alive < 2 {
            debug!(alive, "PvP request ignored");
            return false;
        }

        state.pvp_active = true;
        self.pvp_timer_fired = true;
        stop_spawner(spawner, events);

        let entities: Vec<EntityId> = state.enemies.keys().copied().collect();
        for entity in entities {
            if state.despawn_enemy(entity).is_some() {
                events.push(SimEvent::EnemyDespawned {
                    entity,
                    reason: DespawnReason::Encounter,
                });
            }
        }
        state.projectiles.clear();

        let step = TAU / alive as f32;
        let center = self.config.pvp_arena;
        let radius = self.config.pvp_radius;
        for (slot, player) in state.players.iter_mut().filter(|p| p.alive).enumerate() {
            player.position = Vec2::on_circle(center, radius, step * slot as f32);
            player.move_direction = Vec2::ZERO;
        }

        info!(players = alive, "PvP encounter started");
        events.push(SimEvent::PvpStarted);
        true
    }

    /// End PvP once at most one player is alive
    pub fn check_pvp_winner(&mut self, state: &mut GameState, events: &mut Vec<SimEvent>) {
        if !state.pvp_active || state.alive_count() > 1 {
            return;
        }

        let winner = state.alive_players().next().map(|p| p.id);
        state.pvp_active = false;
        info!(winner = ?winner, "PvP encounter ended");
        events.push(SimEvent::PvpEnded { winner });
    }
}

fn stop_spawner(spawner: &mut SpawnDirector, events: &mut Vec<SimEvent>) {
    if spawner.stop() {
        events.push(SimEvent::SpawnerStateChanged { running: false });
    }
}
