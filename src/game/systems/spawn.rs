//! SpawnDirector: time-scaled wave spawning
//!
//! While running, every `interval` seconds the director computes the current
//! population cap, skips the tick if the live count already reaches it, and
//! otherwise spawns a burst spread round-robin over the alive players. Each
//! unit picks a wave by weight among the waves active at the elapsed minute,
//! then a random archetype from that wave.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;
use tracing::{debug, warn};

use crate::config::{SpawnConfig, SpawnPlacement};
use crate::game::definitions::{ArchetypeId, WaveDefinition};
use crate::game::events::SimEvent;
use crate::game::selection::WeightedSelector;
use crate::game::state::{EnemyScaling, GameState, PlayerId};
use crate::util::vec2::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpawnerState {
    Stopped,
    Running,
}

pub struct SpawnDirector {
    config: SpawnConfig,
    state: SpawnerState,
    /// Seconds spent running; frozen while stopped
    elapsed: f32,
    /// Seconds until the next spawn tick
    timer: f32,
    /// Round-robin cursor over alive players
    next_player: usize,
}

impl SpawnDirector {
    pub fn new(config: SpawnConfig) -> Self {
        let timer = config.initial_delay;
        Self {
            config,
            state: SpawnerState::Stopped,
            elapsed: 0.0,
            timer,
            next_player: 0,
        }
    }

    /// Resume spawning. Returns true if the state changed.
    pub fn start(&mut self) -> bool {
        let changed = self.state != SpawnerState::Running;
        self.state = SpawnerState::Running;
        changed
    }

    /// Suspend spawning. Returns true if the state changed.
    pub fn stop(&mut self) -> bool {
        let changed = self.state != SpawnerState::Stopped;
        self.state = SpawnerState::Stopped;
        changed
    }

    #[inline]
    pub fn state(&self) -> SpawnerState {
        self.state
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.state == SpawnerState::Running
    }

    pub fn elapsed_minutes(&self) -> f32 {
        self.elapsed / 60.0
    }

    pub fn config(&self) -> &SpawnConfig {
        &self.config
    }

    /// Difficulty scalar at `minutes`
    pub fn difficulty(&self, minutes: f32) -> f32 {
        1.0 + minutes * self.config.difficulty_multiplier
    }

    /// Population cap at `minutes`
    pub fn cap(&self, minutes: f32) -> usize {
        let c = &self.config;
        let scaled = (c.base_max_enemies as f32 + c.extra_cap_per_minute * minutes * c.difficulty_multiplier).round();
        (scaled.max(0.0) as usize).min(c.absolute_max_enemies as usize)
    }

    /// Units per spawn tick for `player_count` players at `minutes`
    pub fn burst(&self, minutes: f32, player_count: usize) -> usize {
        let per_player = (self.config.base_burst as f32 + minutes * self.config.difficulty_multiplier).round();
        per_player.max(0.0) as usize * player_count
    }

    /// Advance the spawn clock and run a spawn tick when it is due
    pub fn update<R: Rng>(
        &mut self,
        state: &mut GameState,
        waves: &[WaveDefinition],
        rng: &mut R,
        dt: f32,
    ) -> Vec<SimEvent> {
        if !self.is_running() {
            return Vec::new();
        }

        self.elapsed += dt;
        self.timer -= dt;
        if self.timer > 0.0 {
            return Vec::new();
        }
        self.timer = self.config.interval;

        self.spawn_tick(state, waves, rng)
    }

    /// One spawn pass. Ignored while stopped.
    pub fn spawn_tick<R: Rng>(
        &mut self,
        state: &mut GameState,
        waves: &[WaveDefinition],
        rng: &mut R,
    ) -> Vec<SimEvent> {
        let mut events = Vec::new();
        if !self.is_running() {
            return events;
        }

        let minutes = self.elapsed_minutes();
        let cap = self.cap(minutes);
        let count = state.swarm_population();
        if count >= cap {
            debug!(count, cap, "Spawn tick skipped: at cap");
            return events;
        }

        let anchors: Vec<(PlayerId, Vec2)> = state.alive_players().map(|p| (p.id, p.position)).collect();
        if anchors.is_empty() {
            return events;
        }

        let active: Vec<&WaveDefinition> = waves.iter().filter(|w| w.is_active_at(minutes)).collect();
        if active.is_empty() && self.config.fallback_archetype.is_none() {
            warn!(minutes, "No active wave and no fallback archetype, nothing spawned");
            return events;
        }

        let difficulty = self.difficulty(minutes);
        let to_spawn = self.burst(minutes, anchors.len()).min(cap - count);

        for _ in 0..to_spawn {
            let (player_id, anchor) = anchors[self.next_player % anchors.len()];
            self.next_player = self.next_player.wrapping_add(1);

            let Some((archetype, scaling)) = self.choose_archetype(&active, difficulty, rng) else {
                continue;
            };
            let position = self.place(anchor, rng);
            let Some(entity) = state.spawn_enemy(archetype, position, Some(player_id)) else {
                continue;
            };

            if let (Some(template), Some(instance)) =
                (state.archetypes.enemy(archetype), state.enemies.get_mut(&entity))
            {
                instance.body.apply_scaling(template, scaling);
            }

            events.push(SimEvent::EnemySpawned {
                entity,
                archetype,
                position,
            });
        }

        debug!(spawned = events.len(), cap, minutes, "Spawn tick");
        events
    }

    fn choose_archetype<R: Rng>(
        &self,
        active: &[&WaveDefinition],
        difficulty: f32,
        rng: &mut R,
    ) -> Option<(ArchetypeId, EnemyScaling)> {
        let Some(index) = WeightedSelector::pick(active, |w| w.spawn_weight, rng) else {
            return self.config.fallback_archetype.map(|archetype| {
                (
                    archetype,
                    EnemyScaling {
                        difficulty,
                        health_multiplier: 1.0,
                        damage_multiplier: 1.0,
                    },
                )
            });
        };

        let wave = active[index];
        if wave.archetypes.is_empty() {
            warn!(wave = %wave.name, "Wave has no archetypes");
            return None;
        }

        let archetype = wave.archetypes[rng.gen_range(0..wave.archetypes.len())];
        Some((
            archetype,
            EnemyScaling {
                difficulty,
                health_multiplier: wave.health_multiplier,
                damage_multiplier: wave.damage_multiplier,
            },
        ))
    }

    /// Spawn position around `anchor`, clamped into the map when configured
    fn place<R: Rng>(&self, anchor: Vec2, rng: &mut R) -> Vec2 {
        let offset = match self.config.placement {
            SpawnPlacement::Ring { radius } => Vec2::from_angle(rng.gen_range(0.0..TAU)) * radius,
            SpawnPlacement::ViewEdge {
                half_height,
                aspect,
                buffer,
            } => {
                let half_w = (half_height * aspect + buffer).max(0.0);
                let half_h = (half_height + buffer).max(0.0);
                match rng.gen_range(0..4u8) {
                    0 => Vec2::new(rng.gen_range(-half_w..=half_w), half_h),
                    1 => Vec2::new(rng.gen_range(-half_w..=half_w), -half_h),
                    2 => Vec2::new(-half_w, rng.gen_range(-half_h..=half_h)),
                    _ => Vec2::new(half_w, rng.gen_range(-half_h..=half_h)),
                }
            }
        };

        let position = anchor + offset;
        if self.config.clamp_to_map {
            position.clamp_to_bounds(self.config.map_half_extents, self.config.map_padding)
        } else {
            position
        }
    }
}
