//! Discrete simulation events broadcast to observers every tick

use serde::{Deserialize, Serialize};

use crate::game::definitions::ArchetypeId;
use crate::game::spatial::EntityRef;
use crate::game::state::{EntityId, ItemKind, PickupKind, PlayerId};
use crate::util::vec2::Vec2;

/// Why an enemy left the world without dying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DespawnReason {
    /// Farther than the despawn distance from every player
    OutOfRange,
    /// Cleared when PvP started
    Encounter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    EnemySpawned {
        entity: EntityId,
        archetype: ArchetypeId,
        position: Vec2,
    },
    EnemyDespawned {
        entity: EntityId,
        reason: DespawnReason,
    },
    Died {
        target: EntityRef,
    },
    SpawnerStateChanged {
        running: bool,
    },
    /// `None` means the boss fell back to its default attack set
    PhaseChanged {
        boss: EntityId,
        from: Option<usize>,
        to: Option<usize>,
    },
    WindupStarted {
        boss: EntityId,
        direction: Vec2,
        duration: f32,
    },
    ChargeStarted {
        boss: EntityId,
        direction: Vec2,
    },
    ChargeEnded {
        boss: EntityId,
    },
    SlamWarning {
        boss: EntityId,
        center: Vec2,
        radius: f32,
        delay: f32,
    },
    SlamImpact {
        boss: EntityId,
        center: Vec2,
        radius: f32,
        hits: u32,
    },
    /// An in-flight windup, dash or slam warning was abandoned
    AttackCancelled {
        boss: EntityId,
        attack: String,
    },
    Summoned {
        boss: EntityId,
        count: u32,
    },
    ProjectileFired {
        projectile: EntityId,
        position: Vec2,
        velocity: Vec2,
        hostile: bool,
    },
    UpgradeApplied {
        player: PlayerId,
        upgrade: String,
    },
    LootDropped {
        pickup: EntityId,
        position: Vec2,
        kind: PickupKind,
    },
    CoinsCollected {
        player: PlayerId,
        value: u32,
        total: u32,
    },
    ItemCollected {
        player: PlayerId,
        item: ItemKind,
    },
    /// Coins crossed an upgrade threshold; `choices` are upgrade names
    UpgradeOffered {
        player: PlayerId,
        level: u32,
        choices: Vec<String>,
    },
    BossEncounterStarted {
        boss: EntityId,
        name: String,
    },
    BossDefeated {
        boss: EntityId,
    },
    PvpStarted,
    PvpEnded {
        winner: Option<PlayerId>,
    },
}
