//! Wire messages between observers and the authority
//!
//! Observers only ever send intents; the authority replies with periodic
//! snapshots and a per-tick batch of discrete events.

use serde::{Deserialize, Serialize};

use crate::game::definitions::ArchetypeId;
use crate::game::events::SimEvent;
use crate::game::pool::PooledInstance;
use crate::game::state::{Enemy, EntityId, ItemKind, Pickup, PickupKind, Player, PlayerId, Projectile};
use crate::game::systems::weapon::{WeaponInstance, WeaponLoadout};
use crate::util::vec2::Vec2;

/// Messages from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Request to join the session
    JoinRequest { player_name: String },
    /// A player intent stamped with the tick the client last saw
    Intent { tick: u64, intent: PlayerIntent },
    Leave,
    /// Ping for latency measurement
    Ping { timestamp: u64 },
}

/// Requests an observer may make; the authority validates each one
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PlayerIntent {
    /// Desired movement direction, clamped to unit length by the server
    Move { direction: Vec2 },
    UseItem { item: ItemKind },
    RequestFire { slot: u8 },
    /// Pick an option from the oldest pending upgrade offer
    ChooseUpgrade { index: u8 },
}

/// Messages from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    JoinAccepted { player_id: PlayerId },
    JoinRejected { reason: String },
    Snapshot(GameSnapshot),
    /// Discrete events of one tick, in emission order
    Events { tick: u64, events: Vec<SimEvent> },
    /// Upgrade names offered to the receiving player
    UpgradeOffer { choices: Vec<String> },
    Pong {
        client_timestamp: u64,
        server_timestamp: u64,
    },
}

/// Continuous state replicated every snapshot interval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub tick: u64,
    /// Session seconds
    pub elapsed: f32,
    pub spawner_running: bool,
    pub pvp_active: bool,
    pub players: Vec<PlayerSnapshot>,
    pub enemies: Vec<EnemySnapshot>,
    pub bosses: Vec<BossSnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
    pub pickups: Vec<PickupSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub position: Vec2,
    pub health: f32,
    pub max_health: f32,
    pub alive: bool,
    pub inventory: Vec<ItemKind>,
    pub coins: u32,
    pub level: u32,
    /// Upgrade offers waiting for a choice
    pub pending_upgrades: u32,
    pub damage_multiplier: f32,
    pub weapons: Vec<WeaponSnapshot>,
}

impl PlayerSnapshot {
    pub fn from_player(player: &Player, loadout: Option<&WeaponLoadout>) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            position: player.position,
            health: player.health.current(),
            max_health: player.health.max(),
            alive: player.alive,
            inventory: player.inventory.to_vec(),
            coins: player.coins,
            level: player.level,
            pending_upgrades: player.pending_upgrades.len() as u32,
            damage_multiplier: loadout.map_or(1.0, WeaponLoadout::damage_multiplier),
            weapons: loadout
                .map(|l| {
                    l.weapons()
                        .iter()
                        .map(|w| WeaponSnapshot::from_weapon(w, player.position))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// Weapon visual parameters; orbit weapons carry their orbital centers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponSnapshot {
    pub name: String,
    pub cooldown_remaining: f32,
    pub orbitals: Vec<Vec2>,
}

impl WeaponSnapshot {
    pub fn from_weapon(weapon: &WeaponInstance, owner_position: Vec2) -> Self {
        Self {
            name: weapon.definition.name.clone(),
            cooldown_remaining: weapon.cooldown_remaining(),
            orbitals: weapon.orbital_positions(owner_position).to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnemySnapshot {
    pub id: EntityId,
    pub archetype: ArchetypeId,
    pub position: Vec2,
    pub health: f32,
    pub max_health: f32,
}

impl EnemySnapshot {
    pub fn from_enemy(instance: &PooledInstance<Enemy>) -> Self {
        Self {
            id: instance.handle,
            archetype: instance.archetype,
            position: instance.body.position,
            health: instance.body.health.current(),
            max_health: instance.body.health.max(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BossSnapshot {
    pub id: EntityId,
    pub name: String,
    /// `None` while the default attack set is in use
    pub phase: Option<u32>,
    pub health_fraction: f32,
    pub charging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    pub id: EntityId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub hostile: bool,
}

impl ProjectileSnapshot {
    pub fn from_projectile(projectile: &Projectile) -> Self {
        Self {
            id: projectile.id,
            position: projectile.position,
            velocity: projectile.velocity,
            radius: projectile.radius,
            hostile: projectile.is_hostile(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupSnapshot {
    pub id: EntityId,
    pub position: Vec2,
    pub kind: PickupKind,
}

impl PickupSnapshot {
    pub fn from_pickup(pickup: &Pickup) -> Self {
        Self {
            id: pickup.id,
            position: pickup.position,
            kind: pickup.kind,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Encode error: {0}")]
    Encode(String),
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Encode a message using bincode.
/// Uses legacy config for fixed-size integers.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    bincode::serde::encode_to_vec(message, bincode::config::legacy()).map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Decode a message using bincode
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    bincode::serde::decode_from_slice(data, bincode::config::legacy())
        .map(|(msg, _)| msg)
        .map_err(|e| ProtocolError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::spatial::EntityRef;
    use uuid::Uuid;

    #[test]
    fn test_client_intent_message() {
        let msg = ClientMessage::Intent {
            tick: 42,
            intent: PlayerIntent::UseItem {
                item: ItemKind::BossSummon,
            },
        };
        let bytes = encode(&msg).unwrap();
        match decode::<ClientMessage>(&bytes).unwrap() {
            ClientMessage::Intent { tick, intent } => {
                assert_eq!(tick, 42);
                assert_eq!(
                    intent,
                    PlayerIntent::UseItem {
                        item: ItemKind::BossSummon
                    }
                );
            }
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_event_batch_serialization() {
        let player = Uuid::new_v4();
        let events = vec![
            SimEvent::PhaseChanged {
                boss: 7,
                from: None,
                to: Some(1),
            },
            SimEvent::SlamWarning {
                boss: 7,
                center: Vec2::new(1.0, 2.0),
                radius: 3.0,
                delay: 1.0,
            },
            SimEvent::Died {
                target: EntityRef::Player(player),
            },
            SimEvent::PvpEnded { winner: Some(player) },
        ];
        let bytes = encode(&ServerMessage::Events {
            tick: 9,
            events: events.clone(),
        })
        .unwrap();

        match decode::<ServerMessage>(&bytes).unwrap() {
            ServerMessage::Events { tick, events: decoded } => {
                assert_eq!(tick, 9);
                assert_eq!(decoded, events);
            }
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_snapshot_serialization() {
        let snapshot = GameSnapshot {
            tick: 300,
            elapsed: 10.0,
            spawner_running: true,
            pvp_active: false,
            players: vec![PlayerSnapshot {
                id: Uuid::new_v4(),
                name: "p1".into(),
                position: Vec2::new(3.0, -4.0),
                health: 80.0,
                max_health: 100.0,
                alive: true,
                inventory: vec![ItemKind::PvpTrigger],
                coins: 120,
                level: 2,
                pending_upgrades: 1,
                damage_multiplier: 1.5,
                weapons: vec![WeaponSnapshot {
                    name: "orbitals".into(),
                    cooldown_remaining: 0.0,
                    orbitals: vec![Vec2::new(1.0, 0.0), Vec2::new(-1.0, 0.0)],
                }],
            }],
            enemies: vec![],
            bosses: vec![BossSnapshot {
                id: 12,
                name: "warden".into(),
                phase: Some(2),
                health_fraction: 0.2,
                charging: true,
            }],
            projectiles: vec![],
            pickups: vec![PickupSnapshot {
                id: 40,
                position: Vec2::new(1.0, 1.0),
                kind: PickupKind::Coins(15),
            }],
        };

        let bytes = encode(&ServerMessage::Snapshot(snapshot)).unwrap();
        match decode::<ServerMessage>(&bytes).unwrap() {
            ServerMessage::Snapshot(decoded) => {
                assert_eq!(decoded.tick, 300);
                assert_eq!(decoded.players[0].weapons[0].orbitals.len(), 2);
                assert_eq!(decoded.players[0].inventory, vec![ItemKind::PvpTrigger]);
                assert_eq!(decoded.players[0].coins, 120);
                assert_eq!(decoded.pickups[0].kind, PickupKind::Coins(15));
                assert_eq!(decoded.bosses[0].phase, Some(2));
                assert!(decoded.bosses[0].charging);
            }
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_decode() {
        let result = decode::<ClientMessage>(&[0xFF, 0xFF, 0xFF, 0xFF, 0x01]);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
