//! Loot drops, pickups and the coin economy
//!
//! Killed swarm enemies roll a rare item drop first and a coin drop second.
//! Pickups near a player drift toward them and are collected on contact.
//! Collected coins count toward upgrade offers whose cost grows per level.

use rand::Rng;
use tracing::debug;

use crate::config::LootConfig;
use crate::game::events::SimEvent;
use crate::game::state::{EntityId, GameState, Pickup, PickupKind, Player, PlayerId};
use crate::util::vec2::Vec2;

/// Roll the drop table for an enemy killed at `position`
pub fn drop_loot<R: Rng>(
    state: &mut GameState,
    config: &LootConfig,
    position: Vec2,
    multiplier: f32,
    rng: &mut R,
) -> Option<SimEvent> {
    let kind = if !config.rare_items.is_empty() && rng.gen::<f32>() < config.rare_drop_chance {
        PickupKind::Item(config.rare_items[rng.gen_range(0..config.rare_items.len())])
    } else if rng.gen::<f32>() < config.drop_chance {
        let value = (config.coin_value as f32 * multiplier.max(0.0)).round() as u32;
        if value == 0 {
            return None;
        }
        PickupKind::Coins(value)
    } else {
        return None;
    };

    let pickup = state.next_entity_id();
    state.pickups.push(Pickup {
        id: pickup,
        position,
        kind,
    });
    Some(SimEvent::LootDropped { pickup, position, kind })
}

/// Pull pickups toward nearby players and hand out the ones touched
pub fn update(state: &mut GameState, config: &LootConfig, dt: f32) -> Vec<SimEvent> {
    let quarry: Vec<(PlayerId, Vec2, f32)> = state
        .alive_players()
        .map(|p| (p.id, p.position, p.radius))
        .collect();
    if quarry.is_empty() || state.pickups.is_empty() {
        return Vec::new();
    }

    let magnet_sq = config.magnet_radius * config.magnet_radius;
    let mut collected: Vec<(EntityId, PlayerId, PickupKind)> = Vec::new();
    for pickup in &mut state.pickups {
        let Some(&(player, position, radius)) = quarry.iter().min_by(|a, b| {
            a.1.distance_sq_to(pickup.position)
                .total_cmp(&b.1.distance_sq_to(pickup.position))
        }) else {
            continue;
        };

        let distance_sq = position.distance_sq_to(pickup.position);
        if distance_sq > magnet_sq {
            continue;
        }
        let distance = distance_sq.sqrt();
        pickup.position += pickup.position.direction_to(position) * (config.magnet_speed * dt).min(distance);

        if pickup.position.distance_to(position) <= config.pickup_radius + radius {
            collected.push((pickup.id, player, pickup.kind));
        }
    }

    let mut events = Vec::with_capacity(collected.len());
    for (pickup, player_id, kind) in collected {
        state.pickups.retain(|p| p.id != pickup);
        let Some(player) = state.get_player_mut(player_id) else {
            continue;
        };
        match kind {
            PickupKind::Coins(value) => {
                player.coins = player.coins.saturating_add(value);
                player.upgrade_progress = player.upgrade_progress.saturating_add(value);
                events.push(SimEvent::CoinsCollected {
                    player: player_id,
                    value,
                    total: player.coins,
                });
            }
            PickupKind::Item(item) => {
                player.inventory.push(item);
                debug!(player = %player_id, ?item, "Item picked up");
                events.push(SimEvent::ItemCollected { player: player_id, item });
            }
        }
    }
    events
}

/// Coins needed for the offer after `level`
pub fn upgrade_cost(config: &LootConfig, level: u32) -> u32 {
    config
        .upgrade_cost
        .saturating_add(config.upgrade_cost_growth.saturating_mul(level))
}

/// Spend progress on every threshold reached and return the levels gained
pub fn take_level_ups(player: &mut Player, config: &LootConfig) -> u32 {
    let mut gained = 0;
    loop {
        let cost = upgrade_cost(config, player.level);
        if cost == 0 || player.upgrade_progress < cost {
            return gained;
        }
        player.upgrade_progress -= cost;
        player.level += 1;
        gained += 1;
    }
}
