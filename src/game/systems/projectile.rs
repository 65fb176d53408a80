//! Projectile motion and hit resolution
//!
//! Player projectiles damage enemies, and other players while PvP is active.
//! Hostile projectiles damage players only. A projectile never hits the same
//! target twice and stops after `1 + pierce` hits.

use crate::game::health::DamageRouter;
use crate::game::spatial::{EntityRef, SpatialEntity, SpatialQuery};
use crate::game::state::{GameState, ProjectileOwner};

/// Move, collide and expire every projectile
pub fn update(state: &mut GameState, dt: f32) {
    for projectile in &mut state.projectiles {
        projectile.position += projectile.velocity * dt;
        projectile.lifetime -= dt;
    }

    resolve_hits(state);

    state.projectiles.retain(|p| !p.is_expired());
}

fn resolve_hits(state: &mut GameState) {
    let pvp_active = state.pvp_active;

    for index in 0..state.projectiles.len() {
        let projectile = &state.projectiles[index];
        if projectile.is_expired() {
            continue;
        }

        let owner = projectile.owner;
        let candidates = state.grid.find_all(projectile.position, projectile.radius, &|e: &SpatialEntity| {
            can_hit(owner, e.id, pvp_active)
        });

        for target in candidates {
            let projectile = &state.projectiles[index];
            if projectile.is_expired() {
                break;
            }
            if projectile.hits.contains(&target) || !state.is_targetable(target) {
                continue;
            }

            let damage = projectile.damage;
            DamageRouter::apply(state, target, damage);

            let projectile = &mut state.projectiles[index];
            projectile.hits.push(target);
            if projectile.pierce_remaining == 0 {
                projectile.lifetime = 0.0;
            } else {
                projectile.pierce_remaining -= 1;
            }
        }
    }
}

fn can_hit(owner: ProjectileOwner, target: EntityRef, pvp_active: bool) -> bool {
    match (owner, target) {
        (ProjectileOwner::Hostile(_), EntityRef::Player(_)) => true,
        (ProjectileOwner::Hostile(_), EntityRef::Enemy(_)) => false,
        (ProjectileOwner::Player(_), EntityRef::Enemy(_)) => true,
        (ProjectileOwner::Player(shooter), EntityRef::Player(id)) => pvp_active && id != shooter,
    }
}
