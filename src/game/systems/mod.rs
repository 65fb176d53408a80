pub mod attack;
pub mod boss;
pub mod encounter;
pub mod enemy;
pub mod loot;
pub mod projectile;
pub mod spawn;
pub mod weapon;
