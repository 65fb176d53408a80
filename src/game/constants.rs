//! Tuning constants grouped per concern.
//!
//! These are the defaults used when a definitions file leaves a field out.

/// Simulation timing
pub mod sim {
    /// Server tick rate in Hz
    pub const TICK_RATE: u32 = 30;
    /// Delta time per tick in seconds
    pub const DT: f32 = 1.0 / 30.0;
    /// Snapshot broadcast rate in Hz
    pub const SNAPSHOT_RATE: u32 = 10;
}

/// SpawnDirector defaults
pub mod spawn {
    /// Seconds between spawn ticks
    pub const INTERVAL: f32 = 2.0;
    /// Delay before the first spawn tick after the director starts
    pub const INITIAL_DELAY: f32 = 2.0;
    /// Units spawned per player per tick at minute zero
    pub const BASE_BURST: u32 = 1;
    /// Scales burst growth, cap growth and enemy stat gains over time
    pub const DIFFICULTY_MULTIPLIER: f32 = 1.0;
    /// Population cap at minute zero
    pub const BASE_MAX_ENEMIES: u32 = 20;
    /// Cap growth per elapsed minute (before difficulty)
    pub const EXTRA_CAP_PER_MINUTE: f32 = 10.0;
    /// Hard limit on the live population regardless of elapsed time
    pub const ABSOLUTE_MAX_ENEMIES: u32 = 50;
    /// Distance from the chosen player for ring placement
    pub const RING_RADIUS: f32 = 22.0;
    /// Reference camera half-height for view-edge placement
    pub const VIEW_HALF_HEIGHT: f32 = 10.0;
    /// Reference camera aspect ratio (width / height)
    pub const VIEW_ASPECT: f32 = 1.777;
    /// Extra distance outside the reference view
    pub const VIEW_BUFFER: f32 = 2.0;
    /// Half extents of the playable map
    pub const MAP_HALF_EXTENT: f32 = 1000.0;
    /// Padding kept inside the map edge
    pub const MAP_PADDING: f32 = 5.0;
}

/// Difficulty scaling applied to freshly spawned enemies
pub mod scaling {
    /// Extra max health per difficulty level (before the wave multiplier)
    pub const HEALTH_PER_DIFFICULTY: f32 = 10.0;
    /// Damage gain per difficulty level (20%)
    pub const DAMAGE_PER_DIFFICULTY: f32 = 0.2;
    /// Speed loss per difficulty level
    pub const SPEED_LOSS_PER_DIFFICULTY: f32 = 0.1;
}

/// EntityPool defaults
pub mod pool {
    /// Maximum inactive instances retained per archetype
    pub const MAX_POOL_SIZE: usize = 50;
}

/// Swarm enemy behavior
pub mod enemy {
    /// Seconds between nearest-player re-targeting
    pub const TRACKING_REFRESH: f32 = 0.5;
    /// Seconds between contact hits on the same player
    pub const DAMAGE_INTERVAL: f32 = 1.0;
    /// Enemies farther than this from every player are released
    pub const DESPAWN_DISTANCE: f32 = 50.0;
    /// Seconds between despawn-distance sweeps
    pub const DESPAWN_CHECK_INTERVAL: f32 = 2.0;
    /// Lifetime of hostile projectiles in seconds
    pub const PROJECTILE_LIFETIME: f32 = 5.0;
}

/// Boss behavior
pub mod boss {
    /// Health fraction used for the initial phase evaluation
    pub const INITIAL_HEALTH_FRACTION: f32 = 1.0;
    /// Offset from the arena point where the boss appears
    pub const SPAWN_OFFSET_Y: f32 = 5.0;
    /// Spawn offset for boss projectiles along their heading
    pub const PROJECTILE_MUZZLE_OFFSET: f32 = 0.5;
}

/// Player weapons
pub mod weapon {
    /// Per-target cooldown for orbital contact damage
    pub const ORBIT_HIT_COOLDOWN: f32 = 0.5;
    /// Default orbital angular speed in degrees per second
    pub const ORBIT_ANGULAR_SPEED_DEG: f32 = 180.0;
    /// Contact radius of a single orbital
    pub const ORBITAL_RADIUS: f32 = 0.5;
    /// Lifetime of player projectiles in seconds
    pub const PROJECTILE_LIFETIME: f32 = 3.0;
}

/// Player defaults
pub mod player {
    pub const MAX_HEALTH: f32 = 100.0;
    pub const SPEED: f32 = 5.0;
    pub const RADIUS: f32 = 0.5;
    /// Inventory slots kept inline before spilling to the heap
    pub const INVENTORY_INLINE: usize = 4;
    /// Upgrades offered per level-up
    pub const UPGRADE_CHOICES: usize = 3;
}

/// Loot drops, pickups and coin-driven level-ups
pub mod loot {
    /// Coins in one drop before the loot multiplier
    pub const COIN_VALUE: u32 = 10;
    /// Chance that a killed enemy drops coins
    pub const DROP_CHANCE: f32 = 0.5;
    /// Chance of a rare item drop, rolled before the coin drop
    pub const RARE_DROP_CHANCE: f32 = 0.01;
    /// Contact radius of a pickup
    pub const PICKUP_RADIUS: f32 = 0.5;
    /// Pickups within this distance drift toward the nearest player
    pub const MAGNET_RADIUS: f32 = 4.0;
    /// Drift speed of magnetized pickups
    pub const MAGNET_SPEED: f32 = 10.0;
    /// Coins needed for the first upgrade offer
    pub const UPGRADE_COST: u32 = 50;
    /// Extra coins needed for each further offer
    pub const UPGRADE_COST_GROWTH: u32 = 25;
}

/// Encounter directors
pub mod encounter {
    /// Session seconds before the boss encounter starts on its own
    pub const BOSS_TIMER: f32 = 300.0;
    /// Session seconds before PvP is forced
    pub const PVP_TIMER: f32 = 1200.0;
    /// Radius of the circle players are teleported onto when PvP starts
    pub const PVP_TELEPORT_RADIUS: f32 = 10.0;
}

/// Observer intent handling
pub mod intent {
    /// Intents older than this many ticks are stale and dropped
    pub const MAX_INTENT_AGE_TICKS: u64 = 30;
    /// Default capacity of the intent queue
    pub const BUFFER_CAPACITY: usize = 1024;
}
