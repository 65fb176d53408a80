pub mod constants;
pub mod cooldown;
pub mod definitions;
pub mod events;
pub mod health;
pub mod input_buffer;
pub mod pool;
pub mod selection;
pub mod session;
pub mod spatial;
pub mod state;
pub mod systems;
