//! Horde Server Library
//!
//! Authoritative simulation core for a co-op survival game: pooled enemy
//! waves, phased boss fights, player weapons and encounter directors, driven
//! by a fixed-rate tick.

pub mod config;
pub mod util;
pub mod game;
pub mod net;
pub mod metrics;
