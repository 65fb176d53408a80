//! Cooldown timers
//!
//! `Cooldown` is the single timer carried by every attack and weapon instance.
//! `CooldownScheduler` is a keyed timer bank used where cooldowns are tracked
//! per target (contact damage, orbitals).

use hashbrown::HashMap;
use std::hash::Hash;

/// A countdown timer. Ready once the remaining time reaches zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cooldown {
    remaining: f32,
}

impl Cooldown {
    /// A cooldown that is ready immediately
    pub fn ready() -> Self {
        Self { remaining: 0.0 }
    }

    /// A cooldown that becomes ready after `seconds`
    pub fn after(seconds: f32) -> Self {
        Self {
            remaining: seconds.max(0.0),
        }
    }

    /// Advance the timer by `dt` seconds
    #[inline]
    pub fn tick(&mut self, dt: f32) {
        if self.remaining > 0.0 {
            self.remaining -= dt;
        }
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.remaining <= 0.0
    }

    /// Restart the timer with `seconds` remaining
    #[inline]
    pub fn trigger(&mut self, seconds: f32) {
        self.remaining = seconds.max(0.0);
    }

    pub fn remaining(&self) -> f32 {
        self.remaining.max(0.0)
    }
}

/// Timer bank keyed by actor or target id.
///
/// Keys with no running timer are ready. Expired timers are dropped on `advance`.
#[derive(Debug, Clone)]
pub struct CooldownScheduler<K: Eq + Hash + Copy> {
    timers: HashMap<K, f32>,
}

impl<K: Eq + Hash + Copy> CooldownScheduler<K> {
    pub fn new() -> Self {
        Self {
            timers: HashMap::new(),
        }
    }

    /// Advance every timer by `dt` and forget the ones that expired
    pub fn advance(&mut self, dt: f32) {
        self.timers.retain(|_, remaining| {
            *remaining -= dt;
            *remaining > 0.0
        });
    }

    pub fn is_ready(&self, key: K) -> bool {
        self.timers.get(&key).map_or(true, |remaining| *remaining <= 0.0)
    }

    /// Start (or restart) the timer for `key`
    pub fn start(&mut self, key: K, seconds: f32) {
        if seconds > 0.0 {
            self.timers.insert(key, seconds);
        } else {
            self.timers.remove(&key);
        }
    }

    /// If `key` is ready, start its timer and return true
    pub fn try_consume(&mut self, key: K, seconds: f32) -> bool {
        if !self.is_ready(key) {
            return false;
        }
        self.start(key, seconds);
        true
    }

    /// Number of keys currently cooling down
    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }
}

impl<K: Eq + Hash + Copy> Default for CooldownScheduler<K> {
    fn default() -> Self {
        Self::new()
    }
}
