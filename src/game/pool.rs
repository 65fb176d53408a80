//! Entity pooling keyed by archetype
//!
//! The pool owns every inactive instance. `acquire` moves an instance out to the
//! caller (the world) and `release` moves it back, so an instance can only ever
//! live in one place. Free lists are bounded by `max_pool_size`; a release into
//! a full list destroys the instance.

use hashbrown::HashMap;
use tracing::{debug, error};

use crate::game::definitions::ArchetypeId;
use crate::game::state::{EntityId, PlayerId};
use crate::util::vec2::Vec2;

/// A body that can be recycled through an `EntityPool`
pub trait Poolable: Sized {
    type Template;

    /// Build a fresh body from its template
    fn allocate(template: &Self::Template) -> Self;

    /// Restore template state and move to `position` before reuse
    fn reset(&mut self, template: &Self::Template, position: Vec2);
}

/// An instance handed out by (or held in) the pool
#[derive(Debug, Clone)]
pub struct PooledInstance<T> {
    pub archetype: ArchetypeId,
    /// Handle assigned on acquire; a reused instance never keeps its old handle
    pub handle: EntityId,
    pub active: bool,
    pub owner: Option<PlayerId>,
    /// False for fallback allocations of unregistered archetypes
    pooled: bool,
    pub body: T,
}

impl<T> PooledInstance<T> {
    pub fn is_pooled(&self) -> bool {
        self.pooled
    }
}

/// What happened to an instance on release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Returned to the free list
    Retained,
    /// Free list was full (or the instance was unpooled) and it was dropped
    Destroyed,
}

/// Lifetime counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub allocated: u64,
    pub reused: u64,
    pub retained: u64,
    pub destroyed: u64,
    pub unpooled: u64,
}

pub struct EntityPool<T: Poolable> {
    max_pool_size: usize,
    free: HashMap<ArchetypeId, Vec<PooledInstance<T>>>,
    active_total: usize,
    active_by_archetype: HashMap<ArchetypeId, usize>,
    active_by_owner: HashMap<PlayerId, usize>,
    stats: PoolStats,
}

impl<T: Poolable> EntityPool<T> {
    pub fn new(max_pool_size: usize) -> Self {
        Self {
            max_pool_size,
            free: HashMap::new(),
            active_total: 0,
            active_by_archetype: HashMap::new(),
            active_by_owner: HashMap::new(),
            stats: PoolStats::default(),
        }
    }

    /// Register an archetype so its instances are recycled
    pub fn register(&mut self, archetype: ArchetypeId) {
        self.free.entry(archetype).or_default();
    }

    pub fn is_registered(&self, archetype: ArchetypeId) -> bool {
        self.free.contains_key(&archetype)
    }

    /// Fill the free list for `archetype` up to `count` (bounded by `max_pool_size`)
    pub fn prewarm(&mut self, archetype: ArchetypeId, template: &T::Template, count: usize) {
        let target = count.min(self.max_pool_size);
        let free = self.free.entry(archetype).or_default();
        while free.len() < target {
            free.push(PooledInstance {
                archetype,
                handle: 0,
                active: false,
                owner: None,
                pooled: true,
                body: T::allocate(template),
            });
            self.stats.allocated += 1;
        }
        debug!(archetype = %archetype, count = free.len(), "Pool prewarmed");
    }

    /// Hand out an active instance of `archetype` at `position`.
    ///
    /// Reuses an inactive instance when one exists. An unregistered archetype is a
    /// programmer error: it panics in debug builds and falls back to an unpooled
    /// allocation otherwise.
    pub fn acquire(
        &mut self,
        archetype: ArchetypeId,
        template: &T::Template,
        position: Vec2,
        handle: EntityId,
        owner: Option<PlayerId>,
    ) -> PooledInstance<T> {
        let mut instance = match self.free.get_mut(&archetype) {
            Some(free) => match free.pop() {
                Some(mut reused) => {
                    reused.body.reset(template, position);
                    self.stats.reused += 1;
                    reused
                }
                None => {
                    self.stats.allocated += 1;
                    Self::fresh(archetype, template, position, true)
                }
            },
            None => {
                debug_assert!(false, "acquire on unregistered archetype {}", archetype);
                error!(archetype = %archetype, "Acquire on unregistered archetype, allocating unpooled");
                self.stats.unpooled += 1;
                Self::fresh(archetype, template, position, false)
            }
        };

        instance.handle = handle;
        instance.active = true;
        instance.owner = owner;

        self.active_total += 1;
        *self.active_by_archetype.entry(archetype).or_insert(0) += 1;
        if let Some(owner) = owner {
            *self.active_by_owner.entry(owner).or_insert(0) += 1;
        }

        instance
    }

    /// Take an instance back from the world
    pub fn release(&mut self, mut instance: PooledInstance<T>) -> ReleaseOutcome {
        if instance.active {
            self.active_total = self.active_total.saturating_sub(1);
            decrement(&mut self.active_by_archetype, instance.archetype);
            if let Some(owner) = instance.owner {
                decrement(&mut self.active_by_owner, owner);
            }
        }

        instance.active = false;
        instance.owner = None;

        if !instance.pooled {
            self.stats.destroyed += 1;
            return ReleaseOutcome::Destroyed;
        }

        let free = self.free.entry(instance.archetype).or_default();
        if free.len() >= self.max_pool_size {
            self.stats.destroyed += 1;
            return ReleaseOutcome::Destroyed;
        }

        free.push(instance);
        self.stats.retained += 1;
        ReleaseOutcome::Retained
    }

    fn fresh(archetype: ArchetypeId, template: &T::Template, position: Vec2, pooled: bool) -> PooledInstance<T> {
        let mut body = T::allocate(template);
        body.reset(template, position);
        PooledInstance {
            archetype,
            handle: 0,
            active: false,
            owner: None,
            pooled,
            body,
        }
    }

    #[inline]
    pub fn active_count(&self) -> usize {
        self.active_total
    }

    pub fn active_count_for(&self, archetype: ArchetypeId) -> usize {
        self.active_by_archetype.get(&archetype).copied().unwrap_or(0)
    }

    pub fn active_count_for_owner(&self, owner: PlayerId) -> usize {
        self.active_by_owner.get(&owner).copied().unwrap_or(0)
    }

    /// Inactive instances held for `archetype`
    pub fn free_count(&self, archetype: ArchetypeId) -> usize {
        self.free.get(&archetype).map_or(0, Vec::len)
    }

    pub fn total_free(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    pub fn max_pool_size(&self) -> usize {
        self.max_pool_size
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }
}

fn decrement<K: Eq + std::hash::Hash>(counts: &mut HashMap<K, usize>, key: K) {
    if let Some(count) = counts.get_mut(&key) {
        *count = count.saturating_sub(1);
        if *count == 0 {
            counts.remove(&key);
        }
    }
}
