//! Spatial hash grid and the proximity query interface
//!
//! Divides the play plane into square cells. Queries only visit the cells
//! overlapping the query circle (grown by the largest inserted radius), then
//! filter by true circle-circle overlap.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::game::state::{EntityId, PlayerId};
use crate::util::vec2::Vec2;

/// Default cell size in world units
pub const ENTITY_GRID_CELL_SIZE: f32 = 8.0;

/// Initial capacity for grid cells (number of expected non-empty cells)
const ENTITY_GRID_INITIAL_CAPACITY: usize = 256;

/// Initial capacity for entity vectors within cells
const ENTITY_CELL_INITIAL_CAPACITY: usize = 8;

/// Grid cell key - (x, y) cell coordinates
pub type CellKey = (i32, i32);

/// Reference to any damageable entity in the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityRef {
    Player(PlayerId),
    Enemy(EntityId),
}

/// Entity data stored in the spatial grid
#[derive(Debug, Clone, Copy)]
pub struct SpatialEntity {
    pub id: EntityRef,
    pub position: Vec2,
    pub radius: f32,
}

/// Resolved view of an entity at query time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityHandle {
    pub id: EntityRef,
    pub position: Vec2,
    pub radius: f32,
    pub alive: bool,
}

/// Proximity queries over live bodies.
///
/// A body matches when the query circle and the body circle overlap
/// (`distance <= radius + body.radius`). Results are deterministic: nearest
/// ties and `find_all` ordering both fall back to `EntityRef` ordering.
pub trait SpatialQuery {
    fn find_nearest(
        &self,
        position: Vec2,
        radius: f32,
        predicate: &dyn Fn(&SpatialEntity) -> bool,
    ) -> Option<EntityRef>;

    fn find_all(
        &self,
        position: Vec2,
        radius: f32,
        predicate: &dyn Fn(&SpatialEntity) -> bool,
    ) -> Vec<EntityRef>;
}

/// Identity lookup from a reference to the entity's current state
pub trait EntityResolver {
    fn resolve(&self, id: EntityRef) -> Option<EntityHandle>;
}

/// Spatial hash grid for proximity queries
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    /// Inverse cell size for fast position-to-cell conversion
    inv_cell_size: f32,
    /// Map from cell key to entities in that cell
    cells: HashMap<CellKey, Vec<SpatialEntity>>,
    /// Largest radius inserted since the last clear
    max_radius: f32,
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            inv_cell_size: 1.0 / cell_size,
            cells: HashMap::with_capacity(ENTITY_GRID_INITIAL_CAPACITY),
            max_radius: 0.0,
        }
    }

    /// Clear all entities from the grid, keeping cell allocations
    #[inline]
    pub fn clear(&mut self) {
        for cell in self.cells.values_mut() {
            cell.clear();
        }
        self.max_radius = 0.0;
    }

    #[inline]
    fn position_to_cell(&self, position: Vec2) -> CellKey {
        (
            (position.x * self.inv_cell_size).floor() as i32,
            (position.y * self.inv_cell_size).floor() as i32,
        )
    }

    #[inline]
    pub fn insert(&mut self, entity: SpatialEntity) {
        if !entity.position.is_finite() {
            return;
        }
        self.max_radius = self.max_radius.max(entity.radius);
        let cell_key = self.position_to_cell(entity.position);
        self.cells
            .entry(cell_key)
            .or_insert_with(|| Vec::with_capacity(ENTITY_CELL_INITIAL_CAPACITY))
            .push(entity);
    }

    /// Rebuild from scratch
    pub fn rebuild(&mut self, entities: impl Iterator<Item = SpatialEntity>) {
        self.clear();
        for entity in entities {
            self.insert(entity);
        }
    }

    /// Visit every entity overlapping the circle at `position` with `radius`
    fn for_each_overlapping(&self, position: Vec2, radius: f32, mut visit: impl FnMut(&SpatialEntity, f32)) {
        if !position.is_finite() || !radius.is_finite() || radius < 0.0 {
            return;
        }

        let reach = radius + self.max_radius;
        let (min_x, min_y) = self.position_to_cell(position - Vec2::new(reach, reach));
        let (max_x, max_y) = self.position_to_cell(position + Vec2::new(reach, reach));

        for cx in min_x..=max_x {
            for cy in min_y..=max_y {
                let Some(cell) = self.cells.get(&(cx, cy)) else {
                    continue;
                };
                for entity in cell {
                    let distance = entity.position.distance_to(position);
                    if distance <= radius + entity.radius {
                        visit(entity, distance);
                    }
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SpatialQuery for SpatialGrid {
    fn find_nearest(
        &self,
        position: Vec2,
        radius: f32,
        predicate: &dyn Fn(&SpatialEntity) -> bool,
    ) -> Option<EntityRef> {
        let mut best: Option<(f32, EntityRef)> = None;
        self.for_each_overlapping(position, radius, |entity, distance| {
            if !predicate(entity) {
                return;
            }
            let closer = match best {
                None => true,
                Some((best_distance, best_id)) => match distance.partial_cmp(&best_distance) {
                    Some(Ordering::Less) => true,
                    Some(Ordering::Equal) => entity.id < best_id,
                    _ => false,
                },
            };
            if closer {
                best = Some((distance, entity.id));
            }
        });
        best.map(|(_, id)| id)
    }

    fn find_all(
        &self,
        position: Vec2,
        radius: f32,
        predicate: &dyn Fn(&SpatialEntity) -> bool,
    ) -> Vec<EntityRef> {
        let mut found = Vec::new();
        self.for_each_overlapping(position, radius, |entity, _| {
            if predicate(entity) {
                found.push(entity.id);
            }
        });
        found.sort_unstable();
        found.dedup();
        found
    }
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(ENTITY_GRID_CELL_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn enemy(id: EntityId, x: f32, y: f32, radius: f32) -> SpatialEntity {
        SpatialEntity {
            id: EntityRef::Enemy(id),
            position: Vec2::new(x, y),
            radius,
        }
    }

    fn any(_: &SpatialEntity) -> bool {
        true
    }

    #[test]
    fn test_find_all_uses_body_radius() {
        let mut grid = SpatialGrid::new(4.0);
        grid.insert(enemy(1, 5.0, 0.0, 0.5));
        grid.insert(enemy(2, 5.6, 0.0, 0.5));

        // Query radius 4.5 reaches the edge of the first body only
        let hits = grid.find_all(Vec2::ZERO, 4.5, &any);
        assert_eq!(hits, vec![EntityRef::Enemy(1)]);
    }

    #[test]
    fn test_find_all_spans_many_cells() {
        let mut grid = SpatialGrid::new(2.0);
        for i in 0..10 {
            grid.insert(enemy(i, i as f32 * 3.0 - 15.0, 0.0, 0.2));
        }
        let hits = grid.find_all(Vec2::ZERO, 10.0, &any);
        // x runs -15..=12 in steps of 3; within 10.2 are -9 through 9
        assert_eq!(hits.len(), 7);
        assert!(hits.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_find_nearest_with_predicate() {
        let mut grid = SpatialGrid::default();
        grid.insert(enemy(1, 1.0, 0.0, 0.5));
        grid.insert(enemy(2, 3.0, 0.0, 0.5));

        assert_eq!(grid.find_nearest(Vec2::ZERO, 10.0, &any), Some(EntityRef::Enemy(1)));
        let skip_first = |e: &SpatialEntity| e.id != EntityRef::Enemy(1);
        assert_eq!(grid.find_nearest(Vec2::ZERO, 10.0, &skip_first), Some(EntityRef::Enemy(2)));
        assert_eq!(grid.find_nearest(Vec2::ZERO, 0.1, &skip_first), None);
    }

    #[test]
    fn test_find_nearest_tie_breaks_by_ref() {
        let mut grid = SpatialGrid::default();
        grid.insert(enemy(7, 2.0, 0.0, 0.5));
        grid.insert(enemy(3, -2.0, 0.0, 0.5));
        assert_eq!(grid.find_nearest(Vec2::ZERO, 5.0, &any), Some(EntityRef::Enemy(3)));
    }

    #[test]
    fn test_players_and_enemies_coexist() {
        let mut grid = SpatialGrid::default();
        let player = Uuid::new_v4();
        grid.insert(SpatialEntity {
            id: EntityRef::Player(player),
            position: Vec2::new(1.0, 1.0),
            radius: 0.5,
        });
        grid.insert(enemy(1, -1.0, -1.0, 0.5));

        let players_only = |e: &SpatialEntity| matches!(e.id, EntityRef::Player(_));
        assert_eq!(
            grid.find_all(Vec2::ZERO, 3.0, &players_only),
            vec![EntityRef::Player(player)]
        );
    }

    #[test]
    fn test_clear_and_rebuild() {
        let mut grid = SpatialGrid::default();
        grid.insert(enemy(1, 0.0, 0.0, 0.5));
        assert_eq!(grid.len(), 1);

        grid.rebuild([enemy(2, 1.0, 1.0, 0.5), enemy(3, 2.0, 2.0, 0.5)].into_iter());
        assert_eq!(grid.len(), 2);
        assert!(grid.find_all(Vec2::ZERO, 0.1, &|e: &SpatialEntity| e.id == EntityRef::Enemy(1)).is_empty());
    }

    #[test]
    fn test_non_finite_ignored() {
        let mut grid = SpatialGrid::default();
        grid.insert(enemy(1, f32::NAN, 0.0, 0.5));
        assert!(grid.is_empty());
        assert!(grid.find_all(Vec2::new(f32::INFINITY, 0.0), 1.0, &any).is_empty());
    }
}
