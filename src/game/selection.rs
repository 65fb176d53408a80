//! Weighted and proximity selection helpers.
//!
//! Weighted picks draw a value in `[0, total_weight)` and take the first item
//! whose cumulative weight reaches the draw. If rounding leaves the draw
//! unmatched, the first item is returned, so a non-empty input always yields
//! a pick.

use rand::Rng;

use crate::util::vec2::Vec2;

/// Stateless weighted picker
pub struct WeightedSelector;

impl WeightedSelector {
    /// Pick an index using an explicit draw.
    ///
    /// Negative and NaN weights count as zero. Returns `None` only for an empty slice.
    pub fn pick_with_draw<T>(items: &[T], weight: impl Fn(&T) -> f32, draw: f32) -> Option<usize> {
        if items.is_empty() {
            return None;
        }

        let mut cumulative = 0.0;
        for (index, item) in items.iter().enumerate() {
            cumulative += sanitize(weight(item));
            if cumulative > 0.0 && draw <= cumulative {
                return Some(index);
            }
        }

        // Float rounding (or all-zero weights) left the draw unmatched
        Some(0)
    }

    /// Pick an index with a draw taken from `rng`
    pub fn pick<T, R: Rng + ?Sized>(
        items: &[T],
        weight: impl Fn(&T) -> f32,
        rng: &mut R,
    ) -> Option<usize> {
        let total = Self::total_weight(items, &weight);
        let draw = if total > 0.0 { rng.gen_range(0.0..total) } else { 0.0 };
        Self::pick_with_draw(items, weight, draw)
    }

    pub fn total_weight<T>(items: &[T], weight: impl Fn(&T) -> f32) -> f32 {
        items.iter().map(|item| sanitize(weight(item))).sum()
    }

    /// Index of the item closest to `origin`. Ties go to the earliest item.
    pub fn nearest<T>(items: &[T], position: impl Fn(&T) -> Vec2, origin: Vec2) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (index, item) in items.iter().enumerate() {
            let dist_sq = position(item).distance_sq_to(origin);
            match best {
                Some((_, best_sq)) if dist_sq >= best_sq => {}
                _ => best = Some((index, dist_sq)),
            }
        }
        best.map(|(index, _)| index)
    }
}

#[inline]
fn sanitize(weight: f32) -> f32 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_distribution_matches_weights() {
        let weights = [1.0f32, 3.0];
        let mut rng = StdRng::seed_from_u64(0xC0FFEE);
        let mut counts = [0u32; 2];

        for _ in 0..10_000 {
            let index = WeightedSelector::pick(&weights, |w| *w, &mut rng).unwrap();
            counts[index] += 1;
        }

        let first_share = counts[0] as f32 / 10_000.0;
        assert!(
            (first_share - 0.25).abs() < 0.02,
            "expected ~25% for weight 1, got {:.3}",
            first_share
        );
    }

    #[test]
    fn test_draw_at_90th_percentile_picks_heavier() {
        let weights = [2.0f32, 8.0];
        let total = WeightedSelector::total_weight(&weights, |w| *w);
        let index = WeightedSelector::pick_with_draw(&weights, |w| *w, total * 0.9);
        assert_eq!(index, Some(1));
    }

    #[test]
    fn test_draw_boundary_takes_first_reaching_item() {
        let weights = [2.0f32, 8.0];
        assert_eq!(WeightedSelector::pick_with_draw(&weights, |w| *w, 2.0), Some(0));
        assert_eq!(WeightedSelector::pick_with_draw(&weights, |w| *w, 2.0001), Some(1));
    }

    #[test]
    fn test_unmatched_draw_falls_back_to_first() {
        let weights = [1.0f32, 1.0, 1.0];
        // Draw beyond the total, as float drift could produce
        assert_eq!(WeightedSelector::pick_with_draw(&weights, |w| *w, 3.5), Some(0));
    }

    #[test]
    fn test_zero_weights_fall_back_to_first() {
        let weights = [0.0f32, -1.0, f32::NAN];
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(WeightedSelector::pick(&weights, |w| *w, &mut rng), Some(0));
    }

    #[test]
    fn test_empty_is_none() {
        let weights: [f32; 0] = [];
        assert_eq!(WeightedSelector::pick_with_draw(&weights, |w| *w, 0.0), None);
    }

    #[test]
    fn test_nearest_prefers_first_on_tie() {
        let points = [Vec2::new(5.0, 0.0), Vec2::new(-5.0, 0.0), Vec2::new(9.0, 0.0)];
        assert_eq!(WeightedSelector::nearest(&points, |p| *p, Vec2::ZERO), Some(0));
        assert_eq!(WeightedSelector::nearest(&points, |p| *p, Vec2::new(8.0, 0.0)), Some(2));
    }
}
