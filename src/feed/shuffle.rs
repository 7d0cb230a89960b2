//! Soft shuffle applied to the final page.
//!
//! Pluggable strategy that reorders a page with bounded displacement so the
//! same ranking does not always render in exactly the same slots.

use super::rng::SeededRng;

/// Produces a permutation of `0..len` in which no index moves more than
/// `softness` positions.
pub trait SoftShuffle: Send + Sync {
    fn permutation(&self, len: usize, softness: usize, seed: f64) -> Vec<usize>;
}

/// Sorts by `index + r * (softness + 1)` with `r` drawn from a seeded Lehmer
/// generator. Keys of items more than `softness` apart can never cross.
#[derive(Debug, Clone, Copy, Default)]
pub struct JitterShuffle;

impl SoftShuffle for JitterShuffle {
    fn permutation(&self, len: usize, softness: usize, seed: f64) -> Vec<usize> {
        if softness == 0 || len < 2 {
            return (0..len).collect();
        }

        let mut rng = SeededRng::from_seed(seed);
        let spread = (softness + 1) as f64;
        let mut keyed: Vec<(f64, usize)> = (0..len)
            .map(|index| (index as f64 + rng.next_f64() * spread, index))
            .collect();

        keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
        keyed.into_iter().map(|(_, index)| index).collect()
    }
}

/// Reorder `items` with `shuffler`. A malformed permutation leaves the page as is.
pub fn soft_shuffle<T>(
    shuffler: &dyn SoftShuffle,
    items: Vec<T>,
    softness: usize,
    seed: f64,
) -> Vec<T> {
    let order = shuffler.permutation(items.len(), softness, seed);
    if !is_permutation(&order, items.len()) {
        tracing::warn!(
            len = items.len(),
            "Soft shuffle returned an invalid permutation, keeping ranked order"
        );
        return items;
    }

    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|index| slots[index].take())
        .collect()
}

fn is_permutation(order: &[usize], len: usize) -> bool {
    if order.len() != len {
        return false;
    }
    let mut seen = vec![false; len];
    order.iter().all(|&index| {
        index < len && !std::mem::replace(&mut seen[index], true)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Reverse;

    impl SoftShuffle for Reverse {
        fn permutation(&self, len: usize, _softness: usize, _seed: f64) -> Vec<usize> {
            (0..len).rev().collect()
        }
    }

    struct Broken;

    impl SoftShuffle for Broken {
        fn permutation(&self, len: usize, _softness: usize, _seed: f64) -> Vec<usize> {
            vec![0; len]
        }
    }

    #[test]
    fn test_zero_softness_is_identity() {
        let items: Vec<usize> = (0..20).collect();
        assert_eq!(soft_shuffle(&JitterShuffle, items.clone(), 0, 0.3), items);
    }

    #[test]
    fn test_displacement_is_bounded() {
        for softness in 1..5 {
            for seed in [0.01, 0.2, 0.42, 0.77, 0.99] {
                let order = JitterShuffle.permutation(50, softness, seed);
                assert!(is_permutation(&order, 50));
                for (position, &index) in order.iter().enumerate() {
                    assert!(position.abs_diff(index) <= softness);
                }
            }
        }
    }

    #[test]
    fn test_same_seed_same_order() {
        let a = JitterShuffle.permutation(30, 3, 0.5);
        let b = JitterShuffle.permutation(30, 3, 0.5);
        assert_eq!(a, b);
    }

    #[test]
    fn test_actually_moves_something() {
        let order = JitterShuffle.permutation(30, 3, 0.42);
        assert_ne!(order, (0..30).collect::<Vec<_>>());
    }

    #[test]
    fn test_custom_strategy_applied() {
        let out = soft_shuffle(&Reverse, vec!["a", "b", "c"], 1, 0.0);
        assert_eq!(out, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_invalid_permutation_ignored() {
        let out = soft_shuffle(&Broken, vec!["a", "b", "c"], 1, 0.0);
        assert_eq!(out, vec!["a", "b", "c"]);
    }
}
