//! Collection/unit split for a page.
//!
//! Collections get at most `max_collection_share` of the page and shrink to
//! zero with their supply; units take the rest.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RatioTargets {
    pub target_collections: usize,
    pub target_units: usize,
}

/// `target_collections = floor(limit * min(max_share, available / limit))`,
/// `target_units = limit - target_collections`.
pub fn allocate(available_collections: usize, limit: usize, max_collection_share: f64) -> RatioTargets {
    let share = max_collection_share.clamp(0.0, 1.0);
    // floor(limit * min(share, available / limit)) == min(floor(limit * share), available);
    // the epsilon keeps 20 * 0.3 from flooring to 5
    let share_cap = (limit as f64 * share + 1e-9).floor() as usize;
    let target_collections = share_cap.min(available_collections).min(limit);

    RatioTargets {
        target_collections,
        target_units: limit - target_collections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_capped() {
        let targets = allocate(50, 20, 0.3);
        assert_eq!(
            targets,
            RatioTargets {
                target_collections: 6,
                target_units: 14,
            }
        );
    }

    #[test]
    fn test_scarce_collections_scale_down() {
        let targets = allocate(2, 20, 0.3);
        assert_eq!(targets.target_collections, 2);
        assert_eq!(targets.target_units, 18);
    }

    #[test]
    fn test_no_collections() {
        let targets = allocate(0, 20, 0.5);
        assert_eq!(targets.target_collections, 0);
        assert_eq!(targets.target_units, 20);
    }

    #[test]
    fn test_targets_always_sum_to_limit() {
        for limit in 1..60 {
            for available in 0..80 {
                for share in [0.0, 0.1, 0.25, 0.3, 0.5, 1.0] {
                    let t = allocate(available, limit, share);
                    assert_eq!(t.target_collections + t.target_units, limit);
                    assert!(t.target_collections <= available);
                    assert!(t.target_collections as f64 <= limit as f64 * share + 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_zero_limit() {
        let targets = allocate(10, 0, 0.3);
        assert_eq!(targets.target_collections, 0);
        assert_eq!(targets.target_units, 0);
    }
}
