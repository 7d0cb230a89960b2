//! Per-author diversification
//!
//! A single author may contribute at most `cap` items to a page. When the
//! capped selection is too small to fill the page, the cap is raised one step
//! at a time, up to `base_cap + max_relaxation_steps`, and no further than
//! needed.

use std::collections::HashMap;

use super::types::{ContentItem, DiversificationResult, ScoredItem};

/// Keep items while their author is below `cap`. Input order is preserved.
pub fn diversify<'a>(items: &[ScoredItem<'a>], cap: usize) -> Vec<ScoredItem<'a>> {
    let mut per_author: HashMap<&'a str, usize> = HashMap::new();
    let mut selected = Vec::new();

    for scored in items {
        let item: &'a ContentItem = scored.item;
        let count = per_author.entry(item.author_id.as_str()).or_insert(0);
        if *count < cap {
            *count += 1;
            selected.push(*scored);
        }
    }

    selected
}

/// Smallest cap in `[max(1, base_cap), base_cap + max_relaxation_steps]`
/// whose selection size reaches `min_target`, or the upper bound if none does.
fn relaxed_cap(
    base_cap: usize,
    max_relaxation_steps: usize,
    min_target: usize,
    mut selected_at: impl FnMut(usize) -> usize,
) -> usize {
    let ceiling = base_cap.saturating_add(max_relaxation_steps);
    let mut applied_cap = base_cap.max(1);

    while selected_at(applied_cap) < min_target && applied_cap < ceiling {
        applied_cap += 1;
    }

    applied_cap
}

/// Diversify one list, relaxing the cap until `min_target` items survive.
/// Returns the selection and the cap actually applied.
pub fn relax<'a>(
    items: &[ScoredItem<'a>],
    base_cap: usize,
    max_relaxation_steps: usize,
    min_target: usize,
) -> (Vec<ScoredItem<'a>>, usize) {
    let applied_cap = relaxed_cap(base_cap, max_relaxation_steps, min_target, |cap| {
        diversify(items, cap).len()
    });
    (diversify(items, applied_cap), applied_cap)
}

/// Diversify both pools under one shared cap, relaxing until their combined
/// size reaches `min_target`.
pub fn relax_pools<'a>(
    collections: &[ScoredItem<'a>],
    units: &[ScoredItem<'a>],
    base_cap: usize,
    max_relaxation_steps: usize,
    min_target: usize,
) -> DiversificationResult<'a> {
    let applied_cap = relaxed_cap(base_cap, max_relaxation_steps, min_target, |cap| {
        diversify(collections, cap).len() + diversify(units, cap).len()
    });

    let selected_collections = diversify(collections, applied_cap);
    let selected_units = diversify(units, applied_cap);
    let combined_count = selected_collections.len() + selected_units.len();

    DiversificationResult {
        selected_collections,
        selected_units,
        applied_cap,
        combined_count,
    }
}
