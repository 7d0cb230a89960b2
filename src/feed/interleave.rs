//! Type-biased interleaving of the two final lists.
//!
//! The bias pattern is a fixed table indexed by `position % len`. Each slot
//! takes from the preferred pool when it still has items, otherwise from
//! units, then collections. Both lists keep their internal order.

use std::collections::VecDeque;

use crate::error::{Error, Result};

use super::types::ContentKind;

#[derive(Debug, Clone)]
pub struct Interleaver {
    pattern: Vec<ContentKind>,
}

impl Interleaver {
    /// Fails on an empty pattern.
    pub fn new(pattern: Vec<ContentKind>) -> Result<Self> {
        if pattern.is_empty() {
            return Err(Error::config("interleave pattern cannot be empty"));
        }
        Ok(Self { pattern })
    }

    pub fn preferred_at(&self, position: usize) -> ContentKind {
        self.pattern[position % self.pattern.len()]
    }

    pub fn interleave<T>(&self, collections: Vec<T>, units: Vec<T>, limit: usize) -> Vec<T> {
        let mut collections: VecDeque<T> = collections.into();
        let mut units: VecDeque<T> = units.into();
        let total = limit.min(collections.len() + units.len());
        let mut output = Vec::with_capacity(total);

        while output.len() < total {
            let next = match self.preferred_at(output.len()) {
                ContentKind::Collection => collections.pop_front(),
                ContentKind::Unit => units.pop_front(),
            }
            .or_else(|| units.pop_front())
            .or_else(|| collections.pop_front());

            match next {
                Some(item) => output.push(item),
                None => break,
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_interleaver() -> Interleaver {
        Interleaver::new(vec![
            ContentKind::Unit,
            ContentKind::Unit,
            ContentKind::Collection,
        ])
        .unwrap()
    }

    fn labels(prefix: &str, count: usize) -> Vec<String> {
        (0..count).map(|i| format!("{}{}", prefix, i)).collect()
    }

    #[test]
    fn test_empty_pattern_rejected() {
        assert!(Interleaver::new(Vec::new()).is_err());
    }

    #[test]
    fn test_follows_pattern() {
        let out = default_interleaver().interleave(labels("c", 5), labels("u", 10), 9);
        assert_eq!(
            out,
            vec!["u0", "u1", "c0", "u2", "u3", "c1", "u4", "u5", "c2"]
        );
    }

    #[test]
    fn test_falls_back_to_units_then_collections() {
        let interleaver = default_interleaver();

        let out = interleaver.interleave(labels("c", 0), labels("u", 4), 10);
        assert_eq!(out, vec!["u0", "u1", "u2", "u3"]);

        let out = interleaver.interleave(labels("c", 4), labels("u", 1), 10);
        assert_eq!(out, vec!["u0", "c0", "c1", "c2", "c3"]);
    }

    #[test]
    fn test_pattern_wraps_around() {
        let interleaver =
            Interleaver::new(vec![ContentKind::Collection, ContentKind::Unit]).unwrap();
        assert_eq!(interleaver.preferred_at(0), ContentKind::Collection);
        assert_eq!(interleaver.preferred_at(7), ContentKind::Unit);
        assert_eq!(interleaver.preferred_at(1_000_000), ContentKind::Collection);
    }

    #[test]
    fn test_length_and_no_duplicates() {
        let interleaver = default_interleaver();
        for limit in 0..25 {
            for c in 0..8 {
                for u in 0..8 {
                    let collections = labels("c", c);
                    let units = labels("u", u);
                    let out = interleaver.interleave(collections.clone(), units.clone(), limit);
                    assert_eq!(out.len(), limit.min(c + u));

                    let mut seen = std::collections::HashSet::new();
                    for item in &out {
                        assert!(seen.insert(item.clone()));
                        assert!(collections.contains(item) || units.contains(item));
                    }

                    // Per-pool order preserved
                    let out_units: Vec<&String> =
                        out.iter().filter(|s| s.starts_with('u')).collect();
                    let expected: Vec<&String> = units.iter().take(out_units.len()).collect();
                    assert_eq!(out_units, expected);
                }
            }
        }
    }
}
