//! Which merge sources can have their chunks copied verbatim
//!
//! A source store matches when every field it declares exists in the
//! merged field numbering under the same number and name. Its serialized
//! documents are then already valid in the merged store.

use crate::dsl::FieldInfos;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchingReaders {
    matching: Vec<bool>,
    count: usize,
}

impl MatchingReaders {
    pub fn new(sources: &[&FieldInfos], merged: &FieldInfos) -> Self {
        let matching: Vec<bool> = sources
            .iter()
            .map(|source| {
                source.iter().all(|info| {
                    merged
                        .field_info_by_number(info.number.0)
                        .is_some_and(|other| other.name == info.name)
                })
            })
            .collect();
        let count = matching.iter().filter(|&&m| m).count();
        Self { matching, count }
    }

    /// Whether source `idx` shares the merged numbering
    pub fn is_matching(&self, idx: usize) -> bool {
        self.matching.get(idx).copied().unwrap_or(false)
    }

    /// Number of matching sources
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn matching(&self) -> &[bool] {
        &self.matching
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_readers() {
        let merged = FieldInfos::from_pairs([("x", 0), ("y", 1)]).unwrap();
        let a = FieldInfos::from_pairs([("x", 0), ("y", 1)]).unwrap();
        let b = FieldInfos::from_pairs([("x", 1)]).unwrap();
        let c = FieldInfos::from_pairs([("z", 0)]).unwrap();

        let m = MatchingReaders::new(&[&a, &b, &c], &merged);
        assert_eq!(m.matching(), &[true, false, false]);
        assert_eq!(m.count(), 1);
        assert!(m.is_matching(0));
        assert!(!m.is_matching(2));
        assert!(!m.is_matching(3));
    }

    #[test]
    fn test_swapped_numbers_do_not_match() {
        let merged = FieldInfos::from_pairs([("x", 0), ("y", 1), ("z", 2)]).unwrap();
        let a = FieldInfos::from_pairs([("x", 0), ("y", 1)]).unwrap();
        let b = FieldInfos::from_pairs([("x", 1), ("y", 0)]).unwrap();

        let m = MatchingReaders::new(&[&a, &b], &merged);
        assert!(m.is_matching(0));
        assert!(!m.is_matching(1));
        assert_eq!(m.count(), 1);
    }

    #[test]
    fn test_subset_and_empty_sources_match() {
        let merged = FieldInfos::from_pairs([("x", 0), ("y", 1), ("z", 2)]).unwrap();
        let subset = FieldInfos::from_pairs([("y", 1)]).unwrap();
        let empty = FieldInfos::new();

        let m = MatchingReaders::new(&[&subset, &empty], &merged);
        assert_eq!(m.matching(), &[true, true]);
        assert_eq!(m.count(), 2);

        let none = MatchingReaders::new(&[], &merged);
        assert_eq!(none.count(), 0);
        assert!(none.matching().is_empty());
    }
}
