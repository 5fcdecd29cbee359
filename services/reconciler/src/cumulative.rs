//! Cumulative (inequality) join of alert groups against the reference set
//!
//! For a group `(year, key)` the count is the number of reference records
//! with the same key and `creation_year <= year`. A record created in the
//! alert year already counts.
//!
//! References are bucketed by municipality and each bucket sorted by
//! creation year, so one group resolves with a single binary search.

use crate::records::{AggregatedGroup, CumulativeRow, ReferenceRecord};
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::info;

/// How groups are resolved against the index. Both give identical rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JoinStrategy {
    #[default]
    Sequential,
    Parallel,
}

/// Creation years per municipality key, each bucket sorted ascending
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    years_by_key: HashMap<String, Vec<i32>>,
}

impl ReferenceIndex {
    pub fn build(references: &[ReferenceRecord]) -> Self {
        let mut years_by_key: HashMap<String, Vec<i32>> = HashMap::new();
        for reference in references {
            years_by_key
                .entry(reference.municipality_key.clone())
                .or_default()
                .push(reference.creation_year);
        }
        for years in years_by_key.values_mut() {
            years.sort_unstable();
        }
        Self { years_by_key }
    }

    /// Number of references for `key` created in or before `year`.
    pub fn count_until(&self, key: &str, year: i32) -> usize {
        self.years_by_key
            .get(key)
            .map_or(0, |years| years.partition_point(|&created| created <= year))
    }

    pub fn municipalities(&self) -> usize {
        self.years_by_key.len()
    }
}

fn resolve(index: &ReferenceIndex, group: AggregatedGroup) -> CumulativeRow {
    let cumulative_reference_count = index.count_until(&group.municipality_key, group.year);
    CumulativeRow {
        year: group.year,
        municipality_key: group.municipality_key,
        cumulative_reference_count,
        total_area: group.total_area,
    }
}

/// Join groups against references. Output order equals input order.
pub fn join(groups: Vec<AggregatedGroup>, references: &[ReferenceRecord]) -> Vec<CumulativeRow> {
    join_with(groups, references, JoinStrategy::Sequential)
}

pub fn join_with(
    groups: Vec<AggregatedGroup>,
    references: &[ReferenceRecord],
    strategy: JoinStrategy,
) -> Vec<CumulativeRow> {
    let index = ReferenceIndex::build(references);
    info!(
        groups = groups.len(),
        references = references.len(),
        municipalities = index.municipalities(),
        ?strategy,
        "resolving cumulative reference counts"
    );

    match strategy {
        JoinStrategy::Sequential => groups.into_iter().map(|g| resolve(&index, g)).collect(),
        JoinStrategy::Parallel => groups.into_par_iter().map(|g| resolve(&index, g)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn reference(key: &str, year: i32) -> ReferenceRecord {
        ReferenceRecord {
            area: 1.0,
            creation_year: year,
            municipality_key: key.to_string(),
        }
    }

    fn group(year: i32, key: &str) -> AggregatedGroup {
        AggregatedGroup {
            year,
            municipality_key: key.to_string(),
            record_count: 1,
            total_area: 1.0,
        }
    }

    /// Nested-scan baseline the index must agree with.
    fn join_nested(groups: &[AggregatedGroup], references: &[ReferenceRecord]) -> Vec<usize> {
        groups
            .iter()
            .map(|g| {
                references
                    .iter()
                    .filter(|r| r.municipality_key == g.municipality_key && r.creation_year <= g.year)
                    .count()
            })
            .collect()
    }

    const KEYS: [&str; 5] = ["A", "B", "C", "D", "E"];

    /// References over the first four keys, so the fifth never matches.
    fn arb_references() -> impl Strategy<Value = Vec<ReferenceRecord>> {
        prop::collection::vec((0..4usize, 1980..2025i32), 0..300)
            .prop_map(|v| v.into_iter().map(|(k, year)| reference(KEYS[k], year)).collect())
    }

    fn arb_groups() -> impl Strategy<Value = Vec<AggregatedGroup>> {
        prop::collection::vec((0..5usize, 1975..2030i32), 0..200)
            .prop_map(|v| v.into_iter().map(|(k, year)| group(year, KEYS[k])).collect())
    }

    // -------------------------------------------------------------------------
    // INCLUSIVITY
    // -------------------------------------------------------------------------

    #[test]
    fn test_inclusive_year_bound() {
        let references = vec![reference("M", 2000), reference("M", 2010), reference("M", 2010)];
        let rows = join(vec![group(2010, "M"), group(2009, "M"), group(1999, "M")], &references);

        let counts: Vec<usize> = rows.iter().map(|r| r.cumulative_reference_count).collect();
        assert_eq!(counts, vec![3, 1, 0]);
    }

    #[test]
    fn test_unknown_municipality_counts_zero() {
        let references = vec![reference("M", 2000)];
        let rows = join(vec![group(2020, "N")], &references);
        assert_eq!(rows[0].cumulative_reference_count, 0);
    }

    #[test]
    fn test_other_municipalities_do_not_leak() {
        let references = vec![reference("M", 2000), reference("N", 1990), reference("N", 1995)];
        let rows = join(vec![group(2020, "M"), group(2020, "N")], &references);
        assert_eq!(rows[0].cumulative_reference_count, 1);
        assert_eq!(rows[1].cumulative_reference_count, 2);
    }

    #[test]
    fn test_join_preserves_group_fields_and_order() {
        let groups = vec![
            AggregatedGroup {
                year: 2016,
                municipality_key: "BLUMENAU".to_string(),
                record_count: 2,
                total_area: 10.0,
            },
            group(2010, "BLUMENAU"),
        ];
        let rows = join(groups, &[reference("BLUMENAU", 2005), reference("BLUMENAU", 2015)]);

        assert_eq!(rows[0].year, 2016);
        assert_eq!(rows[0].total_area, 10.0);
        assert_eq!(rows[0].cumulative_reference_count, 2);
        assert_eq!(rows[1].year, 2010);
        assert_eq!(rows[1].cumulative_reference_count, 1);
    }

    #[test]
    fn test_empty_reference_set() {
        let rows = join(vec![group(2020, "A")], &[]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cumulative_reference_count, 0);
    }

    // -------------------------------------------------------------------------
    // EQUIVALENCE WITH NESTED SCAN
    // -------------------------------------------------------------------------

    proptest! {
        #[test]
        fn prop_index_matches_nested_scan(groups in arb_groups(), references in arb_references()) {
            let expected = join_nested(&groups, &references);
            let rows = join(groups, &references);
            let counts: Vec<usize> = rows.iter().map(|r| r.cumulative_reference_count).collect();
            prop_assert_eq!(counts, expected);
        }

        #[test]
        fn prop_parallel_matches_sequential(groups in arb_groups(), references in arb_references()) {
            let sequential = join_with(groups.clone(), &references, JoinStrategy::Sequential);
            let parallel = join_with(groups, &references, JoinStrategy::Parallel);
            prop_assert_eq!(sequential, parallel);
        }
    }

    #[test]
    fn test_count_until_on_index() {
        let index = ReferenceIndex::build(&[reference("A", 2010), reference("A", 2000), reference("B", 2001)]);
        assert_eq!(index.municipalities(), 2);
        assert_eq!(index.count_until("A", 1999), 0);
        assert_eq!(index.count_until("A", 2000), 1);
        assert_eq!(index.count_until("A", 2100), 2);
        assert_eq!(index.count_until("Z", 2100), 0);
    }
}
