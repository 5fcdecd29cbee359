//! Left-join enrichment against the municipality -> region lookup
//!
//! Duplicate municipality keys: the first mapping in source order wins.
//! Unmatched rows keep an absent region; row count never changes here.

use crate::clean::CleaningReport;
use crate::records::{CumulativeRow, FinalRow, ReferenceRecord, RegionMapping};
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

#[derive(Debug, Default)]
pub struct RegionLookup {
    regions: HashMap<String, String>,
}

impl RegionLookup {
    /// Build the lookup, counting duplicate and conflicting keys.
    pub fn build(mapping: Vec<RegionMapping>, report: &mut CleaningReport) -> Self {
        let mut regions: HashMap<String, String> = HashMap::with_capacity(mapping.len());

        for entry in mapping {
            match regions.get(&entry.municipality_key) {
                None => {
                    regions.insert(entry.municipality_key, entry.region);
                }
                Some(existing) => {
                    report.regions_duplicate_keys += 1;
                    if *existing != entry.region {
                        report.regions_conflicting_keys += 1;
                        warn!(
                            municipality = %entry.municipality_key,
                            kept = %existing,
                            ignored = %entry.region,
                            "conflicting region mapping, keeping first"
                        );
                    }
                }
            }
        }

        Self { regions }
    }

    pub fn region_for(&self, key: &str) -> Option<&str> {
        self.regions.get(key).map(String::as_str)
    }

    /// Distinct keys with no mapping.
    pub fn unmatched<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> BTreeSet<&'a str> {
        keys.into_iter().filter(|key| !self.regions.contains_key(*key)).collect()
    }
}

/// Count reference municipalities the lookup cannot place in a region.
pub fn count_unmatched_references(
    lookup: &RegionLookup,
    references: &[ReferenceRecord],
    report: &mut CleaningReport,
) {
    let unmatched = lookup.unmatched(references.iter().map(|r| r.municipality_key.as_str()));
    if !unmatched.is_empty() {
        let sample: Vec<&str> = unmatched.iter().take(5).copied().collect();
        warn!(
            count = unmatched.len(),
            sample = ?sample,
            "reference municipalities without a region mapping"
        );
    }
    report.unmatched_reference_keys += unmatched.len();
}

/// Attach regions to cumulative rows.
pub fn enrich(
    rows: Vec<CumulativeRow>,
    mapping: Vec<RegionMapping>,
    report: &mut CleaningReport,
) -> Vec<FinalRow> {
    let lookup = RegionLookup::build(mapping, report);
    enrich_with(rows, &lookup, report)
}

/// Attach regions from an already built lookup.
pub fn enrich_with(rows: Vec<CumulativeRow>, lookup: &RegionLookup, report: &mut CleaningReport) -> Vec<FinalRow> {
    let mut unmatched: BTreeSet<String> = BTreeSet::new();

    let enriched: Vec<FinalRow> = rows
        .into_iter()
        .map(|row| {
            let region = lookup.region_for(&row.municipality_key).map(str::to_string);
            if region.is_none() {
                unmatched.insert(row.municipality_key.clone());
            }
            FinalRow {
                year: row.year,
                municipality_key: row.municipality_key,
                region,
                cumulative_reference_count: row.cumulative_reference_count,
                total_area: row.total_area,
            }
        })
        .collect();

    if !unmatched.is_empty() {
        let sample: Vec<&str> = unmatched.iter().take(5).map(String::as_str).collect();
        warn!(
            count = unmatched.len(),
            sample = ?sample,
            "municipalities without a region mapping"
        );
    }
    report.unmatched_region_keys += unmatched.len();

    enriched
}
