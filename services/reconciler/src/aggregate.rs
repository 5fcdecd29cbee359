//! Alert aggregation by (year, municipality)
//!
//! Using BTreeMap for deterministic ordering: output is ascending by
//! (year, municipality key), which downstream output relies on.

use crate::records::{round4, AggregatedGroup, AlertRecord, YearlyTotal};
use std::collections::BTreeMap;
use tracing::info;

/// Group alerts by exact (year, key). Zero-area records are excluded.
pub fn aggregate(alerts: Vec<AlertRecord>) -> Vec<AggregatedGroup> {
    let mut buckets: BTreeMap<(i32, String), (usize, f64)> = BTreeMap::new();

    for alert in alerts {
        if alert.area == 0.0 {
            continue;
        }
        let entry = buckets
            .entry((alert.year, alert.municipality_key))
            .or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += alert.area;
    }

    let groups: Vec<AggregatedGroup> = buckets
        .into_iter()
        .map(|((year, municipality_key), (record_count, total_area))| AggregatedGroup {
            year,
            municipality_key,
            record_count,
            total_area: round4(total_area),
        })
        .collect();

    info!(groups = groups.len(), "aggregated alerts by year and municipality");
    groups
}

/// Roll groups up per year, ascending.
pub fn yearly_totals(groups: &[AggregatedGroup]) -> Vec<YearlyTotal> {
    let mut years: BTreeMap<i32, (usize, f64)> = BTreeMap::new();
    for group in groups {
        let entry = years.entry(group.year).or_insert((0, 0.0));
        entry.0 += group.record_count;
        entry.1 += group.total_area;
    }

    years
        .into_iter()
        .map(|(year, (record_count, total_area))| YearlyTotal {
            year,
            record_count,
            total_area: round4(total_area),
        })
        .collect()
}
