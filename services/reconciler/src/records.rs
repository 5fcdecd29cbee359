//! Row types flowing between stages
//!
//! Raw rows come straight from the loading collaborator with untyped `Cell`
//! fields. Cleaned rows carry an explicit municipality key; every later join
//! is on that key, never on row position.

use crate::cell::Cell;
use serde::{Serialize, Serializer};

/// Protected-area registry row as loaded
#[derive(Debug, Clone, PartialEq)]
pub struct RawReference {
    pub area: Cell,
    pub creation_year: Cell,
    pub municipality: Cell,
}

/// Environmental alert row as loaded
#[derive(Debug, Clone, PartialEq)]
pub struct RawAlert {
    pub year: Cell,
    pub municipality: Cell,
    pub area: Cell,
    /// Absent when the source has no state column
    pub state: Cell,
}

/// Municipality -> administrative region row as loaded
#[derive(Debug, Clone, PartialEq)]
pub struct RawRegion {
    pub municipality: Cell,
    pub region: Cell,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceRecord {
    pub area: f64,
    pub creation_year: i32,
    pub municipality_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertRecord {
    pub year: i32,
    pub municipality_key: String,
    pub area: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionMapping {
    pub municipality_key: String,
    pub region: String,
}

/// One (year, municipality) bucket of alerts
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedGroup {
    pub year: i32,
    pub municipality_key: String,
    pub record_count: usize,
    pub total_area: f64,
}

/// Aggregated group plus its cumulative reference count, before enrichment
#[derive(Debug, Clone, PartialEq)]
pub struct CumulativeRow {
    pub year: i32,
    pub municipality_key: String,
    pub cumulative_reference_count: usize,
    pub total_area: f64,
}

/// Terminal row handed to the sink
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalRow {
    pub year: i32,
    #[serde(rename = "municipality")]
    pub municipality_key: String,
    pub region: Option<String>,
    pub cumulative_reference_count: usize,
    #[serde(rename = "total_alert_area", serialize_with = "four_decimals")]
    pub total_area: f64,
}

/// Alerts rolled up per year
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyTotal {
    pub year: i32,
    pub record_count: usize,
    #[serde(rename = "total_alert_area", serialize_with = "four_decimals")]
    pub total_area: f64,
}

/// Round to 4 fractional digits
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn four_decimals<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{:.4}", value))
}
