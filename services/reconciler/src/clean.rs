//! Field-level cleaning of the three raw tables
//!
//! Responsibilities:
//! - Drop reference rows lacking a creation year, area or municipality
//! - Coerce alert areas and drop rows with no year or municipality
//! - Apply the optional state filter to alerts
//! - Normalize every municipality into a join key
//!
//! Dirty data never aborts the run: every defect is recovered locally and
//! counted in `CleaningReport`.

use crate::cell::Cell;
use crate::normalize::{normalize, normalize_cell};
use crate::numeric::{coerce, required_number, required_year};
use crate::records::{AlertRecord, RawAlert, RawReference, RawRegion, ReferenceRecord, RegionMapping};
use serde::Serialize;
use tracing::{info, warn};

/// Recoverable defects seen while cleaning, per source
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct CleaningReport {
    pub references_read: usize,
    pub references_kept: usize,
    pub references_missing_year: usize,
    pub references_missing_area: usize,
    pub references_missing_municipality: usize,

    pub alerts_read: usize,
    pub alerts_kept: usize,
    pub alerts_missing_year: usize,
    pub alerts_missing_municipality: usize,
    pub alerts_outside_state: usize,
    /// Alerts kept by the word-order fallback of the state filter
    pub alerts_state_word_matches: usize,
    pub alerts_no_signal: usize,
    pub rejected_area_tokens: usize,

    pub regions_read: usize,
    pub regions_kept: usize,
    pub regions_missing_field: usize,
    pub regions_duplicate_keys: usize,
    pub regions_conflicting_keys: usize,
    pub unmatched_region_keys: usize,
    pub unmatched_reference_keys: usize,
}

/// Municipality key from a text cell. Non-text cells carry no key.
fn municipality_key(cell: &Cell) -> Option<String> {
    match normalize_cell(cell) {
        Cell::Text(key) => Some(key),
        _ => None,
    }
}

/// Keep reference rows with a parseable year, a positive area and a
/// municipality.
pub fn clean_references(raw: Vec<RawReference>, report: &mut CleaningReport) -> Vec<ReferenceRecord> {
    report.references_read += raw.len();
    let mut kept = Vec::with_capacity(raw.len());

    for row in raw {
        let Some(creation_year) = required_year(&row.creation_year) else {
            report.references_missing_year += 1;
            continue;
        };
        let Some(area) = required_number(&row.area).filter(|a| *a > 0.0) else {
            report.references_missing_area += 1;
            continue;
        };
        let Some(municipality_key) = municipality_key(&row.municipality) else {
            report.references_missing_municipality += 1;
            continue;
        };

        kept.push(ReferenceRecord {
            area,
            creation_year,
            municipality_key,
        });
    }

    report.references_kept += kept.len();
    info!(
        read = report.references_read,
        kept = report.references_kept,
        "cleaned reference table"
    );
    kept
}

fn state_key(row: &RawAlert) -> Option<String> {
    row.state.as_text().map(normalize)
}

/// Alert state filter. Normalized states must equal the filter; when no
/// alert matches exactly, states containing the filter's words in order are
/// accepted instead ("ESTADO DE SANTA CATARINA" for "Santa Catarina").
struct StateFilter {
    wanted: String,
    words: Vec<String>,
    by_words: bool,
}

impl StateFilter {
    fn new(filter: &str, rows: &[RawAlert]) -> Self {
        let wanted = normalize(filter);
        let words = wanted.split(' ').map(str::to_string).collect();
        let by_words = !rows.is_empty()
            && !rows
                .iter()
                .any(|row| state_key(row).as_deref() == Some(wanted.as_str()));
        if by_words {
            warn!(state = %wanted, "no alert state matches exactly, matching state words in order");
        }
        Self {
            wanted,
            words,
            by_words,
        }
    }

    fn accepts(&self, row: &RawAlert) -> bool {
        match state_key(row) {
            Some(state) if self.by_words => has_words_in_order(&state, &self.words),
            Some(state) => state == self.wanted,
            None => false,
        }
    }
}

fn has_words_in_order(text: &str, wanted: &[String]) -> bool {
    let mut next = 0;
    for word in text.split(' ') {
        if next < wanted.len() && word == wanted[next] {
            next += 1;
        }
    }
    next == wanted.len()
}

/// Coerce alert rows. Rows coercing to a zero area are kept out (no signal).
pub fn clean_alerts(
    raw: Vec<RawAlert>,
    state_filter: Option<&str>,
    report: &mut CleaningReport,
) -> Vec<AlertRecord> {
    report.alerts_read += raw.len();
    let state = state_filter.map(|filter| StateFilter::new(filter, &raw));
    let mut kept = Vec::with_capacity(raw.len());

    for row in raw {
        if let Some(state) = &state {
            if !state.accepts(&row) {
                report.alerts_outside_state += 1;
                continue;
            }
            if state.by_words {
                report.alerts_state_word_matches += 1;
            }
        }

        let Some(year) = required_year(&row.year) else {
            report.alerts_missing_year += 1;
            continue;
        };
        let Some(municipality_key) = municipality_key(&row.municipality) else {
            report.alerts_missing_municipality += 1;
            continue;
        };

        let coerced = coerce(&row.area);
        report.rejected_area_tokens += coerced.rejected_tokens;
        if coerced.value == 0.0 {
            report.alerts_no_signal += 1;
            continue;
        }

        kept.push(AlertRecord {
            year,
            municipality_key,
            area: coerced.value,
        });
    }

    report.alerts_kept += kept.len();
    info!(
        read = report.alerts_read,
        kept = report.alerts_kept,
        no_signal = report.alerts_no_signal,
        rejected_tokens = report.rejected_area_tokens,
        "cleaned alert table"
    );
    kept
}

/// Normalize region rows, dropping rows without a municipality or a region.
/// Duplicates are left in place; `region::RegionLookup` resolves them.
pub fn clean_regions(raw: Vec<RawRegion>, report: &mut CleaningReport) -> Vec<RegionMapping> {
    report.regions_read += raw.len();

    let kept: Vec<RegionMapping> = raw
        .into_iter()
        .filter_map(|row| {
            let municipality_key = municipality_key(&row.municipality);
            let region = row.region.as_text().map(|r| r.trim().to_string());
            match (municipality_key, region) {
                (Some(municipality_key), Some(region)) if !region.is_empty() => Some(RegionMapping {
                    municipality_key,
                    region,
                }),
                _ => {
                    report.regions_missing_field += 1;
                    None
                }
            }
        })
        .collect();

    report.regions_kept += kept.len();
    info!(read = report.regions_read, kept = report.regions_kept, "cleaned region table");
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn reference(area: Cell, year: Cell, city: &str) -> RawReference {
        RawReference {
            area,
            creation_year: year,
            municipality: text(city),
        }
    }

    fn alert(year: Cell, city: &str, area: &str, state: Cell) -> RawAlert {
        RawAlert {
            year,
            municipality: text(city),
            area: text(area),
            state,
        }
    }

    // -------------------------------------------------------------------------
    // REFERENCES
    // -------------------------------------------------------------------------

    #[test]
    fn test_references_drop_sentinel_years_and_areas() {
        let raw = vec![
            reference(Cell::Number(100.0), Cell::Number(2005.0), "Blumenau"),
            reference(Cell::Number(100.0), text("?"), "Blumenau"),
            reference(Cell::Number(100.0), text("n/inf"), "Blumenau"),
            reference(text("n/inf"), text("2001"), "Joinville"),
            reference(Cell::Absent, text("2001"), "Joinville"),
            reference(text("12,5"), text("2001"), "Joinville"),
        ];
        let mut report = CleaningReport::default();
        let kept = clean_references(raw, &mut report);

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].municipality_key, "BLUMENAU");
        assert_eq!(kept[1].area, 12.5);
        assert_eq!(report.references_read, 6);
        assert_eq!(report.references_missing_year, 2);
        assert_eq!(report.references_missing_area, 2);
        assert_eq!(report.references_kept, 2);
    }

    #[test]
    fn test_references_drop_non_positive_area_and_missing_city() {
        let raw = vec![
            reference(Cell::Number(0.0), text("2001"), "Joinville"),
            RawReference {
                area: Cell::Number(5.0),
                creation_year: text("2001"),
                municipality: Cell::Absent,
            },
        ];
        let mut report = CleaningReport::default();
        assert!(clean_references(raw, &mut report).is_empty());
        assert_eq!(report.references_missing_area, 1);
        assert_eq!(report.references_missing_municipality, 1);
    }

    // -------------------------------------------------------------------------
    // ALERTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_alerts_zero_area_is_no_signal() {
        let raw = vec![
            alert(Cell::Number(2010.0), "blumenau", "10,0", Cell::Absent),
            alert(Cell::Number(2010.0), "blumenau", "abc", Cell::Absent),
            alert(Cell::Number(2010.0), "blumenau", "", Cell::Absent),
        ];
        let mut report = CleaningReport::default();
        let kept = clean_alerts(raw, None, &mut report);

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].area, 10.0);
        assert_eq!(kept[0].municipality_key, "BLUMENAU");
        assert_eq!(report.alerts_no_signal, 2);
        assert_eq!(report.rejected_area_tokens, 1);
    }

    #[test]
    fn test_alerts_missing_year_dropped() {
        let raw = vec![alert(text("?"), "Blumenau", "1,0", Cell::Absent)];
        let mut report = CleaningReport::default();
        assert!(clean_alerts(raw, None, &mut report).is_empty());
        assert_eq!(report.alerts_missing_year, 1);
    }

    #[test]
    fn test_alerts_state_filter() {
        let raw = vec![
            alert(text("2020"), "Blumenau", "1,0", text("Santa Catarina")),
            alert(text("2020"), "Curitiba", "1,0", text("Paraná")),
            alert(text("2020"), "Lages", "1,0", text("SANTA CATARINA")),
            alert(text("2020"), "Unknown", "1,0", Cell::Absent),
        ];
        let mut report = CleaningReport::default();
        let kept = clean_alerts(raw, Some("santa catarina"), &mut report);

        let keys: Vec<&str> = kept.iter().map(|a| a.municipality_key.as_str()).collect();
        assert_eq!(keys, vec!["BLUMENAU", "LAGES"]);
        assert_eq!(report.alerts_outside_state, 2);
    }

    #[test]
    fn test_alerts_state_filter_falls_back_to_words_in_order() {
        let raw = vec![
            alert(text("2020"), "Blumenau", "1,0", text("Estado de Santa Catarina")),
            alert(text("2020"), "Lages", "1,0", text("SANTA CATARINA (SC)")),
            alert(text("2020"), "Curitiba", "1,0", text("Paraná")),
            alert(text("2020"), "Nowhere", "1,0", text("Catarina Santa")),
        ];
        let mut report = CleaningReport::default();
        let kept = clean_alerts(raw, Some("Santa Catarina"), &mut report);

        let keys: Vec<&str> = kept.iter().map(|a| a.municipality_key.as_str()).collect();
        assert_eq!(keys, vec!["BLUMENAU", "LAGES"]);
        assert_eq!(report.alerts_outside_state, 2);
        assert_eq!(report.alerts_state_word_matches, 2);
    }

    #[test]
    fn test_alerts_state_exact_match_disables_fallback() {
        let raw = vec![
            alert(text("2020"), "Blumenau", "1,0", text("Santa Catarina")),
            alert(text("2020"), "Lages", "1,0", text("Estado de Santa Catarina")),
        ];
        let mut report = CleaningReport::default();
        let kept = clean_alerts(raw, Some("SANTA CATARINA"), &mut report);

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].municipality_key, "BLUMENAU");
        assert_eq!(report.alerts_state_word_matches, 0);
    }

    #[test]
    fn test_alerts_state_ignored_without_filter() {
        let raw = vec![alert(text("2020"), "Curitiba", "1,0", text("Paraná"))];
        let mut report = CleaningReport::default();
        assert_eq!(clean_alerts(raw, None, &mut report).len(), 1);
    }

    // -------------------------------------------------------------------------
    // REGIONS
    // -------------------------------------------------------------------------

    #[test]
    fn test_regions_normalized_and_incomplete_dropped() {
        let raw = vec![
            RawRegion {
                municipality: text("Herval d'Oeste"),
                region: text(" Oeste Catarinense "),
            },
            RawRegion {
                municipality: text("Lages"),
                region: Cell::Absent,
            },
        ];
        let mut report = CleaningReport::default();
        let kept = clean_regions(raw, &mut report);

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].municipality_key, "HERVAL D OESTE");
        assert_eq!(kept[0].region, "Oeste Catarinense");
        assert_eq!(report.regions_missing_field, 1);
    }
}
