//! Data-sink collaborator
//!
//! Writes the final table, the optional yearly rollup and a JSON run report.
//! Area columns are written with exactly 4 fractional digits.

use crate::clean::CleaningReport;
use crate::error::Result;
use crate::pipeline::{PipelineOutput, StageCounts};
use crate::records::{FinalRow, YearlyTotal};
use crate::sources::Provenance;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

/// Audit record for one run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub state_filter: Option<String>,
    pub sources: Vec<Provenance>,
    pub cleaning: CleaningReport,
    pub stages: StageCounts,
}

impl RunReport {
    pub fn new(output: &PipelineOutput, sources: Vec<Provenance>, state_filter: Option<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            state_filter,
            sources,
            cleaning: output.cleaning.clone(),
            stages: output.stages.clone(),
        }
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn write_rows<W: Write, T: Serialize>(writer: W, rows: &[T]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Final table, header `year,municipality,region,cumulative_reference_count,total_alert_area`.
/// An absent region is an empty field.
pub fn write_final_csv(path: &Path, rows: &[FinalRow]) -> Result<()> {
    ensure_parent(path)?;
    if rows.is_empty() {
        // csv only emits headers alongside the first record
        fs::write(path, "year,municipality,region,cumulative_reference_count,total_alert_area\n")?;
        return Ok(());
    }
    write_rows(fs::File::create(path)?, rows)
}

pub fn write_yearly_csv(path: &Path, totals: &[YearlyTotal]) -> Result<()> {
    ensure_parent(path)?;
    if totals.is_empty() {
        fs::write(path, "year,record_count,total_alert_area\n")?;
        return Ok(());
    }
    write_rows(fs::File::create(path)?, totals)
}

pub fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn final_row(year: i32, key: &str, region: Option<&str>, count: usize, area: f64) -> FinalRow {
        FinalRow {
            year,
            municipality_key: key.to_string(),
            region: region.map(str::to_string),
            cumulative_reference_count: count,
            total_area: area,
        }
    }

    #[test]
    fn test_final_csv_format() {
        let mut buf = Vec::new();
        write_rows(
            &mut buf,
            &[
                final_row(2010, "BLUMENAU", Some("Vale do Itajaí"), 1, 10.0),
                final_row(2016, "GASPAR", None, 0, 0.12345),
            ],
        )
        .unwrap();

        let out = String::from_utf8(buf).unwrap();
        assert_eq!(
            out,
            "year,municipality,region,cumulative_reference_count,total_alert_area\n\
             2010,BLUMENAU,Vale do Itajaí,1,10.0000\n\
             2016,GASPAR,,0,0.1235\n"
        );
    }

    #[test]
    fn test_yearly_csv_format() {
        let mut buf = Vec::new();
        write_rows(
            &mut buf,
            &[YearlyTotal {
                year: 2019,
                record_count: 3,
                total_area: 5.5,
            }],
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "year,record_count,total_alert_area\n2019,3,5.5000\n"
        );
    }

    #[test]
    fn test_empty_final_csv_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/base_final.csv");
        write_final_csv(&path, &[]).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "year,municipality,region,cumulative_reference_count,total_alert_area\n"
        );
    }

    #[test]
    fn test_report_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_report.json");
        let output = crate::pipeline::run(Default::default(), &Default::default());
        let report = RunReport::new(&output, vec![], Some("Santa Catarina".to_string()));
        write_report(&path, &report).unwrap();

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["state_filter"], "Santa Catarina");
        assert_eq!(value["stages"]["final_rows"], 0);
        assert_eq!(value["cleaning"]["alerts_read"], 0);
    }
}
