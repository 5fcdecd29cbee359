//! Loading collaborator - turns source files into raw typed tables
//!
//! Responsibilities:
//! - Read delimited text (UTF-8, falling back to Windows-1252) and
//!   spreadsheets (xls/xlsx/ods, optionally every sheet)
//! - Resolve the fixed logical columns through header aliases
//! - Record provenance (path, content hash, row count) for the run report
//!
//! Any failure here is fatal: the pipeline never starts on a partial input.

use crate::cell::Cell;
use crate::config::{SheetSelection, SourceFormat, SourceSpec, SourcesConfig};
use crate::error::{Error, Result};
use crate::normalize::normalize;
use crate::pipeline::Inputs;
use crate::records::{RawAlert, RawReference, RawRegion};
use calamine::{open_workbook_auto, Reader};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

// =============================================================================
// Known column aliases (compared after normalization)
// =============================================================================

const REFERENCE_AREA: &[&str] = &["AREA (HA)", "AREA_HA", "AREA"];
const REFERENCE_YEAR: &[&str] = &["ANO DE CRIACAO", "CREATION_YEAR", "ANO"];
const REFERENCE_MUNICIPALITY: &[&str] = &["MUNICIPIO", "MUNICIPALITY", "CITY", "CIDADE"];

const ALERT_YEAR: &[&str] = &["YEAR", "ANO"];
const ALERT_MUNICIPALITY: &[&str] = &["CITY", "MUNICIPIO", "CIDADE", "MUNICIPALITY"];
const ALERT_AREA: &[&str] = &["AREA_HA", "AREA (HA)", "AREA"];
const ALERT_STATE: &[&str] = &["STATE", "ESTADO", "UF"];

const REGION_MUNICIPALITY: &[&str] = &["CIDADE", "CITY", "MUNICIPIO"];
const REGION_NAME: &[&str] = &["MESOREGIAO", "MESORREGIAO", "REGION", "REGIAO"];

/// Where a loaded table came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Provenance {
    pub source: String,
    pub path: String,
    pub content_hash: String,
    pub rows: usize,
}

/// Header row plus data rows of one CSV file or one sheet
#[derive(Debug, Clone, PartialEq)]
struct Grid {
    label: String,
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Grid {
    /// Find a column by alias. Exact matches beat whole-word matches, and
    /// earlier aliases beat later ones. Words are split on spaces and `_`, so
    /// `UF` never resolves to `buffer_m`.
    fn find_column(&self, aliases: &[String]) -> Option<usize> {
        let headers: Vec<String> = self.headers.iter().map(|h| normalize(h)).collect();
        let aliases: Vec<String> = aliases.iter().map(|a| normalize(a)).collect();

        aliases
            .iter()
            .find_map(|alias| headers.iter().position(|h| h == alias))
            .or_else(|| {
                aliases
                    .iter()
                    .find_map(|alias| headers.iter().position(|h| contains_words(h, alias)))
            })
    }

    /// True when at least one of the logical columns resolves.
    fn has_any_column(&self, columns: &[Vec<String>]) -> bool {
        columns.iter().any(|aliases| self.find_column(aliases).is_some())
    }

    fn require_column(&self, source_name: &str, column: &str, aliases: Vec<String>) -> Result<usize> {
        let idx = self.find_column(&aliases).ok_or_else(|| Error::MissingColumn {
            source_name: format!("{} ({})", source_name, self.label),
            column: column.to_string(),
            candidates: aliases,
        })?;
        debug!(source = source_name, column, header = %self.headers[idx], "resolved column");
        Ok(idx)
    }
}

fn words(text: &str) -> Vec<&str> {
    text.split(|c: char| c.is_whitespace() || c == '_')
        .filter(|w| !w.is_empty())
        .collect()
}

/// `needle`'s words appear as a contiguous run of `haystack`'s words.
fn contains_words(haystack: &str, needle: &str) -> bool {
    let needle = words(needle);
    if needle.is_empty() {
        return false;
    }
    words(haystack).windows(needle.len()).any(|window| window == needle.as_slice())
}

/// Grids worth reading. In a multi-sheet workbook, sheets with none of the
/// required columns (notes, legends) are skipped. A lone grid is always read
/// so its missing column gets reported.
fn data_grids<'a>(source_name: &str, grids: &'a [Grid], required: &[Vec<String>]) -> Vec<&'a Grid> {
    if grids.len() < 2 {
        return grids.iter().collect();
    }
    let kept: Vec<&Grid> = grids
        .iter()
        .filter(|grid| {
            let usable = grid.has_any_column(required);
            if !usable {
                warn!(source = source_name, sheet = %grid.label, "skipping sheet without any expected column");
            }
            usable
        })
        .collect();
    if kept.is_empty() {
        grids.iter().take(1).collect()
    } else {
        kept
    }
}

fn cell_at(row: &[Cell], idx: usize) -> Cell {
    row.get(idx).cloned().unwrap_or(Cell::Absent)
}

// =============================================================================
// Raw readers
// =============================================================================

fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{:x}", hasher.finalize())
}

/// Decode file bytes: UTF-8 when valid, Windows-1252 otherwise.
fn decode_text(bytes: &[u8]) -> String {
    let text = match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    };
    // Remove UTF-8 BOM if present
    match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    }
}

fn parse_delimited(content: &str, delimiter: u8, label: &str) -> Result<Grid> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    for (line_idx, result) in reader.records().enumerate() {
        match result {
            Ok(record) => rows.push(record.iter().map(Cell::from_text).collect()),
            Err(e) => warn!(file = label, line = line_idx + 2, error = %e, "skipping unreadable line"),
        }
    }

    Ok(Grid {
        label: label.to_string(),
        headers,
        rows,
    })
}

fn read_workbook(source_name: &str, spec: &SourceSpec, selection: SheetSelection) -> Result<Vec<Grid>> {
    let mut workbook = open_workbook_auto(&spec.path).map_err(|e| Error::unavailable(source_name, e))?;
    let sheet_names = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(Error::unavailable(source_name, "workbook has no sheets"));
    }

    let selected: Vec<String> = match selection {
        SheetSelection::First => sheet_names.into_iter().take(1).collect(),
        SheetSelection::All => sheet_names,
    };

    let mut grids = Vec::with_capacity(selected.len());
    for sheet_name in selected {
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| Error::unavailable(source_name, format!("sheet '{}': {}", sheet_name, e)))?;
        let mut rows = range.rows();
        let Some(header_row) = rows.next() else {
            warn!(sheet = %sheet_name, "skipping empty sheet");
            continue;
        };
        let headers: Vec<String> = header_row
            .iter()
            .map(|c| Cell::from(c).to_string().trim().to_string())
            .collect();
        let rows: Vec<Vec<Cell>> = rows.map(|r| r.iter().map(Cell::from).collect()).collect();
        grids.push(Grid {
            label: format!("sheet '{}'", sheet_name),
            headers,
            rows,
        });
    }
    Ok(grids)
}

/// Read a source into one grid per CSV file or selected sheet.
fn read_source(source_name: &str, spec: &SourceSpec, default_sheets: SheetSelection) -> Result<(Vec<Grid>, String)> {
    let bytes = std::fs::read(&spec.path).map_err(|e| {
        Error::unavailable(source_name, format!("cannot read {}: {}", spec.path.display(), e))
    })?;
    let hash = content_hash(&bytes);

    let grids = match spec.resolved_format() {
        SourceFormat::Csv => {
            let content = decode_text(&bytes);
            vec![parse_delimited(&content, spec.delimiter_byte()?, "csv")
                .map_err(|e| Error::unavailable(source_name, e))?]
        }
        SourceFormat::Xlsx => read_workbook(source_name, spec, spec.sheets.unwrap_or(default_sheets))?,
    };

    if grids.is_empty() || grids.iter().all(|g| g.headers.iter().all(|h| h.is_empty())) {
        return Err(Error::unavailable(source_name, "no header row found"));
    }
    Ok((grids, hash))
}

fn provenance(source_name: &str, spec: &SourceSpec, hash: String, rows: usize) -> Provenance {
    info!(source = source_name, path = %spec.path.display(), rows, hash = %hash, "loaded source");
    Provenance {
        source: source_name.to_string(),
        path: spec.path.display().to_string(),
        content_hash: hash,
        rows,
    }
}

// =============================================================================
// Table loaders
// =============================================================================

pub fn load_references(spec: &SourceSpec) -> Result<(Vec<RawReference>, Provenance)> {
    let name = "references";
    let (grids, hash) = read_source(name, spec, SheetSelection::All)?;

    let required = [
        spec.aliases("area", REFERENCE_AREA),
        spec.aliases("creation_year", REFERENCE_YEAR),
        spec.aliases("municipality", REFERENCE_MUNICIPALITY),
    ];

    let mut rows = Vec::new();
    for grid in data_grids(name, &grids, &required) {
        let area = grid.require_column(name, "area", required[0].clone())?;
        let year = grid.require_column(name, "creation_year", required[1].clone())?;
        let municipality = grid.require_column(name, "municipality", required[2].clone())?;

        rows.extend(grid.rows.iter().map(|r| RawReference {
            area: cell_at(r, area),
            creation_year: cell_at(r, year),
            municipality: cell_at(r, municipality),
        }));
    }

    let prov = provenance(name, spec, hash, rows.len());
    Ok((rows, prov))
}

pub fn load_alerts(spec: &SourceSpec) -> Result<(Vec<RawAlert>, Provenance)> {
    let name = "alerts";
    let (grids, hash) = read_source(name, spec, SheetSelection::First)?;

    let required = [
        spec.aliases("year", ALERT_YEAR),
        spec.aliases("municipality", ALERT_MUNICIPALITY),
        spec.aliases("area", ALERT_AREA),
    ];

    let mut rows = Vec::new();
    for grid in data_grids(name, &grids, &required) {
        let year = grid.require_column(name, "year", required[0].clone())?;
        let municipality = grid.require_column(name, "municipality", required[1].clone())?;
        let area = grid.require_column(name, "area", required[2].clone())?;
        let state = grid.find_column(&spec.aliases("state", ALERT_STATE));

        rows.extend(grid.rows.iter().map(|r| RawAlert {
            year: cell_at(r, year),
            municipality: cell_at(r, municipality),
            area: cell_at(r, area),
            state: state.map_or(Cell::Absent, |idx| cell_at(r, idx)),
        }));
    }

    let prov = provenance(name, spec, hash, rows.len());
    Ok((rows, prov))
}

pub fn load_regions(spec: &SourceSpec) -> Result<(Vec<RawRegion>, Provenance)> {
    let name = "regions";
    let (grids, hash) = read_source(name, spec, SheetSelection::First)?;

    let required = [
        spec.aliases("municipality", REGION_MUNICIPALITY),
        spec.aliases("region", REGION_NAME),
    ];

    let mut rows = Vec::new();
    for grid in data_grids(name, &grids, &required) {
        let municipality = grid.require_column(name, "municipality", required[0].clone())?;
        let region = grid.require_column(name, "region", required[1].clone())?;

        rows.extend(grid.rows.iter().map(|r| RawRegion {
            municipality: cell_at(r, municipality),
            region: cell_at(r, region),
        }));
    }

    let prov = provenance(name, spec, hash, rows.len());
    Ok((rows, prov))
}

/// Load all three sources. Fails before any pipeline stage on the first
/// unavailable source.
pub fn load_all(config: &SourcesConfig) -> Result<(Inputs, Vec<Provenance>)> {
    let (references, ref_prov) = load_references(&config.references)?;
    let (alerts, alert_prov) = load_alerts(&config.alerts)?;
    let (regions, region_prov) = load_regions(&config.regions)?;

    Ok((
        Inputs {
            references,
            alerts,
            regions,
        },
        vec![ref_prov, alert_prov, region_prov],
    ))
}
