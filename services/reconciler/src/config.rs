//! Run configuration
//!
//! Two layers, as in the rest of the services:
//! - environment (`.env` via dotenvy, then `Config::from_env`) for output paths
//! - a JSON sources file describing the three input tables

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// =============================================================================
// Environment
// =============================================================================

#[derive(Debug, Clone)]
pub struct Config {
    pub output_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            output_dir: PathBuf::from(
                std::env::var("OUTPUT_DIR").unwrap_or_else(|_| "./data/final".to_string()),
            ),
        }
    }

    pub fn default_output(&self) -> PathBuf {
        self.output_dir.join("base_final.csv")
    }

    pub fn default_report(&self) -> PathBuf {
        self.output_dir.join("run_report.json")
    }
}

// =============================================================================
// Sources file
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Csv,
    Xlsx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetSelection {
    First,
    All,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceSpec {
    pub path: PathBuf,
    #[serde(default)]
    pub format: Option<SourceFormat>,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default)]
    pub sheets: Option<SheetSelection>,
    /// Logical column name -> header aliases, overriding the built-in ones
    #[serde(default)]
    pub columns: HashMap<String, Vec<String>>,
}

fn default_delimiter() -> char {
    ','
}

impl SourceSpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: None,
            delimiter: default_delimiter(),
            sheets: None,
            columns: HashMap::new(),
        }
    }

    /// Explicit format, else inferred from the file extension.
    pub fn resolved_format(&self) -> SourceFormat {
        if let Some(format) = self.format {
            return format;
        }
        match self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref()
        {
            Some("xlsx" | "xls" | "xlsm" | "xlsb" | "ods") => SourceFormat::Xlsx,
            _ => SourceFormat::Csv,
        }
    }

    /// Aliases for a logical column: configured ones first, then defaults.
    pub fn aliases(&self, column: &str, defaults: &[&str]) -> Vec<String> {
        let mut aliases = self.columns.get(column).cloned().unwrap_or_default();
        aliases.extend(defaults.iter().map(|d| d.to_string()));
        aliases
    }

    /// Delimiter as a byte. Only ASCII is accepted: decoded text is UTF-8, so
    /// any other char spans several bytes.
    pub fn delimiter_byte(&self) -> Result<u8> {
        if !self.delimiter.is_ascii() {
            return Err(Error::Config(format!(
                "delimiter {:?} is not a single ASCII byte",
                self.delimiter
            )));
        }
        Ok(self.delimiter as u8)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    pub version: String,
    pub references: SourceSpec,
    pub alerts: SourceSpec,
    pub regions: SourceSpec,
    #[serde(default)]
    pub state_filter: Option<String>,
}

impl SourcesConfig {
    pub fn from_json(content: &str, base_dir: &Path) -> Result<Self> {
        let mut config: SourcesConfig = serde_json::from_str(content)?;
        for spec in [&mut config.references, &mut config.alerts, &mut config.regions] {
            if spec.path.is_relative() {
                spec.path = base_dir.join(&spec.path);
            }
        }
        Ok(config)
    }
}

/// Load the sources file. Relative source paths resolve against its directory.
pub fn load_sources_config(path: &Path) -> Result<SourcesConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    SourcesConfig::from_json(&content, base_dir)
}
