//! Fatal error types
//!
//! Only a missing or unreadable source table stops a run. Row and field
//! defects are recovered in `clean` and counted in `CleaningReport`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The loading collaborator could not produce a table at all
    #[error("Source '{source_name}' unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// A required logical column has no matching header
    #[error("Source '{source_name}' has no '{column}' column. Expected one of: {}", .candidates.join(", "))]
    MissingColumn {
        source_name: String,
        column: String,
        candidates: Vec<String>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn unavailable(source_name: &str, reason: impl ToString) -> Self {
        Error::SourceUnavailable {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }
}
