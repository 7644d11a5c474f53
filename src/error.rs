/// Error types for the dashboard pipeline
use std::path::PathBuf;
use thiserror::Error;

use crate::types::Column;

#[derive(Error, Debug)]
pub enum DashboardError {
    /// A source file is missing, unreadable or holds no rows. Fatal at startup.
    #[error("Data unavailable at {path}: {reason}")]
    DataUnavailable { path: PathBuf, reason: String },

    /// A chart needs columns the loaded tables do not have.
    #[error("Chart '{chart}' skipped, missing column(s): {}", format_columns(.missing))]
    SchemaMismatch { chart: String, missing: Vec<Column> },

    /// The filter selection left no rows.
    #[error("No rows match the current filter selection")]
    EmptyFilterResult,

    #[error("Rolling window must be at least 1 (got {0})")]
    InvalidWindow(usize),

    #[error("Failed to render chart '{chart}': {reason}")]
    Render { chart: String, reason: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn format_columns(columns: &[Column]) -> String {
    columns
        .iter()
        .map(|c| c.name())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, DashboardError>;
