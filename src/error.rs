//! Error types for the offset pipeline.

use crate::remote::RemoteError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// The step of a row's processing that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Looking up or creating the recipient's entity and its page.
    Ensure,
    /// Placing the order.
    Purchase,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Ensure => f.write_str("ensuring the recipient's account"),
            Stage::Purchase => f.write_str("placing the order"),
        }
    }
}

/// Errors that can occur during a run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Failed to open, read or replace a file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The header lacks a column every row needs
    #[error("Missing required column {column:?} in the input header")]
    MissingColumn { column: &'static str },

    /// A row failed validation
    #[error("Invalid record at row {row}: {message}")]
    InvalidRecord { row: usize, message: String },

    /// A run setting is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unusable logo file
    #[error("Invalid logo file {}: {reason}", .path.display())]
    InvalidBranding { path: PathBuf, reason: String },

    /// No API key in the environment
    #[error("A Lune API key has to be provided in the LUNE_API_KEY environment variable")]
    MissingApiKey,

    /// Live credentials used without opting in
    #[error(
        "Live Lune API key detected but live mode not permitted. \
         Use --allow-live to interact with live accounts and place real orders"
    )]
    LiveModeNotPermitted,

    /// A remote call failed while processing a row
    #[error("Row {row} ({name}): failed while {stage}: {source}")]
    Remote {
        row: usize,
        name: String,
        stage: Stage,
        #[source]
        source: RemoteError,
    },

    /// An order was placed but writing it back to the file failed
    #[error(
        "Row {row}: order {order_id} was placed but could not be recorded; \
         add it to the file by hand before re-running: {source}"
    )]
    Checkpoint {
        row: usize,
        order_id: String,
        #[source]
        source: Box<PipelineError>,
    },

    /// The HTTP client could not be set up
    #[error("Failed to set up the API client: {0}")]
    Client(#[source] RemoteError),

    /// The account mode check failed before any row was processed
    #[error("Failed to fetch the main account: {0}")]
    Gate(#[source] RemoteError),
}
