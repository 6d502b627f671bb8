//! # Offset Sheet
//!
//! Places carbon offset orders for every row of a CSV spreadsheet and writes
//! the order id and the customer's public page URL back into the same file.
//!
//! ## Design Principles
//!
//! - **Resumable**: the table is checkpointed after every row; a re-run
//!   skips complete rows and never places a recorded order twice
//! - **Remote state is the truth**: customer accounts and pages are looked
//!   up on every run, never trusted from the file
//! - **Atomic writes**: a checkpoint replaces the file in one rename
//! - **Fail fast**: the first error stops the run with the row and stage
//!
//! ## Example
//!
//! ```no_run
//! use offset_sheet::{run_file, LuneClient, LuneSettings, RunConfig};
//! use std::path::Path;
//!
//! let client = LuneClient::new(LuneSettings::new("test_api_key")).unwrap();
//! let config = RunConfig::new("Acme Corporation's customers");
//! let summary = run_file(Path::new("orders.csv"), client, config).unwrap();
//! println!("{} orders placed", summary.purchased);
//! ```

pub mod checkpoint;
pub mod config;
pub mod ensure;
pub mod error;
pub mod identity;
pub mod lune;
pub mod pipeline;
pub mod purchase;
pub mod quantity;
pub mod remote;
pub mod row;
pub mod table;

#[cfg(test)]
mod fake;

pub use checkpoint::{Checkpoint, FileCheckpoint};
pub use config::RunConfig;
pub use ensure::{EntityEnsurer, ResolvedEntity};
pub use error::{PipelineError, Result, Stage};
pub use identity::IdentityResolver;
pub use lune::{LuneClient, LuneSettings};
pub use pipeline::{run_file, Pipeline, RunSummary};
pub use purchase::PurchaseExecutor;
pub use quantity::Kilograms;
pub use remote::{AccountMode, Entity, OffsetService, PurchaseRequest, RemoteError};
pub use row::Row;
pub use table::Table;
