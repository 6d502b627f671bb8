//! The per-row driver.
//!
//! Rows are processed strictly in file order, one at a time. For each row
//! that is not yet complete the driver resolves the recipient's account,
//! places the order and checkpoints the whole table before moving on. A
//! re-run therefore resumes at the first incomplete row without repeating
//! any recorded order.

use crate::checkpoint::{Checkpoint, FileCheckpoint};
use crate::config::RunConfig;
use crate::ensure::EntityEnsurer;
use crate::error::{PipelineError, Result, Stage};
use crate::identity::IdentityResolver;
use crate::purchase::PurchaseExecutor;
use crate::remote::{AccountMode, OffsetService, RemoteError};
use crate::table::Table;
use log::{debug, info, warn};
use std::path::Path;

/// What a run did, row by row.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Rows that were already complete.
    pub skipped: usize,

    /// Rows an order was placed for.
    pub purchased: usize,

    /// Rows that had an order but lacked the page URL.
    pub repaired: usize,
}

enum RowOutcome {
    Skipped,
    Purchased,
    Repaired,
}

/// Drives the table through account resolution, purchase and checkpoint.
///
/// Fails fast: the first error stops the run. Every row finished before the
/// error has already been checkpointed.
pub struct Pipeline<S, C> {
    service: S,
    checkpoint: C,
    config: RunConfig,
    resolver: IdentityResolver,
    ensurer: EntityEnsurer,
    executor: PurchaseExecutor,
}

impl<S: OffsetService, C: Checkpoint> Pipeline<S, C> {
    pub fn new(service: S, checkpoint: C, config: RunConfig) -> Self {
        Pipeline {
            ensurer: EntityEnsurer::new(&config),
            executor: PurchaseExecutor::new(config.default_quantity),
            resolver: IdentityResolver::new(),
            service,
            checkpoint,
            config,
        }
    }

    /// Processes every incomplete row of `table` in place.
    ///
    /// A table whose rows are all complete is returned untouched without a
    /// single remote call.
    pub fn process(&mut self, table: &mut Table) -> Result<RunSummary> {
        let total = table.rows.len();
        let pending = table.rows.iter().filter(|r| !r.is_complete()).count();
        if pending == 0 {
            info!("All {} rows are already complete, nothing to do", total);
            return Ok(RunSummary {
                skipped: total,
                ..RunSummary::default()
            });
        }

        self.check_mode()?;
        info!("{} of {} rows need processing", pending, total);

        let mut summary = RunSummary::default();
        for idx in 0..total {
            info!("Processing row {} out of {}...", idx + 1, total);
            match self.process_row(table, idx)? {
                RowOutcome::Skipped => summary.skipped += 1,
                RowOutcome::Purchased => summary.purchased += 1,
                RowOutcome::Repaired => summary.repaired += 1,
            }
        }

        info!(
            "Done: {} purchased, {} repaired, {} already complete ({} distinct recipients)",
            summary.purchased,
            summary.repaired,
            summary.skipped,
            self.resolver.len()
        );
        Ok(summary)
    }

    /// Refuses live credentials unless the run opted in.
    fn check_mode(&mut self) -> Result<()> {
        let mode = self.service.account_mode().map_err(PipelineError::Gate)?;
        debug!("Credentials operate in {:?} mode", mode);

        if mode == AccountMode::Live && !self.config.allow_live {
            return Err(PipelineError::LiveModeNotPermitted);
        }
        Ok(())
    }

    /// Processes a single row and checkpoints the table if it changed.
    fn process_row(&mut self, table: &mut Table, idx: usize) -> Result<RowOutcome> {
        let row = &mut table.rows[idx];
        if row.is_complete() {
            debug!("Row {}: already complete, skipping", row.line);
            return Ok(RowOutcome::Skipped);
        }

        // Account and page are re-checked on every run; only the order id
        // recorded in the row is trusted.
        let resolved = self
            .resolver
            .resolve(&row.recipient_name, &self.ensurer, &mut self.service)
            .map_err(|source| {
                remote_failure(row.line, &row.recipient_name, Stage::Ensure, source)
            })?;
        let entity_id = resolved.entity.id.clone();
        row.page_url = Some(resolved.page_url.clone());

        let outcome = if row.has_order() {
            warn!(
                "Row {}: order {} already placed but the page URL was missing, filling it in",
                row.line,
                row.order_id.as_deref().unwrap_or_default()
            );
            RowOutcome::Repaired
        } else {
            let order_id = self
                .executor
                .purchase(&mut self.service, row, &entity_id)
                .map_err(|source| {
                    remote_failure(row.line, &row.recipient_name, Stage::Purchase, source)
                })?;
            info!("Row {}: order {} placed", row.line, order_id);
            row.order_id = Some(order_id);
            RowOutcome::Purchased
        };

        let line = row.line;
        let order_id = row.order_id.clone().unwrap_or_default();
        self.checkpoint
            .persist(table)
            .map_err(|source| PipelineError::Checkpoint {
                row: line,
                order_id,
                source: Box::new(source),
            })?;
        Ok(outcome)
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn checkpoint(&self) -> &C {
        &self.checkpoint
    }
}

fn remote_failure(line: usize, name: &str, stage: Stage, source: RemoteError) -> PipelineError {
    PipelineError::Remote {
        row: line,
        name: name.to_string(),
        stage,
        source,
    }
}

/// Loads the table at `path`, processes it and writes progress back to the
/// same file.
pub fn run_file<S: OffsetService>(
    path: &Path,
    service: S,
    config: RunConfig,
) -> Result<RunSummary> {
    config.validate()?;
    let mut table = Table::load(path)?;
    let mut pipeline = Pipeline::new(service, FileCheckpoint::new(path), config);
    pipeline.process(&mut table)
}
