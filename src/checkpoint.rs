//! Durable, atomic write-back of the table.
//!
//! A checkpoint replaces the destination file as a whole: the table is
//! written into a temporary file next to it, synced, then renamed over the
//! destination. A reader sees either the previous table or the new one,
//! never a truncated file.

use crate::error::Result;
use crate::table::Table;
use log::debug;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Somewhere the pipeline can record progress.
pub trait Checkpoint {
    /// Persists the full current table.
    fn persist(&mut self, table: &Table) -> Result<()>;
}

/// Writes the table back to the file it was read from.
#[derive(Debug, Clone)]
pub struct FileCheckpoint {
    path: PathBuf,
}

impl FileCheckpoint {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        FileCheckpoint {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Checkpoint for FileCheckpoint {
    fn persist(&mut self, table: &Table) -> Result<()> {
        // The temporary file must live on the destination's filesystem for
        // the rename to be atomic.
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        // Dropped without `persist` on any error below, which deletes it.
        let temp = NamedTempFile::new_in(dir)?;
        let mut writer = BufWriter::new(temp);
        table.write_to(&mut writer)?;
        writer.flush()?;

        let temp = writer.into_inner().map_err(|e| e.into_error())?;
        // Temporary files are created owner-only; keep the sheet's own mode.
        if let Ok(metadata) = fs::metadata(&self.path) {
            temp.as_file().set_permissions(metadata.permissions())?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;

        debug!("Checkpointed {} rows to {}", table.rows.len(), self.path.display());
        Ok(())
    }
}
