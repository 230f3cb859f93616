//! Seams between the engine and its collaborators.

use std::path::{Path, PathBuf};

use cellscribe_completion::{CompletionClient, CompletionError};
use cellscribe_io::{CellRef, Snapshot, StoreError};

/// Source values and destination cells.
pub trait CellStore {
    /// Value from the snapshot taken at run start; None when empty.
    fn read_cell(&self, cell: CellRef) -> Option<String>;

    /// Persist one cell. Each call is an independent write.
    fn write_cell(&mut self, cell: CellRef, value: &str) -> Result<(), StoreError>;
}

/// Turns a prompt into generated text.
pub trait Completer {
    fn complete(&self, prompt: &str, model: &str) -> Result<String, CompletionError>;
}

impl Completer for CompletionClient {
    fn complete(&self, prompt: &str, model: &str) -> Result<String, CompletionError> {
        CompletionClient::complete(self, prompt, model)
    }
}

/// A sheet in an .xlsx workbook on disk.
///
/// Reads come from the snapshot taken by [`WorkbookStore::open`]; writes go
/// straight to the file, so they never show up in later reads of this run.
#[derive(Debug)]
pub struct WorkbookStore {
    path: PathBuf,
    sheet: String,
    snapshot: Snapshot,
}

impl WorkbookStore {
    pub fn open(path: &Path, sheet: &str) -> Result<Self, StoreError> {
        let snapshot = cellscribe_io::open_for_read(path, sheet)?;
        Ok(Self {
            path: path.to_path_buf(),
            sheet: sheet.to_string(),
            snapshot,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }
}

impl CellStore for WorkbookStore {
    fn read_cell(&self, cell: CellRef) -> Option<String> {
        self.snapshot.read_cell(cell)
    }

    fn write_cell(&mut self, cell: CellRef, value: &str) -> Result<(), StoreError> {
        cellscribe_io::write_cell(&self.path, &self.sheet, cell, value)
    }
}
