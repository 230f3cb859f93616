use std::path::PathBuf;

/// Failures of the workbook and side-file stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Workbook or carrier file does not exist.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Requested sheet is absent; `available` lists what the workbook has.
    #[error("sheet '{sheet}' not found (available: {})", .available.join(", "))]
    SheetNotFound { sheet: String, available: Vec<String> },

    #[error("invalid cell reference '{0}'")]
    InvalidCell(String),

    #[error("cannot read {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },

    #[error("cannot write {}: {message}", .path.display())]
    Write { path: PathBuf, message: String },
}

impl StoreError {
    pub(crate) fn read(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Read { path: path.into(), message: message.to_string() }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Write { path: path.into(), message: message.to_string() }
    }
}
