// Transient carrier files
//
// A carrier holds one cell value on disk for the duration of a step. The
// `Carrier` guard removes the file when it goes out of scope, on every exit
// path.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use cellscribe_config::CarrierFidelity;

use crate::docx;
use crate::error::StoreError;

/// On-disk format of a carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarrierFormat {
    /// UTF-8 text, written verbatim
    Text,
    /// .docx document laid out per the fidelity level
    Document(CarrierFidelity),
}

impl CarrierFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            CarrierFormat::Text => "txt",
            CarrierFormat::Document(_) => "docx",
        }
    }
}

/// A carrier file that is deleted when dropped.
#[derive(Debug)]
pub struct Carrier {
    path: PathBuf,
    format: CarrierFormat,
}

impl Carrier {
    /// Write `value` to `path`. A partially written file is removed on failure.
    pub(crate) fn create(path: PathBuf, format: CarrierFormat, value: &str) -> Result<Self, StoreError> {
        let written = match format {
            CarrierFormat::Text => fs::write(&path, value).map_err(|e| StoreError::write(&path, e)),
            CarrierFormat::Document(fidelity) => docx::write_document(&path, value, fidelity),
        };
        if let Err(e) = written {
            delete_carrier(&path);
            return Err(e);
        }

        tracing::debug!(path = %path.display(), format = format.extension(), "created carrier");
        Ok(Self { path, format })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> CarrierFormat {
        self.format
    }

    /// Read the carrier back.
    pub fn read(&self) -> Result<String, StoreError> {
        read_carrier_file(&self.path, self.format)
    }
}

impl Drop for Carrier {
    fn drop(&mut self) {
        delete_carrier(&self.path);
    }
}

/// Read a whole carrier file.
pub fn read_carrier_file(path: &Path, format: CarrierFormat) -> Result<String, StoreError> {
    match format {
        CarrierFormat::Text => fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::FileNotFound(path.to_path_buf()),
            _ => StoreError::read(path, e),
        }),
        CarrierFormat::Document(fidelity) => docx::read_document(path, fidelity),
    }
}

/// Remove a carrier file. Best effort: a failure is logged and reported
/// as `false`, never raised.
pub fn delete_carrier(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "deleted carrier");
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => true,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not delete carrier file");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_carrier_is_verbatim_and_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp_C2.txt");

        {
            let carrier = Carrier::create(path.clone(), CarrierFormat::Text, "  Video about cats\n").unwrap();
            assert!(carrier.path().exists());
            assert_eq!(carrier.read().unwrap(), "  Video about cats\n");
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_document_carrier_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp_C11.docx");
        let format = CarrierFormat::Document(CarrierFidelity::LineSplit);

        let carrier = Carrier::create(path.clone(), format, "Line one\n\nLine three").unwrap();
        assert_eq!(carrier.format(), format);
        assert_eq!(carrier.read().unwrap(), "Line one\n\nLine three");
        drop(carrier);
        assert!(!path.exists());
    }

    #[test]
    fn test_carrier_removed_when_reader_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp_C3.docx");

        let result: Result<String, StoreError> = (|| {
            let carrier = Carrier::create(
                path.clone(),
                CarrierFormat::Document(CarrierFidelity::LineSplit),
                "x",
            )?;
            std::fs::write(carrier.path(), "corrupted").unwrap();
            carrier.read()
        })();

        assert!(matches!(result, Err(StoreError::Read { .. })));
        assert!(!path.exists());
    }

    #[test]
    fn test_create_in_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_such_dir").join("temp_C2.txt");
        assert!(matches!(
            Carrier::create(path, CarrierFormat::Text, "x"),
            Err(StoreError::Write { .. })
        ));
    }

    #[test]
    fn test_read_missing_carrier() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_carrier_file(&dir.path().join("temp_C9.txt"), CarrierFormat::Text).unwrap_err();
        assert!(matches!(err, StoreError::FileNotFound(_)));
    }

    #[test]
    fn test_delete_missing_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        assert!(delete_carrier(&dir.path().join("temp_C10.txt")));
    }

    #[test]
    fn test_delete_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory cannot be removed with remove_file
        let blocker = dir.path().join("temp_C12.docx");
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("inner"), "x").unwrap();
        assert!(!delete_carrier(&blocker));
    }
}
