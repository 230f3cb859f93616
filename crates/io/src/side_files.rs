// Side files: whole-file text outputs and carriers next to the workbook

use std::fs;
use std::path::{Path, PathBuf};

use cellscribe_config::CarrierFidelity;

use crate::carrier::{Carrier, CarrierFormat};
use crate::error::StoreError;

/// Flat files in the workbook's directory.
#[derive(Debug, Clone)]
pub struct SideFiles {
    dir: PathBuf,
}

impl SideFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Side files for the directory containing `workbook`.
    pub fn for_workbook(workbook: &Path) -> Self {
        match workbook.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => Self::new(parent),
            _ => Self::new("."),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the `{name}.txt` output file.
    pub fn text_file_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.txt", name))
    }

    /// Create or overwrite `{name}.txt` with `content`.
    pub fn write_text_file(&self, name: &str, content: &str) -> Result<PathBuf, StoreError> {
        let path = self.text_file_path(name);
        fs::write(&path, content).map_err(|e| StoreError::write(&path, e))?;
        tracing::debug!(path = %path.display(), bytes = content.len(), "wrote side file");
        Ok(path)
    }

    /// Path a carrier for `label` would use: `temp_{label}.{txt|docx}`.
    pub fn carrier_path(&self, label: &str, format: CarrierFormat) -> PathBuf {
        self.dir.join(format!("temp_{}.{}", label, format.extension()))
    }

    pub fn create_carrier(&self, label: &str, value: Option<&str>, format: CarrierFormat) -> Result<Carrier, StoreError> {
        Carrier::create(self.carrier_path(label, format), format, value.unwrap_or(""))
    }

    /// `temp_{label}.txt` holding `value` verbatim (empty when None).
    pub fn create_carrier_text(&self, label: &str, value: Option<&str>) -> Result<Carrier, StoreError> {
        self.create_carrier(label, value, CarrierFormat::Text)
    }

    /// `temp_{label}.docx` holding `value`.
    pub fn create_carrier_document(
        &self,
        label: &str,
        value: Option<&str>,
        fidelity: CarrierFidelity,
    ) -> Result<Carrier, StoreError> {
        self.create_carrier(label, value, CarrierFormat::Document(fidelity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_workbook_uses_parent() {
        assert_eq!(SideFiles::for_workbook(Path::new("list.xlsx")).dir(), Path::new("."));
        assert_eq!(SideFiles::for_workbook(Path::new("/data/list.xlsx")).dir(), Path::new("/data"));
    }

    #[test]
    fn test_write_text_file_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let files = SideFiles::new(dir.path());

        let path = files.write_text_file("ShortEng_AT", "first").unwrap();
        assert_eq!(path, dir.path().join("ShortEng_AT.txt"));
        files.write_text_file("ShortEng_AT", "second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn test_carrier_names() {
        let files = SideFiles::new("/w");
        assert_eq!(files.carrier_path("C2", CarrierFormat::Text), PathBuf::from("/w/temp_C2.txt"));
        assert_eq!(
            files.carrier_path("C11", CarrierFormat::Document(CarrierFidelity::Basic)),
            PathBuf::from("/w/temp_C11.docx")
        );
    }

    #[test]
    fn test_null_value_becomes_empty_carrier() {
        let dir = tempfile::tempdir().unwrap();
        let files = SideFiles::new(dir.path());

        let carrier = files.create_carrier_text("C9", None).unwrap();
        assert_eq!(carrier.read().unwrap(), "");

        let doc = files.create_carrier_document("C12", None, CarrierFidelity::LineSplit).unwrap();
        assert_eq!(doc.read().unwrap(), "");
    }

    #[test]
    fn test_write_into_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let files = SideFiles::new(dir.path().join("missing"));
        assert!(matches!(files.write_text_file("x", "y"), Err(StoreError::Write { .. })));
    }
}
