// Cell store: read a sheet snapshot with calamine, write single cells by
// patching the worksheet part inside the .xlsx package.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Range, Reader};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::cell_ref::CellRef;
use crate::error::StoreError;
use crate::ooxml::{
    attr_value, read_zip_entry, resolve_sheet_parts, CALC_CHAIN_PART, CONTENT_TYPES_PART, WORKBOOK_PART,
    WORKBOOK_RELS_PART,
};
use crate::xlsx_patch::{remove_elements, set_cell_in_sheet_xml};

/// Read-only view of one sheet, taken once at the start of a run.
///
/// Formula cells hold the value last computed by the spreadsheet
/// application; nothing is recalculated here.
#[derive(Debug, Clone)]
pub struct Snapshot {
    path: PathBuf,
    sheet: String,
    sheet_names: Vec<String>,
    range: Range<Data>,
}

impl Snapshot {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    /// Every sheet in the workbook, in workbook order.
    pub fn sheet_names(&self) -> &[String] {
        &self.sheet_names
    }

    /// Text value of a cell, or None when it is empty.
    pub fn read_cell(&self, cell: CellRef) -> Option<String> {
        self.range.get_value((cell.row, cell.col)).and_then(render)
    }
}

/// Render a calamine value the way the sheet displays it.
fn render(value: &Data) -> Option<String> {
    match value {
        Data::Empty => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(s.clone()),
        Data::Float(n) => Some(format_number(*n)),
        Data::Int(n) => Some(n.to_string()),
        Data::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::Error(e) => Some(e.to_string()),
        Data::DateTime(dt) if dt.is_datetime() => Some(
            dt.as_datetime()
                .map(|d| d.to_string())
                .unwrap_or_else(|| format_number(dt.as_f64())),
        ),
        Data::DateTime(dt) => Some(format_number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}

// Integers without decimals
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Open a workbook and take a snapshot of `sheet`.
pub fn open_for_read(path: &Path, sheet: &str) -> Result<Snapshot, StoreError> {
    if !path.exists() {
        return Err(StoreError::FileNotFound(path.to_path_buf()));
    }

    let mut workbook = open_workbook_auto(path).map_err(|e| StoreError::read(path, e))?;
    let sheet_names = workbook.sheet_names().to_vec();

    if !sheet_names.iter().any(|name| name == sheet) {
        return Err(StoreError::SheetNotFound {
            sheet: sheet.to_string(),
            available: sheet_names,
        });
    }

    let range = workbook
        .worksheet_range(sheet)
        .map_err(|e| StoreError::read(path, format!("sheet '{}': {}", sheet, e)))?;

    tracing::debug!(
        path = %path.display(),
        sheet,
        rows = range.height(),
        cols = range.width(),
        "opened workbook for read"
    );

    Ok(Snapshot {
        path: path.to_path_buf(),
        sheet: sheet.to_string(),
        sheet_names,
        range,
    })
}

/// Sheet names of a workbook, for diagnostics.
pub fn list_sheets(path: &Path) -> Result<Vec<String>, StoreError> {
    if !path.exists() {
        return Err(StoreError::FileNotFound(path.to_path_buf()));
    }
    let workbook = open_workbook_auto(path).map_err(|e| StoreError::read(path, e))?;
    Ok(workbook.sheet_names().to_vec())
}

/// Set one cell to a string value and save the workbook.
///
/// Each call is a full open/modify/save cycle. The package is rebuilt in a
/// temp file next to the workbook and renamed over it, so a failed write
/// leaves the original untouched.
pub fn write_cell(path: &Path, sheet: &str, cell: CellRef, value: &str) -> Result<(), StoreError> {
    if !path.exists() {
        return Err(StoreError::FileNotFound(path.to_path_buf()));
    }

    let file = File::open(path).map_err(|e| StoreError::write(path, e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| StoreError::write(path, format!("not an xlsx package: {}", e)))?;

    let workbook_xml = read_zip_entry(&mut archive, WORKBOOK_PART)
        .ok_or_else(|| StoreError::write(path, format!("missing {}", WORKBOOK_PART)))?;
    let rels_xml = read_zip_entry(&mut archive, WORKBOOK_RELS_PART)
        .ok_or_else(|| StoreError::write(path, format!("missing {}", WORKBOOK_RELS_PART)))?;

    let parts = resolve_sheet_parts(&workbook_xml, &rels_xml);
    let sheet_part = match parts.iter().find(|(name, _)| name == sheet) {
        Some((_, part)) => part.clone(),
        None => {
            return Err(StoreError::SheetNotFound {
                sheet: sheet.to_string(),
                available: parts.into_iter().map(|(name, _)| name).collect(),
            })
        }
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| StoreError::write(path, e))?;

    {
        let mut out = ZipWriter::new(tmp.as_file_mut());
        let mut patched_sheet = false;

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| StoreError::write(path, format!("zip entry {}: {}", i, e)))?;
            let name = entry.name().to_string();

            if name == CALC_CHAIN_PART {
                tracing::debug!(path = %path.display(), "dropping calculation chain");
                continue;
            }

            let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

            if entry.is_dir() {
                out.add_directory(name.as_str(), options)
                    .map_err(|e| StoreError::write(path, e))?;
                continue;
            }

            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .map_err(|e| StoreError::write(path, format!("{}: {}", name, e)))?;

            if name == sheet_part {
                data = set_cell_in_sheet_xml(&data, cell, value)
                    .map_err(|e| StoreError::write(path, format!("{}: {}", name, e)))?;
                patched_sheet = true;
            } else if name == CONTENT_TYPES_PART {
                data = remove_elements(&data, b"Override", |e| {
                    attr_value(e, b"PartName").as_deref() == Some("/xl/calcChain.xml")
                })
                .map_err(|e| StoreError::write(path, format!("{}: {}", name, e)))?;
            } else if name == WORKBOOK_RELS_PART {
                data = remove_elements(&data, b"Relationship", |e| {
                    attr_value(e, b"Target").is_some_and(|t| t.ends_with("calcChain.xml"))
                })
                .map_err(|e| StoreError::write(path, format!("{}: {}", name, e)))?;
            }

            out.start_file(name.as_str(), options)
                .map_err(|e| StoreError::write(path, e))?;
            out.write_all(&data).map_err(|e| StoreError::write(path, e))?;
        }

        if !patched_sheet {
            return Err(StoreError::write(path, format!("worksheet part {} missing", sheet_part)));
        }

        out.finish().map_err(|e| StoreError::write(path, e))?;
    }

    drop(archive);
    tmp.persist(path).map_err(|e| StoreError::write(path, e.error))?;

    tracing::debug!(path = %path.display(), sheet, cell = %cell, "wrote cell");
    Ok(())
}
