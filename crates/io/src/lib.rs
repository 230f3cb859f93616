// File I/O: workbook cells, side files, carrier documents

pub mod carrier;
pub mod cell_ref;
pub mod docx;
pub mod error;
pub mod side_files;
pub mod workbook;
mod ooxml;
mod xlsx_patch;

pub use carrier::{delete_carrier, read_carrier_file, Carrier, CarrierFormat};
pub use cell_ref::CellRef;
pub use error::StoreError;
pub use side_files::SideFiles;
pub use workbook::{list_sheets, open_for_read, write_cell, Snapshot};
