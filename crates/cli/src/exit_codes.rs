//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Meaning                                                     |
//! |------|-------------------------------------------------------------|
//! | 0    | Success, including a run stopped by the operator            |
//! | 1    | General error                                               |
//! | 2    | Usage error (bad arguments)                                 |
//! | 3    | Settings file missing, unreadable, malformed or invalid     |
//! | 4    | Workbook or sheet unavailable at startup; no step ran       |
//!
//! Step failures (HTTP errors, missing key, write errors) are reported in
//! the run summary and do not change the exit code. `doctor` always exits 0.

/// Success - command completed. A run whose steps failed still exits 0.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments. clap exits with this code on its own.
pub const EXIT_USAGE: u8 = 2;

/// Settings could not be loaded or failed validation.
pub const EXIT_CONFIG: u8 = 3;

/// Workbook file or sheet could not be opened before the first step.
pub const EXIT_WORKBOOK: u8 = 4;
