//! `cellscribe-pipeline`: the extract → complete → persist loop.
//!
//! Reads a snapshot of source cells, moves each value through its carrier,
//! asks the completion endpoint, and writes the answer to cells and side
//! files. The store, completer and confirmation prompt are injected, so the
//! same engine serves the interactive and the unattended entry points.

pub mod confirm;
pub mod engine;
pub mod error;
pub mod plan;
pub mod ports;
pub mod prompt;
pub mod report;

pub use confirm::{AutoConfirm, ConfirmationMode, Confirmer, PromptConfirmer};
pub use engine::{Pipeline, RunPolicy};
pub use error::{PersistFailure, PipelineError, StepError};
pub use plan::{Destination, Plan, Step};
pub use ports::{CellStore, Completer, WorkbookStore};
pub use report::{HaltReason, RunReport, RunStatus, SkipReason, StepOutcome, StepReport};
