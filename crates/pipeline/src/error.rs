use cellscribe_completion::CompletionError;
use cellscribe_io::StoreError;

use crate::plan::Destination;

/// Why a step produced no (or only partial) output. Never fatal to the run.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// Carrier could not be written or read back
    #[error("carrier file: {0}")]
    Carrier(#[source] StoreError),

    #[error("completion failed: {0}")]
    Completion(#[from] CompletionError),

    /// At least one destination write failed; `written` lists those that succeeded
    #[error("could not write {}", describe_failures(.failures))]
    Persist {
        failures: Vec<PersistFailure>,
        written: Vec<Destination>,
    },
}

#[derive(Debug)]
pub struct PersistFailure {
    pub destination: Destination,
    pub error: StoreError,
}

fn describe_failures(failures: &[PersistFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.destination, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that stop a run before any step executes.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("step {number}: {message}")]
    InvalidStep { number: usize, message: String },

    #[error("cannot open workbook: {0}")]
    Workbook(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_persist_message_names_destinations() {
        let err = StepError::Persist {
            failures: vec![PersistFailure {
                destination: Destination::File("ShortEng_AT".into()),
                error: StoreError::Write {
                    path: PathBuf::from("/ro/ShortEng_AT.txt"),
                    message: "permission denied".into(),
                },
            }],
            written: vec![],
        };
        let msg = err.to_string();
        assert!(msg.contains("ShortEng_AT.txt"), "{}", msg);
        assert!(msg.contains("permission denied"), "{}", msg);
    }
}
