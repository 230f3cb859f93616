// Configuration loading

pub mod credentials;
pub mod settings;

use std::path::PathBuf;

pub use credentials::{CredentialSource, EnvCredentials, KeyLookup, KeySource, StaticCredential};
pub use settings::{
    CarrierFidelity, CarrierKind, CompletionSettings, RunSettings, Settings, StepSettings,
    WorkbookSettings,
};

/// Errors raised while locating, reading or validating settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("settings file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid settings: {0}")]
    Invalid(String),
}
