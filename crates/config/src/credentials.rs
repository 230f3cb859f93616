// Completion API credentials
//
// The bearer credential is looked up on every call, in order:
// 1. Process environment variable (OPENROUTER_API_KEY unless configured otherwise)
// 2. `.env` file in the working directory, re-read on each lookup
// 3. System keychain (only with the `keychain` feature)
//
// Keys are NEVER stored in settings.toml

use std::env;
use std::path::{Path, PathBuf};

/// Value shipped in sample `.env` files; treated as "no key".
pub const PLACEHOLDER_KEY: &str = "your-api-key-here";

/// Service name for keychain storage
#[cfg(feature = "keychain")]
const KEYCHAIN_SERVICE: &str = "cellscribe";

/// Source of an API key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// Key retrieved from the process environment
    Environment,
    /// Key retrieved from a `.env` file
    DotEnv,
    /// Key retrieved from system keychain
    Keychain,
    /// A key was found but it is the documented placeholder
    Placeholder,
    /// No key found
    None,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::Environment => "environment",
            KeySource::DotEnv => "dotenv",
            KeySource::Keychain => "keychain",
            KeySource::Placeholder => "placeholder",
            KeySource::None => "none",
        }
    }
}

/// Result of key lookup
#[derive(Debug, Clone)]
pub struct KeyLookup {
    pub key: Option<String>,
    pub source: KeySource,
}

impl KeyLookup {
    fn missing() -> Self {
        Self { key: None, source: KeySource::None }
    }

    /// Classify a raw candidate value found at `source`.
    fn classify(raw: String, source: KeySource) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed == PLACEHOLDER_KEY {
            return Some(Self { key: None, source: KeySource::Placeholder });
        }
        Some(Self { key: Some(trimmed.to_string()), source })
    }
}

/// Supplies the bearer credential at call time.
pub trait CredentialSource: Send + Sync {
    fn lookup(&self) -> KeyLookup;

    /// The usable key, if any.
    fn api_key(&self) -> Option<String> {
        self.lookup().key
    }
}

/// Reads the credential from the environment, `.env`, and optionally the keychain.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    var: String,
    dotenv_path: PathBuf,
}

impl EnvCredentials {
    pub fn new(var: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            dotenv_path: PathBuf::from(".env"),
        }
    }

    pub fn with_dotenv_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dotenv_path = path.into();
        self
    }
}

impl CredentialSource for EnvCredentials {
    fn lookup(&self) -> KeyLookup {
        get_api_key(&self.var, &self.dotenv_path)
    }
}

/// Fixed credential, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct StaticCredential(pub Option<String>);

impl StaticCredential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(Some(key.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl CredentialSource for StaticCredential {
    fn lookup(&self) -> KeyLookup {
        self.0
            .clone()
            .and_then(|k| KeyLookup::classify(k, KeySource::Environment))
            .unwrap_or_else(KeyLookup::missing)
    }
}

/// Look up an API key by environment variable name.
///
/// A value present in the process environment wins over `.env`, even when it
/// is the placeholder; `.env` never overrides an exported variable.
pub fn get_api_key(var: &str, dotenv_path: &Path) -> KeyLookup {
    if let Ok(value) = env::var(var) {
        if let Some(found) = KeyLookup::classify(value, KeySource::Environment) {
            return found;
        }
    }

    if let Some(value) = read_dotenv_var(dotenv_path, var) {
        if let Some(found) = KeyLookup::classify(value, KeySource::DotEnv) {
            return found;
        }
    }

    #[cfg(feature = "keychain")]
    {
        if let Ok(entry) = keyring::Entry::new(KEYCHAIN_SERVICE, &keychain_account(var)) {
            if let Ok(key) = entry.get_password() {
                if let Some(found) = KeyLookup::classify(key, KeySource::Keychain) {
                    return found;
                }
            }
        }
    }

    KeyLookup::missing()
}

/// Read one variable from a dotenv file without touching the process environment.
fn read_dotenv_var(path: &Path, var: &str) -> Option<String> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(_) => return None,
    };
    for item in iter {
        match item {
            Ok((key, value)) if key == var => return Some(value),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping malformed .env line");
            }
        }
    }
    None
}

/// Get the keychain account name for an environment variable
#[cfg(feature = "keychain")]
fn keychain_account(var: &str) -> String {
    format!("api/{}", var.to_lowercase())
}

/// Check if keychain support is available
pub fn keychain_available() -> bool {
    #[cfg(feature = "keychain")]
    {
        keyring::Entry::new(KEYCHAIN_SERVICE, "test").is_ok()
    }
    #[cfg(not(feature = "keychain"))]
    {
        false
    }
}
