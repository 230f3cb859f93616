// Pipeline settings
// Loaded from ~/.config/cellscribe/settings.toml (or --config / CELLSCRIBE_CONFIG)

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Environment variable that points at an alternate settings file.
pub const CONFIG_ENV: &str = "CELLSCRIBE_CONFIG";

/// Environment variable that overrides `workbook.path`.
pub const WORKBOOK_ENV: &str = "CELLSCRIBE_WORKBOOK";

pub const DEFAULT_WORKBOOK: &str = "YouTubeVideosList.xlsx";
pub const DEFAULT_SHEET: &str = "Shorts_Automation";
pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-chat:free";
pub const DEFAULT_API_KEY_ENV: &str = "OPENROUTER_API_KEY";
pub const DEFAULT_REFERER: &str = "https://localhost";
pub const DEFAULT_TITLE: &str = "YouTube AI Chat";

/// How a rich-document carrier lays out the cell value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarrierFidelity {
    /// Whole value in one paragraph; read back with trailing whitespace trimmed.
    Basic,
    /// One paragraph per line; read back exactly.
    #[default]
    LineSplit,
}

impl CarrierFidelity {
    pub fn as_str(&self) -> &'static str {
        match self {
            CarrierFidelity::Basic => "basic",
            CarrierFidelity::LineSplit => "line_split",
        }
    }
}

/// How a step moves the source value into its prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CarrierKind {
    /// Round-trip through `temp_<cell>.txt`
    #[default]
    Text,
    /// Round-trip through `temp_<cell>.docx`
    Document,
    /// Use the cell value directly, no file
    Inline,
}

impl CarrierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CarrierKind::Text => "text",
            CarrierKind::Document => "document",
            CarrierKind::Inline => "inline",
        }
    }
}

/// Workbook location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbookSettings {
    pub path: PathBuf,
    pub sheet: String,
}

impl Default for WorkbookSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_WORKBOOK),
            sheet: DEFAULT_SHEET.to_string(),
        }
    }
}

/// Completion endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the bearer credential
    pub api_key_env: String,
    /// Sent as `HTTP-Referer`
    pub referer: Option<String>,
    /// Sent as `X-Title`
    pub title: Option<String>,
    /// None = block until the server answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            referer: Some(DEFAULT_REFERER.to_string()),
            title: Some(DEFAULT_TITLE.to_string()),
            timeout_secs: None,
        }
    }
}

/// Run-wide behaviour shared by every entry point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub carrier_fidelity: CarrierFidelity,
    /// Characters of source content echoed before each step
    pub preview_chars: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            carrier_fidelity: CarrierFidelity::LineSplit,
            preview_chars: 100,
        }
    }
}

/// One source cell and where its generated text goes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSettings {
    /// Source cell, A1 notation
    pub source: String,
    /// Destination cell, A1 notation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell: Option<String>,
    /// Destination side file, without the `.txt` extension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default)]
    pub carrier: CarrierKind,
    /// Prompt template. `{content}` is replaced by the carrier text,
    /// `{target}` by the destination label.
    pub template: String,
}

impl StepSettings {
    fn text_to_cell(source: &str, cell: &str) -> Self {
        Self {
            source: source.to_string(),
            cell: Some(cell.to_string()),
            file: None,
            carrier: CarrierKind::Text,
            template: "Based on this content from the temporary file: '{content}', \
                       generate an appropriate response for cell {target}."
                .to_string(),
        }
    }

    fn document_to_file(source: &str, file: &str, language: &str) -> Self {
        Self {
            source: source.to_string(),
            cell: None,
            file: Some(file.to_string()),
            carrier: CarrierKind::Document,
            template: format!(
                "COMPLETE CONTENT from Word file (preserving all formatting and newlines):\n\n\
                 {{content}}\n\n\
                 Based on the COMPLETE content above from the temporary Word file, generate an \
                 appropriate {language} short response for {{target}} file. Please process the \
                 entire content including all lines, paragraphs, and formatting."
            ),
        }
    }
}

/// The fixed six-step plan: C2→B4, C3→B6, C9→B9, C10→B10,
/// C11→ShortEng_AT.txt, C12→ShortHindi_AT.txt.
pub fn default_steps() -> Vec<StepSettings> {
    vec![
        StepSettings::text_to_cell("C2", "B4"),
        StepSettings::text_to_cell("C3", "B6"),
        StepSettings::text_to_cell("C9", "B9"),
        StepSettings::text_to_cell("C10", "B10"),
        StepSettings::document_to_file("C11", "ShortEng_AT", "English"),
        StepSettings::document_to_file("C12", "ShortHindi_AT", "Hindi"),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub workbook: WorkbookSettings,
    pub completion: CompletionSettings,
    pub run: RunSettings,
    pub steps: Vec<StepSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workbook: WorkbookSettings::default(),
            completion: CompletionSettings::default(),
            run: RunSettings::default(),
            steps: default_steps(),
        }
    }
}

impl Settings {
    /// Get the default settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cellscribe")
            .join("settings.toml")
    }

    /// Load settings.
    ///
    /// Resolution order: `explicit` path, then `CELLSCRIBE_CONFIG`, then the
    /// default config path. An explicitly named file must exist; a missing
    /// default file means built-in defaults. `CELLSCRIBE_WORKBOOK` overrides
    /// the workbook path afterwards.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let named = explicit
            .map(Path::to_path_buf)
            .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));

        let mut settings = match named {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path));
                }
                Self::from_file(&path)?
            }
            None => {
                let path = Self::config_path();
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    tracing::debug!(path = %path.display(), "no settings file, using defaults");
                    Self::default()
                }
            }
        };

        if let Some(workbook) = env::var_os(WORKBOOK_ENV) {
            if !workbook.is_empty() {
                settings.workbook.path = PathBuf::from(workbook);
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Parse a settings file without applying environment overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml(&contents).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;
        tracing::debug!(path = %path.display(), steps = settings.steps.len(), "loaded settings");
        Ok(settings)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            message: e.message().to_string(),
        })
    }

    /// Structural checks. Cell coordinates are parsed later by the pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workbook.sheet.trim().is_empty() {
            return Err(ConfigError::Invalid("workbook.sheet is empty".into()));
        }
        if self.completion.model.trim().is_empty() {
            return Err(ConfigError::Invalid("completion.model is empty".into()));
        }
        if self.completion.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("completion.endpoint is empty".into()));
        }

        let mut seen = HashSet::new();
        for (i, step) in self.steps.iter().enumerate() {
            let source = step.source.trim().to_ascii_uppercase();
            if source.is_empty() {
                return Err(ConfigError::Invalid(format!("steps[{}]: source is empty", i)));
            }
            if !seen.insert(source.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "steps[{}]: source {} appears in more than one step",
                    i, source
                )));
            }
            if step.cell.is_none() && step.file.is_none() {
                return Err(ConfigError::Invalid(format!(
                    "steps[{}] ({}): needs a destination cell or file",
                    i, source
                )));
            }
            if let Some(file) = &step.file {
                if file.is_empty() || file.contains(['/', '\\']) {
                    return Err(ConfigError::Invalid(format!(
                        "steps[{}] ({}): file name '{}' must be a bare name",
                        i, source, file
                    )));
                }
            }
        }

        Ok(())
    }

    /// Render the settings as TOML (used by `cellscribe config`).
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
