// cellscribe CLI - spreadsheet cells in, generated text out
//
// Entry points: `run` (asks before each step), `auto` (runs straight
// through), `doctor` (environment report, always exits 0).

mod doctor;
mod exit_codes;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cellscribe_completion::CompletionClient;
use cellscribe_config::{ConfigError, CredentialSource, EnvCredentials, Settings};
use cellscribe_io::{SideFiles, StoreError};
use cellscribe_pipeline::{AutoConfirm, Pipeline, PipelineError, Plan, PromptConfirmer, RunPolicy, RunStatus, WorkbookStore};

use exit_codes::{EXIT_CONFIG, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE, EXIT_WORKBOOK};

#[derive(Parser)]
#[command(name = "cellscribe")]
#[command(about = "Generate titles, descriptions and short scripts from spreadsheet cells")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CELLSCRIBE_COMMIT"), ")"))]
#[command(subcommand_required = false)]
struct Cli {
    /// Settings file (default: <config dir>/cellscribe/settings.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Workbook to process, overriding workbook.path
    #[arg(long, global = true, value_name = "PATH")]
    workbook: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every step, asking for confirmation after each one
    Run,

    /// Process every step without stopping
    Auto,

    /// Report API key, workbook and component status
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective settings as TOML
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        None => {
            eprintln!("Usage: cellscribe <run|auto|doctor|config> [options]");
            eprintln!("       cellscribe --help for more information");
            Err(CliError {
                code: EXIT_USAGE,
                message: String::new(),
                hint: None,
            })
        }
        Some(Commands::Run) => cmd_run(cli.config, cli.workbook, Mode::Interactive),
        Some(Commands::Auto) => cmd_run(cli.config, cli.workbook, Mode::Unattended),
        Some(Commands::Doctor { json }) => doctor::cmd_doctor(cli.config, cli.workbook, json),
        Some(Commands::Config) => cmd_config(cli.config, cli.workbook),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

/// Default filter `warn`; `RUST_LOG` wins when set.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(verbose >= 2)
        .with_line_number(verbose >= 3)
        .init();
}

pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn config(err: ConfigError) -> Self {
        let hint = match &err {
            ConfigError::NotFound(_) => Some("check --config or CELLSCRIBE_CONFIG".to_string()),
            ConfigError::Parse { .. } => Some("run `cellscribe config` with no settings file to see the expected layout".to_string()),
            _ => None,
        };
        Self { code: EXIT_CONFIG, message: err.to_string(), hint }
    }

    pub fn plan(err: PipelineError) -> Self {
        match err {
            PipelineError::Workbook(e) => Self::workbook(e),
            other => Self { code: EXIT_CONFIG, message: format!("invalid [[steps]]: {}", other), hint: None },
        }
    }

    pub fn workbook(err: StoreError) -> Self {
        let hint = match &err {
            StoreError::FileNotFound(_) => Some("set workbook.path in settings, --workbook, or CELLSCRIBE_WORKBOOK".to_string()),
            StoreError::SheetNotFound { .. } => Some("set workbook.sheet in settings to one of the available sheets".to_string()),
            _ => None,
        };
        Self { code: EXIT_WORKBOOK, message: err.to_string(), hint }
    }
}

/// Settings with the `--workbook` override applied (it beats CELLSCRIBE_WORKBOOK).
fn load_settings(config: Option<PathBuf>, workbook: Option<PathBuf>) -> Result<Settings, CliError> {
    let mut settings = Settings::load(config.as_deref()).map_err(CliError::config)?;
    if let Some(path) = workbook {
        settings.workbook.path = path;
    }
    Ok(settings)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Interactive,
    Unattended,
}

// ============================================================================
// run / auto
// ============================================================================

fn cmd_run(config: Option<PathBuf>, workbook: Option<PathBuf>, mode: Mode) -> Result<(), CliError> {
    let settings = load_settings(config, workbook)?;
    let plan = Plan::from_settings(&settings.steps).map_err(CliError::plan)?;

    let workbook_path = settings.workbook.path.clone();
    let mut store = WorkbookStore::open(&workbook_path, &settings.workbook.sheet).map_err(CliError::workbook)?;
    tracing::info!(workbook = %store.path().display(), steps = plan.len(), ?mode, "workbook opened");
    tracing::debug!(sheets = ?store.snapshot().sheet_names(), "workbook sheets");

    let credentials = EnvCredentials::new(settings.completion.api_key_env.clone());
    if credentials.api_key().is_none() {
        eprintln!(
            "warning: {} is not set; every step will fail until it is",
            settings.completion.api_key_env
        );
    }
    let client = CompletionClient::new(&settings.completion, Box::new(credentials))
        .map_err(|e| CliError::general(e.to_string()))?;

    let side_files = SideFiles::for_workbook(&workbook_path);
    let policy = match mode {
        Mode::Interactive => RunPolicy::interactive(&settings.run),
        Mode::Unattended => RunPolicy::unattended(&settings.run),
    };

    println!(
        "Processing {} step(s) from '{}' in {} via {}",
        plan.len(),
        settings.workbook.sheet,
        workbook_path.display(),
        client.endpoint()
    );

    let pipeline = Pipeline::new(&plan, policy, &settings.completion.model, &side_files);
    let mut stdout = io::stdout();
    let report = match mode {
        Mode::Interactive => pipeline.run(&mut store, &client, &mut PromptConfirmer::stdio(), &mut stdout),
        Mode::Unattended => pipeline.run(&mut store, &client, &mut AutoConfirm, &mut stdout),
    };

    match report.status {
        RunStatus::AllStepsComplete => println!("Done."),
        RunStatus::Halted(_) => println!("Stopped before the end of the plan."),
    }
    Ok(())
}

// ============================================================================
// config
// ============================================================================

fn cmd_config(config: Option<PathBuf>, workbook: Option<PathBuf>) -> Result<(), CliError> {
    let settings = load_settings(config, workbook)?;
    let text = settings.to_toml().map_err(CliError::config)?;
    print!("{}", text);
    Ok(())
}
