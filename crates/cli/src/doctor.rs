// `cellscribe doctor`: environment report. Never fails the process.

use std::path::PathBuf;

use cellscribe_completion::CompletionClient;
use cellscribe_config::credentials::keychain_available;
use cellscribe_config::{CarrierFidelity, CredentialSource, EnvCredentials, KeySource, Settings};
use cellscribe_io::docx::{read_document, write_document};
use cellscribe_io::list_sheets;

use crate::CliError;

/// Text the document self-test writes and expects back.
const SELF_TEST_TEXT: &str = "a\n\nb";

struct DoctorReport {
    config_path: PathBuf,
    config_error: Option<String>,
    key_var: String,
    key_present: bool,
    key_source: KeySource,
    keychain_available: bool,
    model: String,
    endpoint: String,
    workbook: PathBuf,
    workbook_exists: bool,
    sheet: String,
    sheets: Option<Vec<String>>,
    reader: Check,
    document: Check,
    http_client: Check,
}

/// Outcome of one component check.
enum Check {
    Ok,
    Skipped(&'static str),
    Failed(String),
}

impl Check {
    fn as_str(&self) -> &str {
        match self {
            Check::Ok => "ok",
            Check::Skipped(why) => *why,
            Check::Failed(e) => e.as_str(),
        }
    }

    fn status(&self) -> &'static str {
        match self {
            Check::Ok => "ok",
            Check::Skipped(_) => "skipped",
            Check::Failed(_) => "failed",
        }
    }
}

pub fn cmd_doctor(config: Option<PathBuf>, workbook: Option<PathBuf>, json: bool) -> Result<(), CliError> {
    let report = collect(config, workbook);
    if json {
        print_json(&report);
    } else {
        print_text(&report);
    }
    Ok(())
}

fn collect(config: Option<PathBuf>, workbook: Option<PathBuf>) -> DoctorReport {
    let config_path = config
        .clone()
        .or_else(|| std::env::var_os(cellscribe_config::settings::CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(Settings::config_path);

    let (mut settings, config_error) = match Settings::load(config.as_deref()) {
        Ok(s) => (s, None),
        Err(e) => (Settings::default(), Some(e.to_string())),
    };
    if let Some(path) = workbook {
        settings.workbook.path = path;
    }

    let credentials = EnvCredentials::new(settings.completion.api_key_env.clone());
    let lookup = credentials.lookup();

    let workbook_exists = settings.workbook.path.is_file();
    let (sheets, reader) = if workbook_exists {
        match list_sheets(&settings.workbook.path) {
            Ok(names) => (Some(names), Check::Ok),
            Err(e) => (None, Check::Failed(e.to_string())),
        }
    } else {
        (None, Check::Skipped("skipped (no workbook)"))
    };

    let http_client = match CompletionClient::new(&settings.completion, Box::new(credentials)) {
        Ok(_) => Check::Ok,
        Err(e) => Check::Failed(e.to_string()),
    };

    DoctorReport {
        config_path,
        config_error,
        key_var: settings.completion.api_key_env.clone(),
        key_present: lookup.key.is_some(),
        key_source: lookup.source,
        keychain_available: keychain_available(),
        model: settings.completion.model.clone(),
        endpoint: settings.completion.endpoint.clone(),
        workbook: settings.workbook.path.clone(),
        workbook_exists,
        sheet: settings.workbook.sheet.clone(),
        sheets,
        reader,
        document: document_self_test(settings.run.carrier_fidelity),
        http_client,
    }
}

/// Write and read back a document carrier in a scratch directory.
fn document_self_test(fidelity: CarrierFidelity) -> Check {
    let dir = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(e) => return Check::Failed(format!("no scratch directory: {}", e)),
    };
    let path = dir.path().join("temp_doctor.docx");

    if let Err(e) = write_document(&path, SELF_TEST_TEXT, fidelity) {
        return Check::Failed(e.to_string());
    }
    match read_document(&path, fidelity) {
        Ok(text) if fidelity == CarrierFidelity::LineSplit && text != SELF_TEST_TEXT => {
            Check::Failed(format!("read back {:?}", text))
        }
        Ok(_) => Check::Ok,
        Err(e) => Check::Failed(e.to_string()),
    }
}

impl DoctorReport {
    fn sheet_present(&self) -> Option<bool> {
        self.sheets.as_ref().map(|names| names.iter().any(|n| n == &self.sheet))
    }
}

fn print_json(r: &DoctorReport) {
    let output = serde_json::json!({
        "schema_version": 1,
        "config": {
            "path": r.config_path.display().to_string(),
            "error": r.config_error,
        },
        "key": if r.key_present { "present" } else { "missing" },
        "key_source": r.key_source.as_str(),
        "key_var": r.key_var,
        "keychain": if r.keychain_available { "ok" } else { "unavailable" },
        "model": r.model,
        "endpoint": r.endpoint,
        "workbook": {
            "path": r.workbook.display().to_string(),
            "exists": r.workbook_exists,
            "sheet": r.sheet,
            "sheet_present": r.sheet_present(),
            "sheets": r.sheets,
        },
        "components": {
            "reader": r.reader.status(),
            "document": r.document.status(),
            "http_client": r.http_client.status(),
        },
    });
    match serde_json::to_string_pretty(&output) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("error: cannot render report: {}", e),
    }
}

fn print_text(r: &DoctorReport) {
    println!("cellscribe doctor");
    println!("-----------------");
    println!("config:        {}", r.config_path.display());
    if let Some(err) = &r.config_error {
        println!("config_error:  {} (showing defaults)", err);
    }
    println!("key:           {}", if r.key_present { "present" } else { "missing" });
    println!("key_source:    {}", r.key_source.as_str());
    println!("keychain:      {}", if r.keychain_available { "ok" } else { "unavailable" });
    println!("model:         {}", r.model);
    println!("endpoint:      {}", r.endpoint);
    println!("workbook:      {} ({})", r.workbook.display(), if r.workbook_exists { "found" } else { "missing" });
    match (r.sheet_present(), &r.sheets) {
        (Some(true), _) => println!("sheet:         {} (present)", r.sheet),
        (Some(false), Some(names)) => println!("sheet:         {} (absent; have: {})", r.sheet, names.join(", ")),
        _ => println!("sheet:         {} (not checked)", r.sheet),
    }
    println!("reader:        {}", r.reader.as_str());
    println!("document:      {}", r.document.as_str());
    println!("http_client:   {}", r.http_client.as_str());

    if !r.key_present {
        println!();
        if r.key_source == KeySource::Placeholder {
            println!("Fix: {} still holds the placeholder value; replace it with a real key", r.key_var);
        } else {
            println!("Fix: set {} in the environment or in .env", r.key_var);
        }
    }
}
