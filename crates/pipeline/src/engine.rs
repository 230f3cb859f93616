//! The step loop.
//!
//! Per step: ReadingSource → Transforming → Persisting → StepComplete, then
//! AwaitingConfirmation when the policy asks for it. A declined confirmation
//! halts the run; every other failure only ends its own step.

use std::io::Write;

use cellscribe_config::{CarrierFidelity, CarrierKind, RunSettings};
use cellscribe_io::{Carrier, CarrierFormat, SideFiles};

use crate::confirm::{ConfirmationMode, Confirmer};
use crate::error::{PersistFailure, StepError};
use crate::plan::{Destination, Plan, Step};
use crate::ports::{CellStore, Completer};
use crate::prompt;
use crate::report::{HaltReason, RunReport, RunStatus, SkipReason, StepOutcome, StepReport};

/// How a run behaves. Entry points differ only in this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPolicy {
    pub confirmation: ConfirmationMode,
    pub carrier_fidelity: CarrierFidelity,
    pub preview_chars: usize,
}

impl RunPolicy {
    /// Pause after each step.
    pub fn interactive(run: &RunSettings) -> Self {
        Self {
            confirmation: ConfirmationMode::Always,
            carrier_fidelity: run.carrier_fidelity,
            preview_chars: run.preview_chars,
        }
    }

    /// Run every step without pausing.
    pub fn unattended(run: &RunSettings) -> Self {
        Self {
            confirmation: ConfirmationMode::Never,
            ..Self::interactive(run)
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum State {
    ReadingSource,
    Transforming,
    Persisting,
    StepComplete,
    AwaitingConfirmation,
}

fn enter(step: usize, state: State) {
    tracing::debug!(step, ?state, "pipeline state");
}

pub struct Pipeline<'a> {
    plan: &'a Plan,
    policy: RunPolicy,
    model: &'a str,
    side_files: &'a SideFiles,
}

impl<'a> Pipeline<'a> {
    pub fn new(plan: &'a Plan, policy: RunPolicy, model: &'a str, side_files: &'a SideFiles) -> Self {
        Self {
            plan,
            policy,
            model,
            side_files,
        }
    }

    /// Run every step in order. `out` receives the operator-facing progress text.
    pub fn run(
        &self,
        store: &mut dyn CellStore,
        completer: &dyn Completer,
        confirmer: &mut dyn Confirmer,
        out: &mut dyn Write,
    ) -> RunReport {
        let total = self.plan.len();
        let mut steps = Vec::with_capacity(total);
        let mut status = RunStatus::AllStepsComplete;

        tracing::info!(steps = total, confirmation = ?self.policy.confirmation, "starting run");

        for (i, step) in self.plan.steps().iter().enumerate() {
            let number = i + 1;
            enter(number, State::ReadingSource);

            let value = store.read_cell(step.source).filter(|v| !v.is_empty());
            let Some(value) = value else {
                tracing::info!(step = number, source = %step.source, "source empty, skipping");
                let _ = writeln!(out, "\nStep {}/{}: {} is empty, skipping", number, total, step.source);
                steps.push(report(number, step, StepOutcome::Skipped(SkipReason::EmptySource)));
                continue;
            };

            let _ = writeln!(out, "\nStep {}/{}: {}", number, total, step.describe());
            let _ = writeln!(out, "Content preview: {}", preview(&value, self.policy.preview_chars));

            let outcome = self.execute(number, step, &value, store, completer, out);
            match &outcome {
                StepOutcome::Completed { .. } => {
                    let _ = writeln!(out, "Step {} completed: {}", number, step.describe());
                }
                StepOutcome::Skipped(reason) => {
                    let _ = writeln!(out, "Step {} skipped: {}", number, reason.as_str());
                }
                StepOutcome::Failed(e) => {
                    tracing::warn!(step = number, error = %e, "step failed");
                    let _ = writeln!(out, "Step {} failed: {}", number, e);
                    if let StepError::Completion(c) = e {
                        if c.is_auth() {
                            let _ = writeln!(out, "The completion endpoint rejected the API key; check its value.");
                        }
                    }
                }
            }
            enter(number, State::StepComplete);

            let executed = !matches!(outcome, StepOutcome::Skipped(_));
            steps.push(report(number, step, outcome));

            if self.policy.confirmation == ConfirmationMode::Always && executed && number < total {
                enter(number, State::AwaitingConfirmation);
                let message = format!("Step {} finished. Continue with step {}?", number, number + 1);
                if !confirmer.confirm(&message) {
                    tracing::info!(step = number, "run stopped by operator");
                    let _ = writeln!(out, "Stopped by operator after step {}.", number);
                    status = RunStatus::Halted(HaltReason::UserDeclined);
                    break;
                }
            }
        }

        let report = RunReport {
            steps,
            status,
            planned: total,
        };
        print_summary(&report, out);
        report
    }

    fn execute(
        &self,
        number: usize,
        step: &Step,
        value: &str,
        store: &mut dyn CellStore,
        completer: &dyn Completer,
        out: &mut dyn Write,
    ) -> StepOutcome {
        // Held until the step returns; dropping it removes the file
        let mut _carrier: Option<Carrier> = None;
        let label = step.source.to_string();

        let content = match step.carrier {
            CarrierKind::Inline => value.to_string(),
            CarrierKind::Text | CarrierKind::Document => {
                let format = match step.carrier {
                    CarrierKind::Document => CarrierFormat::Document(self.policy.carrier_fidelity),
                    _ => CarrierFormat::Text,
                };
                let carrier = match self.side_files.create_carrier(&label, Some(value), format) {
                    Ok(c) => c,
                    Err(e) => return StepOutcome::Failed(StepError::Carrier(e)),
                };
                let text = match carrier.read() {
                    Ok(t) => t,
                    Err(e) => return StepOutcome::Failed(StepError::Carrier(e)),
                };
                _carrier = Some(carrier);
                text
            }
        };

        if content.is_empty() {
            return StepOutcome::Skipped(SkipReason::EmptyCarrier);
        }

        enter(number, State::Transforming);
        let prompt = prompt::render(&step.template, &content, &step.target_label());
        let response = match completer.complete(&prompt, self.model) {
            Ok(r) => r,
            Err(e) => return StepOutcome::Failed(StepError::Completion(e)),
        };
        let _ = writeln!(out, "Generated text for {}:\n{}", step.target_label(), response);

        enter(number, State::Persisting);
        let mut written = Vec::new();
        let mut failures = Vec::new();
        for destination in &step.destinations {
            let result = match destination {
                Destination::Cell(cell) => store.write_cell(*cell, &response),
                Destination::File(name) => self.side_files.write_text_file(name, &response).map(|_| ()),
            };
            match result {
                Ok(()) => {
                    tracing::debug!(step = number, %destination, "destination written");
                    let _ = writeln!(out, "Saved to {}", destination);
                    written.push(destination.clone());
                }
                Err(error) => {
                    tracing::warn!(step = number, %destination, %error, "destination write failed");
                    failures.push(PersistFailure {
                        destination: destination.clone(),
                        error,
                    });
                }
            }
        }

        if failures.is_empty() {
            StepOutcome::Completed { response, written }
        } else {
            StepOutcome::Failed(StepError::Persist { failures, written })
        }
    }
}

fn report(number: usize, step: &Step, outcome: StepOutcome) -> StepReport {
    StepReport {
        number,
        source: step.source,
        description: step.describe(),
        outcome,
    }
}

/// First `max` characters, with "..." when cut.
fn preview(text: &str, max: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

fn print_summary(report: &RunReport, out: &mut dyn Write) {
    let _ = writeln!(out, "\nSummary:");
    for s in &report.steps {
        let line = match &s.outcome {
            StepOutcome::Completed { .. } => "done".to_string(),
            StepOutcome::Skipped(reason) => format!("skipped ({})", reason.as_str()),
            StepOutcome::Failed(e) => format!("failed ({})", e),
        };
        let _ = writeln!(out, "  Step {}: {}: {}", s.number, s.description, line);
    }
    if report.not_run() > 0 {
        let _ = writeln!(out, "  {} step(s) not run", report.not_run());
    }
    let _ = writeln!(
        out,
        "{} completed, {} skipped, {} failed",
        report.completed(),
        report.skipped(),
        report.failed()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet, VecDeque};

    use crate::confirm::AutoConfirm;
    use cellscribe_completion::CompletionError;
    use cellscribe_config::settings::default_steps;
    use cellscribe_config::StepSettings;
    use cellscribe_io::{CellRef, StoreError};

    fn cell(s: &str) -> CellRef {
        CellRef::parse(s).unwrap()
    }

    #[derive(Default)]
    struct FakeStore {
        cells: HashMap<CellRef, String>,
        writes: Vec<(CellRef, String)>,
        failing: HashSet<CellRef>,
    }

    impl FakeStore {
        fn with(values: &[(&str, &str)]) -> Self {
            Self {
                cells: values.iter().map(|(c, v)| (cell(c), v.to_string())).collect(),
                ..Self::default()
            }
        }
    }

    impl CellStore for FakeStore {
        fn read_cell(&self, c: CellRef) -> Option<String> {
            self.cells.get(&c).cloned()
        }

        fn write_cell(&mut self, c: CellRef, value: &str) -> Result<(), StoreError> {
            if self.failing.contains(&c) {
                return Err(StoreError::Write {
                    path: "fake.xlsx".into(),
                    message: "locked".into(),
                });
            }
            self.writes.push((c, value.to_string()));
            Ok(())
        }
    }

    /// Answers every prompt with a fixed reply, or fails on prompts containing a marker.
    struct FakeCompleter {
        prompts: RefCell<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl FakeCompleter {
        fn ok() -> Self {
            Self {
                prompts: RefCell::new(Vec::new()),
                fail_on: None,
            }
        }

        fn failing_on(marker: &'static str) -> Self {
            Self {
                fail_on: Some(marker),
                ..Self::ok()
            }
        }

        fn calls(&self) -> usize {
            self.prompts.borrow().len()
        }
    }

    impl Completer for FakeCompleter {
        fn complete(&self, prompt: &str, model: &str) -> Result<String, CompletionError> {
            assert_eq!(model, "test-model");
            self.prompts.borrow_mut().push(prompt.to_string());
            if let Some(marker) = self.fail_on {
                if prompt.contains(marker) {
                    return Err(CompletionError::Http {
                        status: 500,
                        body: "boom".into(),
                    });
                }
            }
            Ok(format!("generated #{}", self.calls()))
        }
    }

    struct Scripted {
        answers: VecDeque<bool>,
        asked: Vec<String>,
    }

    impl Scripted {
        fn new(answers: &[bool]) -> Self {
            Self {
                answers: answers.iter().copied().collect(),
                asked: Vec::new(),
            }
        }
    }

    impl Confirmer for Scripted {
        fn confirm(&mut self, message: &str) -> bool {
            self.asked.push(message.to_string());
            self.answers.pop_front().unwrap_or(true)
        }
    }

    fn policy(confirmation: ConfirmationMode) -> RunPolicy {
        RunPolicy {
            confirmation,
            carrier_fidelity: CarrierFidelity::LineSplit,
            preview_chars: 100,
        }
    }

    fn full_sheet() -> FakeStore {
        FakeStore::with(&[
            ("C2", "Video about cats"),
            ("C3", "Second"),
            ("C9", "Ninth"),
            ("C10", "Tenth"),
            ("C11", "Line one\n\nLine three"),
            ("C12", "हिंदी सामग्री"),
        ])
    }

    struct Harness {
        dir: tempfile::TempDir,
        plan: Plan,
    }

    impl Harness {
        fn new(steps: &[StepSettings]) -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                plan: Plan::from_settings(steps).unwrap(),
            }
        }

        fn default_plan() -> Self {
            Self::new(&default_steps())
        }

        fn run(
            &self,
            policy: RunPolicy,
            store: &mut FakeStore,
            completer: &FakeCompleter,
            confirmer: &mut dyn Confirmer,
        ) -> (RunReport, String) {
            let files = SideFiles::new(self.dir.path());
            let pipeline = Pipeline::new(&self.plan, policy, "test-model", &files);
            let mut out = Vec::new();
            let report = pipeline.run(store, completer, confirmer, &mut out);
            (report, String::from_utf8(out).unwrap())
        }

        fn leftover_carriers(&self) -> Vec<String> {
            std::fs::read_dir(self.dir.path())
                .unwrap()
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|name| name.starts_with("temp_"))
                .collect()
        }
    }

    #[test]
    fn test_unattended_run_writes_everything() {
        let h = Harness::default_plan();
        let mut store = full_sheet();
        let completer = FakeCompleter::ok();
        let mut confirmer = Scripted::new(&[]);

        let (report, _) = h.run(policy(ConfirmationMode::Never), &mut store, &completer, &mut confirmer);

        assert_eq!(report.status, RunStatus::AllStepsComplete);
        assert_eq!(report.completed(), 6);
        assert!(confirmer.asked.is_empty());
        assert_eq!(completer.calls(), 6);

        let written: Vec<CellRef> = store.writes.iter().map(|(c, _)| *c).collect();
        assert_eq!(written, vec![cell("B4"), cell("B6"), cell("B9"), cell("B10")]);
        assert_eq!(
            std::fs::read_to_string(h.dir.path().join("ShortEng_AT.txt")).unwrap(),
            "generated #5"
        );
        assert_eq!(
            std::fs::read_to_string(h.dir.path().join("ShortHindi_AT.txt")).unwrap(),
            "generated #6"
        );
        assert!(h.leftover_carriers().is_empty());
    }

    #[test]
    fn test_prompts_embed_carrier_content() {
        let h = Harness::default_plan();
        let mut store = full_sheet();
        let completer = FakeCompleter::ok();

        h.run(policy(ConfirmationMode::Never), &mut store, &completer, &mut Scripted::new(&[]));

        let prompts = completer.prompts.borrow();
        assert_eq!(
            prompts[0],
            "Based on this content from the temporary file: 'Video about cats', generate an appropriate response for cell B4."
        );
        assert!(prompts[4].contains("\n\nLine one\n\nLine three\n\n"), "{}", prompts[4]);
        assert!(prompts[4].contains("English short response for ShortEng_AT file"));
        assert!(prompts[5].contains("Hindi short response for ShortHindi_AT file"));
    }

    #[test]
    fn test_empty_source_is_skipped_without_call_or_write() {
        let h = Harness::default_plan();
        let mut store = full_sheet();
        store.cells.remove(&cell("C9"));
        store.cells.insert(cell("C10"), String::new());
        let completer = FakeCompleter::ok();

        let (report, out) = h.run(policy(ConfirmationMode::Never), &mut store, &completer, &mut Scripted::new(&[]));

        assert_eq!(completer.calls(), 4);
        assert!(!store.writes.iter().any(|(c, _)| *c == cell("B9") || *c == cell("B10")));
        assert!(matches!(
            report.step(cell("C9")).unwrap().outcome,
            StepOutcome::Skipped(SkipReason::EmptySource)
        ));
        assert_eq!(report.skipped(), 2);
        assert!(out.contains("C9 is empty, skipping"));
    }

    #[test]
    fn test_confirmation_after_each_executed_step_but_last() {
        let h = Harness::default_plan();
        let mut store = full_sheet();
        store.cells.remove(&cell("C3"));
        let completer = FakeCompleter::ok();
        let mut confirmer = Scripted::new(&[]);

        let (report, _) = h.run(policy(ConfirmationMode::Always), &mut store, &completer, &mut confirmer);

        assert_eq!(report.status, RunStatus::AllStepsComplete);
        // Steps 1, 3, 4, 5 ask; skipped step 2 and final step 6 do not
        assert_eq!(confirmer.asked.len(), 4);
        assert!(confirmer.asked[0].starts_with("Step 1 finished"));
        assert!(confirmer.asked[3].starts_with("Step 5 finished"));
    }

    #[test]
    fn test_decline_halts_remaining_steps() {
        let h = Harness::default_plan();
        let mut store = full_sheet();
        let completer = FakeCompleter::ok();
        let mut confirmer = Scripted::new(&[true, false]);

        let (report, out) = h.run(policy(ConfirmationMode::Always), &mut store, &completer, &mut confirmer);

        assert_eq!(report.status, RunStatus::Halted(HaltReason::UserDeclined));
        assert_eq!(report.steps.len(), 2);
        assert_eq!(report.not_run(), 4);
        assert_eq!(completer.calls(), 2);
        assert_eq!(store.writes.len(), 2);
        assert!(!h.dir.path().join("ShortEng_AT.txt").exists());
        assert!(out.contains("Stopped by operator after step 2"));
        assert!(out.contains("4 step(s) not run"));
    }

    #[test]
    fn test_completion_failure_skips_step_and_continues() {
        let h = Harness::default_plan();
        let mut store = full_sheet();
        let completer = FakeCompleter::failing_on("cell B6");
        let mut confirmer = Scripted::new(&[]);

        let (report, _) = h.run(policy(ConfirmationMode::Always), &mut store, &completer, &mut confirmer);

        assert_eq!(report.status, RunStatus::AllStepsComplete);
        assert_eq!(report.failed(), 1);
        assert!(matches!(
            report.step(cell("C3")).unwrap().outcome,
            StepOutcome::Failed(StepError::Completion(_))
        ));
        assert!(!store.writes.iter().any(|(c, _)| *c == cell("B6")));
        // A failed step still reaches the confirmation gate
        assert_eq!(confirmer.asked.len(), 5);
        assert!(h.leftover_carriers().is_empty(), "carrier left behind: {:?}", h.leftover_carriers());
    }

    #[test]
    fn test_one_failed_destination_does_not_block_the_other() {
        let h = Harness::new(&[StepSettings {
            source: "C9".into(),
            cell: Some("B9".into()),
            file: Some("ShortEng_AT".into()),
            carrier: CarrierKind::Inline,
            template: "Create an English YouTube Short script based on this content: '{content}'.".into(),
        }]);
        let mut store = full_sheet();
        store.failing.insert(cell("B9"));
        let completer = FakeCompleter::ok();

        let (report, _) = h.run(policy(ConfirmationMode::Never), &mut store, &completer, &mut AutoConfirm);

        match &report.steps[0].outcome {
            StepOutcome::Failed(StepError::Persist { failures, written }) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].destination, Destination::Cell(cell("B9")));
                assert_eq!(written, &vec![Destination::File("ShortEng_AT".into())]);
            }
            other => panic!("expected persist failure, got {:?}", other),
        }
        assert_eq!(
            std::fs::read_to_string(h.dir.path().join("ShortEng_AT.txt")).unwrap(),
            "generated #1"
        );
        assert_eq!(
            completer.prompts.borrow()[0],
            "Create an English YouTube Short script based on this content: 'Ninth'."
        );
    }

    #[test]
    fn test_carrier_failure_is_step_failure() {
        let dir = tempfile::tempdir().unwrap();
        let plan = Plan::from_settings(&default_steps()[..1]).unwrap();
        let files = SideFiles::new(dir.path().join("missing"));
        let pipeline = Pipeline::new(&plan, policy(ConfirmationMode::Never), "test-model", &files);
        let mut store = full_sheet();
        let completer = FakeCompleter::ok();
        let mut out = Vec::new();

        let report = pipeline.run(&mut store, &completer, &mut AutoConfirm, &mut out);

        assert!(matches!(report.steps[0].outcome, StepOutcome::Failed(StepError::Carrier(_))));
        assert_eq!(completer.calls(), 0);
        assert!(store.writes.is_empty());
    }

    #[test]
    fn test_whitespace_source_is_emptied_by_basic_document_carrier() {
        let h = Harness::default_plan();
        let mut store = FakeStore::with(&[("C11", "   \n  ")]);
        let completer = FakeCompleter::ok();
        let p = RunPolicy {
            carrier_fidelity: CarrierFidelity::Basic,
            ..policy(ConfirmationMode::Never)
        };

        let (report, _) = h.run(p, &mut store, &completer, &mut AutoConfirm);

        assert!(matches!(
            report.step(cell("C11")).unwrap().outcome,
            StepOutcome::Skipped(SkipReason::EmptyCarrier)
        ));
        assert_eq!(completer.calls(), 0);
        assert!(h.leftover_carriers().is_empty());
    }

    #[test]
    fn test_preview_truncates_on_chars() {
        assert_eq!(preview("short", 100), "short");
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("नमस्ते", 2), "नम...");
    }

    #[test]
    fn test_policies() {
        let run = RunSettings::default();
        assert_eq!(RunPolicy::interactive(&run).confirmation, ConfirmationMode::Always);
        assert_eq!(RunPolicy::unattended(&run).confirmation, ConfirmationMode::Never);
        assert_eq!(RunPolicy::unattended(&run).carrier_fidelity, CarrierFidelity::LineSplit);
    }
}
