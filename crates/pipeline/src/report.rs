//! What a run did, step by step.

use cellscribe_io::CellRef;

use crate::error::StepError;
use crate::plan::Destination;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Source cell empty or absent: no carrier, no request, no write
    EmptySource,
    /// Carrier read back as empty text: no request, no write
    EmptyCarrier,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::EmptySource => "source cell is empty",
            SkipReason::EmptyCarrier => "carrier content is empty",
        }
    }
}

#[derive(Debug)]
pub enum StepOutcome {
    Completed {
        response: String,
        written: Vec<Destination>,
    },
    Skipped(SkipReason),
    Failed(StepError),
}

impl StepOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, StepOutcome::Completed { .. })
    }
}

#[derive(Debug)]
pub struct StepReport {
    /// 1-based position in the plan
    pub number: usize,
    pub source: CellRef,
    pub description: String,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    UserDeclined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    AllStepsComplete,
    Halted(HaltReason),
}

#[derive(Debug)]
pub struct RunReport {
    /// Steps that were reached, in order; steps after a halt are absent
    pub steps: Vec<StepReport>,
    pub status: RunStatus,
    /// Steps in the plan
    pub planned: usize,
}

impl RunReport {
    pub fn completed(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome.is_completed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.steps.iter().filter(|s| matches!(s.outcome, StepOutcome::Skipped(_))).count()
    }

    pub fn failed(&self) -> usize {
        self.steps.iter().filter(|s| matches!(s.outcome, StepOutcome::Failed(_))).count()
    }

    pub fn not_run(&self) -> usize {
        self.planned.saturating_sub(self.steps.len())
    }

    pub fn step(&self, source: CellRef) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.source == source)
    }
}
