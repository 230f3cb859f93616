//! The ordered step plan.

use std::collections::HashSet;
use std::fmt;

use cellscribe_config::{CarrierKind, StepSettings};
use cellscribe_io::CellRef;

use crate::error::PipelineError;

/// Where generated text goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// A cell on the pipeline's sheet
    Cell(CellRef),
    /// `{name}.txt` next to the workbook
    File(String),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Cell(cell) => write!(f, "{}", cell),
            Destination::File(name) => write!(f, "{}.txt", name),
        }
    }
}

/// One source cell and its destinations.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub source: CellRef,
    /// Cell first, then file, when both are configured
    pub destinations: Vec<Destination>,
    pub carrier: CarrierKind,
    pub template: String,
}

impl Step {
    /// Name substituted for `{target}`: the destination cell, else the file name.
    pub fn target_label(&self) -> String {
        match self.destinations.first() {
            Some(Destination::Cell(cell)) => cell.to_string(),
            Some(Destination::File(name)) => name.clone(),
            None => String::new(),
        }
    }

    /// "C2 → B4", "C9 → B9 + ShortEng_AT.txt"
    pub fn describe(&self) -> String {
        let targets: Vec<String> = self.destinations.iter().map(|d| d.to_string()).collect();
        format!("{} → {}", self.source, targets.join(" + "))
    }
}

/// Steps in execution order. Each source appears once.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    steps: Vec<Step>,
}

impl Plan {
    pub fn from_settings(settings: &[StepSettings]) -> Result<Self, PipelineError> {
        let mut steps = Vec::with_capacity(settings.len());
        let mut seen = HashSet::new();

        for (i, s) in settings.iter().enumerate() {
            let number = i + 1;
            let invalid = |message: String| PipelineError::InvalidStep { number, message };

            let source = CellRef::parse(&s.source).map_err(|e| invalid(e.to_string()))?;
            if !seen.insert(source) {
                return Err(invalid(format!("source {} is used by an earlier step", source)));
            }

            let mut destinations = Vec::new();
            if let Some(cell) = &s.cell {
                destinations.push(Destination::Cell(CellRef::parse(cell).map_err(|e| invalid(e.to_string()))?));
            }
            if let Some(file) = &s.file {
                destinations.push(Destination::File(file.clone()));
            }
            if destinations.is_empty() {
                return Err(invalid(format!("source {} has no destination", source)));
            }

            steps.push(Step {
                source,
                destinations,
                carrier: s.carrier,
                template: s.template.clone(),
            });
        }

        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
