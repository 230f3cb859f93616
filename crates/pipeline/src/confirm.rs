//! Confirmation gate between steps.

use std::io::{self, BufRead, Write};

/// When the engine asks before moving on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationMode {
    /// After every executed step except the last
    Always,
    /// Never; run straight through
    Never,
}

/// Yes/no capability the engine blocks on.
pub trait Confirmer {
    /// `true` to continue with the next step.
    fn confirm(&mut self, message: &str) -> bool;
}

/// Always continues.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

impl Confirmer for AutoConfirm {
    fn confirm(&mut self, _message: &str) -> bool {
        true
    }
}

/// Asks on a line-oriented terminal. Only `Y` or `y` continues; anything
/// else, including end of input or a read error, stops the run.
pub struct PromptConfirmer<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptConfirmer<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl PromptConfirmer<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Confirmer for PromptConfirmer<R, W> {
    fn confirm(&mut self, message: &str) -> bool {
        let _ = write!(self.output, "\n{}\nPress 'Y' to continue, any other key to stop: ", message);
        let _ = self.output.flush();

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => {
                tracing::debug!("confirmation input closed");
                false
            }
            Ok(_) => line.trim().eq_ignore_ascii_case("y"),
            Err(e) => {
                tracing::warn!(error = %e, "cannot read confirmation");
                false
            }
        }
    }
}
