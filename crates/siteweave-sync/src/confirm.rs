//! Confirmation gate for destructive plans.
//!
//! Deletions are irreversible in practice (relays honoring a tombstone
//! drop the event), so execution stands behind an explicit gate. The
//! interactive gate requires typing a full phrase back, not a bare y/n,
//! so muscle memory cannot approve a plan the operator did not read.

use std::io::{self, BufRead, Write};

use crate::plan::PlanSummary;

/// Decides whether a presented plan may execute.
pub trait ConfirmationGate {
    /// Return true to proceed. Called once, after the plan is displayed.
    fn confirm(&self, summary: &PlanSummary) -> bool;
}

/// Interactive gate: the operator must type the exact phrase.
pub struct TypedPhraseGate {
    phrase: String,
}

impl TypedPhraseGate {
    pub fn new(phrase: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
        }
    }

    fn prompt<R: BufRead, W: Write>(&self, mut input: R, mut out: W) -> bool {
        let _ = write!(
            out,
            "Type '{}' to proceed (anything else aborts): ",
            self.phrase
        );
        let _ = out.flush();
        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => false,
            Ok(_) => line.trim() == self.phrase,
        }
    }
}

impl ConfirmationGate for TypedPhraseGate {
    fn confirm(&self, summary: &PlanSummary) -> bool {
        if summary.total_deletions == 0 && summary.total_publications == 0 {
            return true;
        }
        let stdin = io::stdin();
        self.prompt(stdin.lock(), io::stderr())
    }
}

/// Non-interactive gate with a fixed answer. Test double only: the
/// binaries always use [`TypedPhraseGate`] on any execution path, so a
/// destructive plan cannot be approved without operator interaction.
pub struct AutoConfirm(pub bool);

impl ConfirmationGate for AutoConfirm {
    fn confirm(&self, _summary: &PlanSummary) -> bool {
        self.0
    }
}
