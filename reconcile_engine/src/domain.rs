/// Reconcile engine — Core Domain Types
///
/// Pure data. No behaviour, no evaluation logic.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ── Outcome ────────────────────────────────────────────────────────

/// Tri-state result of evaluating a Step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// The system already matches desired state for this Step.
    Satisfied,
    /// Work was started or is still needed.
    Pending,
    /// State could not be determined, or a prerequisite is not met.
    Unknown,
}

impl Outcome {
    pub fn is_satisfied(self) -> bool {
        self == Outcome::Satisfied
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Satisfied => "Satisfied",
            Outcome::Pending => "Pending",
            Outcome::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── StepResult ─────────────────────────────────────────────────────

/// Outcome of one Step paired with a short human-readable explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepResult {
    pub outcome: Outcome,
    pub message: String,
}

impl StepResult {
    pub fn new(outcome: Outcome, message: impl Into<String>) -> Self {
        Self {
            outcome,
            message: message.into(),
        }
    }

    pub fn satisfied(message: impl Into<String>) -> Self {
        Self::new(Outcome::Satisfied, message)
    }

    pub fn pending(message: impl Into<String>) -> Self {
        Self::new(Outcome::Pending, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(Outcome::Unknown, message)
    }
}

// ── PlanResult ─────────────────────────────────────────────────────

/// Aggregate outcome of one Plan execution.
///
/// Keyed by Step name; ordering of the map is by name and carries no
/// meaning about evaluation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanResult {
    pub results: BTreeMap<String, StepResult>,
    /// True iff every top-level Step reported `Satisfied`.
    pub fully_reconciled: bool,
}

impl Default for PlanResult {
    fn default() -> Self {
        Self {
            results: BTreeMap::new(),
            fully_reconciled: true,
        }
    }
}

impl PlanResult {
    /// Record a top-level Step's result. Any non-satisfied outcome clears
    /// `fully_reconciled`.
    pub fn record(&mut self, name: &str, result: StepResult) {
        if !result.outcome.is_satisfied() {
            self.fully_reconciled = false;
        }
        self.results.insert(name.to_string(), result);
    }

    pub fn outcome_of(&self, name: &str) -> Option<Outcome> {
        self.results.get(name).map(|r| r.outcome)
    }

    /// Names of top-level Steps not yet satisfied, sorted.
    pub fn unsatisfied(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|(_, r)| !r.outcome.is_satisfied())
            .map(|(name, _)| name.as_str())
            .collect()
    }
}
