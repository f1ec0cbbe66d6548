//! Drift detection — what changed between the recorded status and a new pass.

use std::collections::BTreeSet;

use reconcile_engine::{Outcome, PlanResult};

use crate::resource::ResourceStatus;

/// A step whose outcome differs between two passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeChange {
    pub step: String,
    pub from: Outcome,
    pub to: Outcome,
}

/// Structured drift report between a recorded status and a fresh Result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusDrift {
    /// Reported by this pass, never recorded before.
    pub added_steps: Vec<String>,
    /// Recorded, but not evaluated by this pass's Plan.
    pub removed_steps: Vec<String>,
    pub changed: Vec<OutcomeChange>,
    /// Steps that were satisfied before and no longer are.
    pub regressed: Vec<String>,
}

impl StatusDrift {
    pub fn is_empty(&self) -> bool {
        self.added_steps.is_empty() && self.removed_steps.is_empty() && self.changed.is_empty()
    }
}

/// Compare recorded step outcomes with a new pass. All lists sorted by name.
pub fn compare_status(previous: &ResourceStatus, result: &PlanResult) -> StatusDrift {
    let before: BTreeSet<&str> = previous.steps.keys().map(|s| s.as_str()).collect();
    let after: BTreeSet<&str> = result.results.keys().map(|s| s.as_str()).collect();

    let added_steps = after.difference(&before).map(|s| s.to_string()).collect();
    let removed_steps = before.difference(&after).map(|s| s.to_string()).collect();

    let mut changed = Vec::new();
    let mut regressed = Vec::new();
    for step in before.intersection(&after) {
        let from = previous.steps[*step].outcome;
        let to = result.results[*step].outcome;
        if from != to {
            if from.is_satisfied() {
                regressed.push(step.to_string());
            }
            changed.push(OutcomeChange {
                step: step.to_string(),
                from,
                to,
            });
        }
    }

    StatusDrift {
        added_steps,
        removed_steps,
        changed,
        regressed,
    }
}
