//! Durable status of a reconciled resource.
//!
//! This is what the driver persists between passes: the per-step outcomes of
//! the last successful pass and the reconcile version the resource has
//! fully converged to.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use reconcile_engine::{Outcome, PlanResult, StepResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResourceStatus {
    /// Version of the last Plan that fully reconciled this resource.
    /// `None` until the first fully reconciled pass.
    pub reconcile_version: Option<u64>,
    /// Latest outcome of every top-level step any pass has reported.
    pub steps: BTreeMap<String, StepResult>,
    pub fully_reconciled: bool,
    /// Error from the most recent pass, cleared on success.
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

impl ResourceStatus {
    /// Fold a successful pass of Plan `version` into the status.
    ///
    /// Outcomes are merged by step name: steps this Plan does not evaluate
    /// keep their last recorded outcome. The version only advances when
    /// fully reconciled.
    pub fn apply_result(&mut self, version: u64, result: &PlanResult) {
        for (name, step) in &result.results {
            self.steps.insert(name.clone(), step.clone());
        }
        self.fully_reconciled = result.fully_reconciled;
        self.last_error = None;
        self.consecutive_failures = 0;
        if result.fully_reconciled {
            self.reconcile_version = Some(version);
        }
    }

    /// Record a failed pass. Outcomes and version are left untouched.
    pub fn record_failure(&mut self, error: &str) {
        self.last_error = Some(error.to_string());
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    pub fn outcome_of(&self, step: &str) -> Option<Outcome> {
        self.steps.get(step).map(|r| r.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(fully: bool) -> PlanResult {
        let mut r = PlanResult::default();
        r.record("a", StepResult::satisfied("ok"));
        if !fully {
            r.record("b", StepResult::pending("creating"));
        }
        r
    }

    #[test]
    fn version_advances_only_when_fully_reconciled() {
        let mut status = ResourceStatus::default();
        status.apply_result(2, &result(false));
        assert_eq!(status.reconcile_version, None);
        assert_eq!(status.outcome_of("b"), Some(Outcome::Pending));

        status.apply_result(2, &result(true));
        assert_eq!(status.reconcile_version, Some(2));
        assert!(status.fully_reconciled);

        status.apply_result(3, &result(false));
        assert_eq!(status.reconcile_version, Some(2));
    }

    #[test]
    fn outcomes_merge_across_plans() {
        let mut status = ResourceStatus::default();
        let mut v1 = PlanResult::default();
        v1.record("podRunning", StepResult::pending("creating pod"));
        status.apply_result(1, &v1);

        let mut v2 = PlanResult::default();
        v2.record("serviceExposed", StepResult::satisfied("service has endpoints"));
        status.apply_result(2, &v2);

        // Kept from the earlier pass, not evaluated by this one.
        assert_eq!(status.outcome_of("podRunning"), Some(Outcome::Pending));
        assert_eq!(status.outcome_of("serviceExposed"), Some(Outcome::Satisfied));
        // Fully reconciled follows the latest pass only.
        assert!(status.fully_reconciled);
        assert_eq!(status.reconcile_version, Some(2));

        let mut again = PlanResult::default();
        again.record("podRunning", StepResult::satisfied("pod running"));
        status.apply_result(2, &again);
        assert_eq!(status.outcome_of("podRunning"), Some(Outcome::Satisfied));
        assert_eq!(status.steps.len(), 2);
    }

    #[test]
    fn failure_keeps_outcomes_and_success_resets_counter() {
        let mut status = ResourceStatus::default();
        status.apply_result(1, &result(true));
        status.record_failure("boom");
        status.record_failure("boom again");
        assert_eq!(status.consecutive_failures, 2);
        assert_eq!(status.last_error.as_deref(), Some("boom again"));
        assert_eq!(status.outcome_of("a"), Some(Outcome::Satisfied));

        status.apply_result(1, &result(true));
        assert_eq!(status.consecutive_failures, 0);
        assert!(status.last_error.is_none());
    }

    #[test]
    fn json_shape() {
        let mut status = ResourceStatus::default();
        status.apply_result(4, &result(true));
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(
            json,
            r#"{"reconcile_version":4,"steps":{"a":{"outcome":"Satisfied","message":"ok"}},"fully_reconciled":true,"last_error":null,"consecutive_failures":0}"#
        );
        let back: ResourceStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
    }
}
