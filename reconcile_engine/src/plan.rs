/// Reconcile engine — Plan
///
/// One complete, versioned reconciliation strategy: a set of top-level Steps
/// drawn from a shared `StepGraph`. Executing a Plan is one pass.
///
/// Top-level order carries no meaning. Real ordering constraints live in
/// prerequisites only; the Result is identical under any permutation.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::PlanResult;
use crate::error::EngineError;
use crate::graph::reachable;
use crate::invariants::validate_plan;
use crate::pass::Pass;
use crate::step::{StepGraph, StepId};

/// Immutable, versioned set of top-level Steps.
pub struct Plan<C: ?Sized> {
    version: u64,
    min_version: u64,
    graph: Arc<StepGraph<C>>,
    steps: Vec<StepId>,
    reachable: Vec<StepId>,
}

impl<C: ?Sized> Plan<C> {
    /// Build a Plan over `graph`.
    ///
    /// `min_version` is the oldest recorded version this Plan may upgrade
    /// from; it may not exceed `version`.
    pub fn new(
        version: u64,
        min_version: u64,
        graph: Arc<StepGraph<C>>,
        steps: Vec<StepId>,
    ) -> Result<Self, EngineError> {
        validate_plan(version, min_version, &graph, &steps)?;
        let reachable = reachable(&graph, &steps);
        Ok(Self {
            version,
            min_version,
            graph,
            steps,
            reachable,
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn min_version(&self) -> u64 {
        self.min_version
    }

    /// Whether this Plan may be applied to a resource recorded at `observed`.
    pub fn admits(&self, observed: u64) -> bool {
        self.min_version <= observed
    }

    pub fn graph(&self) -> &Arc<StepGraph<C>> {
        &self.graph
    }

    /// Top-level Steps, in the order they are evaluated.
    pub fn steps(&self) -> &[StepId] {
        &self.steps
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps
            .iter()
            .map(|id| self.graph.get(*id).name())
            .collect()
    }

    /// Every Step a pass of this Plan may evaluate, prerequisites first.
    pub fn reachable_steps(&self) -> &[StepId] {
        &self.reachable
    }

    /// Run one pass.
    ///
    /// The memo cache is fresh for every Step reachable from the top-level
    /// set. The first top-level work failure aborts the pass with no
    /// Result.
    pub fn execute(&self, ctx: &mut C) -> Result<PlanResult, EngineError> {
        debug!(
            version = self.version,
            top_level = self.steps.len(),
            reachable = self.reachable.len(),
            "executing plan"
        );

        let mut pass = Pass::new(&self.graph);
        let mut result = PlanResult::default();

        for &id in &self.steps {
            let name = self.graph.get(id).name();
            match pass.evaluate(id, ctx) {
                Ok(step_result) => result.record(name, step_result),
                Err(err) => {
                    warn!(
                        version = self.version,
                        step = name,
                        error = %err,
                        "plan aborted"
                    );
                    return Err(err);
                }
            }
        }

        debug!(
            version = self.version,
            fully_reconciled = result.fully_reconciled,
            work_invocations = pass.work_invocations(),
            "plan executed"
        );
        Ok(result)
    }
}

impl<C: ?Sized> fmt::Debug for Plan<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan")
            .field("version", &self.version)
            .field("min_version", &self.min_version)
            .field("steps", &self.step_names())
            .finish()
    }
}
