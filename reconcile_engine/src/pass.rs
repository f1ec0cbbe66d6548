//! Pass-scoped evaluation context.
//!
//! A `Pass` owns the memo cache for one reconciliation pass, keyed by
//! `StepId`. Steps themselves hold no mutable state, so one `StepGraph` can
//! serve any number of concurrent passes, each with its own `Pass`.
//!
//! Evaluation walks prerequisites with an explicit stack, so chain depth is
//! bounded by memory rather than by the thread's stack.

use tracing::{debug, warn};

use crate::domain::StepResult;
use crate::error::{EngineError, StepFailure};
use crate::step::{StepGraph, StepId};

/// Memoized result of evaluating one Step.
pub type Evaluation = Result<StepResult, StepFailure>;

/// Evaluation state for a single pass.
pub struct Pass<'g, C: ?Sized> {
    graph: &'g StepGraph<C>,
    cache: Vec<Option<Evaluation>>,
    work_invocations: usize,
}

impl<'g, C: ?Sized> Pass<'g, C> {
    /// Start a pass with an empty cache for every Step in the graph.
    pub fn new(graph: &'g StepGraph<C>) -> Self {
        Self {
            graph,
            cache: vec![None; graph.len()],
            work_invocations: 0,
        }
    }

    /// Evaluate a Step, consulting the cache first.
    ///
    /// Prerequisites are evaluated in declared order. The first one that
    /// errors or is not `Satisfied` blocks the Step: its result is `Unknown`
    /// naming the blocker, and the prerequisite's error is absorbed here.
    /// Otherwise the Step's work runs and its result, error included, is
    /// cached verbatim.
    ///
    /// Ids from another graph fail with `UnknownStep`.
    pub fn evaluate(&mut self, id: StepId, ctx: &mut C) -> Result<StepResult, EngineError> {
        if !self.graph.contains(id) {
            return Err(EngineError::UnknownStep(id.index()));
        }

        let graph = self.graph;
        // Each frame is a Step and the position of its next prerequisite.
        let mut stack: Vec<(StepId, usize)> = vec![(id, 0)];
        while let Some(&(current, next)) = stack.last() {
            if self.cache[current.index()].is_some() {
                stack.pop();
                continue;
            }

            let Some(&prereq) = graph.get(current).prereqs().get(next) else {
                self.run_work(current, ctx);
                stack.pop();
                continue;
            };

            let satisfied = self.cache[prereq.index()]
                .as_ref()
                .map(|ev| matches!(ev, Ok(result) if result.outcome.is_satisfied()));
            match satisfied {
                None => stack.push((prereq, 0)),
                Some(true) => {
                    if let Some(frame) = stack.last_mut() {
                        frame.1 = next + 1;
                    }
                }
                Some(false) => {
                    self.block(current, prereq);
                    stack.pop();
                }
            }
        }

        match self.cached(id) {
            Some(evaluation) => Ok(evaluation.clone()?),
            None => Err(EngineError::UnknownStep(id.index())),
        }
    }

    fn block(&mut self, id: StepId, blocker: StepId) {
        let graph = self.graph;
        let name = graph.get(id).name();
        let blocker = graph.get(blocker).name();
        debug!(step = name, prerequisite = blocker, "step blocked");
        let result = StepResult::unknown(format!("prerequisite {} not met", blocker));
        self.cache[id.index()] = Some(Ok(result));
    }

    fn run_work(&mut self, id: StepId, ctx: &mut C) {
        let graph = self.graph;
        let step = graph.get(id);
        self.work_invocations += 1;
        let evaluation = step
            .work()
            .reconcile(ctx)
            .map_err(|e| StepFailure::new(step.name(), e));

        match &evaluation {
            Ok(result) => debug!(
                step = step.name(),
                outcome = %result.outcome,
                message = %result.message,
                "step evaluated"
            ),
            Err(failure) => warn!(step = step.name(), error = %failure, "step work failed"),
        }

        self.cache[id.index()] = Some(evaluation);
    }

    /// Cached evaluation of a Step in this pass, if it has been evaluated.
    pub fn cached(&self, id: StepId) -> Option<&Evaluation> {
        if !self.graph.contains(id) {
            return None;
        }
        self.cache.get(id.index()).and_then(|e| e.as_ref())
    }

    /// Number of work callbacks run so far in this pass.
    pub fn work_invocations(&self) -> usize {
        self.work_invocations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Outcome;
    use crate::step::WorkResult;

    #[derive(Default)]
    struct Ctx {
        calls: Vec<&'static str>,
    }

    fn graph() -> (StepGraph<Ctx>, [StepId; 7]) {
        let mut g: StepGraph<Ctx> = StepGraph::new();
        let t = g
            .add_step("trueStep", &[], |c: &mut Ctx| -> WorkResult {
                c.calls.push("trueStep");
                Ok(StepResult::satisfied("it's true"))
            })
            .unwrap();
        let f = g
            .add_step("falseStep", &[], |c: &mut Ctx| -> WorkResult {
                c.calls.push("falseStep");
                Ok(StepResult::pending("it's false"))
            })
            .unwrap();
        let u = g
            .add_step("unknownStep", &[], |c: &mut Ctx| -> WorkResult {
                c.calls.push("unknownStep");
                Ok(StepResult::unknown("who knows?"))
            })
            .unwrap();
        let e = g
            .add_step("errorStep", &[], |c: &mut Ctx| -> WorkResult {
                c.calls.push("errorStep");
                Err("an error".into())
            })
            .unwrap();
        let tf = g
            .add_step("trueThenFalse", &[t, t], |c: &mut Ctx| -> WorkResult {
                c.calls.push("trueThenFalse");
                Ok(StepResult::pending("it's false"))
            })
            .unwrap();
        let ft = g
            .add_step("falsePrereq", &[t, f], |c: &mut Ctx| -> WorkResult {
                c.calls.push("falsePrereq");
                Ok(StepResult::satisfied("it's true"))
            })
            .unwrap();
        let ep = g
            .add_step("errorPrereq", &[e], |c: &mut Ctx| -> WorkResult {
                c.calls.push("errorPrereq");
                Ok(StepResult::satisfied("it's true"))
            })
            .unwrap();
        (g, [t, f, u, e, tf, ft, ep])
    }

    #[test]
    fn steps_return_expected_outcome() {
        let (g, [t, f, u, e, tf, ft, ep]) = graph();
        let mut ctx = Ctx::default();
        let mut pass = Pass::new(&g);

        assert_eq!(pass.evaluate(t, &mut ctx).unwrap().outcome, Outcome::Satisfied);
        assert_eq!(pass.evaluate(f, &mut ctx).unwrap().outcome, Outcome::Pending);
        assert_eq!(pass.evaluate(u, &mut ctx).unwrap().outcome, Outcome::Unknown);
        let err = pass.evaluate(e, &mut ctx).unwrap_err();
        assert!(matches!(err, EngineError::WorkFailure(f) if f.step() == "errorStep"));
        assert_eq!(pass.evaluate(tf, &mut ctx).unwrap().outcome, Outcome::Pending);

        let blocked = pass.evaluate(ft, &mut ctx).unwrap();
        assert_eq!(blocked.outcome, Outcome::Unknown);
        assert_eq!(blocked.message, "prerequisite falseStep not met");

        // A failing prerequisite is absorbed into Unknown, not forwarded.
        let blocked = pass.evaluate(ep, &mut ctx).unwrap();
        assert_eq!(blocked.outcome, Outcome::Unknown);
        assert_eq!(blocked.message, "prerequisite errorStep not met");
    }

    #[test]
    fn blocked_step_never_runs_its_work() {
        let (g, [.., ft, ep]) = graph();
        let mut ctx = Ctx::default();
        let mut pass = Pass::new(&g);

        pass.evaluate(ft, &mut ctx).unwrap();
        pass.evaluate(ep, &mut ctx).unwrap();
        assert!(!ctx.calls.contains(&"falsePrereq"));
        assert!(!ctx.calls.contains(&"errorPrereq"));
        assert_eq!(ctx.calls, vec!["trueStep", "falseStep", "errorStep"]);
    }

    #[test]
    fn work_runs_once_per_pass() {
        let (g, [t, _, _, e, tf, ..]) = graph();
        let mut ctx = Ctx::default();

        let mut pass = Pass::new(&g);
        pass.evaluate(t, &mut ctx).unwrap();
        pass.evaluate(t, &mut ctx).unwrap();
        // tf lists t twice as a prerequisite.
        pass.evaluate(tf, &mut ctx).unwrap();
        let first = pass.evaluate(e, &mut ctx).unwrap_err();
        let second = pass.evaluate(e, &mut ctx).unwrap_err();
        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(ctx.calls, vec!["trueStep", "trueThenFalse", "errorStep"]);
        assert_eq!(pass.work_invocations(), 3);

        // A fresh pass starts with an empty cache.
        let mut pass = Pass::new(&g);
        assert!(pass.cached(t).is_none());
        pass.evaluate(t, &mut ctx).unwrap();
        assert!(pass.cached(t).is_some());
        assert_eq!(ctx.calls.iter().filter(|c| **c == "trueStep").count(), 2);
    }

    #[test]
    fn foreign_ids_are_errors() {
        let (g, [t, ..]) = graph();
        let empty: StepGraph<Ctx> = StepGraph::new();
        let mut ctx = Ctx::default();

        let mut pass = Pass::new(&empty);
        assert!(matches!(
            pass.evaluate(t, &mut ctx),
            Err(EngineError::UnknownStep(0))
        ));

        // Same index, different graph.
        let mut other: StepGraph<Ctx> = StepGraph::new();
        let foreign = other
            .add_step("deleteVolume", &[], |c: &mut Ctx| -> WorkResult {
                c.calls.push("deleteVolume");
                Ok(StepResult::satisfied("deleted"))
            })
            .unwrap();
        let mut pass = Pass::new(&g);
        assert!(matches!(
            pass.evaluate(foreign, &mut ctx),
            Err(EngineError::UnknownStep(0))
        ));
        assert!(pass.cached(foreign).is_none());
        assert!(ctx.calls.is_empty());
    }

    #[test]
    fn deep_prerequisite_chain() {
        const DEPTH: usize = 200_000;
        let mut g: StepGraph<Ctx> = StepGraph::new();
        let mut prev = g
            .add_step("link0", &[], |_: &mut Ctx| -> WorkResult {
                Ok(StepResult::satisfied("ok"))
            })
            .unwrap();
        for i in 1..DEPTH {
            prev = g
                .add_step(format!("link{}", i), &[prev], |_: &mut Ctx| -> WorkResult {
                    Ok(StepResult::satisfied("ok"))
                })
                .unwrap();
        }

        let mut pass = Pass::new(&g);
        let result = pass.evaluate(prev, &mut Ctx::default()).unwrap();
        assert_eq!(result.outcome, Outcome::Satisfied);
        assert_eq!(pass.work_invocations(), DEPTH);
    }
}
