//! Steps and the registry that owns them.
//!
//! Steps are shared DAG nodes: a prerequisite referenced by several parents
//! is one `StepId` in one `StepGraph`, never a copy. A Step can only name
//! prerequisites that are already registered, so every graph is acyclic by
//! construction.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::StepResult;
use crate::error::EngineError;
use crate::invariants::{check_known_steps, check_step_name};

/// Error type returned by work callbacks.
pub type WorkError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result of a single work callback.
pub type WorkResult = Result<StepResult, WorkError>;

/// The side-effecting part of a Step.
///
/// Implementations must be idempotent: they observe the system, do whatever
/// minimal work closes the gap, and report how far along that is.
pub trait Work<C: ?Sized>: Send + Sync {
    fn reconcile(&self, ctx: &mut C) -> WorkResult;
}

impl<C: ?Sized, F> Work<C> for F
where
    F: Fn(&mut C) -> WorkResult + Send + Sync,
{
    fn reconcile(&self, ctx: &mut C) -> WorkResult {
        self(ctx)
    }
}

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(0);

/// Stable identity of a Step inside its `StepGraph`.
///
/// Carries the owning graph's identity, so an id is only ever resolved by
/// the graph that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepId {
    graph: u64,
    index: usize,
}

impl StepId {
    pub fn index(self) -> usize {
        self.index
    }
}

/// A named unit of idempotent reconciliation work with ordered prerequisites.
pub struct Step<C: ?Sized> {
    name: String,
    prereqs: Vec<StepId>,
    work: Box<dyn Work<C>>,
}

impl<C: ?Sized> Step<C> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Prerequisites in declared (evaluation) order.
    pub fn prereqs(&self) -> &[StepId] {
        &self.prereqs
    }

    pub(crate) fn work(&self) -> &dyn Work<C> {
        self.work.as_ref()
    }
}

impl<C: ?Sized> fmt::Debug for Step<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("prereqs", &self.prereqs)
            .finish_non_exhaustive()
    }
}

/// Registry of Steps. Topology is immutable once Plans are built from it.
pub struct StepGraph<C: ?Sized> {
    id: u64,
    steps: Vec<Step<C>>,
    by_name: HashMap<String, StepId>,
}

impl<C: ?Sized> StepGraph<C> {
    pub fn new() -> Self {
        Self {
            id: NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed),
            steps: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Register a Step.
    ///
    /// Fails if the name is malformed or taken, or if any prerequisite is
    /// not yet registered.
    pub fn add_step<W>(
        &mut self,
        name: impl Into<String>,
        prereqs: &[StepId],
        work: W,
    ) -> Result<StepId, EngineError>
    where
        W: Work<C> + 'static,
    {
        let name = name.into();
        check_step_name(&name)?;
        if self.by_name.contains_key(&name) {
            return Err(EngineError::DuplicateStepName(name));
        }
        check_known_steps(self, prereqs)?;

        let id = self.id_at(self.steps.len());
        self.by_name.insert(name.clone(), id);
        self.steps.push(Step {
            name,
            prereqs: prereqs.to_vec(),
            work: Box::new(work),
        });
        Ok(id)
    }

    /// `None` for ids issued by another graph.
    pub fn step(&self, id: StepId) -> Option<&Step<C>> {
        if id.graph != self.id {
            return None;
        }
        self.steps.get(id.index)
    }

    pub fn contains(&self, id: StepId) -> bool {
        self.step(id).is_some()
    }

    pub fn lookup(&self, name: &str) -> Option<StepId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StepId, &Step<C>)> {
        self.steps
            .iter()
            .enumerate()
            .map(|(i, s)| (self.id_at(i), s))
    }

    fn id_at(&self, index: usize) -> StepId {
        StepId {
            graph: self.id,
            index,
        }
    }

    /// Only for ids already checked with `contains()`.
    pub(crate) fn get(&self, id: StepId) -> &Step<C> {
        &self.steps[id.index]
    }
}

impl<C: ?Sized> Default for StepGraph<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized> fmt::Debug for StepGraph<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.steps.iter()).finish()
    }
}
