//! Engine error types.
//!
//! A Step blocked by an unmet prerequisite is not an error; it surfaces as
//! `Outcome::Unknown`. Everything here is returned verbatim to the caller.

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

use crate::step::WorkError;

/// Error returned by a Step's work callback, tagged with the Step name.
///
/// Cloneable so that a memoized failure can be handed to every parent that
/// evaluates the same Step within one pass.
#[derive(Debug, Clone, Error)]
#[error("step {step:?} failed: {source}")]
pub struct StepFailure {
    step: String,
    #[source]
    source: Arc<dyn StdError + Send + Sync + 'static>,
}

impl StepFailure {
    pub fn new(step: impl Into<String>, source: WorkError) -> Self {
        Self {
            step: step.into(),
            source: Arc::from(source),
        }
    }

    /// Name of the Step whose work failed.
    pub fn step(&self) -> &str {
        &self.step
    }
}

/// Engine error taxonomy.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A work callback failed; fatal to the current pass.
    #[error(transparent)]
    WorkFailure(#[from] StepFailure),

    /// No Plan's `min_version` admits the observed version.
    #[error("no plan is compatible with observed version {observed}")]
    NoCompatiblePlan { observed: u64 },

    #[error("plan catalog is empty")]
    EmptyCatalog,

    #[error("duplicate plan version {0} in catalog")]
    DuplicateVersion(u64),

    #[error("plan version {version} has min_version {min_version} above its own version")]
    InvalidVersionRange { version: u64, min_version: u64 },

    #[error("duplicate step name {0:?}")]
    DuplicateStepName(String),

    #[error("invalid step name {0:?}: must match [A-Za-z0-9_.-]+")]
    InvalidStepName(String),

    #[error("step id {0} is not registered in this graph")]
    UnknownStep(usize),

    #[error("step {0:?} listed more than once in plan")]
    DuplicateTopLevelStep(String),
}

impl EngineError {
    /// Whether a later pass may succeed without operator attention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::WorkFailure(_))
    }
}
