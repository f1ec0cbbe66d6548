#![forbid(unsafe_code)]

//! Reconcile engine — versioned, dependency-aware, memoizing step execution.
//!
//! A `Plan` is one versioned reconciliation strategy: a set of top-level
//! Steps whose prerequisites form a DAG inside a `StepGraph`. Executing a
//! Plan runs one pass; every Step's work runs at most once per pass.
//! A `PlanCatalog` picks the Plan compatible with a resource's recorded
//! version.
//!
//! No I/O lives here. Persistence and retry scheduling belong to the driver.

/// Version of the canonical result encoding. Bump when `hashing` output changes.
pub const RESULT_FORMAT_VERSION: u32 = 1;

pub mod domain;
pub mod error;
pub mod invariants;
pub mod step;
pub mod graph;
pub mod pass;
pub mod plan;
pub mod catalog;
pub mod hashing;

pub use catalog::PlanCatalog;
pub use domain::{Outcome, PlanResult, StepResult};
pub use error::{EngineError, StepFailure};
pub use pass::Pass;
pub use plan::Plan;
pub use step::{Step, StepGraph, StepId, Work, WorkError, WorkResult};
