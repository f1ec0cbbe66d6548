/// Reconcile engine — Construction-time Invariant Checks
///
/// Step graphs, Plans and catalogs are validated once, when built.
/// Every check returns `Err` on the first failure.

use std::collections::BTreeSet;

use crate::error::EngineError;
use crate::step::{StepGraph, StepId};

// ---------------------------------------------------------------------------
// Step registration
// ---------------------------------------------------------------------------

/// Step names must be non-empty ASCII `[A-Za-z0-9_.-]`.
pub fn check_step_name(name: &str) -> Result<(), EngineError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' || ch == '.');
    if !valid {
        return Err(EngineError::InvalidStepName(name.to_string()));
    }
    Ok(())
}

/// Every referenced id must already be registered in this graph. Ids
/// issued by another graph are unknown even when their index is in range.
pub fn check_known_steps<C: ?Sized>(
    graph: &StepGraph<C>,
    ids: &[StepId],
) -> Result<(), EngineError> {
    for id in ids {
        if !graph.contains(*id) {
            return Err(EngineError::UnknownStep(id.index()));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Plan construction
// ---------------------------------------------------------------------------

/// A Plan must be applicable to resources already at its own version.
pub fn check_version_range(version: u64, min_version: u64) -> Result<(), EngineError> {
    if min_version > version {
        return Err(EngineError::InvalidVersionRange {
            version,
            min_version,
        });
    }
    Ok(())
}

/// Top-level Steps become Result keys, so each may appear only once.
pub fn check_unique_top_level<C: ?Sized>(
    graph: &StepGraph<C>,
    steps: &[StepId],
) -> Result<(), EngineError> {
    let mut seen: BTreeSet<StepId> = BTreeSet::new();
    for id in steps {
        if !seen.insert(*id) {
            let name = graph.step(*id).map(|s| s.name()).unwrap_or_default();
            return Err(EngineError::DuplicateTopLevelStep(name.to_string()));
        }
    }
    Ok(())
}

/// Run every Plan check. Returns the first failure.
pub fn validate_plan<C: ?Sized>(
    version: u64,
    min_version: u64,
    graph: &StepGraph<C>,
    steps: &[StepId],
) -> Result<(), EngineError> {
    check_version_range(version, min_version)?;
    check_known_steps(graph, steps)?;
    check_unique_top_level(graph, steps)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Catalog construction
// ---------------------------------------------------------------------------

/// No two Plans in a catalog may share a version.
pub fn check_unique_versions(versions: &[u64]) -> Result<(), EngineError> {
    let mut seen: BTreeSet<u64> = BTreeSet::new();
    for v in versions {
        if !seen.insert(*v) {
            return Err(EngineError::DuplicateVersion(*v));
        }
    }
    Ok(())
}
