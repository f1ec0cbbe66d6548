/// Reconcile engine — Plan Catalog
///
/// All known Plan versions for one kind of resource, with selection of the
/// Plan compatible with a resource's last recorded version.
///
/// Versions are unique; the catalog fails closed on duplicates.

use crate::error::EngineError;
use crate::invariants::check_unique_versions;
use crate::plan::Plan;

/// Immutable collection of Plans, held sorted by version descending.
pub struct PlanCatalog<C: ?Sized> {
    plans: Vec<Plan<C>>,
}

impl<C: ?Sized> PlanCatalog<C> {
    /// Build a catalog. Input order is irrelevant.
    pub fn new(mut plans: Vec<Plan<C>>) -> Result<Self, EngineError> {
        let versions: Vec<u64> = plans.iter().map(|p| p.version()).collect();
        check_unique_versions(&versions)?;
        plans.sort_by(|a, b| b.version().cmp(&a.version()));
        Ok(Self { plans })
    }

    /// The Plan with the highest version.
    pub fn newest(&self) -> Result<&Plan<C>, EngineError> {
        self.plans.first().ok_or(EngineError::EmptyCatalog)
    }

    /// Pick the Plan to run against a resource recorded at `observed`.
    ///
    /// `None` means the resource was never reconciled: use the newest Plan.
    /// Otherwise the highest-versioned Plan whose `min_version` admits
    /// `observed`.
    pub fn select_compatible(&self, observed: Option<u64>) -> Result<&Plan<C>, EngineError> {
        let observed = match observed {
            None => return self.newest(),
            Some(v) => v,
        };
        if self.plans.is_empty() {
            return Err(EngineError::EmptyCatalog);
        }
        self.plans
            .iter()
            .find(|p| p.admits(observed))
            .ok_or(EngineError::NoCompatiblePlan { observed })
    }

    pub fn get(&self, version: u64) -> Option<&Plan<C>> {
        self.plans.iter().find(|p| p.version() == version)
    }

    /// All versions, highest first.
    pub fn versions(&self) -> Vec<u64> {
        self.plans.iter().map(|p| p.version()).collect()
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Plan<C>> {
        self.plans.iter()
    }
}
