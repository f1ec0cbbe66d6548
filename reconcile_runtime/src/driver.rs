//! Convergence driver — one reconciliation pass per call.
//!
//! Pass order:
//!   1. load the resource's status (missing = never reconciled)
//!   2. select the Plan compatible with its recorded version
//!   3. execute the Plan against the caller's context
//!   4. persist outcomes, and the Plan version if fully reconciled
//!   5. tell the caller when to come back
//!
//! The driver holds no per-pass state of its own. Passes against the same
//! resource must be serialised by the caller, or via `SharedDriver`, which
//! locks per resource key so different resources converge concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use reconcile_engine::{EngineError, PlanCatalog, PlanResult};

use crate::backoff::RetryPolicy;
use crate::config::DriverConfig;
use crate::drift::{compare_status, StatusDrift};
use crate::resource::ResourceStatus;
use crate::status_store::{StatusStore, StoreError};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("status store: {0}")]
    Store(#[from] StoreError),

    /// No Plan can be applied. Needs operator attention; not retried.
    #[error("no plan for resource {key:?}: {source}")]
    NoPlan {
        key: String,
        #[source]
        source: EngineError,
    },

    /// The pass failed; retry after `retry_after`. Version was not advanced.
    #[error("pass failed for resource {key:?} (retry in {retry_after:?}): {source}")]
    PassFailed {
        key: String,
        retry_after: Duration,
        #[source]
        source: EngineError,
    },
}

impl DriverError {
    /// Backoff delay for retryable failures, `None` for hard errors.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            DriverError::PassFailed { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

/// When the resource should be reconciled again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    /// Not converged yet; run another pass right away.
    Immediately,
    /// Converged; re-check after the resync interval.
    After(Duration),
}

/// Summary of a successful pass.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub plan_version: u64,
    pub result: PlanResult,
    pub drift: StatusDrift,
    pub requeue: Requeue,
}

/// Pass settings shared by `ConvergenceDriver` and `SharedDriver`.
#[derive(Debug, Clone, Copy)]
struct Timing {
    resync_interval: Duration,
    retry_policy: RetryPolicy,
}

impl Timing {
    fn from_config(config: &DriverConfig) -> Self {
        Self {
            resync_interval: config.resync_interval(),
            retry_policy: config.retry_policy(),
        }
    }
}

/// Select, execute and fold one pass into `status`. No store access.
fn run_pass<C: ?Sized>(
    catalog: &PlanCatalog<C>,
    timing: Timing,
    key: &str,
    status: &mut ResourceStatus,
    ctx: &mut C,
) -> Result<PassReport, DriverError> {
    let observed = status.reconcile_version;
    debug!(resource = key, ?observed, "reconciling");

    let plan = match catalog.select_compatible(observed) {
        Ok(plan) => plan,
        Err(source) => {
            error!(resource = key, ?observed, error = %source, "no compatible plan");
            status.record_failure(&source.to_string());
            return Err(DriverError::NoPlan {
                key: key.to_string(),
                source,
            });
        }
    };
    let plan_version = plan.version();

    let result = match plan.execute(ctx) {
        Ok(result) => result,
        Err(source) => {
            status.record_failure(&source.to_string());
            let retry_after = timing.retry_policy.delay(status.consecutive_failures);
            warn!(
                resource = key,
                plan_version,
                failures = status.consecutive_failures,
                ?retry_after,
                error = %source,
                "pass failed"
            );
            return Err(DriverError::PassFailed {
                key: key.to_string(),
                retry_after,
                source,
            });
        }
    };

    let drift = compare_status(status, &result);
    for change in &drift.changed {
        info!(
            resource = key,
            step = %change.step,
            from = %change.from,
            to = %change.to,
            "step outcome changed"
        );
    }
    if !drift.regressed.is_empty() {
        warn!(resource = key, regressed = ?drift.regressed, "previously satisfied steps regressed");
    }

    status.apply_result(plan_version, &result);

    let requeue = if result.fully_reconciled {
        Requeue::After(timing.resync_interval)
    } else {
        Requeue::Immediately
    };
    info!(
        resource = key,
        plan_version,
        fully_reconciled = result.fully_reconciled,
        ?requeue,
        "pass complete"
    );

    Ok(PassReport {
        plan_version,
        result,
        drift,
        requeue,
    })
}

/// Persist the status a pass produced.
///
/// A failed pass keeps its own error when the save fails too, so the caller
/// still sees the retry delay; the store error is logged.
fn persist<S: StatusStore>(
    store: &mut S,
    key: &str,
    status: &ResourceStatus,
    outcome: Result<PassReport, DriverError>,
) -> Result<PassReport, DriverError> {
    match (store.save(key, status), outcome) {
        (Ok(()), outcome) => outcome,
        (Err(store_err), Ok(_)) => Err(DriverError::Store(store_err)),
        (Err(store_err), Err(pass_err)) => {
            error!(resource = key, error = %store_err, "failed to record failed pass");
            Err(pass_err)
        }
    }
}

/// Drives resources of one kind toward the state described by a catalog.
pub struct ConvergenceDriver<C: ?Sized, S: StatusStore> {
    catalog: Arc<PlanCatalog<C>>,
    store: S,
    timing: Timing,
}

impl<C: ?Sized, S: StatusStore> ConvergenceDriver<C, S> {
    pub fn new(catalog: Arc<PlanCatalog<C>>, store: S, config: &DriverConfig) -> Self {
        Self {
            catalog,
            store,
            timing: Timing::from_config(config),
        }
    }

    pub fn catalog(&self) -> &Arc<PlanCatalog<C>> {
        &self.catalog
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current recorded status of a resource.
    pub fn status(&self, key: &str) -> Result<Option<ResourceStatus>, DriverError> {
        Ok(self.store.load(key)?)
    }

    /// Run one pass for resource `key`.
    pub fn reconcile(&mut self, key: &str, ctx: &mut C) -> Result<PassReport, DriverError> {
        let mut status = self.store.load(key)?.unwrap_or_default();
        let outcome = run_pass(&self.catalog, self.timing, key, &mut status, ctx);
        persist(&mut self.store, key, &status, outcome)
    }
}

/// Thread-safe driver handle.
///
/// Passes for the same key run one at a time; passes for different keys
/// run concurrently. The store lock is held only while loading or saving,
/// never across work callbacks.
pub struct SharedDriver<C: ?Sized, S: StatusStore> {
    catalog: Arc<PlanCatalog<C>>,
    store: Mutex<S>,
    timing: Timing,
    resource_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<C: ?Sized, S: StatusStore> SharedDriver<C, S> {
    pub fn new(driver: ConvergenceDriver<C, S>) -> Self {
        Self {
            catalog: driver.catalog,
            store: Mutex::new(driver.store),
            timing: driver.timing,
            resource_locks: Mutex::new(HashMap::new()),
        }
    }

    fn resource_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.resource_locks.lock().expect("Resource lock table poisoned");
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    /// Run one pass under the resource's lock.
    pub fn reconcile(&self, key: &str, ctx: &mut C) -> Result<PassReport, DriverError> {
        let resource = self.resource_lock(key);
        let _guard = resource.lock().expect("Resource lock poisoned");

        let loaded = self.store.lock().expect("Store lock poisoned").load(key)?;
        let mut status = loaded.unwrap_or_default();
        let outcome = run_pass(&self.catalog, self.timing, key, &mut status, ctx);

        let mut store = self.store.lock().expect("Store lock poisoned");
        persist(&mut *store, key, &status, outcome)
    }

    /// Read status under the store lock.
    pub fn status(&self, key: &str) -> Result<Option<ResourceStatus>, DriverError> {
        let store = self.store.lock().expect("Store lock poisoned");
        Ok(store.load(key)?)
    }
}
