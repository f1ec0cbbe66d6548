#![forbid(unsafe_code)]

//! Reconcile runtime — convergence driver around the engine.
//!
//! Fetches a resource's durable status, selects the compatible Plan,
//! executes one pass, persists per-step outcomes and the reconcile version,
//! and decides when the resource should be looked at again.
//!
//! No evaluation logic lives here. Step semantics, memoization and plan
//! selection are delegated to the engine.

pub mod config;
pub mod logging;
pub mod resource;
pub mod status_store;
pub mod backoff;
pub mod drift;
pub mod driver;

pub use config::{ConfigError, DriverConfig};
pub use driver::{ConvergenceDriver, DriverError, PassReport, Requeue, SharedDriver};
pub use resource::ResourceStatus;
pub use status_store::{FileStatusStore, MemoryStatusStore, StatusStore, StoreError};
