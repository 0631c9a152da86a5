//! Guard pipelines.
//!
//! A [`Guard`] sits in front of the downstream handler chain: `check` runs
//! before dispatch, and an error from it means the chain stops and the error
//! is surfaced to the caller. Two pipelines are provided — [`ManualGuard`]
//! driven by an ordered rule table, and [`OApiGuard`] driven by an OpenAPI
//! specification document.

mod manual;
mod oapi;

pub use manual::ManualGuard;
pub use oapi::{OApiConfig, OApiGuard, OpValidationFn};

use crate::error::GuardError;
use crate::request::RequestContext;

/// A per-request authorization check.
///
/// Implementations are shared across concurrent requests; all of their state
/// is read-only after construction or internally synchronized.
pub trait Guard: Send + Sync {
    /// Run the check for one request. `Ok(())` lets the chain proceed; any
    /// error aborts it before the downstream handler runs.
    fn check(&self, req: &mut RequestContext) -> Result<(), GuardError>;
}
