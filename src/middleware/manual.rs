use super::Guard;
use crate::error::GuardError;
use crate::request::RequestContext;
use crate::rules::ManualConfig;
use tracing::debug;

/// Guard driven by an ordered rule table ([`ManualConfig`]).
///
/// Resolution follows the table order with first-match-with-validator
/// semantics (see [`ManualConfig::resolve`]). When nothing resolves — no
/// rule and no default validator — the request proceeds unauthenticated
/// through this layer; "no decision" is not "deny".
pub struct ManualGuard {
    config: ManualConfig,
}

impl ManualGuard {
    #[must_use]
    pub fn new(config: ManualConfig) -> Self {
        Self { config }
    }
}

impl Guard for ManualGuard {
    fn check(&self, req: &mut RequestContext) -> Result<(), GuardError> {
        match self.config.resolve(&req.method, &req.path) {
            Some(validator) => validator(req).map_err(GuardError::Rejected),
            None => {
                debug!(method = %req.method, path = %req.path, "no rule resolved; passing through");
                Ok(())
            }
        }
    }
}
