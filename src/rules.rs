//! Manual mode: an ordered rule table mapping paths and methods to
//! validation functions.
//!
//! Resolution is first-match-with-validator, not first-path-match: a rule
//! whose pattern matches the request path but which has neither a method
//! validator nor a fallback does not stop the scan, and a later rule for the
//! same path can still decide the request.

use crate::request::RequestContext;
use http::Method;
use std::sync::Arc;

/// A validation function for manual mode. Returning an error denies the
/// request and aborts the chain; the error is propagated verbatim.
pub type ValidationFn = Arc<dyn Fn(&mut RequestContext) -> anyhow::Result<()> + Send + Sync>;

/// One entry of the rule table.
///
/// `patterns` are exact-match path strings (templated segments are treated
/// as literal tokens — no wildcard expansion happens at this layer). Method
/// keys are comma-separated method names, matched case- and
/// whitespace-insensitively, in insertion order.
#[derive(Clone, Default)]
pub struct PathRule {
    patterns: Vec<String>,
    methods: Vec<(String, ValidationFn)>,
    fallback: Option<ValidationFn>,
}

impl PathRule {
    /// Create a rule responding to the given path patterns.
    #[must_use]
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
            methods: Vec::new(),
            fallback: None,
        }
    }

    /// Map a method key group (e.g. `"GET"` or `"PUT,PATCH"`) to a
    /// validator.
    #[must_use]
    pub fn method(mut self, keys: impl Into<String>, validator: ValidationFn) -> Self {
        self.methods.push((keys.into(), validator));
        self
    }

    /// Set the validator used when no method key matches.
    #[must_use]
    pub fn fallback(mut self, validator: ValidationFn) -> Self {
        self.fallback = Some(validator);
        self
    }

    /// True when `base_path + pattern` equals `path` for any pattern.
    #[must_use]
    pub fn matches_path(&self, base_path: &str, path: &str) -> bool {
        self.patterns.iter().any(|p| {
            path.strip_prefix(base_path)
                .map_or(false, |rest| rest == p)
        })
    }

    /// Find a method validator for `method`. The first key group containing
    /// the method wins; `None` when no group matches.
    #[must_use]
    pub fn method_validator(&self, method: &Method) -> Option<&ValidationFn> {
        self.methods.iter().find_map(|(keys, validator)| {
            keys.split(',')
                .any(|m| m.trim().eq_ignore_ascii_case(method.as_str()))
                .then_some(validator)
        })
    }

    fn decision(&self, method: &Method) -> Option<&ValidationFn> {
        self.method_validator(method).or(self.fallback.as_ref())
    }
}

/// Manual-mode configuration: a base path, an ordered rule table and an
/// optional default validator.
///
/// Read-only after construction and safe to share across concurrent
/// requests.
#[derive(Clone, Default)]
pub struct ManualConfig {
    base_path: String,
    rules: Vec<PathRule>,
    default_validator: Option<ValidationFn>,
}

impl ManualConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix prepended to every pattern before comparison.
    #[must_use]
    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Append a rule. Order is significant: the first rule that yields a
    /// validator wins.
    #[must_use]
    pub fn rule(mut self, rule: PathRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Validator invoked when no rule resolves.
    #[must_use]
    pub fn default_validator(mut self, validator: ValidationFn) -> Self {
        self.default_validator = Some(validator);
        self
    }

    /// Resolve a request to the applicable validator.
    ///
    /// Scans the table in order. A rule whose pattern matches is consulted
    /// for a method validator first, then its fallback; if it has neither,
    /// the scan continues with later rules. When no rule resolves, the
    /// default validator applies; `None` means "no decision" and the request
    /// proceeds unauthenticated through this layer.
    #[must_use]
    pub fn resolve(&self, method: &Method, path: &str) -> Option<&ValidationFn> {
        for rule in &self.rules {
            if rule.matches_path(&self.base_path, path) {
                if let Some(validator) = rule.decision(method) {
                    return Some(validator);
                }
                // Path matched but nothing applies: keep scanning.
            }
        }
        self.default_validator.as_ref()
    }
}
