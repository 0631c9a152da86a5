//! # oasguard
//!
//! Declarative per-request authorization for HTTP services that describe
//! their surface with an OpenAPI specification.
//!
//! Given an incoming request, oasguard determines which access-control rule
//! applies, invokes a named validation function with its bound parameters,
//! and — in specification mode — computes a set of dynamic *labels*
//! describing the authorization context, exposed to downstream handlers
//! through a request-scoped [`SecurityContext`].
//!
//! ## Two resolution strategies
//!
//! - **Manual mode** ([`ManualGuard`]): an ordered [rule table](ManualConfig)
//!   maps exact path patterns and comma-separated method keys to validation
//!   functions, with per-rule fallbacks and a table-wide default. First rule
//!   that yields a validator wins; a path match without a usable validator
//!   does not stop the scan.
//! - **Specification mode** ([`OApiGuard`]): the OpenAPI document is the
//!   policy source. Each operation may carry an `x-oasguard` vendor
//!   extension naming a validation function, its parameters, and label
//!   conditions; requests resolve to operations through the document's path
//!   templates.
//!
//! Both modes abort the chain on the first failing stage and surface a
//! [`GuardError`] to the caller. The HTTP transport, the JSON/YAML parsers,
//! the expression engine and the schema validator are collaborators behind
//! crate boundaries — oasguard owns the policy-resolution and
//! label-evaluation semantics around them.
//!
//! ## Quick start
//!
//! ```no_run
//! use oasguard::{Guard, OApiConfig, OApiGuard, OpValidationFn, RequestContext};
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! let spec_bytes = std::fs::read("openapi.yaml").expect("spec");
//!
//! let mut validators: HashMap<String, OpValidationFn> = HashMap::new();
//! validators.insert(
//!     "require_admin".to_string(),
//!     Arc::new(|req, _params| {
//!         match req.get_header("x-role") {
//!             Some("admin") => Ok(()),
//!             _ => Err(anyhow::anyhow!("admin role required")),
//!         }
//!     }),
//! );
//!
//! let config = OApiConfig::new(&spec_bytes, validators, true)
//!     .expect("valid spec")
//!     .with_vars(["tenant"]);
//! let guard = OApiGuard::new(config);
//!
//! // Per request, before the downstream handler:
//! let mut req = RequestContext::new(http::Method::GET, "/api/v1/things");
//! if let Err(err) = guard.check(&mut req) {
//!     // abort the chain, surface err
//! }
//! // Downstream: req.security() carries the policy and computed labels.
//! ```
//!
//! ## Labels
//!
//! A label is a named boolean fact about the current request, declared next
//! to the operation's validator:
//!
//! ```yaml
//! x-oasguard:
//!   function: require_admin
//!   labels:
//!     - label: internal
//!       expression: ctx.header.Role == "admin"
//! ```
//!
//! Conditions compile once per `(operation, label)` pair into a cached
//! program (see [`LabelEvaluator`]) and evaluate against a per-request
//! scope. Downstream handlers ask `req.has_labels(&["internal"])`.

pub mod context;
pub mod error;
pub mod labels;
pub mod middleware;
pub mod request;
pub mod router;
pub mod rules;
pub mod spec;
pub mod validator;

pub use context::SecurityContext;
pub use error::GuardError;
pub use labels::{CacheStats, LabelEvaluator};
pub use middleware::{Guard, ManualGuard, OApiConfig, OApiGuard, OpValidationFn};
pub use request::{parse_cookies, parse_query_params, HeaderVec, RequestContext};
pub use router::{OperationMatch, OperationRouter};
pub use rules::{ManualConfig, PathRule, ValidationFn};
pub use spec::{
    build_operations, load_document, LabelRule, OperationMeta, SecurityPolicy,
    VENDOR_EXTENSION_KEY,
};
pub use validator::{Reply, ReplyBody, SchemaCache, ValidationIssue};
