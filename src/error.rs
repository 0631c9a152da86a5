use crate::spec::VENDOR_EXTENSION_KEY;
use crate::validator::ValidationIssue;
use thiserror::Error;

/// Per-request failure surfaced by a guard.
///
/// Every variant is synchronous and local: the guard never retries
/// internally, and a `GuardError` returned from [`crate::Guard::check`]
/// means the request chain must stop before the downstream handler runs.
#[derive(Debug, Error)]
pub enum GuardError {
    /// The specification router could not match the request to an operation.
    #[error("no operation matches {method} {path}")]
    RouteNotFound {
        /// HTTP method of the unmatched request
        method: http::Method,
        /// Request path of the unmatched request
        path: String,
    },

    /// The vendor extension was present on the matched operation but did not
    /// decode into a [`crate::spec::SecurityPolicy`]. This is a local
    /// configuration defect in the specification document, not a request
    /// defect.
    #[error("local configuration error: malformed {VENDOR_EXTENSION_KEY} metadata on operation {operation_id}: {source}")]
    MetadataDecode {
        /// Operation whose extension failed to decode
        operation_id: String,
        #[source]
        source: serde_json::Error,
    },

    /// The policy named a validation function that was never registered.
    /// Indicates a deployment/configuration defect rather than a bad request.
    #[error("validation function {function:?} is not registered")]
    ValidatorNotRegistered {
        /// The missing function name
        function: String,
    },

    /// The named validator rejected the request. The validator's own error is
    /// propagated verbatim; no label evaluation or schema validation ran.
    #[error(transparent)]
    Rejected(anyhow::Error),

    /// A label condition failed to compile. Aborts the remaining label
    /// evaluation for this request; previously cached programs stay valid.
    #[error("failed to compile condition for label {label:?}: {source}")]
    ExpressionCompile {
        /// Label whose condition failed to compile
        label: String,
        #[source]
        source: evalexpr::EvalexprError,
    },

    /// A compiled label condition failed at evaluation time. Note that a
    /// condition returning a non-boolean value is *not* an error; it merely
    /// suppresses the label.
    #[error("failed to evaluate condition for label {label:?}: {source}")]
    ExpressionEval {
        /// Label whose condition failed to evaluate
        label: String,
        #[source]
        source: evalexpr::EvalexprError,
    },

    /// The request or response did not conform to the operation's schema.
    #[error("schema validation failed: {}", format_issues(.issues))]
    SchemaValidation {
        /// Individual violations, in discovery order
        issues: Vec<ValidationIssue>,
    },
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
