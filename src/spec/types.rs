use http::Method;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// Fixed vendor extension key carrying the per-operation security policy.
///
/// Operations without this extension have no policy: the guard passes them
/// through untouched.
pub const VENDOR_EXTENSION_KEY: &str = "x-oasguard";

/// Where a parameter lives in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl From<oas3::spec::ParameterIn> for ParameterLocation {
    fn from(loc: oas3::spec::ParameterIn) -> Self {
        match loc {
            oas3::spec::ParameterIn::Path => ParameterLocation::Path,
            oas3::spec::ParameterIn::Query => ParameterLocation::Query,
            oas3::spec::ParameterIn::Header => ParameterLocation::Header,
            oas3::spec::ParameterIn::Cookie => ParameterLocation::Cookie,
        }
    }
}

impl std::fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterLocation::Path => write!(f, "path"),
            ParameterLocation::Query => write!(f, "query"),
            ParameterLocation::Header => write!(f, "header"),
            ParameterLocation::Cookie => write!(f, "cookie"),
        }
    }
}

/// Parameter metadata extracted from the specification, kept only as far as
/// request validation needs it.
#[derive(Debug, Clone)]
pub struct ParameterMeta {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub schema: Option<Value>,
}

/// One operation (path + method) from the specification document.
///
/// `policy` holds the raw, undecoded vendor extension value. Decoding into a
/// [`SecurityPolicy`] happens lazily per request so that a malformed
/// extension surfaces as a per-request configuration error rather than a
/// startup failure.
#[derive(Debug, Clone)]
pub struct OperationMeta {
    pub operation_id: String,
    pub method: Method,
    /// Path template as written in the document, e.g. `/compute/{group}`
    pub path_pattern: String,
    /// Path prefix taken from the first `servers` entry, e.g. `/api/v1`
    pub base_path: String,
    /// Merged path-item and operation parameters
    pub parameters: Vec<ParameterMeta>,
    /// JSON schema of the `application/json` request body, refs expanded
    pub request_schema: Option<Value>,
    pub request_body_required: bool,
    /// `application/json` response schema per status code, refs expanded
    pub response_schemas: HashMap<u16, Value>,
    /// Raw `x-oasguard` extension value, if the operation carries one
    pub policy: Option<Value>,
}

/// Declarative security policy decoded from the vendor extension.
///
/// Mirrors the document syntax:
///
/// ```yaml
/// x-oasguard:
///   function: do_stuff
///   params:
///     - great
///   labels:
///     - label: internal
///       expression: ctx.header.Role == "admin"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SecurityPolicy {
    /// Name of the registered validation function to invoke
    pub function: String,
    /// Arguments handed to the validation function; never absent, defaults
    /// to an empty sequence
    #[serde(default)]
    pub params: Vec<String>,
    /// Dynamic labels evaluated after the validator succeeds
    #[serde(default)]
    pub labels: Vec<LabelRule>,
}

/// One dynamic label: the label itself plus the condition that activates it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabelRule {
    pub label: String,
    #[serde(rename = "expression")]
    pub condition: String,
}
