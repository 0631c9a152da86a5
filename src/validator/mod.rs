//! Schema validation bridge.
//!
//! Optional request/response contract checks around dispatch. Validators are
//! compiled JSON Schemas, cached for the guard's lifetime so a schema
//! compiles at most once per operation/kind/status; the cache uses a read fast path and a
//! double-checked insert, so concurrent first-time compilation cannot
//! corrupt it.

use crate::error::GuardError;
use crate::request::RequestContext;
use crate::router::OperationMatch;
use crate::spec::{OperationMeta, ParameterLocation};
use jsonschema::Validator;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, error};

/// One schema violation: where it was found, what kind it is, and the
/// validator's message.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub location: String,
    pub kind: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(
        location: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ValidationIssue {
            location: location.into(),
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.location, self.message)
    }
}

/// Thread-safe cache of compiled JSON Schema validators, keyed by
/// `{operation}:{kind}` or `{operation}:{kind}:{status}`.
#[derive(Clone, Default)]
pub struct SchemaCache {
    cache: Arc<RwLock<HashMap<String, Arc<Validator>>>>,
}

impl SchemaCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn cache_key(operation_id: &str, kind: &str, status: Option<u16>) -> String {
        match status {
            Some(s) => format!("{operation_id}:{kind}:{s}"),
            None => format!("{operation_id}:{kind}"),
        }
    }

    /// Get a cached validator, compiling and caching on first use.
    ///
    /// A schema that does not compile logs an error and yields `None`; the
    /// caller skips that check rather than failing the request for a defect
    /// in the document.
    #[must_use]
    pub fn get_or_compile(
        &self,
        operation_id: &str,
        kind: &str,
        status: Option<u16>,
        schema: &Value,
    ) -> Option<Arc<Validator>> {
        let key = Self::cache_key(operation_id, kind, status);

        if let Ok(cache) = self.cache.read() {
            if let Some(validator) = cache.get(&key) {
                debug!(cache_key = %key, "schema validator cache hit");
                return Some(Arc::clone(validator));
            }
        }

        match jsonschema::validator_for(schema) {
            Ok(compiled) => {
                let validator = Arc::new(compiled);
                if let Ok(mut cache) = self.cache.write() {
                    if let Some(existing) = cache.get(&key) {
                        return Some(Arc::clone(existing));
                    }
                    cache.insert(key.clone(), Arc::clone(&validator));
                    debug!(
                        cache_key = %key,
                        cache_size = cache.len(),
                        "schema validator compiled and cached"
                    );
                }
                Some(validator)
            }
            Err(e) => {
                error!(cache_key = %key, error = %e, "failed to compile JSON schema");
                None
            }
        }
    }
}

/// Validate the request side of a matched operation: required parameters
/// present, body present when required, body conforming to the request
/// schema.
pub(crate) fn validate_request(
    cache: &SchemaCache,
    req: &RequestContext,
    matched: &OperationMatch,
) -> Result<(), GuardError> {
    let op = &matched.operation;
    let mut issues = Vec::new();

    for param in &op.parameters {
        if !param.required {
            continue;
        }
        let present = match param.location {
            ParameterLocation::Path => matched.path_params.contains_key(&param.name),
            ParameterLocation::Query => req.get_query(&param.name).is_some(),
            ParameterLocation::Header => req.get_header(&param.name).is_some(),
            ParameterLocation::Cookie => req.get_cookie(&param.name).is_some(),
        };
        if !present {
            issues.push(ValidationIssue::new(
                format!("{} parameter {:?}", param.location, param.name),
                "MissingParameter",
                "required parameter is absent",
            ));
        }
    }

    if op.request_body_required && req.body.is_none() {
        issues.push(ValidationIssue::new(
            "body",
            "MissingRequestBody",
            "request body is required",
        ));
    }

    if let (Some(schema), Some(body)) = (&op.request_schema, &req.body) {
        if let Some(validator) = cache.get_or_compile(&op.operation_id, "request", None, schema) {
            for err in validator.iter_errors(body) {
                issues.push(ValidationIssue::new("body", "Schema", err.to_string()));
            }
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(GuardError::SchemaValidation { issues })
    }
}

/// Validate a response body against the operation's schema for `status`.
/// Absence of a schema for the status means nothing to check.
pub(crate) fn validate_response(
    cache: &SchemaCache,
    op: &OperationMeta,
    status: u16,
    body: &Value,
) -> Result<(), GuardError> {
    let Some(schema) = op.response_schemas.get(&status) else {
        return Ok(());
    };
    let Some(validator) = cache.get_or_compile(&op.operation_id, "response", Some(status), schema)
    else {
        return Ok(());
    };

    let issues: Vec<ValidationIssue> = validator
        .iter_errors(body)
        .map(|err| {
            ValidationIssue::new(format!("response[{status}]"), "Schema", err.to_string())
        })
        .collect();

    if issues.is_empty() {
        Ok(())
    } else {
        Err(GuardError::SchemaValidation { issues })
    }
}

/// Payload for [`crate::OApiGuard::validated_reply`].
///
/// Strings and raw bytes are emitted as-is; any other serializable value is
/// marshalled to JSON. Mirrors how response bodies reach the boundary in
/// practice: pre-rendered text, raw blobs, or structured data.
pub enum ReplyBody {
    Json(Value),
    Text(String),
    Bytes(Vec<u8>),
}

impl From<Value> for ReplyBody {
    fn from(v: Value) -> Self {
        ReplyBody::Json(v)
    }
}

impl From<String> for ReplyBody {
    fn from(s: String) -> Self {
        ReplyBody::Text(s)
    }
}

impl From<&str> for ReplyBody {
    fn from(s: &str) -> Self {
        ReplyBody::Text(s.to_string())
    }
}

impl From<Vec<u8>> for ReplyBody {
    fn from(b: Vec<u8>) -> Self {
        ReplyBody::Bytes(b)
    }
}

impl ReplyBody {
    pub(crate) fn into_bytes(self) -> Vec<u8> {
        match self {
            ReplyBody::Json(v) => v.to_string().into_bytes(),
            ReplyBody::Text(s) => s.into_bytes(),
            ReplyBody::Bytes(b) => b,
        }
    }

    /// The JSON instance to validate, parsing text/bytes payloads.
    pub(crate) fn as_instance(&self) -> Result<Value, GuardError> {
        let parsed = match self {
            ReplyBody::Json(v) => return Ok(v.clone()),
            ReplyBody::Text(s) => serde_json::from_str(s),
            ReplyBody::Bytes(b) => serde_json::from_slice(b),
        };
        parsed.map_err(|e| GuardError::SchemaValidation {
            issues: vec![ValidationIssue::new(
                "response",
                "InvalidJson",
                e.to_string(),
            )],
        })
    }
}

/// A validated response ready for the transport to send.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}
