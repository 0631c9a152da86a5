use super::Guard;
use crate::context::SecurityContext;
use crate::error::GuardError;
use crate::labels::{CacheStats, LabelEvaluator};
use crate::request::RequestContext;
use crate::router::OperationRouter;
use crate::spec::{build_operations, load_document, SecurityPolicy};
use crate::validator::{self, Reply, ReplyBody, SchemaCache};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A validation function for specification mode. Receives the request and
/// the parameters declared in the operation's policy (never absent, empty by
/// default). Returning an error denies the request; the error is propagated
/// verbatim and no label evaluation or schema validation runs.
pub type OpValidationFn =
    Arc<dyn Fn(&mut RequestContext, &[String]) -> anyhow::Result<()> + Send + Sync>;

/// Configuration for an [`OApiGuard`].
///
/// Construction parses the specification document (plain or
/// gzip-compressed bytes) and builds the operation table; the validator
/// registry is immutable afterwards.
pub struct OApiConfig {
    operations: Vec<crate::spec::OperationMeta>,
    validators: HashMap<String, OpValidationFn>,
    validation_enabled: bool,
    scope_vars: Vec<String>,
}

impl OApiConfig {
    /// Parse `openapi` and set up the registry.
    ///
    /// `validation_enabled` turns on request/response contract validation
    /// around dispatch.
    pub fn new(
        openapi: &[u8],
        validators: HashMap<String, OpValidationFn>,
        validation_enabled: bool,
    ) -> anyhow::Result<Self> {
        let doc = load_document(openapi)?;
        let operations = build_operations(&doc)?;
        Ok(Self {
            operations,
            validators,
            validation_enabled,
            scope_vars: Vec::new(),
        })
    }

    /// Names of request-local values to surface into label condition scopes.
    #[must_use]
    pub fn with_vars<I, S>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope_vars = vars.into_iter().map(Into::into).collect();
        self
    }
}

/// Guard driven by an OpenAPI specification document.
///
/// Per request, strictly in order: resolve the operation, decode its policy,
/// dispatch the named validator, attach the security context, evaluate
/// labels, then optionally validate the request contract. Operations without
/// a policy pass through untouched.
///
/// Cloning is cheap; all shared state sits behind `Arc` and is either
/// read-only after construction or internally locked.
#[derive(Clone)]
pub struct OApiGuard {
    router: Arc<OperationRouter>,
    validators: Arc<HashMap<String, OpValidationFn>>,
    evaluator: Arc<LabelEvaluator>,
    schemas: Arc<SchemaCache>,
    validation_enabled: bool,
}

impl OApiGuard {
    #[must_use]
    pub fn new(config: OApiConfig) -> Self {
        Self {
            router: Arc::new(OperationRouter::new(config.operations)),
            validators: Arc::new(config.validators),
            evaluator: Arc::new(LabelEvaluator::new(config.scope_vars)),
            schemas: Arc::new(SchemaCache::new()),
            validation_enabled: config.validation_enabled,
        }
    }

    /// Statistics of the compiled label-condition cache.
    #[must_use]
    pub fn label_cache_stats(&self) -> CacheStats {
        self.evaluator.stats()
    }

    /// Emit a response through the validation boundary.
    ///
    /// When the request passed through this guard with validation enabled,
    /// the payload is checked against the operation's response schema for
    /// `status` before being returned; the bytes are produced either way, so
    /// a failed validation still reflects what would have been sent. Without
    /// a stashed operation the payload is emitted unchecked.
    ///
    /// `headers` travel to the [`Reply`] unchanged. `Content-Type` defaults
    /// to `application/json` only when the caller has not set one, under any
    /// casing.
    pub fn validated_reply(
        &self,
        req: &RequestContext,
        status: u16,
        mut headers: HashMap<String, String>,
        body: impl Into<ReplyBody>,
    ) -> Result<Reply, GuardError> {
        let body = body.into();

        if let Some(op) = req.validated_operation() {
            if op.response_schemas.contains_key(&status) {
                let instance = body.as_instance()?;
                validator::validate_response(&self.schemas, op, status, &instance)?;
            }
        }

        if !headers.keys().any(|k| k.eq_ignore_ascii_case("content-type")) {
            headers.insert("content-type".to_string(), "application/json".to_string());
        }
        Ok(Reply {
            status,
            headers,
            body: body.into_bytes(),
        })
    }
}

impl Guard for OApiGuard {
    fn check(&self, req: &mut RequestContext) -> Result<(), GuardError> {
        let matched = self
            .router
            .resolve(&req.method, &req.path)
            .ok_or_else(|| GuardError::RouteNotFound {
                method: req.method.clone(),
                path: req.path.clone(),
            })?;
        let operation_id = matched.operation.operation_id.clone();

        let raw = match &matched.operation.policy {
            Some(raw) => raw.clone(),
            None => {
                debug!(operation_id = %operation_id, "operation carries no policy; passing through");
                return Ok(());
            }
        };

        let policy: SecurityPolicy = serde_json::from_value(raw).map_err(|source| {
            GuardError::MetadataDecode {
                operation_id: operation_id.clone(),
                source,
            }
        })?;

        let validation_fn = self
            .validators
            .get(&policy.function)
            .cloned()
            .ok_or_else(|| GuardError::ValidatorNotRegistered {
                function: policy.function.clone(),
            })?;

        validation_fn(req, &policy.params).map_err(GuardError::Rejected)?;
        debug!(
            operation_id = %operation_id,
            function = %policy.function,
            "validator accepted request"
        );

        // Attach once with empty labels so the policy is visible even if
        // label evaluation fails partway.
        req.attach_security(SecurityContext {
            policy: policy.clone(),
            labels: Vec::new(),
        });

        let labels = self
            .evaluator
            .evaluate(req, &operation_id, &policy.labels)?;
        debug!(operation_id = %operation_id, labels = ?labels, "labels evaluated");
        req.attach_security(SecurityContext { policy, labels });

        if self.validation_enabled {
            validator::validate_request(&self.schemas, req, &matched)?;
            req.stash_validated_operation(Arc::clone(&matched.operation));
        }

        Ok(())
    }
}
