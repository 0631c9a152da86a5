//! Dynamic label evaluation.
//!
//! A label is a named boolean fact about the current request, declared in the
//! operation's policy as a condition string. Conditions are compiled once per
//! `(operation, label)` pair and the compiled programs are cached for the
//! lifetime of the evaluator; the cache is never evicted, its size is bounded
//! by the number of distinct labels in the loaded specification.
//!
//! ## Scope
//!
//! Conditions see a flattened view of the request under `ctx`:
//!
//! - `ctx.method`, `ctx.path`
//! - `ctx.header.<Name>` — one binding per header, casing as received
//! - `ctx.query.<name>` — one binding per query parameter
//!
//! plus one binding per configured scope variable, resolved from
//! request-local state ([`crate::RequestContext::set`]). Identifiers a
//! program references that are absent from the scope bind to the empty
//! value, never an error.
//!
//! ## Matching contract
//!
//! A label matches only when its condition evaluates to the boolean `true`.
//! A non-boolean result suppresses the label without failing the request;
//! an evaluation error aborts the remaining labels for that request but
//! leaves the cache intact.

use crate::error::GuardError;
use crate::request::RequestContext;
use crate::spec::LabelRule;
use evalexpr::{
    build_operator_tree, Context as _, ContextWithMutableVariables, HashMapContext, Node,
    Value as ExprValue,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Cache statistics for the compiled-condition cache.
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that required a compilation
    pub misses: u64,
    /// Current number of cached programs
    pub size: usize,
}

/// Compiles and evaluates label conditions against per-request scopes.
///
/// One evaluator is constructed per loaded specification and shared across
/// all request-handling paths; the compiled-program cache inside it is
/// guarded by a read/write lock with a read fast path. A concurrent
/// first-time compilation of the same key may compile twice; exactly one
/// program is kept.
pub struct LabelEvaluator {
    cache: RwLock<HashMap<String, Arc<Node>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    scope_vars: Vec<String>,
}

impl LabelEvaluator {
    /// Create an evaluator surfacing `scope_vars` from request-local state
    /// into condition scopes.
    #[must_use]
    pub fn new(scope_vars: Vec<String>) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            scope_vars,
        }
    }

    /// Current cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let size = self.cache.read().map(|c| c.len()).unwrap_or(0);
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size,
        }
    }

    /// Evaluate `labels` for one request, returning the matched label names
    /// in declaration order.
    ///
    /// An empty label sequence short-circuits: no scope is built and no
    /// compilation happens.
    pub fn evaluate(
        &self,
        req: &RequestContext,
        operation_id: &str,
        labels: &[LabelRule],
    ) -> Result<Vec<String>, GuardError> {
        if labels.is_empty() {
            return Ok(Vec::new());
        }

        let mut scope = self.build_scope(req);
        let mut matched = Vec::with_capacity(labels.len());

        for rule in labels {
            let program = self.program(operation_id, rule)?;

            // Absent identifiers bind to the empty value, not an error.
            for ident in program.iter_variable_identifiers() {
                if scope.get_value(ident).is_none() {
                    bind(&mut scope, ident.to_string(), ExprValue::Empty);
                }
            }

            let value = program
                .eval_with_context(&scope)
                .map_err(|source| GuardError::ExpressionEval {
                    label: rule.label.clone(),
                    source,
                })?;

            match value {
                ExprValue::Boolean(true) => matched.push(rule.label.clone()),
                ExprValue::Boolean(false) => {}
                other => {
                    debug!(
                        operation_id = operation_id,
                        label = %rule.label,
                        result = %other,
                        "condition returned non-boolean; label suppressed"
                    );
                }
            }
        }

        Ok(matched)
    }

    /// Get the compiled program for `(operation, label)`, compiling and
    /// caching on first use.
    fn program(&self, operation_id: &str, rule: &LabelRule) -> Result<Arc<Node>, GuardError> {
        let key = format!("{operation_id}:{label}", label = rule.label);

        // Fast path: read lock only.
        if let Ok(cache) = self.cache.read() {
            if let Some(program) = cache.get(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Arc::clone(program));
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let program = build_operator_tree(&rule.condition).map_err(|source| {
            GuardError::ExpressionCompile {
                label: rule.label.clone(),
                source,
            }
        })?;
        let program = Arc::new(program);

        if let Ok(mut cache) = self.cache.write() {
            // Another request may have compiled the same key while we did;
            // keep the existing program so both callers observe one cache
            // entry.
            if let Some(existing) = cache.get(&key) {
                return Ok(Arc::clone(existing));
            }
            cache.insert(key.clone(), Arc::clone(&program));
            debug!(
                operation_id = operation_id,
                label = %rule.label,
                cache_key = %key,
                cache_size = cache.len(),
                "label condition compiled and cached"
            );
        }
        Ok(program)
    }

    fn build_scope(&self, req: &RequestContext) -> HashMapContext {
        let mut scope = HashMapContext::new();

        bind(
            &mut scope,
            "ctx.method".to_string(),
            ExprValue::String(req.method.to_string()),
        );
        bind(
            &mut scope,
            "ctx.path".to_string(),
            ExprValue::String(req.path.clone()),
        );
        for (name, value) in &req.headers {
            bind(
                &mut scope,
                format!("ctx.header.{name}"),
                ExprValue::String(value.clone()),
            );
        }
        for (name, value) in &req.query_params {
            bind(
                &mut scope,
                format!("ctx.query.{name}"),
                ExprValue::String(value.clone()),
            );
        }

        for var in &self.scope_vars {
            if let Some(value) = req.get(var) {
                bind_json(&mut scope, var.clone(), value);
            }
        }

        scope
    }
}

fn bind(scope: &mut HashMapContext, name: String, value: ExprValue) {
    if let Err(err) = scope.set_value(name.clone(), value) {
        warn!(identifier = %name, error = %err, "scope binding rejected; identifier skipped");
    }
}

/// Bind a JSON value under `name`, flattening objects into dotted
/// identifiers so `user = {"role": "admin"}` is reachable as `user.role`.
fn bind_json(scope: &mut HashMapContext, name: String, value: &Value) {
    match value {
        Value::Object(map) => {
            for (key, sub) in map {
                bind_json(scope, format!("{name}.{key}"), sub);
            }
        }
        other => bind(scope, name, to_expr_value(other)),
    }
}

fn to_expr_value(value: &Value) -> ExprValue {
    match value {
        Value::Null => ExprValue::Empty,
        Value::Bool(b) => ExprValue::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                ExprValue::Int(i)
            } else {
                ExprValue::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => ExprValue::String(s.clone()),
        Value::Array(items) => ExprValue::Tuple(items.iter().map(to_expr_value).collect()),
        // Nested objects inside arrays have no tuple representation; expose
        // their JSON text.
        Value::Object(_) => ExprValue::String(value.to_string()),
    }
}
