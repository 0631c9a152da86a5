//! Specification router: resolves a request to an operation.
//!
//! Path templates from the document are compiled once, at construction, into
//! anchored regexes with one capture per `{param}` segment. Resolution is a
//! first-match scan in document order; the table is read-only after
//! construction and safe to share across concurrent requests.

use crate::spec::OperationMeta;
use http::Method;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of successfully matching a request to an operation.
#[derive(Debug, Clone)]
pub struct OperationMatch {
    /// The matched operation (shared, not cloned per request)
    pub operation: Arc<OperationMeta>,
    /// Path parameters extracted from the URL (e.g. `{id}` → `"123"`)
    pub path_params: HashMap<String, String>,
}

/// Matches requests against the operation table built from a specification.
#[derive(Clone)]
pub struct OperationRouter {
    routes: Vec<(Method, Regex, Arc<OperationMeta>, Vec<String>)>,
    base_path: String,
}

impl OperationRouter {
    /// Build a router from operation metadata.
    #[must_use]
    pub fn new(operations: Vec<OperationMeta>) -> Self {
        let base_path = operations
            .first()
            .map(|op| op.base_path.clone())
            .unwrap_or_default();

        let routes: Vec<_> = operations
            .into_iter()
            .filter_map(|op| {
                let full_path = format!("{}{}", op.base_path, op.path_pattern);
                let (regex, param_names) = match path_to_regex(&full_path) {
                    Some(compiled) => compiled,
                    None => {
                        tracing::error!(
                            operation_id = %op.operation_id,
                            path = %full_path,
                            "path template did not compile; operation unreachable"
                        );
                        return None;
                    }
                };
                Some((op.method.clone(), regex, Arc::new(op), param_names))
            })
            .collect();

        info!(
            operations_count = routes.len(),
            base_path = %base_path,
            "operation table loaded"
        );

        Self { routes, base_path }
    }

    /// The path prefix shared by every operation, from the document's first
    /// `servers` entry.
    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Resolve a request to an operation. Returns `None` when nothing in the
    /// table matches the method and path.
    #[must_use]
    pub fn resolve(&self, method: &Method, path: &str) -> Option<OperationMatch> {
        debug!(method = %method, path = %path, "operation match attempt");

        for (route_method, regex, operation, param_names) in &self.routes {
            if route_method != method {
                continue;
            }
            if let Some(caps) = regex.captures(path) {
                let path_params: HashMap<String, String> = param_names
                    .iter()
                    .zip(caps.iter().skip(1))
                    .filter_map(|(name, m)| m.map(|m| (name.clone(), m.as_str().to_string())))
                    .collect();
                debug!(
                    method = %method,
                    path = %path,
                    operation_id = %operation.operation_id,
                    path_params = ?path_params,
                    "operation matched"
                );
                return Some(OperationMatch {
                    operation: Arc::clone(operation),
                    path_params,
                });
            }
        }

        debug!(method = %method, path = %path, "no operation matched");
        None
    }
}

/// Compile a path template to an anchored regex plus its parameter names.
/// `{seg}` segments match exactly one path segment; literal segments are
/// escaped.
fn path_to_regex(path: &str) -> Option<(Regex, Vec<String>)> {
    if path == "/" {
        return Regex::new(r"^/$").ok().map(|re| (re, Vec::new()));
    }

    let mut pattern = String::with_capacity(path.len() + 5);
    pattern.push('^');
    let mut param_names = Vec::with_capacity(path.matches('{').count());

    for segment in path.split('/') {
        if segment.starts_with('{') && segment.ends_with('}') {
            let param_name = segment
                .trim_start_matches('{')
                .trim_end_matches('}')
                .to_string();
            pattern.push_str("/([^/]+)");
            param_names.push(param_name);
        } else if !segment.is_empty() {
            pattern.push('/');
            pattern.push_str(&regex::escape(segment));
        }
    }

    pattern.push('$');
    Regex::new(&pattern).ok().map(|re| (re, param_names))
}
