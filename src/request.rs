use crate::context::SecurityContext;
use crate::spec::OperationMeta;
use http::Method;
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;

/// Maximum inline headers/cookies before heap allocation.
/// Most requests have ≤16 headers.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header/cookie storage.
pub type HeaderVec = SmallVec<[(String, String); MAX_INLINE_HEADERS]>;

/// Transport-neutral per-request value threaded through a guard chain.
///
/// Stands in for whatever request object the surrounding HTTP framework
/// exposes: the guard reads the method, path, headers and query string from
/// it, validators may read or mutate it, and the computed
/// [`SecurityContext`] is carried on it for downstream handlers.
///
/// Header names keep the casing they arrived with; lookups through
/// [`RequestContext::get_header`] are case-insensitive.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// HTTP method
    pub method: Method,
    /// Request path without the query string
    pub path: String,
    /// HTTP headers as received
    pub headers: HeaderVec,
    /// Cookies parsed from the `Cookie` header
    pub cookies: HeaderVec,
    /// Decoded query string parameters
    pub query_params: HashMap<String, String>,
    /// Parsed JSON request body, when one was supplied
    pub body: Option<Value>,
    state: HashMap<String, Value>,
    security: Option<SecurityContext>,
    validated_operation: Option<Arc<OperationMeta>>,
}

impl RequestContext {
    /// Create a request context for `method` and `path`. A query string in
    /// `path` is split off and decoded into [`RequestContext::query_params`].
    #[must_use]
    pub fn new(method: Method, path: &str) -> Self {
        let query_params = parse_query_params(path);
        let path = match path.find('?') {
            Some(pos) => path[..pos].to_string(),
            None => path.to_string(),
        };
        Self {
            method,
            path,
            headers: HeaderVec::new(),
            cookies: HeaderVec::new(),
            query_params,
            body: None,
            state: HashMap::new(),
            security: None,
            validated_operation: None,
        }
    }

    /// Add a header, preserving its casing.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add a cookie.
    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    /// Attach a parsed JSON body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Get a header by name (case-insensitive).
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get a cookie by name.
    #[inline]
    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a query parameter by name.
    #[inline]
    #[must_use]
    pub fn get_query(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }

    /// Store a request-local value under `key`.
    ///
    /// Values stored here are the source of the scope variables surfaced to
    /// label conditions (see [`crate::LabelEvaluator`]).
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.state.insert(key.into(), value);
    }

    /// Retrieve a request-local value previously stored with
    /// [`RequestContext::set`].
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    /// The security context attached by a guard, if the request has passed
    /// one.
    #[must_use]
    pub fn security(&self) -> Option<&SecurityContext> {
        self.security.as_ref()
    }

    /// True when a security context is present and carries every requested
    /// label. Absent context and missing label are treated identically:
    /// `false`, never a panic.
    #[must_use]
    pub fn has_labels(&self, labels: &[&str]) -> bool {
        self.security
            .as_ref()
            .map(|s| s.has_labels(labels))
            .unwrap_or(false)
    }

    pub(crate) fn attach_security(&mut self, ctx: SecurityContext) {
        self.security = Some(ctx);
    }

    pub(crate) fn stash_validated_operation(&mut self, op: Arc<OperationMeta>) {
        self.validated_operation = Some(op);
    }

    pub(crate) fn validated_operation(&self) -> Option<&Arc<OperationMeta>> {
        self.validated_operation.as_ref()
    }
}

/// Parse query string parameters from a URL path.
///
/// Extracts everything after the `?` character and URL-decodes parameter
/// names and values.
#[must_use]
pub fn parse_query_params(path: &str) -> HashMap<String, String> {
    if let Some(pos) = path.find('?') {
        let query_str = &path[pos + 1..];
        url::form_urlencoded::parse(query_str.as_bytes())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    } else {
        HashMap::new()
    }
}

/// Parse the `Cookie` header value into name/value pairs.
#[must_use]
pub fn parse_cookies(header: &str) -> HeaderVec {
    header
        .split(';')
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let name = parts.next()?.trim().to_string();
            if name.is_empty() {
                return None;
            }
            let value = parts.next().unwrap_or("").trim().to_string();
            Some((name, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_is_split_off_the_path() {
        let req = RequestContext::new(Method::GET, "/users?limit=10&offset=20");
        assert_eq!(req.path, "/users");
        assert_eq!(req.get_query("limit"), Some("10"));
        assert_eq!(req.get_query("offset"), Some("20"));
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let req = RequestContext::new(Method::GET, "/").with_header("X-Role", "admin");
        assert_eq!(req.get_header("x-role"), Some("admin"));
        assert_eq!(req.get_header("X-ROLE"), Some("admin"));
        assert_eq!(req.get_header("x-missing"), None);
    }

    #[test]
    fn cookies_parse_from_header_value() {
        let cookies = parse_cookies("session=abc; theme=dark");
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0], ("session".to_string(), "abc".to_string()));
        assert_eq!(cookies[1], ("theme".to_string(), "dark".to_string()));
    }

    #[test]
    fn has_labels_without_context_is_false() {
        let req = RequestContext::new(Method::GET, "/");
        assert!(!req.has_labels(&["internal"]));
    }
}
