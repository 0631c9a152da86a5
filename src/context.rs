use crate::spec::SecurityPolicy;

/// Security decision attached to a request after its validator succeeded.
///
/// The guard attaches this value twice: once with `labels` empty immediately
/// after the named validator returns success, and again once label evaluation
/// has completed. Downstream code retrieves it unchanged through
/// [`crate::RequestContext::security`] for the rest of the request's
/// lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityContext {
    /// The decoded per-operation policy that authorized this request
    pub policy: SecurityPolicy,
    /// Labels whose conditions evaluated to `true`, in declaration order
    pub labels: Vec<String>,
}

impl SecurityContext {
    /// True when every requested label was computed for this request.
    #[must_use]
    pub fn has_labels(&self, labels: &[&str]) -> bool {
        labels
            .iter()
            .all(|l| self.labels.iter().any(|have| have == l))
    }
}
