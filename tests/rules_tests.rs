use http::Method;
use oasguard::{Guard, GuardError, ManualConfig, ManualGuard, PathRule, RequestContext, ValidationFn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing_util::TestTracing;

fn allow(calls: Arc<AtomicUsize>) -> ValidationFn {
    Arc::new(move |_req| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

fn deny(calls: Arc<AtomicUsize>, message: &'static str) -> ValidationFn {
    Arc::new(move |_req| {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow::anyhow!(message))
    })
}

struct Scenario {
    guard: ManualGuard,
    allow_calls: Arc<AtomicUsize>,
    deny_calls: Arc<AtomicUsize>,
    baseline_calls: Arc<AtomicUsize>,
}

/// The reference table: GET on /foo or /bar is allowed, any other method on
/// those paths hits the deny fallback, everything else hits the baseline
/// default.
fn scenario() -> Scenario {
    let allow_calls = Arc::new(AtomicUsize::new(0));
    let deny_calls = Arc::new(AtomicUsize::new(0));
    let baseline_calls = Arc::new(AtomicUsize::new(0));

    let config = ManualConfig::new()
        .rule(
            PathRule::new(["/foo", "/bar"])
                .method("GET", allow(Arc::clone(&allow_calls)))
                .fallback(deny(Arc::clone(&deny_calls), "denied")),
        )
        .default_validator(deny(Arc::clone(&baseline_calls), "baseline denied"));

    Scenario {
        guard: ManualGuard::new(config),
        allow_calls,
        deny_calls,
        baseline_calls,
    }
}

#[test]
fn get_foo_is_allowed_and_chain_proceeds() {
    let _tracing = TestTracing::init();
    let s = scenario();
    let mut req = RequestContext::new(Method::GET, "/foo");
    s.guard.check(&mut req).unwrap();
    assert_eq!(s.allow_calls.load(Ordering::SeqCst), 1);
    assert_eq!(s.deny_calls.load(Ordering::SeqCst), 0);
    assert_eq!(s.baseline_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn put_bar_hits_the_fallback_and_aborts_with_its_error() {
    let _tracing = TestTracing::init();
    let s = scenario();
    let mut req = RequestContext::new(Method::PUT, "/bar");
    let err = s.guard.check(&mut req).unwrap_err();
    assert!(matches!(err, GuardError::Rejected(_)));
    // The validator's own error comes through verbatim.
    assert_eq!(err.to_string(), "denied");
    assert_eq!(s.deny_calls.load(Ordering::SeqCst), 1);
    assert_eq!(s.allow_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn unknown_path_falls_back_to_the_default_validator() {
    let _tracing = TestTracing::init();
    let s = scenario();
    let mut req = RequestContext::new(Method::GET, "/unknown");
    let err = s.guard.check(&mut req).unwrap_err();
    assert_eq!(err.to_string(), "baseline denied");
    assert_eq!(s.baseline_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn no_decision_lets_the_request_proceed() {
    let _tracing = TestTracing::init();
    let config = ManualConfig::new().rule(
        PathRule::new(["/only-post"]).method("POST", Arc::new(|_req| Ok(()))),
    );
    let guard = ManualGuard::new(config);
    let mut req = RequestContext::new(Method::GET, "/elsewhere");
    guard.check(&mut req).unwrap();
}

#[test]
fn first_rule_with_a_usable_validator_wins_over_table_order() {
    let _tracing = TestTracing::init();
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    // The first rule matches /dual but only handles POST; the second rule
    // must decide a GET even though the first matched the path.
    let config = ManualConfig::new()
        .rule(PathRule::new(["/dual"]).method("POST", allow(Arc::clone(&first))))
        .rule(PathRule::new(["/dual"]).method("GET", allow(Arc::clone(&second))));
    let guard = ManualGuard::new(config);

    let mut req = RequestContext::new(Method::GET, "/dual");
    guard.check(&mut req).unwrap();
    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
}

#[test]
fn comma_separated_method_keys_match_all_aliases() {
    let _tracing = TestTracing::init();
    let calls = Arc::new(AtomicUsize::new(0));
    let config = ManualConfig::new()
        .rule(PathRule::new(["/x"]).method("PUT,PATCH", allow(Arc::clone(&calls))))
        .default_validator(deny(Arc::new(AtomicUsize::new(0)), "nope"));
    let guard = ManualGuard::new(config);

    let mut req = RequestContext::new(Method::PUT, "/x");
    guard.check(&mut req).unwrap();
    let mut req = RequestContext::new(Method::PATCH, "/x");
    guard.check(&mut req).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let mut req = RequestContext::new(Method::DELETE, "/x");
    assert!(guard.check(&mut req).is_err());
}

#[test]
fn base_path_applies_to_every_pattern() {
    let _tracing = TestTracing::init();
    let calls = Arc::new(AtomicUsize::new(0));
    let config = ManualConfig::new()
        .base_path("/api/v1")
        .rule(PathRule::new(["/users"]).method("GET", allow(Arc::clone(&calls))));
    let guard = ManualGuard::new(config);

    let mut req = RequestContext::new(Method::GET, "/api/v1/users");
    guard.check(&mut req).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Without the prefix nothing resolves and the request passes through.
    let mut req = RequestContext::new(Method::GET, "/users");
    guard.check(&mut req).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
