use flate2::write::GzEncoder;
use flate2::Compression;
use http::Method;
use oasguard::{Guard, GuardError, OApiConfig, OApiGuard, OpValidationFn, RequestContext};
use serde_json::json;
use std::collections::HashMap;
use std::io::Write as _;
use std::sync::Arc;

use tracing_util::TestTracing;

const OPENAPI: &str = r#"
openapi: 3.0.1
info:
  title: Test
  version: v1
servers:
  - url: http://localhost:8080/api/v1
paths:
  "/compute/groups":
    post:
      operationId: computeGroups
      parameters:
        - name: foo
          in: query
          required: true
          schema:
            type: string
      requestBody:
        content:
          application/json:
            schema:
              required:
                - bar
              properties:
                bar:
                  type: string
      responses:
        '200':
          description: groups created
      x-oasguard:
        function: do_stuff
        params:
          - great
  "/open":
    get:
      operationId: openEndpoint
      responses:
        '200':
          description: ok
  "/health":
    get:
      responses:
        '200':
          description: ok
"#;

fn do_stuff_registry() -> HashMap<String, OpValidationFn> {
    let mut validators: HashMap<String, OpValidationFn> = HashMap::new();
    validators.insert(
        "do_stuff".to_string(),
        Arc::new(|req, params| {
            req.set("caught", json!(true));
            req.set("param", json!(params.first().cloned()));
            Ok(())
        }),
    );
    validators
}

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

#[test]
fn dispatch_invokes_the_named_validator_with_declared_params() {
    let _tracing = TestTracing::init();
    let config = OApiConfig::new(OPENAPI.as_bytes(), do_stuff_registry(), false).unwrap();
    let guard = OApiGuard::new(config);

    let mut req = RequestContext::new(Method::POST, "/api/v1/compute/groups");
    guard.check(&mut req).unwrap();

    assert_eq!(req.get("caught"), Some(&json!(true)));
    assert_eq!(req.get("param"), Some(&json!("great")));

    let security = req.security().expect("security context attached");
    assert_eq!(security.policy.function, "do_stuff");
    assert_eq!(security.policy.params, vec!["great"]);
    assert!(security.labels.is_empty());
}

#[test]
fn gzipped_specification_bytes_load_transparently() {
    let _tracing = TestTracing::init();
    let compressed = gzip(OPENAPI.as_bytes());
    let config = OApiConfig::new(&compressed, do_stuff_registry(), false).unwrap();
    let guard = OApiGuard::new(config);

    let mut req = RequestContext::new(Method::POST, "/api/v1/compute/groups");
    guard.check(&mut req).unwrap();
    assert_eq!(req.get("caught"), Some(&json!(true)));
}

#[test]
fn unmatched_request_is_route_not_found() {
    let _tracing = TestTracing::init();
    let config = OApiConfig::new(OPENAPI.as_bytes(), do_stuff_registry(), false).unwrap();
    let guard = OApiGuard::new(config);

    let mut req = RequestContext::new(Method::GET, "/api/v1/compute/groups");
    let err = guard.check(&mut req).unwrap_err();
    assert!(matches!(err, GuardError::RouteNotFound { .. }));

    let mut req = RequestContext::new(Method::POST, "/compute/groups");
    let err = guard.check(&mut req).unwrap_err();
    assert!(matches!(err, GuardError::RouteNotFound { .. }));
}

#[test]
fn operation_without_policy_passes_through() {
    let _tracing = TestTracing::init();
    let config = OApiConfig::new(OPENAPI.as_bytes(), do_stuff_registry(), false).unwrap();
    let guard = OApiGuard::new(config);

    let mut req = RequestContext::new(Method::GET, "/api/v1/open");
    guard.check(&mut req).unwrap();
    assert!(req.security().is_none());
}

#[test]
fn operation_without_id_still_routes_and_passes_through() {
    let _tracing = TestTracing::init();
    let config = OApiConfig::new(OPENAPI.as_bytes(), do_stuff_registry(), false).unwrap();
    let guard = OApiGuard::new(config);

    // /health carries neither an operationId nor a policy; it is documented,
    // so it must resolve and proceed untouched rather than 404.
    let mut req = RequestContext::new(Method::GET, "/api/v1/health");
    guard.check(&mut req).unwrap();
    assert!(req.security().is_none());
}

#[test]
fn unregistered_function_is_a_configuration_error() {
    let _tracing = TestTracing::init();
    let config = OApiConfig::new(OPENAPI.as_bytes(), HashMap::new(), false).unwrap();
    let guard = OApiGuard::new(config);

    let mut req = RequestContext::new(Method::POST, "/api/v1/compute/groups");
    let err = guard.check(&mut req).unwrap_err();
    assert!(matches!(
        err,
        GuardError::ValidatorNotRegistered { ref function } if function == "do_stuff"
    ));
}

#[test]
fn malformed_metadata_is_a_local_configuration_error() {
    let _tracing = TestTracing::init();
    // `function` must be a string.
    let doc = OPENAPI.replace("function: do_stuff", "function: [1, 2]");
    let config = OApiConfig::new(doc.as_bytes(), do_stuff_registry(), false).unwrap();
    let guard = OApiGuard::new(config);

    let mut req = RequestContext::new(Method::POST, "/api/v1/compute/groups");
    let err = guard.check(&mut req).unwrap_err();
    assert!(matches!(err, GuardError::MetadataDecode { .. }));
    assert!(err.to_string().contains("local configuration error"));
}

#[test]
fn validator_rejection_aborts_before_any_label_work() {
    let _tracing = TestTracing::init();
    let mut validators: HashMap<String, OpValidationFn> = HashMap::new();
    validators.insert(
        "do_stuff".to_string(),
        Arc::new(|_req, _params| Err(anyhow::anyhow!("credentials missing"))),
    );
    let config = OApiConfig::new(OPENAPI.as_bytes(), validators, false).unwrap();
    let guard = OApiGuard::new(config);

    let mut req = RequestContext::new(Method::POST, "/api/v1/compute/groups");
    let err = guard.check(&mut req).unwrap_err();
    assert_eq!(err.to_string(), "credentials missing");
    assert!(req.security().is_none());
    // Nothing was compiled for this request.
    let stats = guard.label_cache_stats();
    assert_eq!(stats.misses, 0);
    assert_eq!(stats.size, 0);
}
