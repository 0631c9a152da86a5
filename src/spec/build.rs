use super::types::{OperationMeta, ParameterLocation, ParameterMeta, VENDOR_EXTENSION_KEY};
use oas3::spec::{ObjectOrReference, Parameter};
use oas3::OpenApiV3Spec;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Resolve a JSON Schema `$ref` to the actual schema definition.
pub fn resolve_schema_ref<'a>(
    spec: &'a OpenApiV3Spec,
    ref_path: &str,
) -> Option<&'a oas3::spec::ObjectSchema> {
    if let Some(name) = ref_path.strip_prefix("#/components/schemas/") {
        spec.components
            .as_ref()?
            .schemas
            .get(name)
            .and_then(|schema_ref| match schema_ref {
                ObjectOrReference::Object(schema) => Some(schema),
                _ => None,
            })
    } else {
        None
    }
}

/// Recursively replace `$ref` objects with their resolved definitions so the
/// stored schemas are self-contained for the validator.
fn expand_schema_refs(spec: &OpenApiV3Spec, value: &mut Value) {
    match value {
        Value::Object(obj) => {
            if let Some(ref_path) = obj.get("$ref").and_then(|v| v.as_str()) {
                if let Some(schema) = resolve_schema_ref(spec, ref_path) {
                    if let Ok(mut new_val) = serde_json::to_value(schema) {
                        expand_schema_refs(spec, &mut new_val);
                        *value = new_val;
                        return;
                    }
                }
            }
            for v in obj.values_mut() {
                expand_schema_refs(spec, v);
            }
        }
        Value::Array(arr) => {
            for v in arr.iter_mut() {
                expand_schema_refs(spec, v);
            }
        }
        _ => {}
    }
}

fn resolve_parameter_ref<'a>(
    spec: &'a OpenApiV3Spec,
    ref_path: &str,
) -> Option<&'a oas3::spec::Parameter> {
    if let Some(name) = ref_path.strip_prefix("#/components/parameters/") {
        spec.components
            .as_ref()?
            .parameters
            .get(name)
            .and_then(|param_ref| match param_ref {
                ObjectOrReference::Object(param) => Some(param),
                _ => None,
            })
    } else {
        None
    }
}

/// Extract parameter metadata, resolving references and keeping the name,
/// location, required flag and schema that request validation needs.
pub fn extract_parameters(
    spec: &OpenApiV3Spec,
    params: &Vec<ObjectOrReference<Parameter>>,
) -> Vec<ParameterMeta> {
    let mut out = Vec::new();
    for p in params {
        let param = match p {
            ObjectOrReference::Object(obj) => Some(obj),
            ObjectOrReference::Ref { ref_path, .. } => resolve_parameter_ref(spec, ref_path),
        };

        if let Some(param) = param {
            let schema = param.schema.as_ref().and_then(|s| match s {
                ObjectOrReference::Object(obj) => serde_json::to_value(obj).ok(),
                ObjectOrReference::Ref { ref_path, .. } => resolve_schema_ref(spec, ref_path)
                    .and_then(|sch| serde_json::to_value(sch).ok()),
            });

            out.push(ParameterMeta {
                name: param.name.clone(),
                location: ParameterLocation::from(param.location),
                required: param.required.unwrap_or(false),
                schema,
            });
        }
    }
    out
}

/// Extract the `application/json` request body schema and whether the body
/// is required.
fn extract_request_schema(
    spec: &OpenApiV3Spec,
    operation: &oas3::spec::Operation,
) -> (Option<Value>, bool) {
    let mut required = false;
    let mut schema = operation.request_body.as_ref().and_then(|r| match r {
        ObjectOrReference::Object(req_body) => {
            required = req_body.required.unwrap_or(false);
            req_body.content.get("application/json").and_then(|media| {
                match media.schema.as_ref()? {
                    ObjectOrReference::Object(schema_obj) => serde_json::to_value(schema_obj).ok(),
                    ObjectOrReference::Ref { ref_path, .. } => resolve_schema_ref(spec, ref_path)
                        .and_then(|s| serde_json::to_value(s).ok()),
                }
            })
        }
        _ => None,
    });
    if let Some(ref mut val) = schema {
        expand_schema_refs(spec, val);
    }
    (schema, required)
}

/// Extract per-status `application/json` response schemas.
fn extract_response_schemas(
    spec: &OpenApiV3Spec,
    operation: &oas3::spec::Operation,
) -> HashMap<u16, Value> {
    let mut out = HashMap::new();
    if let Some(responses_map) = operation.responses.as_ref() {
        for (status_str, resp_ref) in responses_map {
            let status: u16 = match status_str.parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            if let ObjectOrReference::Object(resp_obj) = resp_ref {
                let schema = resp_obj.content.get("application/json").and_then(|media| {
                    match media.schema.as_ref()? {
                        ObjectOrReference::Object(schema_obj) => {
                            serde_json::to_value(schema_obj).ok()
                        }
                        ObjectOrReference::Ref { ref_path, .. } => {
                            resolve_schema_ref(spec, ref_path)
                                .and_then(|s| serde_json::to_value(s).ok())
                        }
                    }
                });
                if let Some(mut val) = schema {
                    expand_schema_refs(spec, &mut val);
                    out.insert(status, val);
                }
            }
        }
    }
    out
}

fn extract_base_path(spec: &OpenApiV3Spec) -> String {
    if let Some(server) = spec.servers.first() {
        let url_str = &server.url;
        url::Url::parse(url_str)
            .or_else(|_| url::Url::parse(&format!("http://dummy{url_str}")))
            .map(|u| {
                let p = u.path().trim_end_matches('/');
                if p == "/" || p.is_empty() {
                    String::new()
                } else {
                    p.to_string()
                }
            })
            .unwrap_or_default()
    } else {
        String::new()
    }
}

/// Derive a stable id for operations the document leaves unnamed, so they
/// still occupy the routing table and can key the schema cache.
fn derive_operation_id(method: &http::Method, path: &str) -> String {
    let mut id = method.as_str().to_ascii_lowercase();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        id.push('_');
        id.push_str(segment.trim_start_matches('{').trim_end_matches('}'));
    }
    id
}

/// Build the operation table for all operations in a specification.
///
/// Operations without an `operationId` get one derived from their method and
/// path; every documented operation is routable whether the document names
/// it or not.
pub fn build_operations(spec: &OpenApiV3Spec) -> anyhow::Result<Vec<OperationMeta>> {
    let mut operations = Vec::new();
    let base_path = extract_base_path(spec);

    if let Some(paths_map) = spec.paths.as_ref() {
        for (path, item) in paths_map {
            for (method, operation) in item.methods() {
                let operation_id = operation.operation_id.clone().unwrap_or_else(|| {
                    let derived = derive_operation_id(&method, path);
                    debug!(
                        path = %path,
                        method = %method,
                        operation_id = %derived,
                        "operation without operationId; id derived"
                    );
                    derived
                });

                let (request_schema, request_body_required) =
                    extract_request_schema(spec, operation);
                let response_schemas = extract_response_schemas(spec, operation);

                let mut parameters = Vec::new();
                parameters.extend(extract_parameters(spec, &item.parameters));
                parameters.extend(extract_parameters(spec, &operation.parameters));

                // oas3 stores extension keys with the "x-" prefix trimmed.
                let policy = operation
                    .extensions
                    .get(VENDOR_EXTENSION_KEY.trim_start_matches("x-"))
                    .or_else(|| operation.extensions.get(VENDOR_EXTENSION_KEY))
                    .cloned();

                operations.push(OperationMeta {
                    operation_id,
                    method: method.clone(),
                    path_pattern: path.clone(),
                    base_path: base_path.clone(),
                    parameters,
                    request_schema,
                    request_body_required,
                    response_schemas,
                    policy,
                });
            }
        }
    }

    Ok(operations)
}
