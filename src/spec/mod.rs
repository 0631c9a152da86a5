//! OpenAPI document loading and per-operation policy extraction.
//!
//! The guard does not interpret the whole specification: it loads the
//! document (plain or gzip-compressed bytes), walks every path/method
//! operation, and keeps just what authorization needs — the operation id,
//! the path template, parameter and body schemas for optional contract
//! validation, and the raw `x-oasguard` vendor extension that carries the
//! declarative security policy for that operation.

mod build;
mod load;
mod types;

pub use build::{build_operations, extract_parameters, resolve_schema_ref};
pub use load::{is_gzipped, load_document};
pub use types::{
    LabelRule, OperationMeta, ParameterLocation, ParameterMeta, SecurityPolicy,
    VENDOR_EXTENSION_KEY,
};
