use anyhow::Context as _;
use flate2::read::GzDecoder;
use oas3::OpenApiV3Spec;
use std::io::Read;

/// True when the byte sequence starts with the gzip magic prefix.
#[must_use]
pub fn is_gzipped(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}

/// Drop non-HTTP keys from path items before the typed decode.
///
/// Specs in the wild carry tooling keys under a path item that the `oas3`
/// model rejects. Vendor extensions (`x-`) are kept.
fn strip_unknown_verbs(val: &mut serde_json::Value) {
    const METHODS: [&str; 8] = [
        "get", "post", "put", "delete", "patch", "options", "head", "trace",
    ];

    if let Some(serde_json::Value::Object(paths_map)) = val.get_mut("paths") {
        for item in paths_map.values_mut() {
            if let serde_json::Value::Object(obj) = item {
                let keys: Vec<String> = obj.keys().cloned().collect();
                for k in keys {
                    let lk = k.to_ascii_lowercase();
                    let keep = match lk.as_str() {
                        "summary" | "description" | "servers" | "parameters" | "$ref" => true,
                        m if METHODS.contains(&m) => true,
                        _ => k.starts_with("x-"),
                    };
                    if !keep {
                        obj.remove(&k);
                    }
                }
            }
        }
    }
}

/// Parse an OpenAPI document from raw bytes.
///
/// The bytes may be gzip-compressed (detected by the two-byte magic prefix)
/// or plain; decompression is transparent. YAML and JSON sources are both
/// accepted.
pub fn load_document(bytes: &[u8]) -> anyhow::Result<OpenApiV3Spec> {
    let inflated;
    let text: &[u8] = if is_gzipped(bytes) {
        let mut decoder = GzDecoder::new(bytes);
        let mut buf = Vec::new();
        decoder
            .read_to_end(&mut buf)
            .context("failed to inflate gzipped OpenAPI document")?;
        inflated = buf;
        &inflated
    } else {
        bytes
    };

    let mut value: serde_json::Value =
        serde_yaml::from_slice(text).context("failed to parse OpenAPI document")?;
    strip_unknown_verbs(&mut value);
    let spec: OpenApiV3Spec =
        serde_json::from_value(value).context("invalid OpenAPI document")?;
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_unknown_verbs() {
        let mut v = json!({
            "paths": {
                "/x": { "get": {}, "patch": {}, "unknown": {}, "x-oasguard": {} }
            }
        });
        strip_unknown_verbs(&mut v);
        assert!(v["paths"]["/x"].get("unknown").is_none());
        assert!(v["paths"]["/x"].get("get").is_some());
        assert!(v["paths"]["/x"].get("x-oasguard").is_some());
    }

    #[test]
    fn gzip_prefix_detection() {
        assert!(is_gzipped(&[0x1f, 0x8b, 0x08]));
        assert!(!is_gzipped(b"openapi: 3.0.1"));
        assert!(!is_gzipped(&[0x1f]));
    }

    #[test]
    fn plain_yaml_document_loads() {
        let doc = b"openapi: 3.0.1\ninfo:\n  title: Test\n  version: v1\npaths: {}\n";
        let spec = load_document(doc).unwrap();
        assert_eq!(spec.info.title, "Test");
    }
}
