use crate::constants;
use crate::error::Error;
use crate::spec::model::SwaggerDocument;
use serde_json::{Map, Value};
use std::time::Duration;

/// Determines if the input string is a URL (starts with http:// or https://)
#[must_use]
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Loads an `OpenAPI` document from a local path or a URL and expands its references.
///
/// # Errors
///
/// Returns `DocumentLoad` when the document cannot be fetched, read or parsed and
/// `DocumentValidation` when it is not a Swagger 2.0 document.
pub async fn load_document(
    location: &str,
    insecure_skip_verify: bool,
) -> Result<SwaggerDocument, Error> {
    if location.trim().is_empty() {
        return Err(Error::document_load(location, "document location is empty"));
    }

    let content = if is_url(location) {
        fetch_document(location, insecure_skip_verify, Duration::from_secs(30)).await?
    } else {
        let path = shellexpand::tilde(location);
        tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| Error::document_load(location, e.to_string()))?
    };

    parse_document(&content, location)
}

async fn fetch_document(
    url: &str,
    insecure_skip_verify: bool,
    timeout: Duration,
) -> Result<String, Error> {
    crate::engine::client::install_crypto_provider();

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(insecure_skip_verify)
        .build()
        .map_err(|e| Error::document_load(url, format!("failed to create HTTP client: {e}")))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Error::document_load(
                url,
                format!("request timed out after {} seconds", timeout.as_secs()),
            )
        } else {
            Error::document_load(url, format!("network error: {e}"))
        }
    })?;

    if !response.status().is_success() {
        return Err(Error::document_load(
            url,
            format!("HTTP {}", response.status()),
        ));
    }

    if let Some(content_length) = response.content_length() {
        if content_length > constants::MAX_DOCUMENT_SIZE {
            return Err(Error::document_load(
                url,
                format!(
                    "document too large: {content_length} bytes (max {} bytes)",
                    constants::MAX_DOCUMENT_SIZE
                ),
            ));
        }
    }

    response
        .text()
        .await
        .map_err(|e| Error::document_load(url, format!("failed to read response body: {e}")))
}

/// Parses JSON or YAML content into a Swagger 2.0 document with every local `$ref` expanded.
///
/// Cyclic references are left in place as `$ref` nodes.
///
/// # Errors
///
/// Returns `DocumentLoad` for syntax errors and unresolvable references,
/// `DocumentValidation` for `OpenAPI` v3 documents or unknown versions.
pub fn parse_document(content: &str, location: &str) -> Result<SwaggerDocument, Error> {
    let mut raw = if content.trim_start().starts_with('{') {
        serde_json::from_str::<Value>(content)
            .map_err(|e| Error::document_load(location, e.to_string()))?
    } else {
        let yaml: serde_yaml::Value = serde_yaml::from_str(content)
            .map_err(|e| Error::document_load(location, e.to_string()))?;
        yaml_to_json(yaml)
    };

    if let Some(version) = raw.get("openapi") {
        return Err(reject_openapi_v3(raw.clone(), version, location));
    }

    // `swagger: 2.0` written without quotes arrives as a number
    let version = match raw.get("swagger") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    match version.as_deref() {
        Some(constants::SWAGGER_VERSION_2) => {
            if let Value::Object(map) = &mut raw {
                map.insert(
                    "swagger".to_string(),
                    Value::String(constants::SWAGGER_VERSION_2.to_string()),
                );
            }
        }
        Some(other) => {
            return Err(Error::document_validation(format!(
                "unsupported swagger version '{other}', expected '{}'",
                constants::SWAGGER_VERSION_2
            )))
        }
        None => {
            return Err(Error::document_validation(
                "missing 'swagger' version field",
            ))
        }
    }

    let expanded = expand_refs(&raw).map_err(|reason| Error::document_load(location, reason))?;

    serde_json::from_value(expanded).map_err(|e| Error::document_load(location, e.to_string()))
}

/// `OpenAPI` v3 is recognised but not supported; parsing it still gives a precise error
fn reject_openapi_v3(raw: Value, version: &Value, location: &str) -> Error {
    match serde_json::from_value::<openapiv3::OpenAPI>(raw) {
        Ok(spec) => Error::document_validation(format!(
            "OpenAPI {} documents are not supported, only Swagger 2.0 is",
            spec.openapi
        )),
        Err(e) => Error::document_load(
            location,
            format!("invalid OpenAPI {version} document: {e}"),
        ),
    }
}

fn yaml_to_json(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map_or(Value::Null, Value::Number)
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => {
            Value::Array(items.into_iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, value) in mapping {
                // Response codes are commonly written as bare integers
                let key = match key {
                    serde_yaml::Value::String(s) => s,
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    other => serde_yaml::to_string(&other)
                        .map(|s| s.trim().to_string())
                        .unwrap_or_default(),
                };
                map.insert(key, yaml_to_json(value));
            }
            Value::Object(map)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

/// Expands every local `$ref` in the document.
///
/// Sibling keys next to a `$ref` are overlaid on the resolved target so that
/// property-level extensions survive expansion.
///
/// # Errors
///
/// Returns the reason when a reference is remote or does not resolve.
pub fn expand_refs(root: &Value) -> Result<Value, String> {
    let mut stack = Vec::new();
    expand_node(root, root, &mut stack)
}

fn expand_node(node: &Value, root: &Value, stack: &mut Vec<String>) -> Result<Value, String> {
    match node {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get(constants::REF_KEY) {
                if stack.contains(reference) {
                    return Ok(node.clone());
                }

                let target = resolve_pointer(root, reference)?;
                stack.push(reference.clone());
                let expanded = expand_node(target, root, stack);
                stack.pop();
                let expanded = expanded?;

                let siblings: Vec<(&String, &Value)> = map
                    .iter()
                    .filter(|(key, _)| key.as_str() != constants::REF_KEY)
                    .collect();
                if siblings.is_empty() {
                    return Ok(expanded);
                }

                let Value::Object(mut merged) = expanded else {
                    return Ok(expanded);
                };
                for (key, value) in siblings {
                    merged.insert(key.clone(), expand_node(value, root, stack)?);
                }
                return Ok(Value::Object(merged));
            }

            let mut expanded = Map::new();
            for (key, value) in map {
                expanded.insert(key.clone(), expand_node(value, root, stack)?);
            }
            Ok(Value::Object(expanded))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| expand_node(item, root, stack))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

fn resolve_pointer<'a>(root: &'a Value, reference: &str) -> Result<&'a Value, String> {
    let Some(pointer) = reference.strip_prefix('#') else {
        return Err(format!("remote reference '{reference}' is not supported"));
    };
    root.pointer(pointer)
        .ok_or_else(|| format!("missing schema for ref {reference}"))
}
