//! Request and response logging for the HTTP lifecycle engine.
//!
//! Header values are never written to the log: every header is rendered as
//! `<present>` or `<empty>` because provider-level headers routinely carry
//! credentials under arbitrary names.

use crate::constants;
use crate::spec::schema::SchemaDefinition;
use serde_json::Value;
use tracing::{debug, info, trace};

const TARGET: &str = "openapi_provider::engine";
const REDACTED: &str = "<redacted>";

/// Describes a header value without revealing it
#[must_use]
pub fn redact_header_value(value: &[u8]) -> &'static str {
    if value.is_empty() {
        "<empty>"
    } else {
        "<present>"
    }
}

/// Logs an outgoing HTTP request
pub fn log_request(
    method: &str,
    url: &str,
    headers: &reqwest::header::HeaderMap,
    body: Option<&str>,
) {
    info!(target: TARGET, "→ {} {}", method.to_uppercase(), redact_query(url));

    for (name, value) in headers {
        debug!(
            target: TARGET,
            "  {}: {}",
            name.as_str(),
            redact_header_value(value.as_bytes())
        );
    }

    if let Some(body_content) = body {
        log_body("Request body", body_content, get_max_body_len());
    }
}

/// Logs an HTTP response status and (at trace level) its body
pub fn log_response(status: u16, duration_ms: u128, body: Option<&str>) {
    info!(target: TARGET, "← {} ({}ms)", status, duration_ms);

    if let Some(body_content) = body {
        log_body("Response body", body_content, get_max_body_len());
    }
}

fn log_body(label: &str, body: &str, max_body_len: usize) {
    if body.len() > max_body_len {
        let cut = (0..=max_body_len)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        trace!(
            target: TARGET,
            "{}: {} (truncated at {} chars)",
            label,
            &body[..cut],
            max_body_len
        );
    } else {
        trace!(target: TARGET, "{}: {}", label, body);
    }
}

/// Copy of a wire body with the values of sensitive properties replaced.
///
/// Keys are matched against the wire names of `schema`; nested objects and
/// lists of objects are masked with their own schemas, and a top-level list is
/// treated as a collection of `schema` items.
#[must_use]
pub fn mask_sensitive(schema: &SchemaDefinition, body: &Value) -> Value {
    match body {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| {
                    let masked = match schema.properties.iter().find(|p| p.name == *key) {
                        Some(property) if property.sensitive && !value.is_null() => {
                            Value::String(REDACTED.to_string())
                        }
                        Some(property) => property
                            .nested
                            .as_deref()
                            .map_or_else(|| value.clone(), |nested| mask_sensitive(nested, value)),
                        None => value.clone(),
                    };
                    (key.clone(), masked)
                })
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| mask_sensitive(schema, item)).collect())
        }
        other => other.clone(),
    }
}

/// Removes query parameter values from a URL; API keys may travel in the query string
#[must_use]
pub fn redact_query(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };

    let redacted: Vec<String> = query
        .split('&')
        .map(|pair| {
            pair.split_once('=')
                .map_or_else(|| pair.to_string(), |(k, _)| format!("{k}={REDACTED}"))
        })
        .collect();

    format!("{base}?{}", redacted.join("&"))
}

/// Gets the maximum body length from the `OPENAPI_PROVIDER_LOG_MAX_BODY` environment variable
#[must_use]
pub fn get_max_body_len() -> usize {
    std::env::var(constants::ENV_LOG_MAX_BODY)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(constants::DEFAULT_LOG_MAX_BODY)
}
