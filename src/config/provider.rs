use crate::constants;
use crate::error::Error;
use crate::provider::host::{Attribute, AttributeType, Block, NestedBlock};
use crate::spec::Analysis;
use regex::Regex;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::warn;

static ENDPOINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*(?::\d{1,5})?$",
    )
    .expect("hard-coded regex is valid")
});

/// Values of a configured provider block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderConfiguration {
    /// Keyed by security scheme configuration name
    pub security_values: BTreeMap<String, String>,
    /// Keyed by header configuration name
    pub header_values: BTreeMap<String, String>,
    /// Host override per resource name
    pub endpoints: BTreeMap<String, String>,
    pub region: Option<String>,
}

impl ProviderConfiguration {
    /// Reads and validates the provider block the host sent.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeConfig` when a global security value is missing, an
    /// endpoint override is not a host, or the region is not allowed.
    pub fn from_host_config(
        values: &Map<String, Value>,
        analysis: &Analysis,
    ) -> Result<Self, Error> {
        let mut config = Self::default();

        for definition in analysis.security.definitions.values() {
            let key = definition.config_name();
            match string_value(values, &key) {
                Some(value) => {
                    config.security_values.insert(key, value);
                }
                None if analysis.security.is_global(&definition.name) => {
                    return Err(Error::runtime_config(format!(
                        "missing required provider attribute '{key}'"
                    )));
                }
                None => {}
            }
        }

        for header in &analysis.headers {
            let key = header.config_name();
            if let Some(value) = string_value(values, &key) {
                config.header_values.insert(key, value);
            }
        }

        for (name, host) in endpoint_values(values.get(constants::CONFIG_ENDPOINTS)) {
            validate_endpoint(&host)?;
            if analysis.resource(&name).is_none() {
                warn!("endpoint override for unknown resource '{name}' is ignored");
                continue;
            }
            config.endpoints.insert(name, host);
        }

        config.region = string_value(values, constants::CONFIG_REGION);
        if let Some(region) = &config.region {
            let regions = analysis.backend.regions();
            if regions.is_empty() {
                return Err(Error::runtime_config(
                    "'region' is set but the API is not multi-region",
                ));
            }
            if !regions.contains(region) {
                return Err(Error::runtime_config(format!(
                    "region '{region}' is not one of the allowed regions: {}",
                    regions.join(", ")
                )));
            }
        }

        Ok(config)
    }

    #[must_use]
    pub fn security_value(&self, config_name: &str) -> Option<&str> {
        self.security_values.get(config_name).map(String::as_str)
    }

    #[must_use]
    pub fn header_value(&self, config_name: &str) -> Option<&str> {
        self.header_values.get(config_name).map(String::as_str)
    }

    #[must_use]
    pub fn endpoint(&self, resource_name: &str) -> Option<&str> {
        self.endpoints.get(resource_name).map(String::as_str)
    }

    /// Identity of the endpoints block, compared instead of the raw overrides
    #[must_use]
    pub fn endpoints_hash(&self) -> String {
        endpoints_hash(&self.endpoints)
    }

    /// Same credentials, headers and region, and an endpoints block with the same identity
    #[must_use]
    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.security_values == other.security_values
            && self.header_values == other.header_values
            && self.region == other.region
            && self.endpoints_hash() == other.endpoints_hash()
    }
}

fn string_value(values: &Map<String, Value>, key: &str) -> Option<String> {
    values
        .get(key)
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// The endpoints block arrives as an object or as a single-element list of objects
fn endpoint_values(value: Option<&Value>) -> Vec<(String, String)> {
    let object = match value {
        Some(Value::Object(map)) => Some(map),
        Some(Value::Array(items)) => items.first().and_then(Value::as_object),
        _ => None,
    };
    object
        .into_iter()
        .flat_map(|map| map.iter())
        .filter_map(|(name, host)| {
            host.as_str()
                .filter(|h| !h.is_empty())
                .map(|h| (name.clone(), h.to_string()))
        })
        .collect()
}

/// Accepts a hostname or IP with an optional `:port`; URLs are rejected.
///
/// # Errors
///
/// Returns `RuntimeConfig` naming the offending value.
pub fn validate_endpoint(value: &str) -> Result<(), Error> {
    if value.contains("://") {
        return Err(Error::runtime_config(format!(
            "endpoint '{value}' must be a host without a scheme"
        )));
    }
    if ENDPOINT.is_match(value) {
        Ok(())
    } else {
        Err(Error::runtime_config(format!(
            "endpoint '{value}' is not a valid hostname or IP"
        )))
    }
}

/// SHA-256 over the sorted `name=value` pairs, hex encoded
fn endpoints_hash(endpoints: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (name, host) in endpoints {
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(host.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

/// The provider block users fill in
#[must_use]
pub fn provider_config_schema(analysis: &Analysis) -> Block {
    let mut block = Block::default();

    for definition in analysis.security.definitions.values() {
        let attribute = Attribute::new(AttributeType::String).sensitive(true);
        let attribute = if analysis.security.is_global(&definition.name) {
            attribute.required()
        } else {
            attribute.optional()
        };
        block.attributes.insert(definition.config_name(), attribute);
    }

    for header in &analysis.headers {
        block.attributes.insert(
            header.config_name(),
            Attribute::new(AttributeType::String)
                .optional()
                .with_description(Some(format!("Value of the '{}' header", header.name))),
        );
    }

    if analysis.backend.is_multi_region() {
        block.attributes.insert(
            constants::CONFIG_REGION.to_string(),
            Attribute::new(AttributeType::String)
                .optional()
                .with_description(Some(format!(
                    "One of: {}; defaults to the first",
                    analysis.backend.regions().join(", ")
                ))),
        );
    }

    let endpoints: BTreeMap<String, Attribute> = analysis
        .resources
        .iter()
        .filter(|r| !r.should_ignore)
        .map(|r| {
            (
                r.name.clone(),
                Attribute::new(AttributeType::String).optional(),
            )
        })
        .collect();
    if !endpoints.is_empty() {
        block.blocks.insert(
            constants::CONFIG_ENDPOINTS.to_string(),
            NestedBlock {
                block: Block {
                    attributes: endpoints,
                    blocks: BTreeMap::new(),
                },
                min_items: 0,
                max_items: Some(1),
            },
        );
    }

    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_endpoint() {
        for ok in ["api.example.com", "localhost:8080", "10.0.0.1", "10.0.0.1:443", "a-b.c"] {
            assert!(validate_endpoint(ok).is_ok(), "{ok}");
        }
        for bad in ["https://api.example.com", "api.example.com/v1", "-bad.com", "host:", ""] {
            assert!(validate_endpoint(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_endpoints_hash_is_order_independent() {
        let mut a = BTreeMap::new();
        a.insert("cdns_v1".to_string(), "cdn.example.com".to_string());
        a.insert("lbs_v1".to_string(), "lb.example.com".to_string());
        let mut b = BTreeMap::new();
        b.insert("lbs_v1".to_string(), "lb.example.com".to_string());
        b.insert("cdns_v1".to_string(), "cdn.example.com".to_string());
        assert_eq!(endpoints_hash(&a), endpoints_hash(&b));
        assert_eq!(endpoints_hash(&a).len(), 64);
        assert_ne!(endpoints_hash(&a), endpoints_hash(&BTreeMap::new()));
    }

    #[test]
    fn test_equivalence_compares_endpoints_by_identity() {
        let mut a = ProviderConfiguration::default();
        a.security_values.insert("apikey_auth".to_string(), "k".to_string());
        a.endpoints.insert("cdns_v1".to_string(), "cdn.example.com".to_string());
        let b = a.clone();
        assert!(a.is_equivalent(&b));

        let mut moved = a.clone();
        moved.endpoints.insert("cdns_v1".to_string(), "cdn2.example.com".to_string());
        assert!(!a.is_equivalent(&moved));

        let mut rekeyed = a.clone();
        rekeyed.security_values.insert("apikey_auth".to_string(), "k2".to_string());
        assert!(!a.is_equivalent(&rekeyed));
    }

    #[test]
    fn test_endpoint_values_accepts_block_list() {
        let value = serde_json::json!([{"cdns_v1": "cdn.example.com", "lbs_v1": ""}]);
        assert_eq!(
            endpoint_values(Some(&value)),
            vec![("cdns_v1".to_string(), "cdn.example.com".to_string())]
        );
    }
}
