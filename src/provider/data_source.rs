//! Data sources: filtered reads of collection endpoints and by-id reads of
//! resource instances.

use crate::constants;
use crate::engine::client::{ensure_success, ApiClient, ApiRequest};
use crate::engine::payload::{extract_identifier, payload_to_state, scalar_to_string};
use crate::error::Error;
use crate::provider::host::{
    Attribute, AttributeType, Block, NestedBlock, ResourceSchema, ResourceState, Timeouts,
};
use crate::provider::resource_factory::{
    add_parent_attributes, computed_block, parent_ids, ResourceHandler,
};
use crate::spec::resource::{DataSource, Resource};
use crate::spec::schema::{PropertyType, SchemaDefinition, SchemaProperty};
use reqwest::Method;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Host schema of a filter data source: computed properties plus `filter` blocks
#[must_use]
pub fn build_data_source_schema(data_source: &DataSource) -> ResourceSchema {
    let mut block = computed_block(&data_source.schema);
    add_parent_attributes(&mut block, data_source.parents());
    block.blocks.insert(constants::FILTER_BLOCK.to_string(), filter_block());
    ResourceSchema {
        block,
        timeouts: Timeouts {
            read: data_source.get.timeout,
            ..Timeouts::default()
        },
    }
}

/// Host schema of the `<resource>_instance` data source: computed properties
/// plus the required `id` to look up
#[must_use]
pub fn build_instance_data_source_schema(resource: &Resource) -> ResourceSchema {
    let mut block = computed_block(&resource.schema);
    add_parent_attributes(&mut block, resource.parents());
    block.attributes.insert(
        constants::PROPERTY_ID.to_string(),
        Attribute::new(AttributeType::String)
            .required()
            .with_description(Some(format!("Identifier of the {} to read", resource.name))),
    );
    ResourceSchema {
        block,
        timeouts: Timeouts {
            read: resource.operations.get.timeout,
            ..Timeouts::default()
        },
    }
}

fn filter_block() -> NestedBlock {
    let mut attributes = BTreeMap::new();
    attributes.insert(
        constants::FILTER_NAME.to_string(),
        Attribute::new(AttributeType::String).required(),
    );
    attributes.insert(
        constants::FILTER_VALUES.to_string(),
        Attribute::new(AttributeType::List(Box::new(AttributeType::String))).required(),
    );
    NestedBlock {
        block: Block {
            attributes,
            blocks: BTreeMap::new(),
        },
        min_items: 0,
        max_items: None,
    }
}

/// One `filter { name, values }` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub name: String,
    pub values: Vec<String>,
}

/// Reads the filter blocks of a data source configuration.
///
/// # Errors
///
/// Returns `RuntimeConfig` for malformed blocks and for names that are not
/// primitive properties of the schema.
pub fn parse_filters(
    schema: &SchemaDefinition,
    config: &Map<String, Value>,
) -> Result<Vec<Filter>, Error> {
    let blocks = match config.get(constants::FILTER_BLOCK) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(blocks)) => blocks.as_slice(),
        Some(block @ Value::Object(_)) => std::slice::from_ref(block),
        Some(other) => {
            return Err(Error::runtime_config(format!(
                "'{}' must be a list of blocks, got {other}",
                constants::FILTER_BLOCK
            )))
        }
    };

    blocks
        .iter()
        .map(|block| {
            let name = block
                .get(constants::FILTER_NAME)
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    Error::runtime_config(format!(
                        "every '{}' block needs a '{}'",
                        constants::FILTER_BLOCK,
                        constants::FILTER_NAME
                    ))
                })?;
            let property = filterable_property(schema, name)?;
            let values = block
                .get(constants::FILTER_VALUES)
                .and_then(Value::as_array)
                .map(|values| values.iter().filter_map(scalar_to_string).collect())
                .unwrap_or_default();
            Ok(Filter {
                name: property.name.clone(),
                values,
            })
        })
        .collect()
}

fn filterable_property<'s>(
    schema: &'s SchemaDefinition,
    name: &str,
) -> Result<&'s SchemaProperty, Error> {
    let property = schema
        .properties
        .iter()
        .find(|p| p.terraform_name() == name)
        .ok_or_else(|| Error::runtime_config(format!("filter property '{name}' does not exist")))?;
    if matches!(property.property_type, PropertyType::List | PropertyType::Object) {
        return Err(Error::runtime_config(format!(
            "filter property '{name}' must be a string, number or boolean"
        )));
    }
    Ok(property)
}

fn matches_filters(item: &Map<String, Value>, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| {
        item.get(&filter.name)
            .and_then(scalar_to_string)
            .is_some_and(|value| filter.values.contains(&value))
    })
}

/// Reads a collection endpoint and selects the single item matching the filters
#[derive(Debug, Clone)]
pub struct DataSourceHandler {
    data_source: Arc<DataSource>,
}

impl DataSourceHandler {
    #[must_use]
    pub const fn new(data_source: Arc<DataSource>) -> Self {
        Self { data_source }
    }

    /// # Errors
    ///
    /// Returns `RuntimeConfig` for invalid filters or when the filters match
    /// zero or several items, and the request's errors.
    pub async fn read(
        &self,
        client: &ApiClient,
        cancel: &CancellationToken,
        config: Map<String, Value>,
    ) -> Result<ResourceState, Error> {
        let data_source = &*self.data_source;
        let filters = parse_filters(&data_source.schema, &config)?;
        let parents = parent_ids(data_source.parents(), &config)?;
        let ids: Vec<&str> = parents.iter().map(String::as_str).collect();
        let url = client
            .url_builder()
            .url(&data_source.name, &data_source.host, &data_source.path, &ids)?;

        let response = client
            .send(
                ApiRequest {
                    resource: &data_source.name,
                    method: Method::GET,
                    url: url.clone(),
                    operation: &data_source.get,
                    schema: &data_source.schema,
                    body: None,
                },
                cancel,
            )
            .await?;
        let response = ensure_success(&Method::GET, &url, response)?;
        let Some(Value::Array(items)) = response.body else {
            return Err(Error::ApiResponse {
                method: Method::GET.to_string(),
                url,
                status: response.status,
                body: "response body is not a JSON array".to_string(),
            });
        };

        let mut matching = items
            .iter()
            .filter_map(Value::as_object)
            .filter(|item| matches_filters(item, &filters));
        let (Some(item), None) = (matching.next(), matching.next()) else {
            let count = items
                .iter()
                .filter_map(Value::as_object)
                .filter(|item| matches_filters(item, &filters))
                .count();
            return Err(Error::runtime_config(format!(
                "data source '{}' expects exactly one result, the filters matched {count}",
                data_source.name
            )));
        };
        debug!("data source '{}' matched one of {} items", data_source.name, items.len());

        let id = extract_identifier(&data_source.schema, item).ok_or_else(|| Error::ApiResponse {
            method: Method::GET.to_string(),
            url: url.clone(),
            status: response.status,
            body: "matched item has no identifier".to_string(),
        })?;

        let mut attributes = payload_to_state(&data_source.schema, item, None);
        for parent in data_source.parents() {
            let key = parent.id_attribute();
            if let Some(value) = config.get(&key) {
                attributes.insert(key, value.clone());
            }
        }
        if let Some(filter) = config.get(constants::FILTER_BLOCK) {
            attributes.insert(constants::FILTER_BLOCK.to_string(), filter.clone());
        }
        Ok(ResourceState { id, attributes })
    }
}

/// Reads one resource instance by the configured `id`
#[derive(Debug, Clone)]
pub struct InstanceDataSourceHandler {
    resource: ResourceHandler,
}

impl InstanceDataSourceHandler {
    #[must_use]
    pub const fn new(resource: Arc<Resource>) -> Self {
        Self {
            resource: ResourceHandler::new(resource),
        }
    }

    /// # Errors
    ///
    /// Returns `RuntimeConfig` without an `id`, `ApiResponse` when the instance
    /// does not exist, and the request's errors.
    pub async fn read(
        &self,
        client: &ApiClient,
        cancel: &CancellationToken,
        config: Map<String, Value>,
    ) -> Result<ResourceState, Error> {
        let id = config
            .get(constants::PROPERTY_ID)
            .and_then(scalar_to_string)
            .ok_or_else(|| {
                Error::runtime_config(format!(
                    "missing required attribute '{}'",
                    constants::PROPERTY_ID
                ))
            })?;
        let parents = parent_ids(self.resource.resource().parents(), &config)?;
        let url = self.resource.instance_url(client, &parents, &id)?;

        let Some(remote) = self.resource.fetch(client, cancel, &url).await? else {
            return Err(Error::ApiResponse {
                method: Method::GET.to_string(),
                url,
                status: 404,
                body: format!(
                    "{} '{id}' does not exist",
                    self.resource.resource().name
                ),
            });
        };
        let mut state = self.resource.to_state(id, Some(&remote), &config);
        state.attributes.insert(
            constants::PROPERTY_ID.to_string(),
            Value::String(state.id.clone()),
        );
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::model::Schema;
    use crate::spec::resource::{ResourceHost, ResourceOperation, ResourceSource};
    use crate::spec::schema::SchemaCompiler;
    use indexmap::IndexMap;
    use serde_json::json;

    fn schema() -> SchemaDefinition {
        let schema: Schema = serde_json::from_value(json!({"properties": {
            "id": {"type": "string", "readOnly": true},
            "label": {"type": "string"},
            "port": {"type": "integer"},
            "tags": {"type": "array", "items": {"type": "string"}}
        }}))
        .unwrap();
        SchemaCompiler::new(&IndexMap::new())
            .compile_definition(&schema)
            .unwrap()
    }

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_data_source_schema_shape() {
        let data_source = DataSource {
            name: "cdns_v1".to_string(),
            path: "/v1/cdns".to_string(),
            schema: Arc::new(schema()),
            get: ResourceOperation::default(),
            host: ResourceHost::Global,
            source: ResourceSource::Plain,
        };
        let schema = build_data_source_schema(&data_source);
        assert!(schema.block.attribute("id").is_none());
        assert!(schema.block.attribute("label").unwrap().computed);
        let filter = &schema.block.blocks[constants::FILTER_BLOCK];
        assert!(filter.block.attribute("name").unwrap().required);
        assert_eq!(
            filter.block.attribute("values").unwrap().attr_type,
            AttributeType::List(Box::new(AttributeType::String))
        );
    }

    #[test]
    fn test_parse_filters() {
        let filters = parse_filters(
            &schema(),
            &object(json!({"filter": [
                {"name": "label", "values": ["edge"]},
                {"name": "port", "values": [443]}
            ]})),
        )
        .unwrap();
        assert_eq!(
            filters,
            vec![
                Filter {
                    name: "label".to_string(),
                    values: vec!["edge".to_string()],
                },
                Filter {
                    name: "port".to_string(),
                    values: vec!["443".to_string()],
                },
            ]
        );
        assert!(parse_filters(&schema(), &Map::new()).unwrap().is_empty());
        for name in ["tags", "nope"] {
            let config = object(json!({"filter": [{"name": name, "values": []}]}));
            assert!(parse_filters(&schema(), &config).is_err(), "{name}");
        }
    }

    #[test]
    fn test_matches_filters() {
        let filters = vec![Filter {
            name: "port".to_string(),
            values: vec!["80".to_string(), "443".to_string()],
        }];
        assert!(matches_filters(&object(json!({"port": 443})), &filters));
        assert!(!matches_filters(&object(json!({"port": 8080})), &filters));
        assert!(!matches_filters(&object(json!({})), &filters));
        assert!(matches_filters(&object(json!({})), &[]));
    }
}
