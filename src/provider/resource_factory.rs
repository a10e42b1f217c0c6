//! Host schemas for compiled resources and the CRUD handlers bound to them.

use crate::constants;
use crate::engine::client::{ensure_success, ApiClient, ApiRequest, ApiResponse};
use crate::engine::payload::{
    extract_identifier, extract_status, payload_to_state, scalar_to_string, state_to_payload,
};
use crate::engine::polling::{wait_for_status, PollSpec};
use crate::error::Error;
use crate::provider::host::{
    Attribute, AttributeType, Block, ResourceSchema, ResourceState, Timeouts,
};
use crate::spec::resource::{ParentInfo, Resource, ResourceOperation};
use crate::spec::schema::{PropertyType, SchemaDefinition, SchemaProperty};
use reqwest::Method;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Host schema of a resource.
///
/// The top-level `id` property is left to the host. Without a PUT every input
/// forces replacement.
#[must_use]
pub fn build_resource_schema(resource: &Resource) -> ResourceSchema {
    let replace_on_change = !resource.is_updatable();
    let mut block = Block::default();

    for property in &resource.schema.properties {
        let name = property.terraform_name();
        if name == constants::PROPERTY_ID {
            continue;
        }
        block
            .attributes
            .insert(name, property_attribute(property, replace_on_change));
    }
    add_parent_attributes(&mut block, resource.parents());

    let operations = &resource.operations;
    ResourceSchema {
        block,
        timeouts: Timeouts {
            create: operations.post.timeout,
            read: operations.get.timeout,
            update: operations.put.as_ref().and_then(|op| op.timeout),
            delete: operations.delete.as_ref().and_then(|op| op.timeout),
        },
    }
}

/// Required, replace-on-change `<parent>_id` attributes of a sub-resource
pub(crate) fn add_parent_attributes(block: &mut Block, parents: &[ParentInfo]) {
    for parent in parents {
        block.attributes.insert(
            parent.id_attribute(),
            Attribute::new(AttributeType::String)
                .required()
                .force_new(true)
                .with_description(Some(format!(
                    "Identifier of the parent {}",
                    parent.resource_name
                ))),
        );
    }
}

fn property_attribute(property: &SchemaProperty, replace_on_change: bool) -> Attribute {
    let attribute = Attribute::new(attribute_type(property, replace_on_change))
        .with_description(property.description.clone())
        .sensitive(property.sensitive);

    if property.read_only {
        return attribute.computed();
    }

    let attribute = if property.required {
        attribute.required()
    } else if property.is_optional_computed() {
        attribute.optional().computed()
    } else {
        attribute.optional()
    };
    attribute
        .force_new(property.force_new || property.immutable || replace_on_change)
        .with_default(property.default.clone())
}

fn attribute_type(property: &SchemaProperty, replace_on_change: bool) -> AttributeType {
    match property.property_type {
        PropertyType::List => {
            let item = match (property.item_type, property.nested.as_deref()) {
                (Some(PropertyType::Object), Some(nested)) => {
                    AttributeType::Object(nested_block(nested, replace_on_change))
                }
                (Some(item), _) => scalar_type(item),
                (None, _) => AttributeType::String,
            };
            AttributeType::List(Box::new(item))
        }
        PropertyType::Object => AttributeType::Object(
            property
                .nested
                .as_deref()
                .map(|nested| nested_block(nested, replace_on_change))
                .unwrap_or_default(),
        ),
        other => scalar_type(other),
    }
}

const fn scalar_type(property_type: PropertyType) -> AttributeType {
    match property_type {
        PropertyType::Integer => AttributeType::Int,
        PropertyType::Number => AttributeType::Float,
        PropertyType::Bool => AttributeType::Bool,
        _ => AttributeType::String,
    }
}

fn nested_block(schema: &SchemaDefinition, replace_on_change: bool) -> Block {
    Block {
        attributes: schema
            .properties
            .iter()
            .map(|p| (p.terraform_name(), property_attribute(p, replace_on_change)))
            .collect(),
        blocks: std::collections::BTreeMap::new(),
    }
}

/// Computed-only block: every property of `schema` except the top-level `id`
pub(crate) fn computed_block(schema: &SchemaDefinition) -> Block {
    let mut block = Block::default();
    for property in &schema.properties {
        let name = property.terraform_name();
        if name == constants::PROPERTY_ID {
            continue;
        }
        let mut attribute = property_attribute(property, false);
        attribute.required = false;
        attribute.optional = false;
        attribute.force_new = false;
        attribute.default = None;
        block.attributes.insert(name, attribute.computed());
    }
    block
}

/// Identifiers of a resource's parents, read from host attributes
///
/// # Errors
///
/// Returns `RuntimeConfig` naming the first missing parent attribute.
pub(crate) fn parent_ids(
    parents: &[ParentInfo],
    attributes: &Map<String, Value>,
) -> Result<Vec<String>, Error> {
    parents
        .iter()
        .map(|parent| {
            let attribute = parent.id_attribute();
            attributes
                .get(&attribute)
                .and_then(scalar_to_string)
                .ok_or_else(|| {
                    Error::runtime_config(format!("missing required attribute '{attribute}'"))
                })
        })
        .collect()
}

/// CRUD operations of one resource, executed through a shared [`ApiClient`]
#[derive(Debug, Clone)]
pub struct ResourceHandler {
    resource: Arc<Resource>,
}

impl ResourceHandler {
    #[must_use]
    pub const fn new(resource: Arc<Resource>) -> Self {
        Self { resource }
    }

    #[must_use]
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// POSTs the planned state, waits for the resource when the response
    /// enables polling, and returns the state the API reports.
    ///
    /// # Errors
    ///
    /// Returns the request's errors, `Polling` failures, and `ApiResponse` when
    /// no identifier can be read from the API's answer.
    pub async fn create(
        &self,
        client: &ApiClient,
        cancel: &CancellationToken,
        planned: Map<String, Value>,
    ) -> Result<ResourceState, Error> {
        let resource = &*self.resource;
        let parents = parent_ids(resource.parents(), &planned)?;
        let ids: Vec<&str> = parents.iter().map(String::as_str).collect();
        let url = client
            .url_builder()
            .url(&resource.name, &resource.host, &resource.root_path, &ids)?;

        let body = state_to_payload(&resource.schema, &planned);
        let response = self
            .request(client, cancel, Method::POST, &url, &resource.operations.post, Some(body))
            .await?;

        let id = response
            .object()
            .and_then(|object| extract_identifier(&resource.schema, object))
            .ok_or_else(|| Error::ApiResponse {
                method: Method::POST.to_string(),
                url: url.clone(),
                status: response.status,
                body: format!(
                    "response does not contain the identifier of '{}'",
                    resource.name
                ),
            })?;
        info!("created {} '{id}'", resource.name);

        let remote = match resource.operations.post.polling_for(response.status) {
            Some(behaviour) => {
                let instance_url = self.instance_url(client, &parents, &id)?;
                self.poll(
                    client,
                    cancel,
                    &instance_url,
                    &behaviour.target_statuses,
                    &behaviour.pending_statuses,
                    resource.operations.post.timeout,
                    false,
                )
                .await?;
                self.fetch(client, cancel, &instance_url).await?
            }
            None => response.body,
        };

        Ok(self.to_state(id, remote.as_ref(), &planned))
    }

    /// `Ok(None)` when the API answers 404
    ///
    /// # Errors
    ///
    /// Returns the request's errors and `ApiResponse` for non-object bodies.
    pub async fn read(
        &self,
        client: &ApiClient,
        cancel: &CancellationToken,
        current: &ResourceState,
    ) -> Result<Option<ResourceState>, Error> {
        let parents = parent_ids(self.resource.parents(), &current.attributes)?;
        let url = self.instance_url(client, &parents, &current.id)?;
        let Some(remote) = self.fetch(client, cancel, &url).await? else {
            info!("{} '{}' no longer exists", self.resource.name, current.id);
            return Ok(None);
        };
        Ok(Some(self.to_state(
            current.id.clone(),
            Some(&remote),
            &current.attributes,
        )))
    }

    /// PUTs the planned state. Immutable properties may not change.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedOperation` without a PUT, `RuntimeConfig` for a
    /// changed immutable property, and the request and polling errors.
    pub async fn update(
        &self,
        client: &ApiClient,
        cancel: &CancellationToken,
        prior: &ResourceState,
        planned: Map<String, Value>,
    ) -> Result<ResourceState, Error> {
        let resource = &*self.resource;
        let put = resource
            .operations
            .put
            .as_ref()
            .ok_or_else(|| Error::UnsupportedOperation {
                resource: resource.name.clone(),
                operation: "update".to_string(),
            })?;
        check_immutable(&resource.schema, &prior.attributes, &planned)?;

        let parents = parent_ids(resource.parents(), &prior.attributes)?;
        let url = self.instance_url(client, &parents, &prior.id)?;
        let body = state_to_payload(&resource.schema, &planned);
        let response = self
            .request(client, cancel, Method::PUT, &url, put, Some(body))
            .await?;

        let remote = match put.polling_for(response.status) {
            Some(behaviour) => {
                self.poll(
                    client,
                    cancel,
                    &url,
                    &behaviour.target_statuses,
                    &behaviour.pending_statuses,
                    put.timeout,
                    false,
                )
                .await?;
                self.fetch(client, cancel, &url).await?
            }
            None if response.object().is_some() => response.body,
            None => self.fetch(client, cancel, &url).await?,
        };

        Ok(self.to_state(prior.id.clone(), remote.as_ref(), &planned))
    }

    /// DELETEs the resource; a 404 counts as already deleted.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedOperation` without a DELETE, and the request and
    /// polling errors.
    pub async fn delete(
        &self,
        client: &ApiClient,
        cancel: &CancellationToken,
        current: &ResourceState,
    ) -> Result<(), Error> {
        let resource = &*self.resource;
        let delete = resource
            .operations
            .delete
            .as_ref()
            .ok_or_else(|| Error::UnsupportedOperation {
                resource: resource.name.clone(),
                operation: "delete".to_string(),
            })?;

        let parents = parent_ids(resource.parents(), &current.attributes)?;
        let url = self.instance_url(client, &parents, &current.id)?;
        let response = client
            .send(
                ApiRequest {
                    resource: &resource.name,
                    method: Method::DELETE,
                    url: url.clone(),
                    operation: delete,
                    schema: &resource.schema,
                    body: None,
                },
                cancel,
            )
            .await?;
        if response.status == 404 {
            info!("{} '{}' was already deleted", resource.name, current.id);
            return Ok(());
        }
        let response = ensure_success(&Method::DELETE, &url, response)?;

        if let Some(behaviour) = delete.polling_for(response.status) {
            let mut targets = behaviour.target_statuses.clone();
            targets.push(constants::STATUS_DESTROYED.to_string());
            self.poll(
                client,
                cancel,
                &url,
                &targets,
                &behaviour.pending_statuses,
                delete.timeout,
                true,
            )
            .await?;
        }
        info!("deleted {} '{}'", resource.name, current.id);
        Ok(())
    }

    /// GETs an instance; `Ok(None)` on 404
    pub(crate) async fn fetch(
        &self,
        client: &ApiClient,
        cancel: &CancellationToken,
        url: &str,
    ) -> Result<Option<Value>, Error> {
        let response = client
            .send(
                ApiRequest {
                    resource: &self.resource.name,
                    method: Method::GET,
                    url: url.to_string(),
                    operation: &self.resource.operations.get,
                    schema: &self.resource.schema,
                    body: None,
                },
                cancel,
            )
            .await?;
        if response.status == 404 {
            return Ok(None);
        }
        let response = ensure_success(&Method::GET, url, response)?;
        if response.object().is_none() {
            return Err(non_object_body(&Method::GET, url, &response));
        }
        Ok(response.body)
    }

    pub(crate) fn instance_url(
        &self,
        client: &ApiClient,
        parents: &[String],
        id: &str,
    ) -> Result<String, Error> {
        let mut ids: Vec<&str> = parents.iter().map(String::as_str).collect();
        ids.push(id);
        client.url_builder().url(
            &self.resource.name,
            &self.resource.host,
            &self.resource.instance_path,
            &ids,
        )
    }

    pub(crate) fn to_state(
        &self,
        id: String,
        remote: Option<&Value>,
        prior: &Map<String, Value>,
    ) -> ResourceState {
        let mut attributes = match remote.and_then(Value::as_object) {
            Some(object) => payload_to_state(&self.resource.schema, object, Some(prior)),
            None => payload_to_state(&self.resource.schema, &Map::new(), Some(prior)),
        };
        for parent in self.resource.parents() {
            let key = parent.id_attribute();
            if let Some(value) = prior.get(&key) {
                attributes.insert(key, value.clone());
            }
        }
        ResourceState { id, attributes }
    }

    async fn request(
        &self,
        client: &ApiClient,
        cancel: &CancellationToken,
        method: Method,
        url: &str,
        operation: &ResourceOperation,
        body: Option<Map<String, Value>>,
    ) -> Result<ApiResponse, Error> {
        let response = client
            .send(
                ApiRequest {
                    resource: &self.resource.name,
                    method: method.clone(),
                    url: url.to_string(),
                    operation,
                    schema: &self.resource.schema,
                    body: body.map(Value::Object),
                },
                cancel,
            )
            .await?;
        ensure_success(&method, url, response)
    }

    #[allow(clippy::too_many_arguments)]
    async fn poll(
        &self,
        client: &ApiClient,
        cancel: &CancellationToken,
        url: &str,
        target_statuses: &[String],
        pending_statuses: &[String],
        timeout: Option<std::time::Duration>,
        deleting: bool,
    ) -> Result<String, Error> {
        let settings = client.settings();
        let spec = PollSpec {
            resource: &self.resource.name,
            target_statuses,
            pending_statuses,
            timeout: timeout.unwrap_or(settings.default_operation_timeout),
            interval: settings.poll_interval,
        };
        debug!(
            "polling {} every {:?} for up to {:?}",
            self.resource.name, spec.interval, spec.timeout
        );
        wait_for_status(&spec, cancel, move || {
            self.probe_status(client, cancel, url, deleting)
        })
        .await
    }

    async fn probe_status(
        &self,
        client: &ApiClient,
        cancel: &CancellationToken,
        url: &str,
        deleting: bool,
    ) -> Result<String, Error> {
        let Some(remote) = self.fetch(client, cancel, url).await? else {
            if deleting {
                return Ok(constants::STATUS_DESTROYED.to_string());
            }
            return Err(Error::Polling {
                resource: self.resource.name.clone(),
                reason: "resource disappeared while waiting for it".to_string(),
                last_status: String::new(),
            });
        };
        remote
            .as_object()
            .and_then(|object| extract_status(&self.resource.schema, object))
            .ok_or_else(|| Error::Polling {
                resource: self.resource.name.clone(),
                reason: "response carries no status field".to_string(),
                last_status: String::new(),
            })
    }
}

fn non_object_body(method: &Method, url: &str, response: &ApiResponse) -> Error {
    Error::ApiResponse {
        method: method.to_string(),
        url: url.to_string(),
        status: response.status,
        body: "response body is not a JSON object".to_string(),
    }
}

/// Rejects plans that change an `x-terraform-immutable` property
fn check_immutable(
    schema: &SchemaDefinition,
    prior: &Map<String, Value>,
    planned: &Map<String, Value>,
) -> Result<(), Error> {
    for property in schema.properties.iter().filter(|p| p.immutable) {
        let key = property.terraform_name();
        let before = prior.get(&key).filter(|v| !v.is_null());
        let after = planned.get(&key).filter(|v| !v.is_null());
        if before != after {
            return Err(Error::runtime_config(format!(
                "property '{key}' is immutable and cannot be updated"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::model::Schema;
    use crate::spec::resource::{ResourceHost, ResourceOperations, ResourceSource};
    use crate::spec::schema::SchemaCompiler;
    use indexmap::IndexMap;
    use serde_json::json;
    use std::time::Duration;

    fn resource(schema: Value, updatable: bool, parents: Vec<ParentInfo>) -> Resource {
        let schema: Schema = serde_json::from_value(schema).unwrap();
        let definition = SchemaCompiler::new(&IndexMap::new())
            .compile_definition(&schema)
            .unwrap();
        let source = if parents.is_empty() {
            ResourceSource::Plain
        } else {
            ResourceSource::SubResource { parents }
        };
        Resource {
            name: "cdns_v1".to_string(),
            root_path: "/v1/cdns".to_string(),
            instance_path: "/v1/cdns/{id}".to_string(),
            schema: Arc::new(definition),
            operations: ResourceOperations {
                post: ResourceOperation {
                    timeout: Some(Duration::from_secs(30)),
                    ..ResourceOperation::default()
                },
                get: ResourceOperation::default(),
                put: updatable.then(ResourceOperation::default),
                delete: Some(ResourceOperation::default()),
            },
            host: ResourceHost::Global,
            source,
            should_ignore: false,
        }
    }

    fn cdn_schema() -> Value {
        json!({
            "required": ["label"],
            "properties": {
                "id": {"type": "string", "readOnly": true},
                "label": {"type": "string"},
                "status": {"type": "string", "readOnly": true},
                "region": {"type": "string", "x-terraform-immutable": true},
                "tier": {"type": "string", "default": "basic"},
                "token": {"type": "string", "x-terraform-sensitive": true, "x-terraform-computed": true},
                "ports": {"type": "array", "items": {"type": "integer"}},
                "origin": {"type": "object", "properties": {"host": {"type": "string"}}}
            }
        })
    }

    #[test]
    fn test_resource_schema_attributes() {
        let schema = build_resource_schema(&resource(cdn_schema(), true, vec![]));
        let block = &schema.block;

        assert!(block.attribute("id").is_none());

        let label = block.attribute("label").unwrap();
        assert!(label.required && !label.computed && !label.force_new);

        let status = block.attribute("status").unwrap();
        assert!(status.computed && !status.optional && !status.required);

        assert!(block.attribute("region").unwrap().force_new);

        let tier = block.attribute("tier").unwrap();
        assert!(tier.optional && tier.computed);
        assert_eq!(tier.default, Some(json!("basic")));

        let token = block.attribute("token").unwrap();
        assert!(token.sensitive && token.optional && token.computed);

        assert_eq!(
            block.attribute("ports").unwrap().attr_type,
            AttributeType::List(Box::new(AttributeType::Int))
        );
        assert!(matches!(
            block.attribute("origin").unwrap().attr_type,
            AttributeType::Object(_)
        ));
        assert_eq!(schema.timeouts.create, Some(Duration::from_secs(30)));
        assert_eq!(schema.timeouts.update, None);
    }

    #[test]
    fn test_resource_without_put_replaces_on_change() {
        let schema = build_resource_schema(&resource(cdn_schema(), false, vec![]));
        assert!(schema.block.attribute("label").unwrap().force_new);
        assert!(!schema.block.attribute("status").unwrap().force_new);
    }

    #[test]
    fn test_sub_resource_schema_has_parent_ids() {
        let parent = ParentInfo {
            resource_name: "cdns_v1".to_string(),
            root_path: "/v1/cdns".to_string(),
            instance_path: "/v1/cdns/{id}".to_string(),
        };
        let schema = build_resource_schema(&resource(cdn_schema(), true, vec![parent.clone()]));
        let attribute = schema.block.attribute("cdns_v1_id").unwrap();
        assert!(attribute.required && attribute.force_new);

        let mut attributes = Map::new();
        assert!(parent_ids(&[parent.clone()], &attributes).is_err());
        attributes.insert("cdns_v1_id".to_string(), json!(7));
        assert_eq!(parent_ids(&[parent], &attributes).unwrap(), vec!["7"]);
    }

    #[test]
    fn test_computed_block_has_no_inputs() {
        let block = computed_block(&resource(cdn_schema(), true, vec![]).schema);
        assert!(block.attribute("id").is_none());
        assert!(block
            .attributes
            .values()
            .all(|a| a.computed && !a.optional && !a.required && !a.force_new));
    }

    #[test]
    fn test_check_immutable() {
        let schema = resource(cdn_schema(), true, vec![]).schema;
        let prior = json!({"region": "eu", "label": "a"}).as_object().unwrap().clone();
        let same = json!({"region": "eu", "label": "b"}).as_object().unwrap().clone();
        let changed = json!({"region": "us", "label": "a"}).as_object().unwrap().clone();
        assert!(check_immutable(&schema, &prior, &same).is_ok());
        let err = check_immutable(&schema, &prior, &changed).unwrap_err();
        assert!(err.to_string().contains("region"));
    }
}
