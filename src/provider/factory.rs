//! Composes the analysis, the host schemas and the lifecycle engine into a
//! provider the host can drive.

use crate::config::plugin::{resolve_service, validate_provider_name};
use crate::config::provider::{provider_config_schema, ProviderConfiguration};
use crate::config::settings::EngineSettings;
use crate::constants;
use crate::engine::client::ApiClient;
use crate::error::Error;
use crate::provider::data_source::{
    build_data_source_schema, build_instance_data_source_schema, DataSourceHandler,
    InstanceDataSourceHandler,
};
use crate::provider::host::{ProviderSchema, ProviderService, ResourceState};
use crate::provider::resource_factory::{build_resource_schema, ResourceHandler};
use crate::spec::model::SwaggerDocument;
use crate::spec::resource::{DataSource, Resource};
use crate::spec::{load_document, Analysis, SpecAnalyser};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Analysed document of one named provider
#[derive(Debug, Clone)]
pub struct ProviderFactory {
    name: String,
    analysis: Arc<Analysis>,
    insecure_skip_verify: bool,
}

impl ProviderFactory {
    /// # Errors
    ///
    /// Returns `RuntimeConfig` for an invalid provider name and the analyser's
    /// fatal errors.
    pub fn new(name: &str, document: &SwaggerDocument, document_url: &str) -> Result<Self, Error> {
        validate_provider_name(name)?;
        let analysis = SpecAnalyser::new(document, document_url).analyse()?;
        info!(
            "provider '{name}': {} resources, {} data sources, {} paths skipped",
            analysis.resources.len(),
            analysis.data_sources.len(),
            analysis.skipped.len()
        );
        Ok(Self {
            name: name.to_string(),
            analysis: Arc::new(analysis),
            insecure_skip_verify: false,
        })
    }

    /// Locates the provider's document through the environment or the plugin
    /// configuration file, loads and analyses it.
    ///
    /// # Errors
    ///
    /// Returns the lookup, load and analysis errors.
    pub async fn from_plugin_config(name: &str) -> Result<Self, Error> {
        let service = resolve_service(name)?;
        debug!("provider '{name}' uses document '{}'", service.swagger_url);
        let document = load_document(&service.swagger_url, service.insecure_skip_verify).await?;
        let mut factory = Self::new(name, &document, &service.swagger_url)?;
        factory.insecure_skip_verify = service.insecure_skip_verify;
        Ok(factory)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn analysis(&self) -> &Analysis {
        &self.analysis
    }

    /// Host-facing type name, e.g. `cdn_cdns_v1`
    #[must_use]
    pub fn type_name(&self, name: &str) -> String {
        format!("{}_{name}", self.name)
    }

    /// Resources users can manage; excluded ones are left out
    pub fn resources(&self) -> impl Iterator<Item = &Arc<Resource>> {
        self.analysis.resources.iter().filter(|r| !r.should_ignore)
    }

    pub fn data_sources(&self) -> impl Iterator<Item = &Arc<DataSource>> {
        self.analysis.data_sources.iter()
    }

    #[must_use]
    pub fn provider_schema(&self) -> ProviderSchema {
        let resources = self
            .resources()
            .map(|r| (self.type_name(&r.name), build_resource_schema(r)))
            .collect();

        let mut data_sources: std::collections::BTreeMap<_, _> = self
            .data_sources()
            .map(|d| (self.type_name(&d.name), build_data_source_schema(d)))
            .collect();
        for resource in self.resources() {
            data_sources.insert(
                self.type_name(&instance_name(&resource.name)),
                build_instance_data_source_schema(resource),
            );
        }

        ProviderSchema {
            provider: provider_config_schema(&self.analysis),
            resources,
            data_sources,
        }
    }

    #[must_use]
    pub fn build(self, settings: EngineSettings) -> OpenApiProvider {
        let insecure = settings.insecure_skip_verify || self.insecure_skip_verify;
        OpenApiProvider {
            schema: self.provider_schema(),
            factory: self,
            settings: settings.with_insecure_skip_verify(insecure),
            client: RwLock::new(None),
            cancel: CancellationToken::new(),
        }
    }
}

fn instance_name(resource_name: &str) -> String {
    format!("{resource_name}{}", constants::INSTANCE_DATA_SOURCE_SUFFIX)
}

/// A configured-on-demand provider backed by an `OpenAPI` document
#[derive(Debug)]
pub struct OpenApiProvider {
    factory: ProviderFactory,
    schema: ProviderSchema,
    settings: EngineSettings,
    client: RwLock<Option<Arc<ApiClient>>>,
    cancel: CancellationToken,
}

impl OpenApiProvider {
    #[must_use]
    pub const fn factory(&self) -> &ProviderFactory {
        &self.factory
    }

    async fn client(&self) -> Result<Arc<ApiClient>, Error> {
        self.client.read().await.clone().ok_or(Error::NotConfigured)
    }

    fn local_name<'t>(&self, type_name: &'t str) -> Result<&'t str, Error> {
        type_name
            .strip_prefix(self.factory.name.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
            .ok_or_else(|| Error::UnknownResource {
                name: type_name.to_string(),
            })
    }

    fn resource(&self, type_name: &str) -> Result<ResourceHandler, Error> {
        let name = self.local_name(type_name)?;
        self.factory
            .resources()
            .find(|r| r.name == name)
            .map(|r| ResourceHandler::new(Arc::clone(r)))
            .ok_or_else(|| Error::UnknownResource {
                name: type_name.to_string(),
            })
    }
}

#[async_trait]
impl ProviderService for OpenApiProvider {
    fn schema(&self) -> ProviderSchema {
        self.schema.clone()
    }

    async fn configure(&self, config: Map<String, Value>) -> Result<(), Error> {
        let analysis = &self.factory.analysis;
        let provider_config = ProviderConfiguration::from_host_config(&config, analysis)?;
        let unchanged = self
            .client
            .read()
            .await
            .as_ref()
            .is_some_and(|client| client.config().is_equivalent(&provider_config));
        if unchanged {
            debug!(
                "provider '{}' configuration unchanged (endpoints {}), keeping the client",
                self.factory.name,
                provider_config.endpoints_hash()
            );
            return Ok(());
        }

        let endpoints = provider_config.endpoints_hash();
        let client = ApiClient::new(
            analysis.backend.clone(),
            analysis.security.clone(),
            provider_config,
            self.settings.clone(),
        )?;
        *self.client.write().await = Some(Arc::new(client));
        info!(
            "provider '{}' configured (endpoints {endpoints})",
            self.factory.name
        );
        Ok(())
    }

    fn stop(&self) {
        info!("provider '{}' stopping; cancelling in-flight operations", self.factory.name);
        self.cancel.cancel();
    }

    async fn create(
        &self,
        type_name: &str,
        planned: Map<String, Value>,
    ) -> Result<ResourceState, Error> {
        let handler = self.resource(type_name)?;
        let client = self.client().await?;
        handler.create(&client, &self.cancel, planned).await
    }

    async fn read(
        &self,
        type_name: &str,
        current: &ResourceState,
    ) -> Result<Option<ResourceState>, Error> {
        let handler = self.resource(type_name)?;
        let client = self.client().await?;
        handler.read(&client, &self.cancel, current).await
    }

    async fn update(
        &self,
        type_name: &str,
        prior: &ResourceState,
        planned: Map<String, Value>,
    ) -> Result<ResourceState, Error> {
        let handler = self.resource(type_name)?;
        let client = self.client().await?;
        handler.update(&client, &self.cancel, prior, planned).await
    }

    async fn delete(&self, type_name: &str, current: &ResourceState) -> Result<(), Error> {
        let handler = self.resource(type_name)?;
        let client = self.client().await?;
        handler.delete(&client, &self.cancel, current).await
    }

    async fn read_data_source(
        &self,
        type_name: &str,
        config: Map<String, Value>,
    ) -> Result<ResourceState, Error> {
        let name = self.local_name(type_name)?;
        let client = self.client().await?;

        if let Some(data_source) = self.factory.data_sources().find(|d| d.name == name) {
            return DataSourceHandler::new(Arc::clone(data_source))
                .read(&client, &self.cancel, config)
                .await;
        }

        let resource = name
            .strip_suffix(constants::INSTANCE_DATA_SOURCE_SUFFIX)
            .and_then(|base| self.factory.resources().find(|r| r.name == base))
            .ok_or_else(|| Error::UnknownResource {
                name: type_name.to_string(),
            })?;
        InstanceDataSourceHandler::new(Arc::clone(resource))
            .read(&client, &self.cancel, config)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SWAGGER_URL: &str = "https://api.example.com/swagger.json";

    fn document() -> SwaggerDocument {
        let raw = json!({
            "swagger": "2.0",
            "host": "api.example.com",
            "schemes": ["https"],
            "securityDefinitions": {
                "apikey_auth": {"type": "apiKey", "name": "X-API-Key", "in": "header"}
            },
            "security": [{"apikey_auth": []}],
            "paths": {
                "/v1/cdns": {
                    "post": {
                        "parameters": [{"in": "body", "name": "body", "schema": {"$ref": "#/definitions/Cdn"}}],
                        "responses": {"201": {"description": "created", "schema": {"$ref": "#/definitions/Cdn"}}}
                    },
                    "get": {
                        "responses": {"200": {"description": "ok", "schema": {"type": "array", "items": {"$ref": "#/definitions/Cdn"}}}}
                    }
                },
                "/v1/cdns/{id}": {
                    "get": {
                        "parameters": [{"in": "path", "name": "id", "required": true, "type": "string"}],
                        "responses": {"200": {"description": "ok", "schema": {"$ref": "#/definitions/Cdn"}}}
                    },
                    "delete": {
                        "parameters": [{"in": "path", "name": "id", "required": true, "type": "string"}],
                        "responses": {"204": {"description": "deleted"}}
                    }
                }
            },
            "definitions": {
                "Cdn": {
                    "type": "object",
                    "required": ["label"],
                    "properties": {
                        "id": {"type": "string", "readOnly": true},
                        "label": {"type": "string"}
                    }
                }
            }
        });
        crate::spec::parse_document(&raw.to_string(), "swagger.json").unwrap()
    }

    #[test]
    fn test_provider_schema_names_are_prefixed() {
        let factory = ProviderFactory::new("cdn", &document(), SWAGGER_URL).unwrap();
        let schema = factory.provider_schema();
        assert!(schema.resources.contains_key("cdn_cdns_v1"));
        assert!(schema.data_sources.contains_key("cdn_cdns_v1"));
        assert!(schema.data_sources.contains_key("cdn_cdns_v1_instance"));
        assert!(schema.provider.attribute("apikey_auth").unwrap().required);
    }

    #[test]
    fn test_invalid_provider_name() {
        assert!(ProviderFactory::new("My-Cdn", &document(), "swagger.json").is_err());
    }

    #[tokio::test]
    async fn test_operations_need_configuration() {
        let provider = ProviderFactory::new("cdn", &document(), SWAGGER_URL)
            .unwrap()
            .build(EngineSettings::default());
        let err = provider.create("cdn_cdns_v1", Map::new()).await.unwrap_err();
        assert!(matches!(err, Error::NotConfigured));

        let err = provider.create("cdn_lbs_v1", Map::new()).await.unwrap_err();
        assert!(matches!(err, Error::UnknownResource { .. }));

        let err = provider.configure(Map::new()).await.unwrap_err();
        assert!(matches!(err, Error::RuntimeConfig { .. }));
    }

    #[tokio::test]
    async fn test_reconfigure_keeps_client_for_same_endpoints() {
        let provider = ProviderFactory::new("cdn", &document(), SWAGGER_URL)
            .unwrap()
            .build(EngineSettings::default());
        let config = |endpoint: &str| {
            json!({"apikey_auth": "k", "endpoints": [{"cdns_v1": endpoint}]})
                .as_object()
                .unwrap()
                .clone()
        };

        provider.configure(config("cdn.example.com")).await.unwrap();
        let first = provider.client().await.unwrap();
        provider.configure(config("cdn.example.com")).await.unwrap();
        let same = provider.client().await.unwrap();
        assert!(Arc::ptr_eq(&first, &same));

        provider.configure(config("cdn2.example.com:8443")).await.unwrap();
        let changed = provider.client().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &changed));
        assert_eq!(changed.config().endpoint("cdns_v1"), Some("cdn2.example.com:8443"));
    }
}
