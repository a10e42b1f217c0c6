//! Schema shapes and the service contract the host runtime talks to.
//!
//! The plugin handshake itself lives outside this crate; a host adapter
//! translates its wire messages into calls on [`ProviderService`].

use crate::error::Error;
use async_trait::async_trait;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "of", rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Int,
    Float,
    Bool,
    List(Box<AttributeType>),
    Object(Block),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub force_new: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl Attribute {
    #[must_use]
    pub const fn new(attr_type: AttributeType) -> Self {
        Self {
            attr_type,
            description: None,
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            force_new: false,
            default: None,
        }
    }

    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self.optional = false;
        self
    }

    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self.required = false;
        self
    }

    #[must_use]
    pub const fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    #[must_use]
    pub const fn sensitive(mut self, sensitive: bool) -> Self {
        self.sensitive = sensitive;
        self
    }

    #[must_use]
    pub const fn force_new(mut self, force_new: bool) -> Self {
        self.force_new = force_new;
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: Option<Value>) -> Self {
        self.default = default;
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }
}

/// Repeated nested block, e.g. `filter { ... }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NestedBlock {
    pub block: Block,
    pub min_items: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
}

/// Attributes and nested blocks, sorted by name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Block {
    pub attributes: BTreeMap<String, Attribute>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub blocks: BTreeMap<String, NestedBlock>,
}

impl Block {
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }
}

/// Per-operation timeouts; `None` means the host default
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Timeouts {
    #[serde(serialize_with = "as_secs")]
    pub create: Option<Duration>,
    #[serde(serialize_with = "as_secs")]
    pub read: Option<Duration>,
    #[serde(serialize_with = "as_secs")]
    pub update: Option<Duration>,
    #[serde(serialize_with = "as_secs")]
    pub delete: Option<Duration>,
}

#[allow(clippy::ref_option)]
fn as_secs<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(duration) => serializer.serialize_some(&duration.as_secs_f64()),
        None => serializer.serialize_none(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSchema {
    pub block: Block,
    pub timeouts: Timeouts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProviderSchema {
    pub provider: Block,
    pub resources: BTreeMap<String, ResourceSchema>,
    pub data_sources: BTreeMap<String, ResourceSchema>,
}

/// State of one resource instance as the host stores it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub id: String,
    pub attributes: Map<String, Value>,
}

/// Operations a host invokes on a configured provider.
///
/// Type names are the host-facing names, i.e. prefixed with the provider name.
#[async_trait]
pub trait ProviderService: Send + Sync {
    fn schema(&self) -> ProviderSchema;

    /// Validates and applies the provider block
    async fn configure(&self, config: Map<String, Value>) -> Result<(), Error>;

    /// Cancels in-flight operations
    fn stop(&self);

    async fn create(&self, type_name: &str, planned: Map<String, Value>)
        -> Result<ResourceState, Error>;

    /// `Ok(None)` when the remote object no longer exists
    async fn read(
        &self,
        type_name: &str,
        current: &ResourceState,
    ) -> Result<Option<ResourceState>, Error>;

    async fn update(
        &self,
        type_name: &str,
        prior: &ResourceState,
        planned: Map<String, Value>,
    ) -> Result<ResourceState, Error>;

    async fn delete(&self, type_name: &str, current: &ResourceState) -> Result<(), Error>;

    async fn read_data_source(
        &self,
        type_name: &str,
        config: Map<String, Value>,
    ) -> Result<ResourceState, Error>;
}
