use crate::constants;
use crate::duration::parse_timeout;
use crate::error::Error;
use crate::spec::headers::{collect_operation_headers, HeaderParameter};
use crate::spec::model::{Operation, Parameter};
use crate::spec::schema::SchemaDefinition;
use crate::spec::security::{SecurityRequirement, SecuritySchemes};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// What to do after a given response status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseBehaviour {
    pub polling_enabled: bool,
    pub target_statuses: Vec<String>,
    pub pending_statuses: Vec<String>,
}

/// One HTTP operation of a resource, as declared by the document
#[derive(Debug, Clone, Default)]
pub struct ResourceOperation {
    pub headers: Vec<HeaderParameter>,
    pub security: Vec<SecurityRequirement>,
    pub responses: BTreeMap<u16, ResponseBehaviour>,
    pub timeout: Option<Duration>,
}

impl ResourceOperation {
    /// Compiles an operation; path-level parameters precede the operation's own.
    ///
    /// # Errors
    ///
    /// Returns `InvalidProperty` for an unparseable `x-terraform-resource-timeout`.
    pub fn from_operation(
        operation: &Operation,
        path_parameters: &[Parameter],
        security: &SecuritySchemes,
    ) -> Result<Self, Error> {
        let headers =
            collect_operation_headers(path_parameters.iter().chain(operation.parameters.iter()));

        let responses = operation
            .responses
            .iter()
            .filter_map(|(code, response)| {
                let status = code.parse::<u16>().ok()?;
                let ext = &response.extensions;
                Some((
                    status,
                    ResponseBehaviour {
                        polling_enabled: ext.get_bool(constants::EXT_POLL_ENABLED),
                        target_statuses: ext
                            .get_csv(constants::EXT_POLL_COMPLETED_STATUSES)
                            .unwrap_or_default(),
                        pending_statuses: ext
                            .get_csv(constants::EXT_POLL_PENDING_STATUSES)
                            .unwrap_or_default(),
                    },
                ))
            })
            .collect();

        let timeout = operation
            .extensions
            .get_str(constants::EXT_RESOURCE_TIMEOUT)
            .map(parse_timeout)
            .transpose()?;

        Ok(Self {
            headers,
            security: security.operation_requirements(operation.security.as_deref()),
            responses,
            timeout,
        })
    }

    /// Polling behaviour for a status, when polling is enabled for it
    #[must_use]
    pub fn polling_for(&self, status: u16) -> Option<&ResponseBehaviour> {
        self.responses.get(&status).filter(|r| r.polling_enabled)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResourceOperations {
    pub post: ResourceOperation,
    pub get: ResourceOperation,
    pub put: Option<ResourceOperation>,
    pub delete: Option<ResourceOperation>,
}

/// Host a resource's requests go to, before user endpoint overrides
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceHost {
    /// The backend's host
    Global,
    /// `x-terraform-resource-host`
    Override(String),
    /// One expansion of a multi-region `x-terraform-resource-host`
    Regional { region: String, host: String },
}

/// One ancestor of a sub-resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentInfo {
    /// Full name of the parent resource, parent chain included
    pub resource_name: String,
    pub root_path: String,
    pub instance_path: String,
}

impl ParentInfo {
    /// Host attribute carrying the parent's identifier
    #[must_use]
    pub fn id_attribute(&self) -> String {
        format!("{}_{}", self.resource_name, constants::PROPERTY_ID)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceSource {
    Plain,
    SubResource { parents: Vec<ParentInfo> },
}

impl ResourceSource {
    #[must_use]
    pub fn parents(&self) -> &[ParentInfo] {
        match self {
            Self::Plain => &[],
            Self::SubResource { parents } => parents,
        }
    }
}

/// A compiled, immutable resource
#[derive(Debug, Clone)]
pub struct Resource {
    /// Name without the provider prefix, e.g. `cdns_v1`
    pub name: String,
    pub root_path: String,
    pub instance_path: String,
    pub schema: Arc<SchemaDefinition>,
    pub operations: ResourceOperations,
    pub host: ResourceHost,
    pub source: ResourceSource,
    pub should_ignore: bool,
}

impl Resource {
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        match &self.host {
            ResourceHost::Regional { region, .. } => Some(region),
            _ => None,
        }
    }

    #[must_use]
    pub fn parents(&self) -> &[ParentInfo] {
        self.source.parents()
    }

    /// Without a PUT every change replaces the resource
    #[must_use]
    pub const fn is_updatable(&self) -> bool {
        self.operations.put.is_some()
    }
}

/// A collection endpoint exported as a filterable data source
#[derive(Debug, Clone)]
pub struct DataSource {
    pub name: String,
    pub path: String,
    pub schema: Arc<SchemaDefinition>,
    pub get: ResourceOperation,
    pub host: ResourceHost,
    pub source: ResourceSource,
}

impl DataSource {
    #[must_use]
    pub fn parents(&self) -> &[ParentInfo] {
        self.source.parents()
    }
}
