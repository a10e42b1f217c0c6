use crate::constants;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    // Startup: document loading and validation
    #[error("Failed to load OpenAPI document '{location}': {reason}")]
    DocumentLoad { location: String, reason: String },
    #[error("Invalid OpenAPI document: {reason}")]
    DocumentValidation { reason: String },

    // Startup: per-resource compilation, recovered by skipping the resource
    #[error("Resource '{resource}' could not be compiled: {reason}")]
    ResourceCompilation { resource: String, reason: String },
    #[error("Property '{property}' is invalid: {reason}")]
    InvalidProperty { property: String, reason: String },

    // Runtime
    #[error("Invalid provider configuration: {reason}")]
    RuntimeConfig { reason: String },
    #[error("{method} {url} failed: {reason}")]
    Transport {
        method: String,
        url: String,
        reason: String,
    },
    #[error("{method} {url} returned HTTP {status}: {body}")]
    ApiResponse {
        method: String,
        url: String,
        status: u16,
        body: String,
    },
    #[error("Polling resource '{resource}' failed: {reason} (last observed status: '{last_status}')")]
    Polling {
        resource: String,
        reason: String,
        last_status: String,
    },
    #[error("Operation on resource '{resource}' was cancelled")]
    Cancelled { resource: String },
    #[error("Resource '{resource}' does not support the {operation} operation")]
    UnsupportedOperation { resource: String, operation: String },
    #[error("Unknown resource type '{name}'")]
    UnknownResource { name: String },
    #[error("Provider has not been configured yet")]
    NotConfigured,
}

/// JSON representation of an error for structured diagnostics
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonError {
    pub error_type: String,
    pub message: String,
    pub context: Option<String>,
}

impl Error {
    pub fn document_load(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DocumentLoad {
            location: location.into(),
            reason: reason.into(),
        }
    }

    pub fn document_validation(reason: impl Into<String>) -> Self {
        Self::DocumentValidation {
            reason: reason.into(),
        }
    }

    pub fn resource_compilation(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ResourceCompilation {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_property(property: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidProperty {
            property: property.into(),
            reason: reason.into(),
        }
    }

    pub fn runtime_config(reason: impl Into<String>) -> Self {
        Self::RuntimeConfig {
            reason: reason.into(),
        }
    }

    /// True for errors that only disqualify a single resource during analysis
    #[must_use]
    pub const fn is_compilation(&self) -> bool {
        matches!(
            self,
            Self::ResourceCompilation { .. } | Self::InvalidProperty { .. }
        )
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// True when the API answered 404
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiResponse { status: 404, .. })
    }

    /// Re-labels a compilation error with the resource (or path) it belongs to
    #[must_use]
    pub fn in_resource(self, resource: &str) -> Self {
        match self {
            Self::InvalidProperty { property, reason } => Self::ResourceCompilation {
                resource: resource.to_string(),
                reason: format!("property '{property}': {reason}"),
            },
            Self::ResourceCompilation { reason, .. } => Self::ResourceCompilation {
                resource: resource.to_string(),
                reason,
            },
            other => other,
        }
    }

    /// Convert error to JSON representation for structured output
    #[must_use]
    pub fn to_json(&self) -> JsonError {
        let (error_type, context) = match self {
            Self::Io(_) => ("FileSystem", None),
            Self::Yaml(_) | Self::Json(_) | Self::DocumentLoad { .. } => {
                ("DocumentLoad", Some(constants::ERR_DOCUMENT_FORMAT))
            }
            Self::DocumentValidation { .. } => {
                ("DocumentValidation", Some(constants::ERR_DOCUMENT_FORMAT))
            }
            Self::ResourceCompilation { .. } | Self::InvalidProperty { .. } => (
                "ResourceCompilation",
                Some(constants::ERR_RESOURCE_COMPILATION),
            ),
            Self::RuntimeConfig { .. } | Self::NotConfigured | Self::UnknownResource { .. } => {
                ("RuntimeConfig", Some(constants::ERR_PROVIDER_CONFIG))
            }
            Self::Transport { .. } => ("RuntimeHTTP", Some(constants::ERR_CONNECTION)),
            Self::ApiResponse { status, .. } => (
                "RuntimeHTTP",
                match status {
                    401 => Some(constants::ERR_API_CREDENTIALS),
                    403 => Some(constants::ERR_PERMISSION_DENIED),
                    500..=599 => Some(constants::ERR_SERVER_ERROR),
                    _ => None,
                },
            ),
            Self::Polling { .. } => ("RuntimePolling", Some(constants::ERR_POLLING)),
            Self::Cancelled { .. } => ("Cancellation", None),
            Self::UnsupportedOperation { .. } => ("RuntimeHTTP", None),
        };

        JsonError {
            error_type: error_type.to_string(),
            message: self.to_string(),
            context: context.map(str::to_string),
        }
    }
}
