//! Discovery of the document a provider is built from.
//!
//! The URL comes from `OTF_VAR_<PROVIDER>_SWAGGER_URL` when set, otherwise from
//! the plugin configuration file.

use crate::constants;
use crate::error::Error;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static PROVIDER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+$").expect("hard-coded regex is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfiguration {
    #[serde(rename = "swagger-url")]
    pub swagger_url: String,
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfiguration {
    pub version: String,
    #[serde(default)]
    pub services: IndexMap<String, ServiceConfiguration>,
}

impl PluginConfiguration {
    /// Parses the YAML form of the file.
    ///
    /// # Errors
    ///
    /// Returns `Yaml` for malformed content and `RuntimeConfig` for unknown versions.
    pub fn from_yaml(content: &str) -> Result<Self, Error> {
        let config: Self = serde_yaml::from_str(content)?;
        if config.version != constants::PLUGIN_CONFIG_VERSION {
            return Err(Error::runtime_config(format!(
                "plugin configuration version '{}' is not supported, expected '{}'",
                config.version,
                constants::PLUGIN_CONFIG_VERSION
            )));
        }
        Ok(config)
    }

    /// Reads and parses the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `Io` when the file cannot be read, otherwise see [`Self::from_yaml`].
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// `$OPENAPI_PROVIDER_PLUGIN_CONFIG`, else `~/.terraform.d/plugins/terraform-provider-openapi.yaml`
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(constants::ENV_PLUGIN_CONFIG) {
            return Some(PathBuf::from(shellexpand::tilde(&path).as_ref()));
        }
        dirs::home_dir().map(|home| {
            home.join(constants::PLUGIN_CONFIG_DIR)
                .join(constants::PLUGIN_CONFIG_FILE)
        })
    }

    #[must_use]
    pub fn service(&self, provider_name: &str) -> Option<&ServiceConfiguration> {
        self.services.get(provider_name)
    }
}

/// Provider names are lowercase alphanumerics only.
///
/// # Errors
///
/// Returns `RuntimeConfig` for any other name.
pub fn validate_provider_name(name: &str) -> Result<(), Error> {
    if PROVIDER_NAME.is_match(name) {
        Ok(())
    } else {
        Err(Error::runtime_config(format!(
            "provider name '{name}' must match ^[a-z0-9]+$"
        )))
    }
}

/// Environment variables consulted for the document URL, in order
#[must_use]
pub fn swagger_url_env_vars(provider_name: &str) -> [String; 2] {
    [
        format!(
            "{}{}{}",
            constants::ENV_SWAGGER_URL_PREFIX,
            provider_name.to_uppercase(),
            constants::ENV_SWAGGER_URL_SUFFIX
        ),
        format!(
            "{}{}{}",
            constants::ENV_SWAGGER_URL_PREFIX,
            provider_name,
            constants::ENV_SWAGGER_URL_SUFFIX
        ),
    ]
}

/// Resolves the document of a provider from the process environment and the
/// default plugin configuration file.
///
/// # Errors
///
/// See [`resolve_service_with`].
pub fn resolve_service(provider_name: &str) -> Result<ServiceConfiguration, Error> {
    resolve_service_with(
        provider_name,
        |key| std::env::var(key).ok(),
        PluginConfiguration::default_path().as_deref(),
    )
}

/// Resolves the document of a provider; the environment wins over the file.
///
/// # Errors
///
/// Returns `RuntimeConfig` for invalid provider names or when neither source
/// names a document, and the file's load errors when it exists but is invalid.
pub fn resolve_service_with(
    provider_name: &str,
    env: impl Fn(&str) -> Option<String>,
    plugin_path: Option<&Path>,
) -> Result<ServiceConfiguration, Error> {
    validate_provider_name(provider_name)?;

    let from_env = swagger_url_env_vars(provider_name)
        .iter()
        .find_map(|key| env(key).filter(|v| !v.trim().is_empty()));
    if let Some(swagger_url) = from_env {
        return Ok(ServiceConfiguration {
            swagger_url,
            insecure_skip_verify: false,
        });
    }

    if let Some(path) = plugin_path.filter(|p| p.exists()) {
        let config = PluginConfiguration::load(path)?;
        if let Some(service) = config.service(provider_name) {
            return Ok(service.clone());
        }
    }

    let [env_var, _] = swagger_url_env_vars(provider_name);
    Err(Error::runtime_config(format!(
        "no document configured for provider '{provider_name}': set {env_var} or add it to the plugin configuration file"
    )))
}
