//! Request URL assembly.

use crate::config::provider::ProviderConfiguration;
use crate::error::Error;
use crate::spec::backend::BackendConfiguration;
use crate::spec::resource::ResourceHost;
use regex::Regex;
use std::sync::LazyLock;

static PATH_PARAMETER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^/{}]+\}").expect("hard-coded regex is valid"));

/// Builds request URLs from the backend and the user's provider configuration
#[derive(Debug, Clone, Copy)]
pub struct UrlBuilder<'a> {
    backend: &'a BackendConfiguration,
    config: &'a ProviderConfiguration,
}

impl<'a> UrlBuilder<'a> {
    #[must_use]
    pub const fn new(backend: &'a BackendConfiguration, config: &'a ProviderConfiguration) -> Self {
        Self { backend, config }
    }

    /// Host for a resource: user endpoint override, then document override,
    /// then region-resolved host, then the global host.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeConfig` when a multi-region global host cannot be resolved.
    pub fn resource_host(&self, resource_name: &str, host: &ResourceHost) -> Result<String, Error> {
        if let Some(endpoint) = self.config.endpoint(resource_name) {
            return Ok(endpoint.to_string());
        }
        match host {
            ResourceHost::Override(host) | ResourceHost::Regional { host, .. } => Ok(host.clone()),
            ResourceHost::Global => self.backend.resolve_host(self.config.region.as_deref()),
        }
    }

    /// Full URL for a path template with its `{...}` parameters filled from `ids`
    /// left to right (parent ids first, then the instance id).
    ///
    /// # Errors
    ///
    /// Returns `RuntimeConfig` when the number of ids does not match the template.
    pub fn url(
        &self,
        resource_name: &str,
        host: &ResourceHost,
        path_template: &str,
        ids: &[&str],
    ) -> Result<String, Error> {
        let host = self.resource_host(resource_name, host)?;
        let path = substitute_path(path_template, ids)?;
        Ok(join_url(self.backend.scheme(), &host, &self.backend.base_path, &path))
    }
}

/// Fills path parameters left to right; ids are percent-encoded.
///
/// # Errors
///
/// Returns `RuntimeConfig` when `ids` has fewer or more entries than the template has parameters.
pub fn substitute_path(template: &str, ids: &[&str]) -> Result<String, Error> {
    let expected = PATH_PARAMETER.find_iter(template).count();
    if expected != ids.len() {
        return Err(Error::runtime_config(format!(
            "path '{template}' needs {expected} identifier(s), got {}",
            ids.len()
        )));
    }

    let mut ids = ids.iter();
    let path = PATH_PARAMETER.replace_all(template, |_: &regex::Captures<'_>| {
        ids.next()
            .map(|id| urlencoding::encode(id).into_owned())
            .unwrap_or_default()
    });
    Ok(path.into_owned())
}

/// `<scheme>://<host><base_path><path>` with exactly one `/` between segments
#[must_use]
pub fn join_url(scheme: &str, host: &str, base_path: &str, path: &str) -> String {
    let host = host.trim_end_matches('/');
    let base = base_path.trim_matches('/');
    let path = path.trim_start_matches('/');

    let mut url = format!("{scheme}://{host}");
    if !base.is_empty() {
        url.push('/');
        url.push_str(base);
    }
    if !path.is_empty() {
        url.push('/');
        url.push_str(path);
    }
    url
}
