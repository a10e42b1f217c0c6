use crate::constants;
use crate::error::Error;
use crate::spec::model::SwaggerDocument;
use crate::spec::paths::{multi_region_keyword, resolve_region_host};
use serde::Serialize;
use tracing::warn;

/// Region-parameterised host declared at document level
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultiRegion {
    pub template: String,
    pub keyword: String,
    pub regions: Vec<String>,
}

/// Where the described API lives: host, base path, scheme and optional regions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendConfiguration {
    pub host: String,
    pub base_path: String,
    pub schemes: Vec<String>,
    pub multi_region: Option<MultiRegion>,
}

impl BackendConfiguration {
    /// Resolves the backend of a document.
    ///
    /// # Errors
    ///
    /// Returns `DocumentValidation` when no host can be derived, the document has
    /// no http/https scheme, or a multi-region template is declared without regions.
    pub fn from_document(document: &SwaggerDocument, document_url: &str) -> Result<Self, Error> {
        let multi_region = resolve_multi_region(document)?;

        let host = match document.host.as_deref().map(str::trim) {
            Some(host) if !host.is_empty() => host.to_string(),
            _ if multi_region.is_some() => String::new(),
            _ => host_from_url(document_url)?,
        };

        let schemes: Vec<String> = document
            .schemes
            .iter()
            .map(|s| s.to_ascii_lowercase())
            .filter(|s| s == constants::SCHEME_HTTPS || s == constants::SCHEME_HTTP)
            .collect();
        if schemes.is_empty() {
            return Err(Error::document_validation(
                "document must declare the 'http' or 'https' scheme",
            ));
        }

        Ok(Self {
            host,
            base_path: normalise_base_path(document.base_path.as_deref().unwrap_or_default()),
            schemes,
            multi_region,
        })
    }

    /// Preferred scheme, https over http
    #[must_use]
    pub fn scheme(&self) -> &str {
        if self.schemes.iter().any(|s| s == constants::SCHEME_HTTPS) {
            constants::SCHEME_HTTPS
        } else {
            constants::SCHEME_HTTP
        }
    }

    #[must_use]
    pub const fn is_multi_region(&self) -> bool {
        self.multi_region.is_some()
    }

    #[must_use]
    pub fn regions(&self) -> &[String] {
        self.multi_region
            .as_ref()
            .map_or(&[], |mr| mr.regions.as_slice())
    }

    /// First declared region
    #[must_use]
    pub fn default_region(&self) -> Option<&str> {
        self.regions().first().map(String::as_str)
    }

    /// Host of the multi-region template for `region`.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeConfig` when the backend is not multi-region or the region
    /// is not one of the declared regions.
    pub fn host_by_region(&self, region: &str) -> Result<String, Error> {
        let Some(mr) = &self.multi_region else {
            return Err(Error::runtime_config(
                "the API does not declare a multi-region host",
            ));
        };
        if !mr.regions.iter().any(|r| r == region) {
            return Err(Error::runtime_config(format!(
                "region '{region}' is not one of the allowed regions: {}",
                mr.regions.join(", ")
            )));
        }
        Ok(resolve_region_host(&mr.template, &mr.keyword, region))
    }

    /// Global host, resolved through the region (or the default region) for
    /// multi-region backends.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeConfig` for regions outside the allowed list.
    pub fn resolve_host(&self, region: Option<&str>) -> Result<String, Error> {
        if self.multi_region.is_none() {
            return Ok(self.host.clone());
        }
        let region = region
            .or_else(|| self.default_region())
            .ok_or_else(|| Error::runtime_config("no region available"))?;
        self.host_by_region(region)
    }
}

fn resolve_multi_region(document: &SwaggerDocument) -> Result<Option<MultiRegion>, Error> {
    let Some(template) = document
        .extensions
        .get_str(constants::EXT_PROVIDER_MULTIREGION_FQDN)
    else {
        return Ok(None);
    };

    let Some(keyword) = multi_region_keyword(template) else {
        warn!(
            "{} '{template}' is not a region template and will be ignored",
            constants::EXT_PROVIDER_MULTIREGION_FQDN
        );
        return Ok(None);
    };

    let regions = document
        .extensions
        .get_csv(constants::EXT_PROVIDER_REGIONS)
        .unwrap_or_default();
    if regions.is_empty() {
        return Err(Error::document_validation(format!(
            "{} is declared but {} is missing or empty",
            constants::EXT_PROVIDER_MULTIREGION_FQDN,
            constants::EXT_PROVIDER_REGIONS
        )));
    }

    Ok(Some(MultiRegion {
        template: template.to_string(),
        keyword,
        regions,
    }))
}

fn host_from_url(document_url: &str) -> Result<String, Error> {
    if document_url.trim().is_empty() {
        return Err(Error::document_validation(
            "document declares no host and the document URL is empty",
        ));
    }
    let url = reqwest::Url::parse(document_url).map_err(|e| {
        Error::document_validation(format!(
            "document declares no host and '{document_url}' is not a URL: {e}"
        ))
    })?;
    let host = url.host_str().ok_or_else(|| {
        Error::document_validation(format!(
            "document declares no host and '{document_url}' has none"
        ))
    })?;
    Ok(url
        .port()
        .map_or_else(|| host.to_string(), |port| format!("{host}:{port}")))
}

/// `""` and `"/"` become empty; anything else gets exactly one leading slash and none trailing
#[must_use]
pub fn normalise_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(value: serde_json::Value) -> SwaggerDocument {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_host_and_scheme_preference() {
        let doc = document(json!({
            "swagger": "2.0", "host": "api.example.com", "basePath": "/api/",
            "schemes": ["http", "https"]
        }));
        let backend = BackendConfiguration::from_document(&doc, "").unwrap();
        assert_eq!(backend.host, "api.example.com");
        assert_eq!(backend.base_path, "/api");
        assert_eq!(backend.scheme(), "https");
    }

    #[test]
    fn test_host_falls_back_to_document_url() {
        let doc = document(json!({"swagger": "2.0", "schemes": ["http"]}));
        let backend =
            BackendConfiguration::from_document(&doc, "http://localhost:8080/swagger.yaml")
                .unwrap();
        assert_eq!(backend.host, "localhost:8080");
        assert_eq!(backend.scheme(), "http");

        let err = BackendConfiguration::from_document(&doc, "").unwrap_err();
        assert!(matches!(err, Error::DocumentValidation { .. }));
    }

    #[test]
    fn test_missing_scheme_is_rejected() {
        let doc = document(json!({"swagger": "2.0", "host": "api.example.com", "schemes": ["ws"]}));
        assert!(BackendConfiguration::from_document(&doc, "").is_err());
        let doc = document(json!({"swagger": "2.0", "host": "api.example.com"}));
        assert!(BackendConfiguration::from_document(&doc, "").is_err());
    }

    #[test]
    fn test_multi_region_backend() {
        let doc = document(json!({
            "swagger": "2.0", "schemes": ["https"],
            "x-terraform-provider-multiregion-fqdn": "api.${region}.example.com",
            "x-terraform-provider-regions": "rst1, dub1"
        }));
        let backend = BackendConfiguration::from_document(&doc, "").unwrap();
        assert!(backend.is_multi_region());
        assert_eq!(backend.default_region(), Some("rst1"));
        assert_eq!(backend.host_by_region("dub1").unwrap(), "api.dub1.example.com");
        assert_eq!(backend.resolve_host(None).unwrap(), "api.rst1.example.com");
        assert!(backend.host_by_region("nowhere").is_err());
    }

    #[test]
    fn test_multi_region_without_regions_is_rejected() {
        let doc = document(json!({
            "swagger": "2.0", "schemes": ["https"],
            "x-terraform-provider-multiregion-fqdn": "api.${region}.example.com",
            "x-terraform-provider-regions": ""
        }));
        let err = BackendConfiguration::from_document(&doc, "").unwrap_err();
        assert!(matches!(err, Error::DocumentValidation { .. }));
    }

    #[test]
    fn test_normalise_base_path() {
        assert_eq!(normalise_base_path(""), "");
        assert_eq!(normalise_base_path("/"), "");
        assert_eq!(normalise_base_path("api"), "/api");
        assert_eq!(normalise_base_path("/api/v1/"), "/api/v1");
    }
}
