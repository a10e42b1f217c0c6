//! The HTTP half of the lifecycle engine: one shared client per configured
//! provider, credential and header injection, response classification.

use crate::config::provider::ProviderConfiguration;
use crate::config::settings::EngineSettings;
use crate::constants;
use crate::engine::auth::Authenticator;
use crate::engine::url::UrlBuilder;
use crate::error::Error;
use crate::logging;
use crate::spec::backend::BackendConfiguration;
use crate::spec::resource::ResourceOperation;
use crate::spec::schema::SchemaDefinition;
use crate::spec::security::SecuritySchemes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::{Map, Value};
use std::str::FromStr;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Installs the process-wide rustls crypto provider. Safe to call repeatedly.
pub fn install_crypto_provider() {
    #[cfg(not(windows))]
    let _ = rustls::crypto::ring::default_provider().install_default();
    #[cfg(windows)]
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// A decoded HTTP response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// `None` for 204, empty or non-JSON bodies
    pub body: Option<Value>,
    pub text: String,
}

impl ApiResponse {
    #[must_use]
    pub fn object(&self) -> Option<&Map<String, Value>> {
        self.body.as_ref().and_then(Value::as_object)
    }
}

/// One request of a resource operation
#[derive(Debug)]
pub struct ApiRequest<'a> {
    /// Resource name, for diagnostics
    pub resource: &'a str,
    pub method: Method,
    pub url: String,
    pub operation: &'a ResourceOperation,
    /// Schema of the bodies exchanged, used to mask sensitive values in logs
    pub schema: &'a SchemaDefinition,
    pub body: Option<Value>,
}

/// Reentrant request executor shared by every resource of a provider instance
#[derive(Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    backend: BackendConfiguration,
    config: ProviderConfiguration,
    authenticator: Authenticator,
    settings: EngineSettings,
    user_agent: String,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns `RuntimeConfig` when the HTTP client cannot be built.
    pub fn new(
        backend: BackendConfiguration,
        security: SecuritySchemes,
        config: ProviderConfiguration,
        settings: EngineSettings,
    ) -> Result<Self, Error> {
        install_crypto_provider();
        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .danger_accept_invalid_certs(settings.insecure_skip_verify)
            .build()
            .map_err(|e| Error::runtime_config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            authenticator: Authenticator::new(security, http.clone()),
            user_agent: settings.user_agent(),
            http,
            backend,
            config,
            settings,
        })
    }

    #[must_use]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    #[must_use]
    pub const fn config(&self) -> &ProviderConfiguration {
        &self.config
    }

    #[must_use]
    pub const fn backend(&self) -> &BackendConfiguration {
        &self.backend
    }

    #[must_use]
    pub const fn url_builder(&self) -> UrlBuilder<'_> {
        UrlBuilder::new(&self.backend, &self.config)
    }

    /// Authenticates, sends and decodes one request. The status is not checked;
    /// see [`ensure_success`].
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` when the token fires before or during the round trip,
    /// `RuntimeConfig` for missing credentials or required headers, and
    /// `Transport` when the request cannot be sent.
    pub async fn send(
        &self,
        request: ApiRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, Error> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled {
                resource: request.resource.to_string(),
            });
        }

        let credentials = self
            .authenticator
            .authenticate(&request.operation.security, &self.config)
            .await?;

        let mut headers = self.base_headers(request.body.is_some())?;
        for header in &request.operation.headers {
            match self.config.header_value(&header.config_name()) {
                Some(value) => insert_header(&mut headers, &header.name, value)?,
                None if header.required => {
                    return Err(Error::runtime_config(format!(
                        "header '{}' is required by {} {} but '{}' is not configured",
                        header.name,
                        request.method,
                        request.url,
                        header.config_name()
                    )));
                }
                None => {}
            }
        }
        for (name, value) in &credentials.headers {
            insert_header(&mut headers, name, value)?;
        }

        let mut url = reqwest::Url::parse(&request.url).map_err(|e| Error::Transport {
            method: request.method.to_string(),
            url: request.url.clone(),
            reason: e.to_string(),
        })?;
        if !credentials.query.is_empty() {
            url.query_pairs_mut().extend_pairs(credentials.query.iter());
        }

        let body = request.body.as_ref().map(serde_json::to_string).transpose()?;
        let logged_body = request
            .body
            .as_ref()
            .map(|body| logging::mask_sensitive(request.schema, body).to_string());
        logging::log_request(
            request.method.as_str(),
            url.as_str(),
            &headers,
            logged_body.as_deref(),
        );

        let mut builder = self
            .http
            .request(request.method.clone(), url.clone())
            .headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let start = Instant::now();
        let response = tokio::select! {
            result = builder.send() => result.map_err(|e| Error::Transport {
                method: request.method.to_string(),
                url: logging::redact_query(url.as_str()),
                reason: e.to_string(),
            })?,
            () = cancel.cancelled() => {
                return Err(Error::Cancelled {
                    resource: request.resource.to_string(),
                });
            }
        };

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| Error::Transport {
            method: request.method.to_string(),
            url: logging::redact_query(url.as_str()),
            reason: e.to_string(),
        })?;
        let body: Option<Value> = if status == 204 || text.trim().is_empty() {
            None
        } else {
            serde_json::from_str(&text).ok()
        };
        let logged_text = body.as_ref().map_or_else(
            || text.clone(),
            |body| logging::mask_sensitive(request.schema, body).to_string(),
        );
        logging::log_response(status, start.elapsed().as_millis(), Some(&logged_text));

        Ok(ApiResponse { status, body, text })
    }

    fn base_headers(&self, with_body: bool) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        insert_header(&mut headers, constants::HEADER_USER_AGENT, &self.user_agent)?;
        headers.insert(
            constants::HEADER_ACCEPT,
            HeaderValue::from_static(constants::CONTENT_TYPE_JSON),
        );
        if with_body {
            headers.insert(
                constants::HEADER_CONTENT_TYPE,
                HeaderValue::from_static(constants::CONTENT_TYPE_JSON),
            );
        }
        Ok(headers)
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), Error> {
    let header_name = HeaderName::from_str(name)
        .map_err(|e| Error::runtime_config(format!("invalid header name '{name}': {e}")))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|e| Error::runtime_config(format!("invalid value for header '{name}': {e}")))?;
    headers.insert(header_name, header_value);
    Ok(())
}

/// Accepts 200, 201, 202 and 204.
///
/// # Errors
///
/// Returns `ApiResponse` with the status and a body snippet for anything else.
pub fn ensure_success(
    method: &Method,
    url: &str,
    response: ApiResponse,
) -> Result<ApiResponse, Error> {
    if matches!(response.status, 200 | 201 | 202 | 204) {
        return Ok(response);
    }
    Err(Error::ApiResponse {
        method: method.to_string(),
        url: logging::redact_query(url),
        status: response.status,
        body: body_snippet(&response.text),
    })
}

fn body_snippet(text: &str) -> String {
    if text.is_empty() {
        return "(empty response)".to_string();
    }
    if text.chars().count() <= MAX_ERROR_BODY_CHARS {
        return text.to_string();
    }
    let mut snippet: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
    snippet.push_str("...");
    snippet
}
