//! Credential injection for outgoing requests.

use crate::config::provider::ProviderConfiguration;
use crate::constants;
use crate::error::Error;
use crate::spec::security::{
    SecurityDefinition, SecurityRequirement, SecuritySchemeKind, SecuritySchemes,
};
use tracing::{debug, info};

/// Headers and query parameters carrying the credentials of one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
}

/// Picks the first satisfiable security requirement of an operation and turns
/// it into [`Credentials`]
#[derive(Debug, Clone)]
pub struct Authenticator {
    schemes: SecuritySchemes,
    http: reqwest::Client,
}

impl Authenticator {
    #[must_use]
    pub const fn new(schemes: SecuritySchemes, http: reqwest::Client) -> Self {
        Self { schemes, http }
    }

    /// Credentials for an operation.
    ///
    /// An empty requirement list means the operation is unauthenticated.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeConfig` when no requirement can be satisfied from the
    /// configuration, and the refresh call's errors for refresh-token schemes.
    pub async fn authenticate(
        &self,
        requirements: &[SecurityRequirement],
        config: &ProviderConfiguration,
    ) -> Result<Credentials, Error> {
        if requirements.is_empty() {
            return Ok(Credentials::default());
        }

        let Some(selected) = requirements
            .iter()
            .find_map(|req| self.resolve(req, config))
        else {
            let names: Vec<String> = requirements
                .iter()
                .map(|req| {
                    req.schemes
                        .iter()
                        .map(|s| s.scheme_name.as_str())
                        .collect::<Vec<_>>()
                        .join(" + ")
                })
                .collect();
            return Err(Error::runtime_config(format!(
                "no configured credentials satisfy the security requirements: {}",
                names.join(" or ")
            )));
        };

        let mut credentials = Credentials::default();
        for (definition, value) in selected {
            debug!("applying security scheme '{}'", definition.name);
            self.apply(definition, value, &mut credentials).await?;
        }
        Ok(credentials)
    }

    /// Every scheme of the requirement with its configured value, if all are present
    fn resolve<'s, 'c>(
        &'s self,
        requirement: &SecurityRequirement,
        config: &'c ProviderConfiguration,
    ) -> Option<Vec<(&'s SecurityDefinition, &'c str)>> {
        requirement
            .schemes
            .iter()
            .map(|scheme| {
                let definition = self.schemes.get(&scheme.scheme_name)?;
                let value = config.security_value(&definition.config_name())?;
                Some((definition, value))
            })
            .collect()
    }

    async fn apply(
        &self,
        definition: &SecurityDefinition,
        value: &str,
        credentials: &mut Credentials,
    ) -> Result<(), Error> {
        match &definition.kind {
            SecuritySchemeKind::ApiKeyHeader { header } => {
                credentials.headers.push((header.clone(), value.to_string()));
            }
            SecuritySchemeKind::ApiKeyQuery { param }
            | SecuritySchemeKind::BearerQuery { param } => {
                credentials.query.push((param.clone(), value.to_string()));
            }
            SecuritySchemeKind::BearerHeader { header } => {
                credentials.headers.push((header.clone(), bearer(value)));
            }
            SecuritySchemeKind::RefreshToken { header, url } => {
                let token = self.refresh_access_token(url, value).await?;
                credentials.headers.push((header.clone(), bearer(&token)));
            }
        }
        Ok(())
    }

    /// Exchanges a refresh token for an access token, returned in the
    /// response's `Authorization` header
    async fn refresh_access_token(&self, url: &str, refresh_token: &str) -> Result<String, Error> {
        info!("POST {url} (token refresh)");
        let response = self
            .http
            .post(url)
            .header(constants::HEADER_AUTHORIZATION, refresh_token)
            .send()
            .await
            .map_err(|e| Error::Transport {
                method: constants::HTTP_METHOD_POST.to_string(),
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let token = response
            .headers()
            .get(constants::HEADER_AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ApiResponse {
                method: constants::HTTP_METHOD_POST.to_string(),
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        token.filter(|t| !t.is_empty()).ok_or_else(|| Error::ApiResponse {
            method: constants::HTTP_METHOD_POST.to_string(),
            url: url.to_string(),
            status: status.as_u16(),
            body: format!(
                "token refresh response has no {} header",
                constants::HEADER_AUTHORIZATION
            ),
        })
    }
}

/// `Bearer <token>`, leaving an already prefixed token alone
fn bearer(token: &str) -> String {
    let prefix = format!("{} ", constants::BEARER_PREFIX);
    if token.starts_with(&prefix) {
        token.to_string()
    } else {
        format!("{prefix}{token}")
    }
}
