use crate::constants;
use crate::spec::model::{SecurityDefinitionObject, SwaggerDocument};
use crate::utils::to_snake_case;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::warn;

/// How a credential is attached to a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SecuritySchemeKind {
    /// `<header>: <value>`
    ApiKeyHeader { header: String },
    /// `?<param>=<value>`
    ApiKeyQuery { param: String },
    /// `<header>: Bearer <value>`
    BearerHeader { header: String },
    /// `?<param>=<value>` where the value is a bearer token
    BearerQuery { param: String },
    /// The configured value is a refresh token exchanged at `url` for an access token
    RefreshToken { header: String, url: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityDefinition {
    pub name: String,
    pub kind: SecuritySchemeKind,
}

impl SecurityDefinition {
    /// Name of the provider configuration attribute holding the credential
    #[must_use]
    pub fn config_name(&self) -> String {
        to_snake_case(&self.name)
    }

    fn from_object(name: &str, object: &SecurityDefinitionObject) -> Option<Self> {
        if object.scheme_type != constants::SECURITY_TYPE_API_KEY {
            warn!(
                "security definition '{name}' of type '{}' is not supported and will be ignored",
                object.scheme_type
            );
            return None;
        }

        let param_name = object.name.clone().unwrap_or_default();
        let in_query = object.location.as_deref() == Some(constants::PARAM_IN_QUERY);
        let bearer = object.extensions.get_bool(constants::EXT_AUTH_SCHEME_BEARER);
        let refresh_url = object
            .extensions
            .get_str(constants::EXT_REFRESH_TOKEN_URL)
            .map(str::to_string);

        let kind = match (refresh_url, in_query, bearer) {
            (Some(url), false, _) => SecuritySchemeKind::RefreshToken {
                header: header_or_authorization(param_name),
                url,
            },
            (Some(_), true, _) => {
                warn!("security definition '{name}' declares a refresh token URL on a query parameter; ignored");
                return None;
            }
            (None, true, true) => SecuritySchemeKind::BearerQuery { param: param_name },
            (None, true, false) => SecuritySchemeKind::ApiKeyQuery { param: param_name },
            (None, false, true) => SecuritySchemeKind::BearerHeader {
                header: header_or_authorization(param_name),
            },
            (None, false, false) => SecuritySchemeKind::ApiKeyHeader { header: param_name },
        };

        Some(Self {
            name: name.to_string(),
            kind,
        })
    }
}

fn header_or_authorization(name: String) -> String {
    if name.is_empty() {
        constants::HEADER_AUTHORIZATION.to_string()
    } else {
        name
    }
}

/// One reference to a security scheme inside a requirement object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemeRef {
    pub scheme_name: String,
    pub scopes: Vec<String>,
}

/// A requirement object: every referenced scheme must be satisfied (AND)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SecurityRequirement {
    pub schemes: Vec<SchemeRef>,
}

/// Converts the raw `security` list; alternatives are OR-ed in declaration order
#[must_use]
pub fn requirements_from(raw: &[IndexMap<String, Vec<String>>]) -> Vec<SecurityRequirement> {
    raw.iter()
        .map(|object| SecurityRequirement {
            schemes: object
                .iter()
                .map(|(scheme_name, scopes)| SchemeRef {
                    scheme_name: scheme_name.clone(),
                    scopes: scopes.clone(),
                })
                .collect(),
        })
        .collect()
}

/// Security definitions and document-wide requirements
#[derive(Debug, Clone, Default, Serialize)]
pub struct SecuritySchemes {
    pub definitions: IndexMap<String, SecurityDefinition>,
    pub global: Vec<SecurityRequirement>,
}

impl SecuritySchemes {
    #[must_use]
    pub fn from_document(document: &SwaggerDocument) -> Self {
        let definitions = document
            .security_definitions
            .iter()
            .filter_map(|(name, object)| {
                SecurityDefinition::from_object(name, object).map(|def| (name.clone(), def))
            })
            .collect();

        let global = document
            .security
            .as_deref()
            .map(requirements_from)
            .unwrap_or_default();

        Self {
            definitions,
            global,
        }
    }

    /// Requirements effective for an operation: its own when declared (an empty
    /// list disables authentication), the document's otherwise
    #[must_use]
    pub fn operation_requirements(
        &self,
        declared: Option<&[IndexMap<String, Vec<String>>]>,
    ) -> Vec<SecurityRequirement> {
        declared.map_or_else(|| self.global.clone(), requirements_from)
    }

    /// True when the scheme is referenced by the document-wide `security` list
    #[must_use]
    pub fn is_global(&self, scheme_name: &str) -> bool {
        self.global
            .iter()
            .flat_map(|req| req.schemes.iter())
            .any(|s| s.scheme_name == scheme_name)
    }

    #[must_use]
    pub fn get(&self, scheme_name: &str) -> Option<&SecurityDefinition> {
        self.definitions.get(scheme_name)
    }
}
