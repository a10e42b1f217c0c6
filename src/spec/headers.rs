use crate::constants;
use crate::spec::http_methods_iter;
use crate::spec::model::{Parameter, SwaggerDocument};
use crate::utils::to_snake_case;
use serde::Serialize;

/// A header parameter declared by an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderParameter {
    /// Name sent on the wire
    pub name: String,
    /// `x-terraform-header` override of the configuration name
    pub preferred_name: Option<String>,
    pub required: bool,
}

impl HeaderParameter {
    /// Name of the provider configuration attribute that supplies this header
    #[must_use]
    pub fn config_name(&self) -> String {
        to_snake_case(self.preferred_name.as_deref().unwrap_or(&self.name))
    }

    fn from_parameter(param: &Parameter) -> Self {
        Self {
            name: param.name.clone(),
            preferred_name: param
                .extensions
                .get_str(constants::EXT_HEADER)
                .map(str::to_string),
            required: param.required,
        }
    }
}

/// Collects the header parameters of an operation, deduplicated by configuration
/// name with the first declaration winning
#[must_use]
pub fn collect_operation_headers<'a>(
    parameters: impl IntoIterator<Item = &'a Parameter>,
) -> Vec<HeaderParameter> {
    let mut headers: Vec<HeaderParameter> = Vec::new();
    for param in parameters {
        if param.location != constants::PARAM_IN_HEADER {
            continue;
        }
        let header = HeaderParameter::from_parameter(param);
        let config_name = header.config_name();
        if !headers.iter().any(|h| h.config_name() == config_name) {
            headers.push(header);
        }
    }
    headers
}

/// Union of every header declared anywhere in the document, one entry per
/// configuration name
#[must_use]
pub fn collect_document_headers(document: &SwaggerDocument) -> Vec<HeaderParameter> {
    let mut headers: Vec<HeaderParameter> = Vec::new();

    for item in document.paths.values() {
        for (_, operation) in http_methods_iter(item) {
            let Some(operation) = operation else {
                continue;
            };
            let params = item.parameters.iter().chain(operation.parameters.iter());
            for header in collect_operation_headers(params) {
                let config_name = header.config_name();
                if !headers.iter().any(|h| h.config_name() == config_name) {
                    headers.push(header);
                }
            }
        }
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn param(value: serde_json::Value) -> Parameter {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_collect_operation_headers_dedups_by_normalised_name() {
        let params = [
            param(json!({"name": "X-Request-ID", "in": "header", "required": true})),
            param(json!({"name": "x_request_id", "in": "header"})),
            param(json!({"name": "limit", "in": "query"})),
        ];
        let headers = collect_operation_headers(&params);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].name, "X-Request-ID");
        assert!(headers[0].required);
        assert_eq!(headers[0].config_name(), "x_request_id");
    }

    #[test]
    fn test_preferred_header_name() {
        let params = [param(json!({
            "name": "X-Tenant",
            "in": "header",
            "x-terraform-header": "tenantName"
        }))];
        let headers = collect_operation_headers(&params);
        assert_eq!(headers[0].config_name(), "tenant_name");
    }

    #[test]
    fn test_collect_document_headers_registers_once() {
        let document: SwaggerDocument = serde_json::from_value(json!({
            "swagger": "2.0",
            "paths": {
                "/v1/cdns": {"post": {"parameters": [
                    {"name": "X-Request-ID", "in": "header"}
                ]}},
                "/v1/lbs": {
                    "parameters": [{"name": "X-Trace", "in": "header"}],
                    "post": {"parameters": [{"name": "x-request-id", "in": "header"}]}
                }
            }
        }))
        .unwrap();
        let names: Vec<String> = collect_document_headers(&document)
            .iter()
            .map(HeaderParameter::config_name)
            .collect();
        assert_eq!(names, vec!["x_request_id", "x_trace"]);
    }
}
