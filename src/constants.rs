//! Centralized string constants for the `OpenAPI` provider
//!
//! Vendor extension names, header names and defaults live here so the
//! analyser, the schema compiler and the HTTP engine agree on them.

// Definition and property level extensions
pub const EXT_IMMUTABLE: &str = "x-terraform-immutable";
pub const EXT_FORCE_NEW: &str = "x-terraform-force-new";
pub const EXT_SENSITIVE: &str = "x-terraform-sensitive";
pub const EXT_FIELD_NAME: &str = "x-terraform-field-name";
pub const EXT_FIELD_STATUS: &str = "x-terraform-field-status";
pub const EXT_ID: &str = "x-terraform-id";
pub const EXT_COMPUTED: &str = "x-terraform-computed";
pub const EXT_IGNORE_ORDER: &str = "x-terraform-ignore-order";

// Operation level extensions
pub const EXT_RESOURCE_TIMEOUT: &str = "x-terraform-resource-timeout";
pub const EXT_POLL_ENABLED: &str = "x-terraform-resource-poll-enabled";
pub const EXT_POLL_COMPLETED_STATUSES: &str = "x-terraform-resource-poll-completed-statuses";
pub const EXT_POLL_PENDING_STATUSES: &str = "x-terraform-resource-poll-pending-statuses";
pub const EXT_EXCLUDE_RESOURCE: &str = "x-terraform-exclude-resource";
pub const EXT_RESOURCE_NAME: &str = "x-terraform-resource-name";
pub const EXT_RESOURCE_HOST: &str = "x-terraform-resource-host";

// Parameter level extensions
pub const EXT_HEADER: &str = "x-terraform-header";

// Document level extensions
pub const EXT_PROVIDER_MULTIREGION_FQDN: &str = "x-terraform-provider-multiregion-fqdn";
pub const EXT_PROVIDER_REGIONS: &str = "x-terraform-provider-regions";
pub const EXT_RESOURCE_REGIONS_PREFIX: &str = "x-terraform-resource-regions-";

// Security definition extensions
pub const EXT_AUTH_SCHEME_BEARER: &str = "x-terraform-authentication-scheme-bearer";
pub const EXT_REFRESH_TOKEN_URL: &str = "x-terraform-refresh-token-url";

// Swagger keywords
pub const SWAGGER_VERSION_2: &str = "2.0";
pub const REF_KEY: &str = "$ref";
pub const DEFINITIONS_PREFIX: &str = "#/definitions/";
pub const PARAM_IN_HEADER: &str = "header";
pub const PARAM_IN_QUERY: &str = "query";
pub const PARAM_IN_BODY: &str = "body";
pub const SECURITY_TYPE_API_KEY: &str = "apiKey";

// Schema types
pub const TYPE_STRING: &str = "string";
pub const TYPE_INTEGER: &str = "integer";
pub const TYPE_NUMBER: &str = "number";
pub const TYPE_BOOLEAN: &str = "boolean";
pub const TYPE_ARRAY: &str = "array";
pub const TYPE_OBJECT: &str = "object";

// Schemes
pub const SCHEME_HTTPS: &str = "https";
pub const SCHEME_HTTP: &str = "http";

// Well-known property names
pub const PROPERTY_ID: &str = "id";
pub const PROPERTY_STATUS: &str = "status";

// Data source filter block
pub const FILTER_BLOCK: &str = "filter";
pub const FILTER_NAME: &str = "name";
pub const FILTER_VALUES: &str = "values";
pub const INSTANCE_DATA_SOURCE_SUFFIX: &str = "_instance";

// Provider configuration surface
pub const CONFIG_ENDPOINTS: &str = "endpoints";
pub const CONFIG_REGION: &str = "region";

// Pseudo status observed when a resource disappears while polling a delete
pub const STATUS_DESTROYED: &str = "destroyed";

// HTTP
pub const HEADER_USER_AGENT: &str = "User-Agent";
pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_ACCEPT: &str = "Accept";
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const BEARER_PREFIX: &str = "Bearer";
pub const HTTP_METHOD_GET: &str = "GET";
pub const HTTP_METHOD_POST: &str = "POST";
pub const HTTP_METHOD_PUT: &str = "PUT";
pub const HTTP_METHOD_DELETE: &str = "DELETE";

// Environment variables
pub const ENV_PLUGIN_CONFIG: &str = "OPENAPI_PROVIDER_PLUGIN_CONFIG";
pub const ENV_SWAGGER_URL_PREFIX: &str = "OTF_VAR_";
pub const ENV_SWAGGER_URL_SUFFIX: &str = "_SWAGGER_URL";
pub const ENV_LOG: &str = "OPENAPI_PROVIDER_LOG";
pub const ENV_LOG_FORMAT: &str = "OPENAPI_PROVIDER_LOG_FORMAT";
pub const ENV_LOG_FILE: &str = "OPENAPI_PROVIDER_LOG_FILE";
pub const ENV_LOG_MAX_BODY: &str = "OPENAPI_PROVIDER_LOG_MAX_BODY";

// Plugin configuration file
pub const PLUGIN_CONFIG_DIR: &str = ".terraform.d/plugins";
pub const PLUGIN_CONFIG_FILE: &str = "terraform-provider-openapi.yaml";
pub const PLUGIN_CONFIG_VERSION: &str = "1";

// Default values
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_LOG_MAX_BODY: usize = 1000;
pub const MAX_DOCUMENT_SIZE: u64 = 10 * 1024 * 1024;

// Error context messages
pub const ERR_API_CREDENTIALS: &str =
    "Check the provider credentials and authentication configuration.";
pub const ERR_PERMISSION_DENIED: &str =
    "The credentials may be valid but lack permission for this operation.";
pub const ERR_SERVER_ERROR: &str = "The API server is experiencing issues. Try again later.";
pub const ERR_CONNECTION: &str = "Check that the API server is running and accessible.";
pub const ERR_DOCUMENT_FORMAT: &str =
    "Check that the OpenAPI document is a valid Swagger 2.0 document.";
pub const ERR_RESOURCE_COMPILATION: &str =
    "The resource was skipped; fix its definition in the OpenAPI document.";
pub const ERR_PROVIDER_CONFIG: &str = "Check the provider block in your configuration.";
pub const ERR_POLLING: &str =
    "The API did not reach a completed status; inspect the resource on the API side.";
