
use openapi_provider::error::Error;
use openapi_provider::provider::{ProviderService, ResourceState};
use serde_json::json;
use std::sync::{Arc, Mutex};
use test_helpers::{cdn_api, configured_provider, mock_host, object, swagger, API_KEY};
use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn state(id: &str, attributes: serde_json::Value) -> ResourceState {
    ResourceState {
        id: id.to_string(),
        attributes: object(attributes),
    }
}

async fn cdn_provider(server: &MockServer) -> openapi_provider::provider::OpenApiProvider {
    configured_provider(
        &cdn_api(&mock_host(server)),
        json!({"apikey_auth": API_KEY, "request_id": "req-1"}),
    )
    .await
}

#[tokio::test]
async fn test_create_polls_until_completed_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/cdns"))
        .and(header("X-API-Key", API_KEY))
        .and(header("X-Request-ID", "req-1"))
        .and(header_exists("User-Agent"))
        .and(body_json(json!({"label": "edge", "region": "eu"})))
        .respond_with(ResponseTemplate::new(202).set_body_json(
            json!({"id": "42", "label": "edge", "region": "eu", "status": "creating"}),
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/cdns/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"id": "42", "label": "edge", "region": "eu", "status": "creating"}),
        ))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/cdns/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"id": "42", "label": "edge", "region": "eu", "status": "deployed"}),
        ))
        .mount(&server)
        .await;

    let provider = cdn_provider(&server).await;
    let created = provider
        .create("cdn_cdns_v1", object(json!({"label": "edge", "region": "eu"})))
        .await
        .unwrap();

    assert_eq!(created.id, "42");
    assert_eq!(created.attributes["status"], json!("deployed"));
    assert_eq!(created.attributes["label"], json!("edge"));
    assert!(!created.attributes.contains_key("id"));
}

#[tokio::test]
async fn test_create_fails_on_unexpected_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/cdns"))
        .respond_with(
            ResponseTemplate::new(202).set_body_json(json!({"id": "42", "status": "creating"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/cdns/42"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "42", "status": "failed"})),
        )
        .mount(&server)
        .await;

    let provider = cdn_provider(&server).await;
    let err = provider
        .create("cdn_cdns_v1", object(json!({"label": "edge"})))
        .await
        .unwrap_err();

    match err {
        Error::Polling { last_status, .. } => assert_eq!(last_status, "failed"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_create_without_identifier_in_response_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/lbs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"name": "lb"})))
        .mount(&server)
        .await;

    let provider = cdn_provider(&server).await;
    let err = provider
        .create("cdn_lbs_v1", object(json!({"name": "lb"})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ApiResponse { status: 201, .. }));
}

#[tokio::test]
async fn test_synchronous_create_and_api_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/lbs"))
        .and(body_json(json!({"name": "lb"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 7, "name": "lb"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/lbs"))
        .respond_with(ResponseTemplate::new(409).set_body_string("name already taken"))
        .mount(&server)
        .await;

    let provider = cdn_provider(&server).await;
    let created = provider
        .create("cdn_lbs_v1", object(json!({"name": "lb"})))
        .await
        .unwrap();
    assert_eq!(created.id, "7");

    let err = provider
        .create("cdn_lbs_v1", object(json!({"name": "lb"})))
        .await
        .unwrap_err();
    match err {
        Error::ApiResponse { status, body, .. } => {
            assert_eq!(status, 409);
            assert!(body.contains("already taken"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_read_reports_missing_resource() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/cdns/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"id": "42", "label": "renamed", "status": "deployed"}),
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/cdns/43"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let provider = cdn_provider(&server).await;
    let current = provider
        .read("cdn_cdns_v1", &state("42", json!({"label": "edge", "region": "eu"})))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.attributes["label"], json!("renamed"));
    assert_eq!(current.attributes["region"], json!("eu"));

    let gone = provider
        .read("cdn_cdns_v1", &state("43", json!({"label": "edge"})))
        .await
        .unwrap();
    assert!(gone.is_none());
}

#[tokio::test]
async fn test_update_sends_put_and_rejects_immutable_changes() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/cdns/42"))
        .and(body_json(json!({"label": "edge2", "region": "eu"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"id": "42", "label": "edge2", "region": "eu", "status": "deployed"}),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let provider = cdn_provider(&server).await;
    let prior = state("42", json!({"label": "edge", "region": "eu", "status": "deployed"}));

    let updated = provider
        .update(
            "cdn_cdns_v1",
            &prior,
            object(json!({"label": "edge2", "region": "eu", "status": "deployed"})),
        )
        .await
        .unwrap();
    assert_eq!(updated.id, "42");
    assert_eq!(updated.attributes["label"], json!("edge2"));

    let err = provider
        .update(
            "cdn_cdns_v1",
            &prior,
            object(json!({"label": "edge", "region": "us"})),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("immutable"));
}

#[tokio::test]
async fn test_update_without_put_is_unsupported() {
    let server = MockServer::start().await;
    let provider = cdn_provider(&server).await;
    let err = provider
        .update(
            "cdn_lbs_v1",
            &state("7", json!({"name": "lb"})),
            object(json!({"name": "lb2"})),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedOperation { .. }));
}

#[tokio::test]
async fn test_delete_polls_until_resource_is_gone() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/cdns/42"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/cdns/42"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "42", "status": "deleting"})),
        )
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/cdns/42"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let provider = cdn_provider(&server).await;
    provider
        .delete("cdn_cdns_v1", &state("42", json!({"label": "edge"})))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_of_missing_resource_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/lbs/7"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/lbs/8"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let provider = cdn_provider(&server).await;
    provider
        .delete("cdn_lbs_v1", &state("7", json!({"name": "lb"})))
        .await
        .unwrap();
    provider
        .delete("cdn_lbs_v1", &state("8", json!({"name": "lb"})))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_sub_resource_urls_use_parent_ids() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/cdns/c1/v1/firewalls"))
        .and(body_json(json!({"name": "fw"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "f1", "name": "fw"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/cdns/c1/v1/firewalls/f1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "f1", "name": "fw"})))
        .mount(&server)
        .await;

    let provider = cdn_provider(&server).await;
    let created = provider
        .create(
            "cdn_cdns_v1_firewalls_v1",
            object(json!({"cdns_v1_id": "c1", "name": "fw"})),
        )
        .await
        .unwrap();
    assert_eq!(created.id, "f1");
    assert_eq!(created.attributes["cdns_v1_id"], json!("c1"));

    let current = provider
        .read("cdn_cdns_v1_firewalls_v1", &created)
        .await
        .unwrap();
    assert!(current.is_some());

    let err = provider
        .create("cdn_cdns_v1_firewalls_v1", object(json!({"name": "fw"})))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("cdns_v1_id"));
}

#[tokio::test]
async fn test_filter_data_source_requires_exactly_one_match() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/cdns"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "42", "label": "edge", "status": "deployed"},
            {"id": "43", "label": "origin", "status": "deployed"}
        ])))
        .mount(&server)
        .await;

    let provider = cdn_provider(&server).await;
    let found = provider
        .read_data_source(
            "cdn_cdns_v1",
            object(json!({"filter": [{"name": "label", "values": ["edge"]}]})),
        )
        .await
        .unwrap();
    assert_eq!(found.id, "42");
    assert_eq!(found.attributes["status"], json!("deployed"));

    let err = provider
        .read_data_source(
            "cdn_cdns_v1",
            object(json!({"filter": [{"name": "status", "values": ["deployed"]}]})),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("matched 2"));
}

#[tokio::test]
async fn test_instance_data_source_reads_by_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/cdns/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"id": "42", "label": "edge", "status": "deployed"}),
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/cdns/99"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let provider = cdn_provider(&server).await;
    let found = provider
        .read_data_source("cdn_cdns_v1_instance", object(json!({"id": "42"})))
        .await
        .unwrap();
    assert_eq!(found.id, "42");
    assert_eq!(found.attributes["label"], json!("edge"));

    let err = provider
        .read_data_source("cdn_cdns_v1_instance", object(json!({"id": "99"})))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_stopped_provider_cancels_operations() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/lbs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "7", "name": "lb"})))
        .expect(0)
        .mount(&server)
        .await;

    let provider = cdn_provider(&server).await;
    provider.stop();
    let err = provider
        .create("cdn_lbs_v1", object(json!({"name": "lb"})))
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}

fn token_api(server: &MockServer, security_definitions: serde_json::Value) -> serde_json::Value {
    let mut raw = swagger(
        &mock_host(server),
        json!({
            "/v1/tokens": {
                "post": {
                    "parameters": [{"in": "body", "name": "body", "schema": {"$ref": "#/definitions/Token"}}],
                    "responses": {"201": {"description": "created", "schema": {"$ref": "#/definitions/Token"}}}
                }
            },
            "/v1/tokens/{id}": {
                "get": {
                    "parameters": [{"in": "path", "name": "id", "required": true, "type": "string"}],
                    "responses": {"200": {"description": "ok", "schema": {"$ref": "#/definitions/Token"}}}
                }
            }
        }),
        json!({
            "Token": {
                "type": "object",
                "properties": {
                    "id": {"type": "string", "readOnly": true},
                    "name": {"type": "string"}
                }
            }
        }),
    );
    let requirement: serde_json::Map<String, serde_json::Value> = security_definitions
        .as_object()
        .map(|defs| defs.keys().map(|name| (name.clone(), json!([]))).collect())
        .unwrap_or_default();
    raw["securityDefinitions"] = security_definitions;
    raw["security"] = json!([requirement]);
    raw
}

#[tokio::test]
async fn test_api_key_in_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/tokens/t1"))
        .and(query_param("token", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "t1", "name": "n"})))
        .expect(1)
        .mount(&server)
        .await;

    let raw = token_api(
        &server,
        json!({"query_auth": {"type": "apiKey", "name": "token", "in": "query"}}),
    );
    let provider = configured_provider(&raw, json!({"query_auth": "abc"})).await;
    let current = provider
        .read("cdn_tokens_v1", &state("t1", json!({})))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.attributes["name"], json!("n"));
}

#[tokio::test]
async fn test_refresh_token_is_exchanged_for_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/refresh"))
        .and(header("Authorization", "refresh-123"))
        .respond_with(ResponseTemplate::new(200).insert_header("Authorization", "access-456"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/tokens/t1"))
        .and(header("Authorization", "Bearer access-456"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "t1", "name": "n"})))
        .expect(1)
        .mount(&server)
        .await;

    let raw = token_api(
        &server,
        json!({"refresh_auth": {
            "type": "apiKey",
            "name": "Authorization",
            "in": "header",
            "x-terraform-refresh-token-url": format!("{}/refresh", server.uri())
        }}),
    );
    let provider = configured_provider(&raw, json!({"refresh_auth": "refresh-123"})).await;
    let current = provider
        .read("cdn_tokens_v1", &state("t1", json!({})))
        .await
        .unwrap();
    assert!(current.is_some());
}

/// Collects formatted log output in memory
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test]
async fn test_sensitive_values_are_masked_in_body_logs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/users"))
        .and(body_json(json!({"name": "ops", "password": "hunter2"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(
            json!({"id": "u1", "name": "ops", "password": "hunter2"}),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let raw = swagger(
        &mock_host(&server),
        json!({
            "/v1/users": {
                "post": {
                    "parameters": [{"in": "body", "name": "body", "schema": {"$ref": "#/definitions/User"}}],
                    "responses": {"201": {"description": "created", "schema": {"$ref": "#/definitions/User"}}}
                }
            },
            "/v1/users/{id}": {
                "get": {
                    "parameters": [{"in": "path", "name": "id", "required": true, "type": "string"}],
                    "responses": {"200": {"description": "ok", "schema": {"$ref": "#/definitions/User"}}}
                }
            }
        }),
        json!({
            "User": {
                "type": "object",
                "properties": {
                    "id": {"type": "string", "readOnly": true},
                    "name": {"type": "string"},
                    "password": {"type": "string", "x-terraform-sensitive": true}
                }
            }
        }),
    );
    let provider = configured_provider(&raw, json!({})).await;

    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(logs.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let created = provider
        .create("cdn_users_v1", object(json!({"name": "ops", "password": "hunter2"})))
        .await
        .unwrap();
    assert_eq!(created.attributes["password"], json!("hunter2"));

    let output = logs.contents();
    assert!(output.contains("Request body"), "{output}");
    assert!(output.contains("Response body"), "{output}");
    assert!(output.contains("<redacted>"), "{output}");
    assert!(!output.contains("hunter2"), "{output}");
}
