
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;
use test_helpers::cdn_api;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let document = serde_json::to_string_pretty(&cdn_api("api.example.com")).unwrap();
        fs::write(dir.path().join("cdn.json"), document).unwrap();
        Self { dir }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("openapi-provider").unwrap();
        cmd.env_remove("OTF_VAR_CDN_SWAGGER_URL")
            .env_remove("OTF_VAR_cdn_SWAGGER_URL")
            .env_remove("OPENAPI_PROVIDER_LOG")
            .env_remove("OPENAPI_PROVIDER_LOG_FILE")
            .env("HOME", self.dir.path())
            .env(
                "OPENAPI_PROVIDER_PLUGIN_CONFIG",
                self.dir.path().join("missing.yaml"),
            );
        cmd
    }

    fn with_document(&self) -> Command {
        let mut cmd = self.command();
        cmd.env("OTF_VAR_CDN_SWAGGER_URL", self.dir.path().join("cdn.json"));
        cmd
    }
}

#[test]
fn test_schema_command_prints_provider_schema() {
    let workspace = Workspace::new();
    let output = workspace
        .with_document()
        .args(["schema", "cdn", "--compact"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let schema: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(schema["resources"]["cdn_cdns_v1"].is_object());
    assert!(schema["data_sources"]["cdn_cdns_v1_instance"].is_object());
    assert!(schema["provider"]["attributes"]["apikey_auth"].is_object());
}

#[test]
fn test_resources_command_lists_exports() {
    let workspace = Workspace::new();
    workspace
        .with_document()
        .args(["resources", "cdn"])
        .assert()
        .success()
        .stdout(predicate::str::contains("resource     cdn_cdns_v1"))
        .stdout(predicate::str::contains("resource     cdn_lbs_v1"))
        .stdout(predicate::str::contains("data-source  cdn_cdns_v1"));
}

#[test]
fn test_plugin_configuration_file_is_read() {
    let workspace = Workspace::new();
    let plugin = workspace.dir.path().join("plugin.yaml");
    fs::write(
        &plugin,
        format!(
            "version: '1'\nservices:\n  cdn:\n    swagger-url: {}\n",
            workspace.dir.path().join("cdn.json").display()
        ),
    )
    .unwrap();

    workspace
        .command()
        .env("OPENAPI_PROVIDER_PLUGIN_CONFIG", &plugin)
        .args(["resources", "cdn"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cdn_cdns_v1"));
}

#[test]
fn test_unconfigured_provider_fails() {
    let workspace = Workspace::new();
    workspace
        .command()
        .args(["schema", "cdn"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration Error"))
        .stderr(predicate::str::contains("OTF_VAR_CDN_SWAGGER_URL"));
}

#[test]
fn test_json_errors() {
    let workspace = Workspace::new();
    let output = workspace
        .command()
        .args(["--json-errors", "resources", "cdn"])
        .output()
        .unwrap();
    assert!(!output.status.success());

    let error: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(error["error_type"], "RuntimeConfig");
    assert!(error["message"]
        .as_str()
        .unwrap()
        .contains("no document configured"));
}

#[test]
fn test_invalid_provider_name() {
    let workspace = Workspace::new();
    workspace
        .with_document()
        .args(["schema", "My-Cdn"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("^[a-z0-9]+$"));
}
