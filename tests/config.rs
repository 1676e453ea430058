use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;
use tempfile::TempDir;

use delivery_toolkit::config::{ConfigLoader, ConfigOverrides, CredentialKind};
use delivery_toolkit::domain::Environment;
use delivery_toolkit::error::DeliveryError;

fn write_config(dir: &TempDir, content: &str) -> String {
    let path = dir.path().join("delivery.json");
    fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn resolves_file_values() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"{
            "environment": "dev",
            "endpoints": {"warehouse": "http://localhost:9050/"},
            "retry": {"max_retries": 1, "delay_secs": 2},
            "batch_size": 50,
            "report_dir": "out/reports",
            "credentials": "env",
            "invite_users_not_found": true
        }"#,
    );
    let config = ConfigLoader::resolve(Some(path.as_str())).unwrap();

    assert_eq!(config.environment, Environment::Dev);
    assert_eq!(
        config.endpoints.datarepo,
        "https://jade.datarepo-dev.broadinstitute.org"
    );
    assert_eq!(config.endpoints.warehouse, "http://localhost:9050");
    assert_eq!(config.retry.max_retries, 1);
    assert_eq!(config.retry.delay, Duration::from_secs(2));
    assert_eq!(config.batch_size, 50);
    assert_eq!(config.report_dir.as_str(), "out/reports");
    assert_eq!(config.credentials, CredentialKind::Env);
    assert!(config.invite_users_not_found);
}

#[test]
fn overrides_take_precedence() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"{"environment": "dev", "retry": {"delay_secs": 0}, "report_dir": "a"}"#,
    );
    let config = ConfigLoader::resolve_with(
        Some(path.as_str()),
        ConfigOverrides {
            environment: Some(Environment::Prod),
            report_dir: Some("b".to_string()),
            max_retries: Some(7),
        },
    )
    .unwrap();

    assert_eq!(config.environment, Environment::Prod);
    assert_eq!(config.endpoints.workspace, "https://api.firecloud.org");
    assert_eq!(config.report_dir.as_str(), "b");
    assert_eq!(config.retry.max_retries, 7);
    assert_eq!(config.retry.delay, Duration::ZERO);
}

#[test]
fn zero_batch_size_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, r#"{"batch_size": 0}"#);
    assert_matches!(
        ConfigLoader::resolve(Some(path.as_str())),
        Err(DeliveryError::InvalidConfig(_))
    );
}

#[test]
fn non_http_endpoint_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, r#"{"endpoints": {"storage": "ftp://example.org"}}"#);
    assert_matches!(
        ConfigLoader::resolve(Some(path.as_str())),
        Err(DeliveryError::InvalidConfig(_))
    );
}

#[test]
fn explicit_missing_path_is_an_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.json");
    assert_matches!(
        ConfigLoader::resolve(Some(&*missing.to_string_lossy())),
        Err(DeliveryError::ConfigRead(_))
    );
}

#[test]
fn malformed_json_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "{ not json");
    assert_matches!(
        ConfigLoader::resolve(Some(path.as_str())),
        Err(DeliveryError::ConfigParse(_))
    );
}
