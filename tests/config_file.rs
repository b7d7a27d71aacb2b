//! Config file loading

use azrm::config::Config;
use azrm::error::ProviderError;
use std::io::Write;

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "client_id": "client",
            "tenant_id": "tenant",
            "subscription_id": "sub",
            "client_secret": "secret",
            "environment": "german",
            "poll_interval_secs": 5
        }}"#
    )
    .unwrap();

    let config = Config::load_from(file.path()).unwrap();
    assert_eq!(config.poll_interval(), Some(std::time::Duration::from_secs(5)));

    let creds = config.credentials().unwrap();
    assert_eq!(creds.environment(), "german");
    assert_eq!(creds.client_secret(), "secret");
}

#[test]
fn test_malformed_file_is_config_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ not json").unwrap();

    let err = Config::load_from(file.path()).unwrap_err();
    assert!(matches!(err, ProviderError::Config(_)));
}

#[test]
fn test_save_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("azrm").join("config.json");

    let config = Config {
        subscription_id: Some("sub".to_string()),
        poll_interval_secs: Some(2),
        ..Config::default()
    };
    config.save(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded.subscription_id.as_deref(), Some("sub"));
    assert_eq!(loaded.poll_interval_secs, Some(2));
    assert!(loaded.client_secret.is_none());
}
