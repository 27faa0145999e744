//! Configuration file loading
//!
//! Environment overrides are exercised through `apply_env_with` in the unit
//! tests; these only touch files, so they leave the process environment
//! alone.

use std::io::Write;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;

use streamchat_core::config::{load_config_from_path, DEFAULT_STREAM_PATH};
use streamchat_core::{ClientConfig, ConfigError};

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_file_values_override_defaults() {
    let file = write_config(
        r#"
[client]
base_url = "https://chat.example.com"
connect_timeout_secs = 3
max_input_chars = 500
"#,
    );

    let config = load_config_from_path(file.path()).unwrap();

    assert_eq!(
        config,
        ClientConfig {
            base_url: "https://chat.example.com".to_string(),
            stream_path: DEFAULT_STREAM_PATH.to_string(),
            connect_timeout: Duration::from_secs(3),
            max_input_chars: 500,
            event_buffer: ClientConfig::default().event_buffer,
        }
    );
    assert_eq!(
        config.stream_url(),
        "https://chat.example.com/api/chat/stream"
    );
}

#[test]
fn test_empty_file_yields_defaults() {
    let file = write_config("");
    let config = load_config_from_path(file.path()).unwrap();
    assert_eq!(config, ClientConfig::default());
}

#[test]
fn test_unknown_key_is_a_parse_error() {
    let file = write_config("[client]\nbase_uri = \"http://x\"\n");
    let err = load_config_from_path(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "{err:?}");
}

#[test]
fn test_invalid_value_is_rejected() {
    let file = write_config("[client]\nmax_input_chars = 0\n");
    let err = load_config_from_path(file.path()).unwrap_err();
    assert!(
        matches!(
            err,
            ConfigError::InvalidValue {
                key: "max_input_chars",
                ..
            }
        ),
        "{err:?}"
    );
}

#[test]
fn test_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_config_from_path(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }), "{err:?}");
}
