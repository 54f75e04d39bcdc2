//! Integration tests for configuration loading and graceful degradation
//!
//! Tests that touch VOX_CONFIG are marked with #[serial] so they never race
//! on the process environment.

use serial_test::serial;
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;
use vox_common::config::{resolve_config_path, TomlConfig, CONFIG_ENV_VAR};

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(content.as_bytes()).expect("write config");
    file
}

#[test]
fn test_load_full_config() {
    let file = write_config(
        r#"
[audio]
sample_rate = 16000
crossfade_ms = 12
trailing_pad_ms = 400

[output]
device = "Speakers"
buffer_size = 512

[logging]
level = "debug"
"#,
    );

    let config = TomlConfig::load(file.path()).unwrap();
    assert_eq!(config.audio.sample_rate, 16000);
    assert_eq!(config.audio.crossfade_ms, 12);
    assert_eq!(config.audio.trailing_pad_ms, 400);
    assert_eq!(config.output.device.as_deref(), Some("Speakers"));
    assert_eq!(config.output.buffer_size, Some(512));
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_missing_explicit_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    let config = TomlConfig::load_or_default(Some(&missing)).unwrap();
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_malformed_explicit_file_is_error() {
    let file = write_config("[output]\nbuffer_size = 0\n");
    assert!(TomlConfig::load_or_default(Some(file.path())).is_err());
}

#[test]
#[serial]
fn test_env_var_used_when_no_cli_arg() {
    let file = write_config("[audio]\nsample_rate = 8000\n");
    env::set_var(CONFIG_ENV_VAR, file.path());

    let resolved = resolve_config_path(None, CONFIG_ENV_VAR);
    let config = TomlConfig::load_or_default(None).unwrap();

    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved.as_deref(), Some(file.path()));
    assert_eq!(config.audio.sample_rate, 8000);
}

#[test]
#[serial]
fn test_cli_arg_overrides_env_var() {
    let env_file = write_config("[audio]\nsample_rate = 8000\n");
    let cli_file = write_config("[audio]\nsample_rate = 44100\n");
    env::set_var(CONFIG_ENV_VAR, env_file.path());

    let config = TomlConfig::load_or_default(Some(cli_file.path())).unwrap();

    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.audio.sample_rate, 44100);
}
