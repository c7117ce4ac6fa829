//! Tests for veritas-ad service configuration
//!
//! Tests that manipulate VERITAS_ROOT_FOLDER are marked with #[serial].

mod helpers;

use serial_test::serial;
use std::env;
use std::path::PathBuf;

use helpers::{scratch_entries, VALID_RESULT};
use veritas_ad::config::{CliOverrides, ServiceConfig};
use veritas_ad::models::{MediaKind, UploadRequest};
use veritas_common::config::{TomlConfig, ROOT_FOLDER_ENV};

#[test]
#[serial]
fn test_env_root_folder_places_scratch_directory() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/veritas-ad-env-root");

    let config = ServiceConfig::resolve(TomlConfig::default(), CliOverrides::default()).unwrap();

    assert_eq!(config.root_folder, PathBuf::from("/tmp/veritas-ad-env-root"));
    assert_eq!(config.staging.root, PathBuf::from("/tmp/veritas-ad-env-root/uploads"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_cli_root_folder_beats_env() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/veritas-ad-env-root");

    let config = ServiceConfig::resolve(
        TomlConfig::default(),
        CliOverrides {
            root_folder: Some(PathBuf::from("/tmp/veritas-ad-cli-root")),
            port: None,
        },
    )
    .unwrap();

    assert_eq!(config.staging.root, PathBuf::from("/tmp/veritas-ad-cli-root/uploads"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
fn test_config_file_drives_service_settings() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("veritas-ad.toml");
    std::fs::write(
        &path,
        r#"
[server]
port = 6100
max_upload_bytes = 1048576

[engine]
audio_command = ["/opt/engine/bin/analyze", "--quiet"]
working_dir = "/opt/engine"
timeout_secs = 30
max_concurrent = 6
"#,
    )
    .unwrap();

    let toml = TomlConfig::load(&path).unwrap();
    let config = ServiceConfig::resolve(
        toml,
        CliOverrides {
            root_folder: Some(temp_dir.path().to_path_buf()),
            port: None,
        },
    )
    .unwrap();

    assert_eq!(config.port, 6100);
    assert_eq!(config.max_upload_bytes, 1024 * 1024);
    assert_eq!(config.engine.audio.program, "/opt/engine/bin/analyze");
    assert_eq!(config.engine.audio.args, vec!["--quiet"]);
    assert_eq!(config.engine.working_dir, Some(PathBuf::from("/opt/engine")));
    assert_eq!(config.engine.timeout.as_secs(), 30);
    assert_eq!(config.max_concurrent_engines, 6);

    let orchestrator = config.build_orchestrator();
    assert_eq!(orchestrator.engines().size(), 6);
}

#[cfg(unix)]
#[tokio::test]
async fn test_configured_pipeline_runs_engine_command() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut toml = TomlConfig::default();
    let script = format!("test -s \"$1\" && echo '{}'", VALID_RESULT);
    toml.engine.audio_command = vec!["sh".to_string(), "-c".to_string(), script, "engine".to_string()];

    let config = ServiceConfig::resolve(
        toml,
        CliOverrides {
            root_folder: Some(temp_dir.path().to_path_buf()),
            port: None,
        },
    )
    .unwrap();
    let orchestrator = config.build_orchestrator();

    let result = orchestrator
        .analyze(UploadRequest::new(MediaKind::Audio, "clip.wav", &b"RIFF"[..]))
        .await
        .unwrap();

    assert_eq!(result.cnn.confidence, "92%");
    assert!(scratch_entries(&config.staging.root).is_empty());
}
