//! Tests for configuration loading and root folder resolution
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate VERITAS_ROOT_FOLDER are marked with #[serial].

use serial_test::serial;
use std::env;
use std::path::PathBuf;
use veritas_common::config::{
    default_config_path, CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig,
    ROOT_FOLDER_ENV,
};

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert_eq!(defaults.log_level, "info");
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root_folder = RootFolderResolver::new("test-module").resolve();

    assert_eq!(root_folder, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
#[serial]
fn test_resolver_env_var() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/veritas-test-env-folder");

    let root_folder = RootFolderResolver::new("test-module")
        .with_toml_root(Some(PathBuf::from("/tmp/veritas-from-toml")))
        .resolve();

    assert_eq!(root_folder, PathBuf::from("/tmp/veritas-test-env-folder"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_cli_arg_takes_precedence() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/veritas-priority-2");

    let root_folder = RootFolderResolver::new("test-module")
        .with_cli_arg(Some(PathBuf::from("/tmp/veritas-priority-1")))
        .with_toml_root(Some(PathBuf::from("/tmp/veritas-priority-3")))
        .resolve();

    assert_eq!(root_folder, PathBuf::from("/tmp/veritas-priority-1"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_toml_root_used_without_env() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root_folder = RootFolderResolver::new("test-module")
        .with_toml_root(Some(PathBuf::from("/tmp/veritas-from-toml")))
        .resolve();

    assert_eq!(root_folder, PathBuf::from("/tmp/veritas-from-toml"));
}

#[test]
fn test_initializer_creates_directory_idempotently() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("nested").join("root");

    let initializer = RootFolderInitializer::new(root.clone());
    assert!(initializer.ensure_directory_exists().is_ok());
    assert!(initializer.ensure_directory_exists().is_ok());

    assert!(root.is_dir(), "Created path is not a directory");
}

#[test]
fn test_missing_config_file_does_not_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("does-not-exist.toml");

    let config = TomlConfig::load(&path).expect("missing file must fall back to defaults");
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_config_file_is_loaded() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("veritas-ad.toml");
    std::fs::write(
        &path,
        r#"
root_folder = "/srv/veritas"

[logging]
level = "debug"

[staging]
max_staged_files = 8

[engine]
audio_command = ["/opt/engine/bin/analyze-audio"]
timeout_secs = 45
"#,
    )
    .unwrap();

    let config = TomlConfig::load(&path).unwrap();

    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/veritas")));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.staging.max_staged_files, Some(8));
    assert_eq!(config.engine.audio_command, vec!["/opt/engine/bin/analyze-audio"]);
    assert_eq!(config.engine.timeout_secs, 45);
    // Untouched keys keep their defaults
    assert_eq!(config.engine.video_command[1], "python/videoanalyze.py");
}

#[test]
fn test_malformed_config_file_is_an_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "[engine\ntimeout_secs = ").unwrap();

    let err = TomlConfig::load(&path).unwrap_err();
    assert!(matches!(err, veritas_common::Error::Config(_)));
}

#[test]
fn test_default_config_path_names_module() {
    if let Some(path) = default_config_path("veritas-ad") {
        assert!(path.ends_with("veritas/veritas-ad.toml"));
    }
}
