//! Config file resolution and graceful degradation
//!
//! Tests that manipulate RINGCHECK_CONFIG are marked with #[serial] so they do
//! not race each other.

use ringcheck_common::config::{
    load_config, resolve_config_path, ScanMode, TierBackendKind, CONFIG_ENV_VAR,
};
use ringcheck_common::Error;
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

#[test]
#[serial]
fn test_cli_path_has_highest_priority() {
    let dir = TempDir::new().unwrap();
    let cli_path = dir.path().join("cli.toml");
    env::set_var(CONFIG_ENV_VAR, dir.path().join("env.toml"));

    let resolved = resolve_config_path(Some(&cli_path));
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved, Some(cli_path));
}

#[test]
#[serial]
fn test_env_path_used_without_cli() {
    let dir = TempDir::new().unwrap();
    let env_path = dir.path().join("env.toml");
    env::set_var(CONFIG_ENV_VAR, &env_path);

    let resolved = resolve_config_path(None);
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved, Some(env_path));
}

#[test]
#[serial]
fn test_explicit_missing_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");
    env::remove_var(CONFIG_ENV_VAR);

    let result = load_config(Some(&missing));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_load_resolves_paths_against_config_dir() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ringcheck.toml");
    fs::write(
        &path,
        r#"
        [scan]
        mode = "agent"

        [tiers.informal_knowledge]
        kind = "file"
        path = "informal.json"
        "#,
    )
    .unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    let (config, source) = load_config(Some(&path)).unwrap();

    assert_eq!(source.as_deref(), Some(path.as_path()));
    assert_eq!(config.scan.mode, ScanMode::Agent);
    let informal = config.tiers.get("informal_knowledge").unwrap();
    assert_eq!(informal.kind, TierBackendKind::File);
    assert_eq!(informal.path.as_deref(), Some(dir.path().join("informal.json").as_path()));
}

#[test]
#[serial]
fn test_malformed_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ringcheck.toml");
    fs::write(&path, "[tiers.codified_standards]\nkind = \"carrier-pigeon\"\n").unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    let result = load_config(Some(&path));
    assert!(matches!(result, Err(Error::TomlParse(_))));
}
