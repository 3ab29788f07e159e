//! Configuration layering tests - BDD style
//!
//! Following BDD naming convention: given_<context>_when_<action>_then_<outcome>

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::io::Write;

use autoscaler_operator::{Error, OperatorConfig};
use tempfile::NamedTempFile;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |name| vars.get(name).cloned()
}

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

// ============================================================================
// 1. FILE LAYER
// ============================================================================

#[test]
fn given_partial_file_when_loaded_then_missing_keys_keep_defaults() {
    // GIVEN: A file overriding only the verbosity and status interval
    let file = config_file(
        r"
[autoscaler]
verbosity = 4

[status]
interval_secs = 30
",
    );

    // WHEN: Loading without environment
    let config = OperatorConfig::load(Some(file.path()), env_from(&[])).unwrap();

    // THEN: Overrides apply and everything else is default
    let defaults = OperatorConfig::default();
    assert_eq!(config.autoscaler.verbosity, 4);
    assert_eq!(config.status.interval_secs, 30);
    assert_eq!(config.autoscaler.name, defaults.autoscaler.name);
    assert_eq!(config.watch_namespace, defaults.watch_namespace);
    assert_eq!(config.targets, defaults.targets);
}

#[test]
fn given_malformed_file_when_loaded_then_parse_error() {
    let file = config_file("[autoscaler\nverbosity = ");

    let err = OperatorConfig::load(Some(file.path()), env_from(&[])).unwrap_err();

    assert!(matches!(err, Error::ParseError(_)), "got {err:?}");
}

#[test]
fn given_missing_file_when_loaded_then_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let err = OperatorConfig::load(Some(&path), env_from(&[])).unwrap_err();

    assert!(matches!(err, Error::IoError(_)), "got {err:?}");
}

// ============================================================================
// 2. ENVIRONMENT LAYER
// ============================================================================

#[test]
fn given_file_and_env_when_loaded_then_env_wins() {
    // GIVEN: A file and environment both naming the image
    let file = config_file(
        r#"
[autoscaler]
image = "registry.local/autoscaler:file"
"#,
    );
    let env = env_from(&[
        ("CLUSTER_AUTOSCALER_IMAGE", "registry.local/autoscaler:env"),
        ("CLUSTER_AUTOSCALER_EXTRA_ARGS", "--v=2  --skip-nodes-with-local-storage"),
        ("RELEASE_VERSION", "4.18.0"),
    ]);

    // WHEN: Loading both layers
    let config = OperatorConfig::load(Some(file.path()), env).unwrap();

    // THEN: The environment value is used
    assert_eq!(config.autoscaler.image, "registry.local/autoscaler:env");
    assert_eq!(
        config.autoscaler.extra_args,
        vec!["--v=2", "--skip-nodes-with-local-storage"]
    );
    assert_eq!(config.autoscaler.release_version, "4.18.0");
}

#[test]
fn given_empty_release_version_when_loaded_then_version_stays_unknown() {
    let config = OperatorConfig::load(None, env_from(&[("RELEASE_VERSION", "")])).unwrap();

    assert_eq!(
        config.autoscaler.release_version,
        OperatorConfig::default().autoscaler.release_version
    );
}

#[test]
fn given_unparseable_port_when_loaded_then_invalid_config() {
    let err = OperatorConfig::load(None, env_from(&[("WEBHOOKS_PORT", "https")])).unwrap_err();

    assert!(matches!(err, Error::InvalidConfig(_)), "got {err:?}");
}

// ============================================================================
// 3. VALIDATION LAYER
// ============================================================================

#[test]
fn given_out_of_range_port_when_loaded_then_validation_error() {
    let err = OperatorConfig::load(None, env_from(&[("WEBHOOKS_PORT", "70000")])).unwrap_err();

    assert!(matches!(err, Error::ValidationError(_)), "got {err:?}");
}

#[test]
fn given_malformed_target_kind_when_loaded_then_validation_error() {
    let file = config_file(
        r#"
[[targets.kinds]]
api_version = "too/many/parts"
kind = "MachineSet"
"#,
    );

    let err = OperatorConfig::load(Some(file.path()), env_from(&[])).unwrap_err();

    assert!(matches!(err, Error::ValidationError(_)), "got {err:?}");
}

#[test]
fn given_webhook_port_when_building_autoscaler_config_then_port_is_carried() {
    let config = OperatorConfig::load(None, env_from(&[("WEBHOOKS_PORT", "9443")])).unwrap();

    assert_eq!(config.autoscaler_config().webhooks_port, 9443);
}
