//! Operator configuration.
//!
//! # Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. TOML file given with `--config`
//! 3. Environment variables
//! 4. Validation
//!
//! Environment lookup is passed in as a closure, so tests never touch the
//! process environment.
//!
//! # Example Config
//!
//! ```toml
//! watch_namespace = "openshift-machine-api"
//!
//! [autoscaler]
//! image = "quay.io/openshift/origin-cluster-autoscaler:v4.0"
//! verbosity = 3
//!
//! [webhooks]
//! enabled = true
//! port = 8443
//!
//! [status]
//! interval_secs = 15
//! degraded_threshold = 3
//!
//! [[targets.kinds]]
//! api_version = "machine.openshift.io/v1beta1"
//! kind = "MachineSet"
//! ```

use std::path::Path;
use std::time::Duration;

use autoscaler_api::config::ObjectReference;
use autoscaler_core::GroupVersionKind;
use autoscaler_reconciler::{AutoscalerConfig, StatusConfig, TargetRegistry};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

// ═══════════════════════════════════════════════════════════════════════════
// CONFIGURATION STRUCTURES
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OperatorConfig {
    /// Namespace whose `MachineAutoscaler`s are reconciled. Empty for all.
    pub watch_namespace: String,
    pub autoscaler: AutoscalerConfig,
    pub webhooks: WebhooksConfig,
    pub status: StatusSettings,
    pub targets: TargetsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WebhooksConfig {
    pub enabled: bool,
    pub port: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StatusSettings {
    pub operator_name: String,
    /// `ClusterOperator` that must be healthy first.
    pub dependency: String,
    pub interval_secs: u64,
    pub degraded_threshold: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TargetsConfig {
    /// Candidate target kinds, pruned at startup to those the store resolves.
    pub kinds: Vec<TargetKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetKind {
    pub api_version: String,
    pub kind: String,
}

// ═══════════════════════════════════════════════════════════════════════════
// DEFAULT IMPLEMENTATIONS
// ═══════════════════════════════════════════════════════════════════════════

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            watch_namespace: "openshift-machine-api".to_string(),
            autoscaler: AutoscalerConfig::default(),
            webhooks: WebhooksConfig::default(),
            status: StatusSettings::default(),
            targets: TargetsConfig::default(),
        }
    }
}

impl Default for WebhooksConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8443,
        }
    }
}

impl Default for StatusSettings {
    fn default() -> Self {
        let status = StatusConfig::default();
        Self {
            operator_name: status.operator_name,
            dependency: status.dependency,
            interval_secs: status.interval.as_secs(),
            degraded_threshold: status.degraded_threshold,
        }
    }
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            kinds: TargetRegistry::default_kinds()
                .iter()
                .map(|gvk| TargetKind {
                    api_version: gvk.api_version(),
                    kind: gvk.kind.clone(),
                })
                .collect(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PUBLIC API
// ═══════════════════════════════════════════════════════════════════════════

impl OperatorConfig {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The config file cannot be read or is malformed TOML
    /// - An environment override cannot be parsed
    /// - The merged values fail validation
    pub fn load<F>(path: Option<&Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(env)?;
        config.validate()?;
        info!(
            name = %config.autoscaler.name,
            namespace = %config.autoscaler.namespace,
            release = %config.autoscaler.release_version,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Read a TOML file. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::IoError(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_toml(&content)
            .map_err(|e| Error::ParseError(format!("{}: {e}", path.display())))
    }

    /// # Errors
    ///
    /// Returns error if `content` is not valid TOML for this shape.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ParseError(e.to_string()))
    }

    /// Apply environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns error if a numeric or boolean variable does not parse.
    pub fn apply_env<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = env("CLUSTER_AUTOSCALER_NAME") {
            self.autoscaler.name = value;
        }

        if let Some(value) = env("CLUSTER_AUTOSCALER_NAMESPACE") {
            self.autoscaler.namespace = value;
        }

        if let Some(value) = env("CLUSTER_AUTOSCALER_IMAGE") {
            self.autoscaler.image = value;
        }

        if let Some(value) = env("CLUSTER_AUTOSCALER_CLOUD_PROVIDER") {
            self.autoscaler.cloud_provider = value;
        }

        if let Some(value) = env("CLUSTER_AUTOSCALER_VERBOSITY") {
            self.autoscaler.verbosity = parse_var("CLUSTER_AUTOSCALER_VERBOSITY", &value)?;
        }

        if let Some(value) = env("CLUSTER_AUTOSCALER_EXTRA_ARGS") {
            self.autoscaler.extra_args = value.split_whitespace().map(String::from).collect();
        }

        if let Some(value) = env("WATCH_NAMESPACE") {
            self.watch_namespace = value;
        }

        // An empty release version means unknown.
        if let Some(value) = env("RELEASE_VERSION").filter(|v| !v.is_empty()) {
            self.autoscaler.release_version = value;
        }

        if let Some(value) = env("WEBHOOKS_ENABLED") {
            self.webhooks.enabled = parse_var("WEBHOOKS_ENABLED", &value)?;
        }

        if let Some(value) = env("WEBHOOKS_PORT") {
            self.webhooks.port = parse_var("WEBHOOKS_PORT", &value)?;
        }

        Ok(())
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns error if any value is out of range or inconsistent.
    pub fn validate(&self) -> Result<()> {
        if self.autoscaler.name.is_empty() {
            return Err(Error::validation("autoscaler.name must not be empty"));
        }
        if self.autoscaler.namespace.is_empty() {
            return Err(Error::validation("autoscaler.namespace must not be empty"));
        }
        if self.autoscaler.image.is_empty() {
            return Err(Error::validation("autoscaler.image must not be empty"));
        }
        if self.autoscaler.replicas < 0 {
            return Err(Error::validation("autoscaler.replicas must not be negative"));
        }
        if !(1..=65535).contains(&self.webhooks.port) {
            return Err(Error::validation("webhooks.port must be 1-65535"));
        }
        if self.status.interval_secs == 0 {
            return Err(Error::validation("status.interval_secs must be positive"));
        }
        if self.status.degraded_threshold == 0 {
            return Err(Error::validation("status.degraded_threshold must be positive"));
        }
        if self.targets.kinds.is_empty() {
            return Err(Error::validation("targets.kinds must not be empty"));
        }
        self.target_kinds()?;
        Ok(())
    }

    /// Candidate target kinds as GVKs.
    ///
    /// # Errors
    ///
    /// Returns error for a malformed `api_version`.
    pub fn target_kinds(&self) -> Result<Vec<GroupVersionKind>> {
        self.targets
            .kinds
            .iter()
            .map(|t| {
                GroupVersionKind::from_api_version(&t.api_version, t.kind.clone())
                    .map_err(|e| Error::validation(format!("targets.kinds: {e}")))
            })
            .collect()
    }

    /// Settings for the `ClusterAutoscaler` reconciler.
    pub fn autoscaler_config(&self) -> AutoscalerConfig {
        AutoscalerConfig {
            webhooks_port: self.webhooks.port,
            ..self.autoscaler.clone()
        }
    }

    /// Settings for the status loop.
    pub fn status_config(&self, related_objects: Vec<ObjectReference>) -> StatusConfig {
        StatusConfig {
            operator_name: self.status.operator_name.clone(),
            dependency: self.status.dependency.clone(),
            cluster_autoscaler_name: self.autoscaler.name.clone(),
            namespace: self.autoscaler.namespace.clone(),
            release_version: self.autoscaler.release_version.clone(),
            related_objects,
            degraded_threshold: self.status.degraded_threshold,
            interval: Duration::from_secs(self.status.interval_secs),
        }
    }
}

/// Environment lookup backed by the process environment.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::invalid_config(format!("Invalid {name} value {value:?}: {e}")))
}

// ═══════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = OperatorConfig::load(None, env_from(&[])).unwrap();
        assert_eq!(config, OperatorConfig::default());
        assert_eq!(config.autoscaler.release_version, "unknown");
        assert_eq!(config.target_kinds().unwrap().len(), 4);
    }

    #[test]
    fn test_env_overrides_defaults() {
        let config = OperatorConfig::load(
            None,
            env_from(&[
                ("CLUSTER_AUTOSCALER_IMAGE", "example.com/ca:1"),
                ("CLUSTER_AUTOSCALER_VERBOSITY", "4"),
                ("CLUSTER_AUTOSCALER_EXTRA_ARGS", "--foo=1  --bar"),
                ("RELEASE_VERSION", "4.18.0"),
                ("WEBHOOKS_ENABLED", "false"),
            ]),
        )
        .unwrap();

        assert_eq!(config.autoscaler.image, "example.com/ca:1");
        assert_eq!(config.autoscaler.verbosity, 4);
        assert_eq!(config.autoscaler.extra_args, vec!["--foo=1", "--bar"]);
        assert_eq!(config.autoscaler.release_version, "4.18.0");
        assert!(!config.webhooks.enabled);
    }

    #[test]
    fn test_empty_release_version_stays_unknown() {
        let config = OperatorConfig::load(None, env_from(&[("RELEASE_VERSION", "")])).unwrap();
        assert_eq!(config.autoscaler.release_version, "unknown");
    }

    #[test]
    fn test_bad_numeric_env_is_rejected() {
        let err = OperatorConfig::load(None, env_from(&[("WEBHOOKS_PORT", "https")])).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = OperatorConfig::from_toml(
            r#"
            [autoscaler]
            verbosity = 5

            [status]
            degraded_threshold = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.autoscaler.verbosity, 5);
        assert_eq!(config.autoscaler.name, "default");
        assert_eq!(config.status.degraded_threshold, 5);
        assert_eq!(config.status.interval_secs, 15);
        assert!(config.webhooks.enabled);
    }

    #[test]
    fn test_validation_rejects_bad_target_kind() {
        let config = OperatorConfig {
            targets: TargetsConfig {
                kinds: vec![TargetKind {
                    api_version: "a/b/c".to_string(),
                    kind: "MachineSet".to_string(),
                }],
            },
            ..OperatorConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::ValidationError(_))));
    }

    #[test]
    fn test_webhooks_port_flows_into_autoscaler_config() {
        let mut config = OperatorConfig::default();
        config.webhooks.port = 9443;
        assert_eq!(config.autoscaler_config().webhooks_port, 9443);
    }
}
