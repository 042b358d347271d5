//! Process settings and hooks configuration
//!
//! Settings come from `KVERSO_*` environment variables. Hooks and their
//! conversion bindings come from a YAML file:
//!
//! ```yaml
//! hooks:
//!   - name: crontabs
//!     command: ["/hooks/crontabs.sh"]
//!     kubernetesCustomResourceConversion:
//!       - name: crontabs_up
//!         crdName: crontabs.stable.example.com
//!         group: main
//!         includeSnapshotsFrom: [pods]
//!         conversions:
//!           - fromVersion: v1
//!             toVersion: v2
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::conversion::config::{ConversionWebhookConfig, WebhookMetadata};
use crate::conversion::rule::ConversionRule;
use crate::hook::controller::ConversionConfig;

/// Default path of the hooks configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/kverso/hooks.yaml";

/// Default port for health, metrics, and conversion endpoints
pub const DEFAULT_LISTEN_PORT: u16 = 9680;

/// Default webhook service name
pub const DEFAULT_SERVICE_NAME: &str = "kverso";

/// Default namespace of the webhook service
pub const DEFAULT_NAMESPACE: &str = "kverso-system";

/// Default secret name for webhook TLS
pub const DEFAULT_TLS_SECRET_NAME: &str = "kverso-webhook-tls";

/// Errors loading the hooks configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid hooks configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("hook '{hook}': {message}")]
    Invalid { hook: String, message: String },
}

/// Process settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub config_path: PathBuf,
    pub listen_port: u16,
    pub tls_enabled: bool,
    pub service_name: String,
    pub namespace: String,
    pub tls_secret_name: String,
    pub hook_tmp_dir: PathBuf,
}

impl Settings {
    /// Read settings from the environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through a lookup function
    ///
    /// Unset or unparsable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let is_true = |v: String| v == "true" || v == "1";

        Self {
            config_path: lookup("KVERSO_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            listen_port: lookup("KVERSO_LISTEN_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_LISTEN_PORT),
            tls_enabled: lookup("KVERSO_TLS").map(is_true).unwrap_or(false),
            service_name: lookup("KVERSO_SERVICE_NAME")
                .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
            namespace: lookup("KVERSO_NAMESPACE").unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            tls_secret_name: lookup("KVERSO_TLS_SECRET")
                .unwrap_or_else(|| DEFAULT_TLS_SECRET_NAME.to_string()),
            hook_tmp_dir: lookup("KVERSO_HOOK_TMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
        }
    }
}

/// All configured hooks
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HooksConfig {
    #[serde(default)]
    pub hooks: Vec<HookConfig>,
}

/// One hook: a command and the conversions it performs
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookConfig {
    pub name: String,
    pub command: Vec<String>,
    #[serde(default, rename = "kubernetesCustomResourceConversion")]
    pub conversion_bindings: Vec<ConversionBindingSpec>,
}

/// A conversion binding as written in the configuration file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionBindingSpec {
    pub name: String,
    pub crd_name: String,
    pub conversions: Vec<ConversionRule>,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub include_snapshots_from: Vec<String>,
}

impl HooksConfig {
    /// Load and validate a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&data)
    }

    /// Parse and validate a YAML configuration
    pub fn from_yaml(data: &str) -> Result<Self, ConfigError> {
        let config: HooksConfig = serde_yaml::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for hook in &self.hooks {
            let invalid = |message: String| ConfigError::Invalid {
                hook: hook.name.clone(),
                message,
            };

            if hook.command.is_empty() {
                return Err(invalid("command is empty".to_string()));
            }
            for binding in &hook.conversion_bindings {
                if binding.crd_name.is_empty() {
                    return Err(invalid(format!("binding '{}' has no crdName", binding.name)));
                }
                if binding.conversions.is_empty() {
                    return Err(invalid(format!(
                        "binding '{}' has no conversions",
                        binding.name
                    )));
                }
                if let Some(rule) = binding
                    .conversions
                    .iter()
                    .find(|r| r.from_version.is_empty() || r.to_version.is_empty())
                {
                    return Err(invalid(format!(
                        "binding '{}' has an incomplete conversion '{}'",
                        binding.name, rule
                    )));
                }
            }
        }
        Ok(())
    }
}

impl ConversionBindingSpec {
    /// Binding configuration for the controller of `hook_name`
    pub fn to_conversion_config(&self, hook_name: &str) -> ConversionConfig {
        ConversionConfig {
            binding_name: self.name.clone(),
            webhook: ConversionWebhookConfig {
                crd_name: self.crd_name.clone(),
                conversions: self.conversions.clone(),
                metadata: WebhookMetadata {
                    name: self.name.clone(),
                    debug_name: format!("{}/{}", hook_name, self.name),
                    log_labels: [("hook".to_string(), hook_name.to_string())]
                        .into_iter()
                        .collect(),
                },
            },
            include_snapshots_from: self.include_snapshots_from.clone(),
            group: self.group.clone(),
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
