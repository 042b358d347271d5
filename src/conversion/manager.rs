//! Registration of conversion webhooks
//!
//! Bindings push their [`ConversionWebhookConfig`] to a [`WebhookRegistrar`].
//! [`WebhookManager`] collects them per CRD and later points each CRD at the
//! webhook service.

use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::{info, warn};

use super::config::ConversionWebhookConfig;
use super::crd_client_config::{CrdClientConfig, CrdConfigError};
use super::types::REVIEW_API_VERSION;

/// Receives webhook configurations from conversion bindings
pub trait WebhookRegistrar: Send + Sync {
    fn add_webhook(&self, config: ConversionWebhookConfig);
}

/// Service the API server should call for conversions
#[derive(Debug, Clone, Default)]
pub struct WebhookServiceSettings {
    pub namespace: String,
    pub service_name: String,
}

#[derive(Debug, Default)]
struct Registry {
    configs: BTreeMap<String, Vec<ConversionWebhookConfig>>,
    client_configs: BTreeMap<String, CrdClientConfig>,
}

/// Collects webhook configurations and patches CRDs
#[derive(Debug, Default)]
pub struct WebhookManager {
    settings: WebhookServiceSettings,
    registry: RwLock<Registry>,
}

impl WebhookManager {
    pub fn new(settings: WebhookServiceSettings) -> Self {
        Self {
            settings,
            registry: RwLock::new(Registry::default()),
        }
    }

    /// Names of CRDs with at least one registered webhook
    pub fn crd_names(&self) -> Vec<String> {
        self.read(|r| r.client_configs.keys().cloned().collect())
    }

    /// Webhook configurations registered for a CRD
    pub fn configs(&self, crd_name: &str) -> Vec<ConversionWebhookConfig> {
        self.read(|r| r.configs.get(crd_name).cloned().unwrap_or_default())
    }

    /// Client config that will be applied to a CRD
    pub fn client_config(&self, crd_name: &str) -> Option<CrdClientConfig> {
        self.read(|r| r.client_configs.get(crd_name).cloned())
    }

    /// Patch every registered CRD to use the webhook
    ///
    /// All CRDs are attempted; the first error is returned.
    pub async fn update_crds(
        &self,
        client: &kube::Client,
        ca_bundle: &str,
    ) -> Result<(), CrdConfigError> {
        let client_configs: Vec<CrdClientConfig> =
            self.read(|r| r.client_configs.values().cloned().collect());

        let mut first_error = None;
        for mut config in client_configs {
            config.ca_bundle = ca_bundle.to_string();
            if let Err(e) = config.update(client).await {
                warn!(crd = %config.crd_name, error = %e, "Failed to update CRD conversion");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn read<T>(&self, f: impl FnOnce(&Registry) -> T) -> T {
        let registry = self.registry.read().unwrap_or_else(|e| e.into_inner());
        f(&registry)
    }
}

impl WebhookRegistrar for WebhookManager {
    fn add_webhook(&self, config: ConversionWebhookConfig) {
        let mut registry = self.registry.write().unwrap_or_else(|e| e.into_inner());

        let client_config = registry
            .client_configs
            .entry(config.crd_name.clone())
            .or_insert_with(|| {
                let mut c = CrdClientConfig::new(config.crd_name.clone());
                c.namespace = self.settings.namespace.clone();
                c.service_name = self.settings.service_name.clone();
                c.add_review_version(REVIEW_API_VERSION);
                c
            });

        info!(
            crd = %config.crd_name,
            binding = %config.metadata.debug_name,
            labels = ?config.metadata.log_labels,
            rules = config.conversions.len(),
            path = %client_config.path,
            "Conversion webhook registered"
        );

        registry
            .configs
            .entry(config.crd_name.clone())
            .or_default()
            .push(config);
    }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod tests;
