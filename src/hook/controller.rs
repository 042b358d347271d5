//! Conversion bindings of one hook
//!
//! The controller links each `(crdName, ruleId)` declared by the hook's
//! bindings to the binding that performs it, registers the bindings'
//! webhooks, and builds binding contexts for conversion events.
//!
//! Callers must check [`ConversionBindingsController::can_handle_event`]
//! before calling [`ConversionBindingsController::handle_event`]. An event
//! for an unknown link is logged as a bug and answered with an empty
//! [`BindingExecutionInfo`].

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::conversion::config::ConversionWebhookConfig;
use crate::conversion::manager::WebhookRegistrar;
use crate::conversion::types::ConversionEvent;

use super::binding_context::{
    BindingContext, BindingContextMetadata, BindingExecutionInfo, BindingType,
    CONVERSION_CONTEXT_TYPE,
};

/// A conversion binding of a hook
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionConfig {
    pub binding_name: String,
    pub webhook: ConversionWebhookConfig,
    pub include_snapshots_from: Vec<String>,
    pub group: String,
}

/// Link between a conversion rule of a CRD and the binding that handles it
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionBindingToWebhookLink {
    pub binding_name: String,
    pub crd_name: String,
    pub from_version: String,
    pub to_version: String,
    pub include_snapshots: Vec<String>,
    pub group: String,
}

/// Handles conversion bindings for one hook
pub trait ConversionBindingsController: Send + Sync {
    /// Create links for all bindings and register their webhooks
    fn enable_conversion_bindings(&mut self);

    /// Dynamic disabling is not supported; this does nothing
    fn disable_conversion_bindings(&mut self);

    fn can_handle_event(&self, event: &ConversionEvent, rule_id: &str) -> bool;

    fn handle_event(&self, event: &ConversionEvent, rule_id: &str) -> BindingExecutionInfo;
}

/// Default controller backed by a [`WebhookRegistrar`]
pub struct DefaultConversionBindingsController {
    /// crdName -> ruleId -> link
    links: HashMap<String, HashMap<String, ConversionBindingToWebhookLink>>,
    bindings: Vec<ConversionConfig>,
    registrar: Arc<dyn WebhookRegistrar>,
}

impl DefaultConversionBindingsController {
    pub fn new(bindings: Vec<ConversionConfig>, registrar: Arc<dyn WebhookRegistrar>) -> Self {
        Self {
            links: HashMap::new(),
            bindings,
            registrar,
        }
    }

    pub fn bindings(&self) -> &[ConversionConfig] {
        &self.bindings
    }

    pub fn link(&self, crd_name: &str, rule_id: &str) -> Option<&ConversionBindingToWebhookLink> {
        self.links.get(crd_name)?.get(rule_id)
    }

    /// Number of (crdName, ruleId) links
    pub fn links_len(&self) -> usize {
        self.links.values().map(HashMap::len).sum()
    }
}

impl ConversionBindingsController for DefaultConversionBindingsController {
    fn enable_conversion_bindings(&mut self) {
        for config in &self.bindings {
            let crd_name = &config.webhook.crd_name;
            let crd_links = self.links.entry(crd_name.clone()).or_default();

            for rule in &config.webhook.conversions {
                let link = ConversionBindingToWebhookLink {
                    binding_name: config.binding_name.clone(),
                    crd_name: crd_name.clone(),
                    from_version: rule.from_version.clone(),
                    to_version: rule.to_version.clone(),
                    include_snapshots: config.include_snapshots_from.clone(),
                    group: config.group.clone(),
                };
                if let Some(previous) = crd_links.insert(rule.id(), link) {
                    if previous.binding_name != config.binding_name {
                        warn!(
                            crd = %crd_name,
                            rule = %rule,
                            previous = %previous.binding_name,
                            binding = %config.binding_name,
                            "Possible bug!!! Conversion rule is claimed by several bindings"
                        );
                    }
                }
            }

            info!(
                binding = %config.binding_name,
                crd = %crd_name,
                rules = config.webhook.conversions.len(),
                "Conversion binding controller: add webhook from config"
            );
            self.registrar.add_webhook(config.webhook.clone());
        }
    }

    fn disable_conversion_bindings(&mut self) {}

    fn can_handle_event(&self, event: &ConversionEvent, rule_id: &str) -> bool {
        self.link(&event.crd_name, rule_id).is_some()
    }

    fn handle_event(&self, event: &ConversionEvent, rule_id: &str) -> BindingExecutionInfo {
        let Some(crd_links) = self.links.get(&event.crd_name) else {
            error!(
                crd = %event.crd_name,
                "Possible bug!!! No binding for conversion event"
            );
            return BindingExecutionInfo::default();
        };
        let Some(link) = crd_links.get(rule_id) else {
            error!(
                crd = %event.crd_name,
                rule = %rule_id,
                "Possible bug!!! Event has an unknown conversion rule: no binding was registered"
            );
            return BindingExecutionInfo::default();
        };

        let bc = BindingContext {
            binding: link.binding_name.clone(),
            context_type: CONVERSION_CONTEXT_TYPE,
            from_version: link.from_version.clone(),
            to_version: link.to_version.clone(),
            review: event.get_review(),
            metadata: BindingContextMetadata {
                binding_type: BindingType::KubernetesConversion,
                include_snapshots: link.include_snapshots.clone(),
                group: link.group.clone(),
            },
        };

        BindingExecutionInfo {
            binding_context: vec![bc],
            binding: link.binding_name.clone(),
            include_snapshots: link.include_snapshots.clone(),
            group: link.group.clone(),
        }
    }
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;
