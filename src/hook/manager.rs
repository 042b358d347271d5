//! Hooks and the conversion chains built from their bindings

use std::sync::Arc;

use tracing::info;

use crate::config::HooksConfig;
use crate::conversion::chain::ChainStorage;
use crate::conversion::manager::WebhookRegistrar;
use crate::conversion::rule::ConversionRule;
use crate::conversion::types::ConversionEvent;

use super::binding_context::BindingExecutionInfo;
use super::controller::{
    ConversionBindingsController, ConversionConfig, DefaultConversionBindingsController,
};

/// A configured hook with its conversion bindings
pub struct Hook {
    pub name: String,
    pub command: Vec<String>,
    pub controller: Box<dyn ConversionBindingsController>,
}

impl Hook {
    pub fn new(
        name: impl Into<String>,
        command: Vec<String>,
        controller: Box<dyn ConversionBindingsController>,
    ) -> Self {
        Self {
            name: name.into(),
            command,
            controller,
        }
    }
}

/// All hooks and the conversion chains of their CRDs
///
/// Chain expansion mutates the storage, so concurrent callers must
/// serialize access to the manager.
#[derive(Default)]
pub struct HookManager {
    hooks: Vec<Hook>,
    conversion_chains: ChainStorage,
}

impl HookManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build hooks from configuration and enable their bindings
    pub fn init(config: &HooksConfig, registrar: Arc<dyn WebhookRegistrar>) -> Self {
        let mut manager = Self::new();
        for hook in &config.hooks {
            let bindings = hook
                .conversion_bindings
                .iter()
                .map(|b| b.to_conversion_config(&hook.name))
                .collect();
            manager.add_hook(&hook.name, hook.command.clone(), bindings, registrar.clone());
        }
        info!(
            hooks = manager.hooks.len(),
            crds = manager.conversion_chains.len(),
            "Hook manager initialized"
        );
        manager
    }

    /// Add a hook, enable its bindings and seed the chains with its rules
    pub fn add_hook(
        &mut self,
        name: &str,
        command: Vec<String>,
        bindings: Vec<ConversionConfig>,
        registrar: Arc<dyn WebhookRegistrar>,
    ) {
        for binding in &bindings {
            for rule in &binding.webhook.conversions {
                self.conversion_chains.put(&binding.webhook.crd_name, rule);
            }
        }

        let mut controller = DefaultConversionBindingsController::new(bindings, registrar);
        controller.enable_conversion_bindings();

        self.hooks
            .push(Hook::new(name, command, Box::new(controller)));
    }

    pub fn hook(&self, name: &str) -> Option<&Hook> {
        self.hooks.iter().find(|h| h.name == name)
    }

    pub fn hook_names(&self) -> Vec<&str> {
        self.hooks.iter().map(|h| h.name.as_str()).collect()
    }

    pub fn conversion_chains(&self) -> &ChainStorage {
        &self.conversion_chains
    }

    /// Path of declared rule ids for a conversion of a CRD
    pub fn find_conversion_chain(
        &mut self,
        crd_name: &str,
        rule: &ConversionRule,
    ) -> Option<Vec<String>> {
        self.conversion_chains.find_conversion_chain(crd_name, rule)
    }

    /// Find the hook that handles a rule of an event and build its execution info
    pub fn handle_conversion_event(
        &self,
        event: &ConversionEvent,
        rule_id: &str,
    ) -> Option<(&Hook, BindingExecutionInfo)> {
        self.hooks
            .iter()
            .find(|h| h.controller.can_handle_event(event, rule_id))
            .map(|h| (h, h.controller.handle_event(event, rule_id)))
    }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod tests;
