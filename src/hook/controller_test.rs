//! Tests for the conversion bindings controller

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::conversion::rule::ConversionRule;
use crate::conversion::types::ConversionReview;
use serde_json::json;
use std::sync::Mutex;

const CRD: &str = "crontabs.stable.example.com";

/// Registrar that remembers what it was given
#[derive(Default)]
struct RecordingRegistrar {
    webhooks: Mutex<Vec<ConversionWebhookConfig>>,
}

impl RecordingRegistrar {
    fn crd_names(&self) -> Vec<String> {
        self.webhooks
            .lock()
            .unwrap()
            .iter()
            .map(|w| w.crd_name.clone())
            .collect()
    }
}

impl WebhookRegistrar for RecordingRegistrar {
    fn add_webhook(&self, config: ConversionWebhookConfig) {
        self.webhooks.lock().unwrap().push(config);
    }
}

fn binding(name: &str, crd_name: &str, rules: &[(&str, &str)]) -> ConversionConfig {
    ConversionConfig {
        binding_name: name.to_string(),
        webhook: ConversionWebhookConfig {
            crd_name: crd_name.to_string(),
            conversions: rules
                .iter()
                .map(|(from, to)| ConversionRule::new(*from, *to))
                .collect(),
            ..Default::default()
        },
        include_snapshots_from: vec!["pods".to_string()],
        group: "main".to_string(),
    }
}

fn event(crd_name: &str) -> ConversionEvent {
    let review: ConversionReview = serde_json::from_value(json!({
        "apiVersion": "apiextensions.k8s.io/v1",
        "kind": "ConversionReview",
        "request": {
            "uid": "uid-1",
            "desiredAPIVersion": "stable.example.com/v2",
            "objects": [{"apiVersion": "stable.example.com/v1", "kind": "CronTab"}]
        }
    }))
    .unwrap();
    ConversionEvent::new(crd_name, review)
}

fn enabled_controller(
    bindings: Vec<ConversionConfig>,
) -> (DefaultConversionBindingsController, Arc<RecordingRegistrar>) {
    let registrar = Arc::new(RecordingRegistrar::default());
    let mut controller = DefaultConversionBindingsController::new(bindings, registrar.clone());
    controller.enable_conversion_bindings();
    (controller, registrar)
}

#[test]
fn test_nothing_is_handled_before_enable() {
    let registrar = Arc::new(RecordingRegistrar::default());
    let controller = DefaultConversionBindingsController::new(
        vec![binding("up", CRD, &[("v1", "v2")])],
        registrar.clone(),
    );

    assert!(!controller.can_handle_event(&event(CRD), "v1->v2"));
    assert!(registrar.crd_names().is_empty());
}

#[test]
fn test_enable_creates_links_and_registers_webhooks() {
    let (controller, registrar) = enabled_controller(vec![
        binding("up", CRD, &[("v1", "v2"), ("v2", "v3")]),
        binding("backups", "backups.stable.example.com", &[("v1", "v2")]),
    ]);

    assert_eq!(controller.links_len(), 3);
    assert_eq!(
        registrar.crd_names(),
        vec![CRD.to_string(), "backups.stable.example.com".to_string()]
    );

    let link = controller.link(CRD, "v2->v3").unwrap();
    assert_eq!(link.binding_name, "up");
    assert_eq!(link.crd_name, CRD);
    assert_eq!(link.from_version, "v2");
    assert_eq!(link.to_version, "v3");
    assert_eq!(link.include_snapshots, vec!["pods"]);
    assert_eq!(link.group, "main");
}

#[test]
fn test_can_handle_event() {
    let (controller, _) = enabled_controller(vec![binding("up", CRD, &[("v1", "v2")])]);

    assert!(controller.can_handle_event(&event(CRD), "v1->v2"));
    assert!(!controller.can_handle_event(&event(CRD), "v2->v1"));
    assert!(!controller.can_handle_event(&event("unknown.example.com"), "v1->v2"));
}

#[test]
fn test_handle_event_builds_one_binding_context() {
    let (controller, _) = enabled_controller(vec![binding("up", CRD, &[("v1", "v2")])]);

    let info = controller.handle_event(&event(CRD), "v1->v2");

    assert_eq!(info.binding, "up");
    assert_eq!(info.include_snapshots, vec!["pods"]);
    assert_eq!(info.group, "main");
    assert_eq!(info.binding_context.len(), 1);

    let bc = &info.binding_context[0];
    assert_eq!(bc.binding, "up");
    assert_eq!(bc.from_version, "v1");
    assert_eq!(bc.to_version, "v2");
    assert_eq!(bc.metadata.binding_type, BindingType::KubernetesConversion);
    assert_eq!(bc.metadata.include_snapshots, vec!["pods"]);
    assert_eq!(bc.metadata.group, "main");
    assert_eq!(bc.review["request"]["uid"], "uid-1");
    assert_eq!(
        bc.review["request"]["objects"][0]["apiVersion"],
        "stable.example.com/v1"
    );
}

#[test]
fn test_handle_event_for_unknown_crd_is_empty() {
    let (controller, _) = enabled_controller(vec![binding("up", CRD, &[("v1", "v2")])]);

    let info = controller.handle_event(&event("unknown.example.com"), "v1->v2");
    assert!(info.is_empty());
    assert!(info.binding.is_empty());
}

#[test]
fn test_handle_event_for_unknown_rule_is_empty() {
    let (controller, _) = enabled_controller(vec![binding("up", CRD, &[("v1", "v2")])]);

    let info = controller.handle_event(&event(CRD), "v2->v1");
    assert!(info.is_empty());
}

#[test]
fn test_conflicting_bindings_keep_last_claim() {
    let (controller, registrar) = enabled_controller(vec![
        binding("first", CRD, &[("v1", "v2")]),
        binding("second", CRD, &[("v1", "v2")]),
    ]);

    assert_eq!(controller.links_len(), 1);
    assert_eq!(controller.link(CRD, "v1->v2").unwrap().binding_name, "second");
    assert_eq!(registrar.crd_names().len(), 2);
}

#[test]
fn test_enable_twice_registers_again() {
    let (mut controller, registrar) = enabled_controller(vec![binding("up", CRD, &[("v1", "v2")])]);
    controller.enable_conversion_bindings();

    assert_eq!(controller.links_len(), 1);
    assert_eq!(registrar.crd_names().len(), 2);
}

#[test]
fn test_disable_keeps_links() {
    let (mut controller, _) = enabled_controller(vec![binding("up", CRD, &[("v1", "v2")])]);
    controller.disable_conversion_bindings();

    assert!(controller.can_handle_event(&event(CRD), "v1->v2"));
}
