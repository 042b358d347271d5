//! Tests for the conversion webhook

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::config::HooksConfig;
use crate::conversion::manager::{WebhookManager, WebhookServiceSettings};
use crate::hook::binding_context::BindingExecutionInfo;
use crate::hook::executor::ExecutionError;
use crate::hook::manager::Hook;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Mutex as StdMutex;

const CRD: &str = "crontabs.stable.example.com";

const CONFIG: &str = r#"
hooks:
  - name: up
    command: ["/hooks/up.sh"]
    kubernetesCustomResourceConversion:
      - name: up
        crdName: crontabs.stable.example.com
        conversions:
          - fromVersion: stable.example.com/v1
            toVersion: stable.example.com/v2
          - fromVersion: stable.example.com/v2
            toVersion: stable.example.com/v3
  - name: down
    command: ["/hooks/down.sh"]
    kubernetesCustomResourceConversion:
      - name: down
        crdName: crontabs.stable.example.com
        conversions:
          - fromVersion: v3
            toVersion: v2
"#;

/// Executor that sets apiVersion to the binding's to version
#[derive(Default)]
struct VersionSetter {
    runs: StdMutex<Vec<String>>,
    fail_hook: Option<String>,
    error_hook: Option<String>,
    /// Response returned as is by the named hook
    canned: Option<(String, ConversionResponse)>,
}

#[async_trait]
impl HookExecutor for VersionSetter {
    async fn run(
        &self,
        hook: &Hook,
        info: &BindingExecutionInfo,
    ) -> Result<ConversionResponse, ExecutionError> {
        let bc = &info.binding_context[0];
        self.runs
            .lock()
            .unwrap()
            .push(format!("{}:{}->{}", hook.name, bc.from_version, bc.to_version));

        if self.error_hook.as_deref() == Some(hook.name.as_str()) {
            return Err(ExecutionError::NoResponse(hook.name.clone()));
        }
        if self.fail_hook.as_deref() == Some(hook.name.as_str()) {
            return Ok(ConversionResponse::failed("cannot convert"));
        }
        if let Some((name, response)) = &self.canned {
            if *name == hook.name {
                return Ok(response.clone());
            }
        }

        let objects: Vec<Value> = bc.review["request"]["objects"]
            .as_array()
            .unwrap()
            .iter()
            .map(|obj| {
                let mut obj = obj.clone();
                obj["apiVersion"] = json!(bc.to_version);
                obj
            })
            .collect();
        Ok(ConversionResponse::success(objects))
    }
}

fn converter(executor: Arc<VersionSetter>) -> Converter {
    let config = HooksConfig::from_yaml(CONFIG).unwrap();
    let webhooks = Arc::new(WebhookManager::new(WebhookServiceSettings::default()));
    Converter::new(HookManager::init(&config, webhooks), executor)
}

fn event(desired: &str, objects: Vec<Value>) -> ConversionEvent {
    let review: ConversionReview = serde_json::from_value(json!({
        "apiVersion": "apiextensions.k8s.io/v1",
        "kind": "ConversionReview",
        "request": {
            "uid": "uid-1",
            "desiredAPIVersion": desired,
            "objects": objects
        }
    }))
    .unwrap();
    ConversionEvent::new(CRD, review)
}

fn crontab(name: &str, api_version: &str) -> Value {
    json!({
        "apiVersion": api_version,
        "kind": "CronTab",
        "metadata": {"name": name, "namespace": "default"}
    })
}

#[tokio::test]
async fn test_convert_single_step() {
    let executor = Arc::new(VersionSetter::default());
    let converter = converter(executor.clone());

    let response = converter
        .convert(event(
            "stable.example.com/v2",
            vec![crontab("a", "stable.example.com/v1")],
        ))
        .await;

    assert!(!response.is_failed(), "{}", response.dump());
    let objects = response.converted_objects.unwrap();
    assert_eq!(objects[0]["apiVersion"], "stable.example.com/v2");
    assert_eq!(objects[0]["metadata"]["name"], "a");
    assert_eq!(
        *executor.runs.lock().unwrap(),
        vec!["up:stable.example.com/v1->stable.example.com/v2"]
    );
}

#[tokio::test]
async fn test_convert_multi_step_keeps_order() {
    let executor = Arc::new(VersionSetter::default());
    let converter = converter(executor.clone());

    let response = converter
        .convert(event(
            "stable.example.com/v3",
            vec![
                crontab("a", "stable.example.com/v1"),
                crontab("b", "stable.example.com/v1"),
            ],
        ))
        .await;

    let objects = response.converted_objects.unwrap();
    assert_eq!(objects.len(), 2);
    assert_eq!(objects[0]["metadata"]["name"], "a");
    assert_eq!(objects[1]["metadata"]["name"], "b");
    assert_eq!(objects[1]["apiVersion"], "stable.example.com/v3");
    assert_eq!(
        *executor.runs.lock().unwrap(),
        vec![
            "up:stable.example.com/v1->stable.example.com/v2",
            "up:stable.example.com/v2->stable.example.com/v3"
        ]
    );
}

#[tokio::test]
async fn test_convert_with_short_rule() {
    let executor = Arc::new(VersionSetter::default());
    let converter = converter(executor.clone());

    let response = converter
        .convert(event(
            "stable.example.com/v2",
            vec![crontab("a", "stable.example.com/v3")],
        ))
        .await;

    assert!(!response.is_failed(), "{}", response.dump());
    assert_eq!(*executor.runs.lock().unwrap(), vec!["down:v3->v2"]);
}

#[tokio::test]
async fn test_convert_same_version_skips_hooks() {
    let executor = Arc::new(VersionSetter::default());
    let converter = converter(executor.clone());

    let objects = vec![crontab("a", "stable.example.com/v2")];
    let response = converter
        .convert(event("stable.example.com/v2", objects.clone()))
        .await;

    assert_eq!(response.converted_objects, Some(objects));
    assert!(executor.runs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_convert_without_objects() {
    let converter = converter(Arc::new(VersionSetter::default()));

    let response = converter.convert(event("stable.example.com/v2", vec![])).await;

    assert!(!response.is_failed());
    assert_eq!(response.converted_objects, Some(vec![]));
}

#[tokio::test]
async fn test_convert_without_path() {
    let converter = converter(Arc::new(VersionSetter::default()));

    let response = converter
        .convert(event(
            "stable.example.com/v1",
            vec![crontab("a", "stable.example.com/v2")],
        ))
        .await;

    assert_eq!(
        response.failed_message,
        "No conversion path found for stable.example.com/v2->stable.example.com/v1"
    );
}

#[tokio::test]
async fn test_convert_stops_on_failed_hook() {
    let executor = Arc::new(VersionSetter {
        fail_hook: Some("up".to_string()),
        ..Default::default()
    });
    let converter = converter(executor.clone());

    let response = converter
        .convert(event(
            "stable.example.com/v3",
            vec![crontab("a", "stable.example.com/v1")],
        ))
        .await;

    assert_eq!(response.failed_message, "cannot convert");
    assert_eq!(executor.runs.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_convert_reports_executor_error() {
    let executor = Arc::new(VersionSetter {
        error_hook: Some("up".to_string()),
        ..Default::default()
    });
    let converter = converter(executor);

    let response = converter
        .convert(event(
            "stable.example.com/v2",
            vec![crontab("a", "stable.example.com/v1")],
        ))
        .await;

    assert!(response.is_failed());
    assert!(response.failed_message.starts_with("Hook 'up' failed on"));
}

#[tokio::test]
async fn test_convert_mixed_versions_with_passthrough() {
    let executor = Arc::new(VersionSetter::default());
    let converter = converter(executor.clone());

    let response = converter
        .convert(event(
            "stable.example.com/v2",
            vec![
                crontab("a", "stable.example.com/v2"),
                crontab("b", "stable.example.com/v1"),
            ],
        ))
        .await;

    assert!(!response.is_failed(), "{}", response.dump());
    let objects = response.converted_objects.unwrap();
    assert_eq!(objects[0]["metadata"]["name"], "a");
    assert_eq!(objects[0]["apiVersion"], "stable.example.com/v2");
    assert_eq!(objects[1]["metadata"]["name"], "b");
    assert_eq!(objects[1]["apiVersion"], "stable.example.com/v2");
    assert_eq!(
        *executor.runs.lock().unwrap(),
        vec!["up:stable.example.com/v1->stable.example.com/v2"]
    );
}

#[tokio::test]
async fn test_convert_mixed_versions_use_own_chains() {
    let executor = Arc::new(VersionSetter::default());
    let converter = converter(executor.clone());

    let response = converter
        .convert(event(
            "stable.example.com/v3",
            vec![
                crontab("a", "stable.example.com/v1"),
                crontab("b", "stable.example.com/v2"),
                crontab("c", "stable.example.com/v1"),
            ],
        ))
        .await;

    assert!(!response.is_failed(), "{}", response.dump());
    let objects = response.converted_objects.unwrap();
    let names: Vec<&str> = objects
        .iter()
        .map(|o| o["metadata"]["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    assert!(objects
        .iter()
        .all(|o| o["apiVersion"] == "stable.example.com/v3"));

    // The v1 group walks two steps, the v2 group only the last one.
    assert_eq!(
        *executor.runs.lock().unwrap(),
        vec![
            "up:stable.example.com/v1->stable.example.com/v2",
            "up:stable.example.com/v2->stable.example.com/v3",
            "up:stable.example.com/v2->stable.example.com/v3"
        ]
    );
}

#[tokio::test]
async fn test_convert_object_without_api_version_fails() {
    let executor = Arc::new(VersionSetter::default());
    let converter = converter(executor.clone());

    let response = converter
        .convert(event(
            "stable.example.com/v2",
            vec![
                json!({"kind": "CronTab"}),
                crontab("b", "stable.example.com/v1"),
            ],
        ))
        .await;

    assert_eq!(response.failed_message, "Object at index 0 has no apiVersion");
    assert_eq!(response.converted_objects, None);
    assert!(executor.runs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_convert_rejects_missing_converted_objects() {
    let executor = Arc::new(VersionSetter {
        canned: Some((
            "up".to_string(),
            ConversionResponse {
                failed_message: String::new(),
                converted_objects: None,
            },
        )),
        ..Default::default()
    });
    let converter = converter(executor);

    let response = converter
        .convert(event(
            "stable.example.com/v2",
            vec![crontab("a", "stable.example.com/v1")],
        ))
        .await;

    assert_eq!(
        response.failed_message,
        "Hook 'up' returned no convertedObjects on stable.example.com/v1->stable.example.com/v2"
    );
}

#[tokio::test]
async fn test_convert_rejects_object_count_mismatch() {
    let executor = Arc::new(VersionSetter {
        canned: Some((
            "up".to_string(),
            ConversionResponse::success(vec![crontab("a", "stable.example.com/v2")]),
        )),
        ..Default::default()
    });
    let converter = converter(executor);

    let response = converter
        .convert(event(
            "stable.example.com/v2",
            vec![
                crontab("a", "stable.example.com/v1"),
                crontab("b", "stable.example.com/v1"),
            ],
        ))
        .await;

    assert_eq!(
        response.failed_message,
        "Hook 'up' returned 1 objects for 2 on stable.example.com/v1->stable.example.com/v2"
    );
}
