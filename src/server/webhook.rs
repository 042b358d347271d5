//! CRD conversion webhook
//!
//! Kubernetes posts a ConversionReview to `/{crd_name}`. The objects are
//! converted by walking the conversion chain from their version to the
//! desired version, running the hook that owns each rule on the way.
//!
//! ## Endpoints
//! - POST /{crd_name} - Kubernetes ConversionReview webhook

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::conversion::rule::ConversionRule;
use crate::conversion::types::{
    ConversionEvent, ConversionResponse, ConversionReview, ConversionReviewResponse,
};
use crate::conversion::version::versions_matched;
use crate::hook::executor::HookExecutor;
use crate::hook::manager::HookManager;

use super::health::ServerState;

/// Converts events through the hooks of a [`HookManager`]
///
/// Conversions hold the manager lock for their whole duration, so chain
/// expansion and hook runs never interleave.
pub struct Converter {
    manager: Mutex<HookManager>,
    executor: Arc<dyn HookExecutor>,
}

impl Converter {
    pub fn new(manager: HookManager, executor: Arc<dyn HookExecutor>) -> Self {
        Self {
            manager: Mutex::new(manager),
            executor,
        }
    }

    /// Convert all objects of an event to the desired version
    ///
    /// Objects are grouped by apiVersion and each group walks its own chain.
    /// The converted objects keep the request order.
    pub async fn convert(&self, event: ConversionEvent) -> ConversionResponse {
        if event.objects.is_empty() {
            return ConversionResponse::success(Vec::new());
        }

        let groups = match group_by_version(&event.objects) {
            Ok(groups) => groups,
            Err(index) => {
                return ConversionResponse::failed(format!(
                    "Object at index {} has no apiVersion",
                    index
                ));
            }
        };

        let desired_version = event.desired_version().to_string();
        let mut converted: Vec<Option<Value>> = vec![None; event.objects.len()];
        let mut manager = self.manager.lock().await;

        for (version, indices) in groups {
            let objects: Vec<Value> = indices.iter().map(|&i| event.objects[i].clone()).collect();

            let objects = if versions_matched(&version, &desired_version) {
                objects
            } else {
                let rule = ConversionRule::new(version, desired_version.clone());
                let mut group_event = event.clone();
                group_event.objects = objects;
                match self.run_chain(&mut manager, group_event, &rule).await {
                    Ok(objects) => objects,
                    Err(message) => return ConversionResponse::failed(message),
                }
            };

            for (index, object) in indices.into_iter().zip(objects) {
                converted[index] = Some(object);
            }
        }

        ConversionResponse::success(converted.into_iter().flatten().collect())
    }

    /// Run the hooks on the conversion chain of `rule` over the event objects
    ///
    /// Returns the failure message of the first step that fails.
    async fn run_chain(
        &self,
        manager: &mut HookManager,
        mut event: ConversionEvent,
        rule: &ConversionRule,
    ) -> Result<Vec<Value>, String> {
        let path = manager
            .find_conversion_chain(&event.crd_name, rule)
            .ok_or_else(|| format!("No conversion path found for {}", rule))?;

        debug!(crd = %event.crd_name, rule = %rule, path = ?path, "Conversion path found");

        for rule_id in &path {
            let (hook, info) = manager
                .handle_conversion_event(&event, rule_id)
                .ok_or_else(|| {
                    format!(
                        "No hook handles conversion rule {} for crd/{}",
                        rule_id, event.crd_name
                    )
                })?;

            let response = self
                .executor
                .run(hook, &info)
                .await
                .map_err(|e| format!("Hook '{}' failed on {}: {}", hook.name, rule_id, e))?;

            debug!(
                hook = %hook.name,
                rule = %rule_id,
                response = %response.dump(),
                "Conversion hook finished"
            );

            if response.is_failed() {
                return Err(response.failed_message);
            }

            let given = event.objects.len();
            match response.converted_objects {
                Some(objects) if objects.len() == given => event.objects = objects,
                Some(objects) => {
                    return Err(format!(
                        "Hook '{}' returned {} objects for {} on {}",
                        hook.name,
                        objects.len(),
                        given,
                        rule_id
                    ));
                }
                None => {
                    return Err(format!(
                        "Hook '{}' returned no convertedObjects on {}",
                        hook.name, rule_id
                    ));
                }
            }
        }

        Ok(event.objects)
    }
}

/// Object indices grouped by apiVersion, in order of first appearance
///
/// Fails with the index of the first object without a string apiVersion.
fn group_by_version(objects: &[Value]) -> Result<Vec<(String, Vec<usize>)>, usize> {
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    for (index, object) in objects.iter().enumerate() {
        let version = object
            .get("apiVersion")
            .and_then(Value::as_str)
            .ok_or(index)?;
        match groups.iter_mut().find(|(v, _)| v.as_str() == version) {
            Some((_, indices)) => indices.push(index),
            None => groups.push((version.to_string(), vec![index])),
        }
    }
    Ok(groups)
}

/// Axum handler for the /{crd_name} endpoint
pub async fn handle_convert(
    State(state): State<ServerState>,
    Path(crd_name): Path<String>,
    Json(review): Json<ConversionReview>,
) -> impl IntoResponse {
    let uid = review.request.uid.clone();
    info!(
        uid = %uid,
        crd = %crd_name,
        desired_version = %review.request.desired_api_version,
        object_count = review.request.objects.len(),
        "Processing conversion request"
    );

    let started = Instant::now();
    let event = ConversionEvent::new(crd_name.clone(), review);
    let response = state.converter.convert(event).await;

    state.metrics.record_conversion(
        &crd_name,
        !response.is_failed(),
        started.elapsed().as_secs_f64(),
    );

    if response.is_failed() {
        warn!(
            uid = %uid,
            crd = %crd_name,
            error = %response.failed_message,
            "Conversion failed"
        );
    } else {
        info!(
            uid = %uid,
            crd = %crd_name,
            converted_count = response.converted_objects.as_ref().map_or(0, Vec::len),
            "Conversion successful"
        );
    }

    (
        StatusCode::OK,
        Json(ConversionReviewResponse::from_response(uid, response)),
    )
}

#[cfg(test)]
#[path = "webhook_test.rs"]
mod tests;
