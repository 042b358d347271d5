//! Point a CRD's conversion strategy at the webhook
//!
//! Patches `spec.conversion` of a CustomResourceDefinition:
//!
//! ```yaml
//! conversion:
//!   strategy: Webhook
//!   webhook:
//!     clientConfig:
//!       service: {namespace, name, path: /<crdName>}
//!       caBundle: <base64 CA>
//!     conversionReviewVersions: [v1, ...]
//! ```

use std::collections::BTreeSet;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Patch, PatchParams};
use kube::Api;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::info;

use super::version::trim_group;

/// Errors updating a CRD's conversion settings
#[derive(Debug, Error)]
pub enum CrdConfigError {
    #[error("crd/{0} not found")]
    NotFound(String),

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
}

/// Webhook client configuration for a particular CRD
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrdClientConfig {
    pub crd_name: String,
    /// Short versions, sorted for stable patches
    pub review_versions: BTreeSet<String>,
    pub namespace: String,
    pub service_name: String,
    pub path: String,
    /// Base64-encoded CA certificate
    pub ca_bundle: String,
}

impl CrdClientConfig {
    pub fn new(crd_name: impl Into<String>) -> Self {
        let crd_name = crd_name.into();
        Self {
            path: format!("/{}", crd_name),
            crd_name,
            ..Default::default()
        }
    }

    /// Add a version to conversionReviewVersions, without its group
    pub fn add_review_version(&mut self, version: &str) {
        self.review_versions.insert(trim_group(version).to_string());
    }

    /// Merge patch that switches the CRD to webhook conversion
    pub fn conversion_patch(&self) -> Value {
        let review_versions: Vec<&str> = self.review_versions.iter().map(String::as_str).collect();
        json!({
            "spec": {
                "conversion": {
                    "strategy": "Webhook",
                    "webhook": {
                        "clientConfig": {
                            "service": {
                                "namespace": self.namespace,
                                "name": self.service_name,
                                "path": self.path,
                            },
                            "caBundle": self.ca_bundle,
                        },
                        "conversionReviewVersions": review_versions,
                    }
                }
            }
        })
    }

    /// Apply the conversion patch to the CRD
    pub async fn update(&self, client: &kube::Client) -> Result<(), CrdConfigError> {
        let crds: Api<CustomResourceDefinition> = Api::all(client.clone());

        if crds.get_opt(&self.crd_name).await?.is_none() {
            return Err(CrdConfigError::NotFound(self.crd_name.clone()));
        }

        crds.patch(
            &self.crd_name,
            &PatchParams::default(),
            &Patch::Merge(&self.conversion_patch()),
        )
        .await?;

        info!(
            crd = %self.crd_name,
            review_versions = ?self.review_versions,
            "CRD spec.conversion is updated to webhook"
        );

        Ok(())
    }
}
