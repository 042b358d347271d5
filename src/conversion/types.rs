//! ConversionReview payloads and hook responses
//!
//! - [`ConversionReview`] is what the API server sends to the webhook
//! - [`ConversionEvent`] carries a review to the hooks of one CRD
//! - [`ConversionResponse`] is what a hook writes back
//! - [`ConversionReviewResponse`] is what the webhook answers

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// apiVersion of the ConversionReview answer
pub const REVIEW_API_VERSION: &str = "apiextensions.k8s.io/v1";

/// kind of the ConversionReview answer
pub const REVIEW_KIND: &str = "ConversionReview";

/// Errors reading a hook's conversion response
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid conversion response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Kubernetes ConversionReview request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionReview {
    pub api_version: String,
    pub kind: String,
    pub request: ConversionRequest,
}

/// The conversion request from Kubernetes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRequest {
    /// Unique ID for this request
    pub uid: String,
    /// Target API version (e.g., "stable.example.com/v1")
    #[serde(rename = "desiredAPIVersion")]
    pub desired_api_version: String,
    /// Objects to convert
    #[serde(default)]
    pub objects: Vec<Value>,
}

/// A conversion review addressed to the hooks of one CRD
#[derive(Debug, Clone)]
pub struct ConversionEvent {
    pub crd_name: String,
    pub review: ConversionReview,
    /// Objects as converted so far
    pub objects: Vec<Value>,
}

impl ConversionEvent {
    pub fn new(crd_name: impl Into<String>, review: ConversionReview) -> Self {
        let objects = review.request.objects.clone();
        Self {
            crd_name: crd_name.into(),
            review,
            objects,
        }
    }

    /// The review as passed to hooks, with the current objects
    pub fn get_review(&self) -> Value {
        json!({
            "kind": self.review.kind,
            "apiVersion": self.review.api_version,
            "request": {
                "uid": self.review.request.uid,
                "desiredAPIVersion": self.review.request.desired_api_version,
                "objects": self.objects,
            }
        })
    }

    /// apiVersion of the first object
    pub fn from_version(&self) -> Option<&str> {
        self.objects
            .first()
            .and_then(|obj| obj.get("apiVersion"))
            .and_then(Value::as_str)
    }

    pub fn desired_version(&self) -> &str {
        &self.review.request.desired_api_version
    }
}

/// Response of a conversion hook
///
/// An empty `failed_message` means success. Converted objects must keep the
/// order of the request objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResponse {
    #[serde(default)]
    pub failed_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converted_objects: Option<Vec<Value>>,
}

impl ConversionResponse {
    pub fn success(converted_objects: Vec<Value>) -> Self {
        Self {
            failed_message: String::new(),
            converted_objects: Some(converted_objects),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            failed_message: message.into(),
            converted_objects: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        !self.failed_message.is_empty()
    }

    /// Read a response file
    ///
    /// Returns `Ok(None)` for an empty file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Option<Self>, ResponseError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| ResponseError::Read {
            path: path.display().to_string(),
            source,
        })?;
        if data.is_empty() {
            return Ok(None);
        }
        Self::from_bytes(&data).map(Some)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, ResponseError> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, ResponseError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ResponseError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Short description for logs
    pub fn dump(&self) -> String {
        let mut out = format!("ConversionResponse(failedMessage={}", self.failed_message);
        if let Some(objects) = self.converted_objects.as_ref().filter(|o| !o.is_empty()) {
            out.push_str(&format!(",convertedObjects.len={}", objects.len()));
        }
        out.push(')');
        out
    }
}

/// Result status for conversion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversionResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Response part of the answered ConversionReview
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub uid: String,
    pub result: ConversionResult,
    pub converted_objects: Vec<Value>,
}

/// Full ConversionReview answer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionReviewResponse {
    pub api_version: String,
    pub kind: String,
    pub response: ReviewResponse,
}

impl ConversionReviewResponse {
    /// Build the answer for a request from a hook response
    pub fn from_response(uid: impl Into<String>, response: ConversionResponse) -> Self {
        let result = if response.is_failed() {
            ConversionResult {
                status: "Failed".to_string(),
                message: Some(response.failed_message),
            }
        } else {
            ConversionResult {
                status: "Success".to_string(),
                message: None,
            }
        };
        let converted_objects = if result.status == "Success" {
            response.converted_objects.unwrap_or_default()
        } else {
            Vec::new()
        };

        Self {
            api_version: REVIEW_API_VERSION.to_string(),
            kind: REVIEW_KIND.to_string(),
            response: ReviewResponse {
                uid: uid.into(),
                result,
                converted_objects,
            },
        }
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
