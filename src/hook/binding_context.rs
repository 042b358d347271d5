//! Binding contexts passed to hooks

use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Kind of binding that produced a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BindingType {
    #[serde(rename = "kubernetesCustomResourceConversion")]
    KubernetesConversion,
}

impl fmt::Display for BindingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingType::KubernetesConversion => write!(f, "kubernetesCustomResourceConversion"),
        }
    }
}

/// Information about a binding that is not passed to the hook
#[derive(Debug, Clone, PartialEq)]
pub struct BindingContextMetadata {
    pub binding_type: BindingType,
    pub include_snapshots: Vec<String>,
    pub group: String,
}

/// Context of one conversion step, serialized for the hook
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingContext {
    pub binding: String,
    #[serde(rename = "type")]
    pub context_type: &'static str,
    pub from_version: String,
    pub to_version: String,
    pub review: Value,
    #[serde(skip)]
    pub metadata: BindingContextMetadata,
}

/// Type of a conversion binding context as seen by hooks
pub const CONVERSION_CONTEXT_TYPE: &str = "Conversion";

/// What a hook needs to run for an event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingExecutionInfo {
    pub binding_context: Vec<BindingContext>,
    pub binding: String,
    pub include_snapshots: Vec<String>,
    pub group: String,
}

impl BindingExecutionInfo {
    /// True when there is nothing to execute
    pub fn is_empty(&self) -> bool {
        self.binding_context.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_binding_context_serialization() {
        let bc = BindingContext {
            binding: "crontabs_up".to_string(),
            context_type: CONVERSION_CONTEXT_TYPE,
            from_version: "v1".to_string(),
            to_version: "v2".to_string(),
            review: json!({"kind": "ConversionReview"}),
            metadata: BindingContextMetadata {
                binding_type: BindingType::KubernetesConversion,
                include_snapshots: vec!["pods".to_string()],
                group: "main".to_string(),
            },
        };

        let value = serde_json::to_value(&bc).expect("serialize");
        assert_eq!(
            value,
            json!({
                "binding": "crontabs_up",
                "type": "Conversion",
                "fromVersion": "v1",
                "toVersion": "v2",
                "review": {"kind": "ConversionReview"}
            })
        );
    }

    #[test]
    fn test_default_execution_info_is_empty() {
        assert!(BindingExecutionInfo::default().is_empty());
    }

    #[test]
    fn test_binding_type_display() {
        assert_eq!(
            BindingType::KubernetesConversion.to_string(),
            "kubernetesCustomResourceConversion"
        );
    }
}
