//! Conversion webhook configuration announced by bindings

use std::collections::BTreeMap;

use super::rule::ConversionRule;

/// Webhook configuration for one CRD
///
/// `crd_name` is also the last element of the webhook URL path, so it
/// must be URL safe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionWebhookConfig {
    pub crd_name: String,
    pub conversions: Vec<ConversionRule>,
    pub metadata: WebhookMetadata,
}

/// Identification of the binding behind a webhook configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebhookMetadata {
    pub name: String,
    pub debug_name: String,
    pub log_labels: BTreeMap<String, String>,
}
