//! CRD version conversion
//!
//! - [`rule`] / [`version`]: conversion rules and version matching
//! - [`chain`]: multi-hop conversion paths per CRD
//! - [`sorter`]: ordering versions by maturity
//! - [`manager`] / [`crd_client_config`]: webhook registration and CRD patching
//! - [`types`]: ConversionReview payloads and hook responses

pub mod chain;
pub mod config;
pub mod crd_client_config;
pub mod manager;
pub mod rule;
pub mod sorter;
pub mod types;
pub mod version;

pub use chain::{Chain, ChainStorage};
pub use config::{ConversionWebhookConfig, WebhookMetadata};
pub use crd_client_config::{CrdClientConfig, CrdConfigError};
pub use manager::{WebhookManager, WebhookRegistrar, WebhookServiceSettings};
pub use rule::ConversionRule;
pub use sorter::{compare_versions, is_greater_than, sort_versions};
pub use types::{
    ConversionEvent, ConversionResponse, ConversionReview, ConversionReviewResponse,
    ResponseError,
};
pub use version::{trim_group, versions_matched};
