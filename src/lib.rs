//! Conversion webhook for Kubernetes custom resources
//!
//! Hooks declare conversion rules between CRD versions. Conversion requests
//! for versions without a declared rule are served by chaining declared
//! rules, each step running the hook that owns it.

pub mod config;
pub mod conversion;
pub mod hook;
pub mod server;
