//! HTTP server for the conversion webhook
//!
//! Serves:
//! - `/{crd_name}` - ConversionReview webhook for each registered CRD
//! - `/healthz` - Liveness probe (process is running)
//! - `/readyz` - Readiness probe (hooks loaded, webhooks registered)
//! - `/metrics` - Prometheus metrics
//!
//! Also provides graceful shutdown on SIGTERM/SIGINT.

mod health;
pub mod metrics;
pub mod shutdown;
pub mod tls;
pub mod webhook;

pub use health::{build_router, run_server, run_server_tls, ReadinessState, ServerState};
pub use metrics::{create_metrics, ConversionMetrics, SharedMetrics};
pub use shutdown::wait_for_signal;
pub use tls::{build_rustls_config, initialize_tls, CertificateBundle, TlsError};
pub use webhook::Converter;
