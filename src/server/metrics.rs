//! Prometheus metrics for conversion requests

use std::sync::Arc;

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

/// Metrics shared between request handlers
pub type SharedMetrics = Arc<ConversionMetrics>;

/// Conversion request counters and latencies, labeled by CRD
pub struct ConversionMetrics {
    registry: Registry,
    requests: IntCounterVec,
    duration: HistogramVec,
}

impl ConversionMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new(
                "kverso_conversion_requests_total",
                "Conversion requests by CRD and result",
            ),
            &["crd", "result"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new(
                "kverso_conversion_duration_seconds",
                "Time spent converting a ConversionReview",
            ),
            &["crd"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self {
            registry,
            requests,
            duration,
        })
    }

    /// Record one conversion request
    pub fn record_conversion(&self, crd_name: &str, success: bool, seconds: f64) {
        let result = if success { "success" } else { "failure" };
        self.requests.with_label_values(&[crd_name, result]).inc();
        self.duration
            .with_label_values(&[crd_name])
            .observe(seconds);
    }

    /// Encode all metrics in Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Create the metrics registry
pub fn create_metrics() -> Result<SharedMetrics, prometheus::Error> {
    Ok(Arc::new(ConversionMetrics::new()?))
}
