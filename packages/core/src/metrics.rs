//! Prometheus metrics registry for the workshop queue.
//!
//! [`AppMetrics`] owns all registered metrics and the [`Registry`] they
//! belong to. Construct it once at startup, wrap in `Arc`, and pass it to
//! the HTTP layer.
//!
//! Exposed at `GET /metrics` in Prometheus text exposition format
//! (`text/plain; version=0.0.4`). The endpoint is intentionally excluded
//! from API-key auth so it can be scraped by Prometheus / Grafana agents.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use prometheus::{Counter, CounterVec, Gauge, Histogram, HistogramOpts, Opts, Registry};

/// All application-level Prometheus metrics.
pub struct AppMetrics {
    /// Total number of items admitted into the queue.
    pub enqueued_total: Counter,
    /// Total number of items transitioned to `OPENED`.
    pub opened_total: Counter,
    /// Pending-set size as of the last queue read.
    pub pending_items: Gauge,
    /// HTTP request count, labelled by method, path, and status code.
    pub http_requests_total: CounterVec,
    /// HTTP request latency histogram in seconds.
    pub http_request_duration: Histogram,
    /// The registry that owns all of the above metrics.
    pub registry: Registry,
}

impl AppMetrics {
    /// Create and register all metrics. Returns an error if any metric
    /// name is invalid or duplicated (should not happen in practice).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let enqueued_total = Counter::with_opts(Opts::new(
            "workshop_queue_enqueued_total",
            "Items admitted into the queue",
        ))?;

        let opened_total = Counter::with_opts(Opts::new(
            "workshop_queue_opened_total",
            "Items transitioned to OPENED",
        ))?;

        let pending_items = Gauge::with_opts(Opts::new(
            "workshop_queue_pending_items",
            "Pending-set size as of the last queue read",
        ))?;

        let http_requests_total = CounterVec::new(
            Opts::new(
                "workshop_queue_http_requests_total",
                "HTTP requests by method, path, and status",
            ),
            &["method", "path", "status"],
        )?;

        let http_request_duration = Histogram::with_opts(
            HistogramOpts::new(
                "workshop_queue_http_request_duration_seconds",
                "HTTP request latency in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;

        registry.register(Box::new(enqueued_total.clone()))?;
        registry.register(Box::new(opened_total.clone()))?;
        registry.register(Box::new(pending_items.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;

        Ok(Self {
            enqueued_total,
            opened_total,
            pending_items,
            http_requests_total,
            http_request_duration,
            registry,
        })
    }

    /// Render all metrics as Prometheus text format (for the `/metrics` endpoint).
    pub fn render(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&metric_families, &mut buf)?;
        Ok(String::from_utf8(buf).unwrap_or_default())
    }
}

/// Axum middleware recording request count and latency.
pub async fn track_http(
    State(metrics): State<Arc<AppMetrics>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    metrics
        .http_requests_total
        .with_label_values(&[method.as_str(), &path, response.status().as_str()])
        .inc();
    metrics
        .http_request_duration
        .observe(start.elapsed().as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_metrics_register_without_error() {
        let metrics = AppMetrics::new();
        assert!(metrics.is_ok(), "AppMetrics::new() failed: {:?}", metrics.err());
    }

    #[test]
    fn render_produces_non_empty_output_after_increment() {
        let metrics = AppMetrics::new().unwrap();
        metrics.enqueued_total.inc();
        let output = metrics.render().unwrap();
        assert!(output.contains("workshop_queue_enqueued_total"));
    }

    #[test]
    fn counters_increment_correctly() {
        let metrics = AppMetrics::new().unwrap();
        metrics.enqueued_total.inc_by(3.0);
        metrics.opened_total.inc();
        assert!((metrics.enqueued_total.get() - 3.0).abs() < f64::EPSILON);
        assert!((metrics.opened_total.get() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn gauge_set_and_get() {
        let metrics = AppMetrics::new().unwrap();
        metrics.pending_items.set(42.0);
        assert!((metrics.pending_items.get() - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn http_requests_counter_vec_labels_work() {
        let metrics = AppMetrics::new().unwrap();
        metrics
            .http_requests_total
            .with_label_values(&["GET", "/queue", "200"])
            .inc();
        let val = metrics
            .http_requests_total
            .with_label_values(&["GET", "/queue", "200"])
            .get();
        assert!((val - 1.0).abs() < f64::EPSILON);
    }
}
