//! # Prometheus Metrics
//!
//! Operational metrics for the node, scraped at `/metrics` on the metrics
//! port. Everything is registered in a dedicated [`prometheus::Registry`]
//! with the `titan` prefix.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use titan_contracts::FeeQuote;

/// Handles to every metric the node records.
///
/// Clones share the underlying series.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// JSON-RPC calls, labelled by method and outcome (`ok` / error kind).
    pub calls_total: IntCounterVec,
    /// Successful `payCore_payTitan` calls.
    pub payments_processed_total: IntCounter,
    /// Sum of fees moved to fee receivers.
    pub fees_collected_total: IntCounter,
    /// Sum of payment amounts, fees included.
    pub payment_volume_total: IntCounter,
    /// Currently connected WebSocket subscribers.
    pub ws_subscribers: IntGauge,
    /// Time spent handling one JSON-RPC call.
    pub call_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once per registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("titan".into()), None)?;

        let calls_total = IntCounterVec::new(
            Opts::new("calls_total", "JSON-RPC calls by method and outcome"),
            &["method", "outcome"],
        )?;
        registry.register(Box::new(calls_total.clone()))?;

        let payments_processed_total = IntCounter::new(
            "payments_processed_total",
            "Total number of fee-split payments completed",
        )?;
        registry.register(Box::new(payments_processed_total.clone()))?;

        let fees_collected_total = IntCounter::new(
            "fees_collected_total",
            "Total fee units transferred to fee receivers",
        )?;
        registry.register(Box::new(fees_collected_total.clone()))?;

        let payment_volume_total = IntCounter::new(
            "payment_volume_total",
            "Total units paid through PayCore, fees included",
        )?;
        registry.register(Box::new(payment_volume_total.clone()))?;

        let ws_subscribers = IntGauge::new(
            "ws_subscribers",
            "Number of connected WebSocket subscribers",
        )?;
        registry.register(Box::new(ws_subscribers.clone()))?;

        let call_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "call_latency_seconds",
                "JSON-RPC call handling latency in seconds",
            )
            .buckets(vec![
                0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
        )?;
        registry.register(Box::new(call_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            calls_total,
            payments_processed_total,
            fees_collected_total,
            payment_volume_total,
            ws_subscribers,
            call_latency_seconds,
        })
    }

    /// Counts one call. `outcome` is `"ok"` or an error kind.
    pub fn record_call(&self, method: &str, outcome: &str) {
        self.calls_total.with_label_values(&[method, outcome]).inc();
    }

    pub fn record_payment(&self, quote: &FeeQuote) {
        self.payments_processed_total.inc();
        self.fees_collected_total.inc_by(quote.fee);
        self.payment_volume_total.inc_by(quote.amount);
    }

    /// Encodes all registered metrics into the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
