//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - HTTP request counts by method, path, and status
//! - HTTP request latency histograms
//! - Live hub connections and rooms
//! - Broadcast and per-connection delivery counts
//! - Hub evictions by reason

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// HTTP request counter - tracks total requests by method, path, and status code
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests").namespace("chat_hub"),
        &["method", "path", "status"],
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric")
});

/// HTTP request latency histogram - tracks request duration in seconds
pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
    HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        )
        .namespace("chat_hub")
        .buckets(buckets),
        &["method", "path"],
    )
    .expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric")
});

/// Connections currently registered with the hub
pub static HUB_CONNECTIONS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("hub_connections", "Live connections registered with the hub")
            .namespace("chat_hub"),
    )
    .expect("Failed to create HUB_CONNECTIONS metric")
});

/// Rooms with at least one subscriber
pub static HUB_ROOMS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("hub_rooms", "Chat rooms with at least one subscriber").namespace("chat_hub"),
    )
    .expect("Failed to create HUB_ROOMS metric")
});

pub static HUB_BROADCASTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new("hub_broadcasts_total", "Broadcast envelopes processed").namespace("chat_hub"),
    )
    .expect("Failed to create HUB_BROADCASTS_TOTAL metric")
});

pub static HUB_DELIVERIES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new(
            "hub_deliveries_total",
            "Payloads queued onto connection outbound queues",
        )
        .namespace("chat_hub"),
    )
    .expect("Failed to create HUB_DELIVERIES_TOTAL metric")
});

pub static HUB_EVICTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("hub_evictions_total", "Connections removed by the hub").namespace("chat_hub"),
        &["reason"], // "replaced", "slow_consumer", "writer_gone"
    )
    .expect("Failed to create HUB_EVICTIONS_TOTAL metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("Failed to register HTTP_REQUESTS_TOTAL");
    registry
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");
    registry
        .register(Box::new(HUB_CONNECTIONS.clone()))
        .expect("Failed to register HUB_CONNECTIONS");
    registry
        .register(Box::new(HUB_ROOMS.clone()))
        .expect("Failed to register HUB_ROOMS");
    registry
        .register(Box::new(HUB_BROADCASTS_TOTAL.clone()))
        .expect("Failed to register HUB_BROADCASTS_TOTAL");
    registry
        .register(Box::new(HUB_DELIVERIES_TOTAL.clone()))
        .expect("Failed to register HUB_DELIVERIES_TOTAL");
    registry
        .register(Box::new(HUB_EVICTIONS_TOTAL.clone()))
        .expect("Failed to register HUB_EVICTIONS_TOTAL");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to record HTTP request metrics
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status = status.to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, status.as_str()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

/// Called by the hub loop after every step
pub fn set_hub_gauges(connections: usize, rooms: usize) {
    HUB_CONNECTIONS.set(connections as i64);
    HUB_ROOMS.set(rooms as i64);
}

pub fn record_broadcast(delivered: usize) {
    HUB_BROADCASTS_TOTAL.inc();
    HUB_DELIVERIES_TOTAL.inc_by(delivered as u64);
}

pub fn record_eviction(reason: &str) {
    HUB_EVICTIONS_TOTAL.with_label_values(&[reason]).inc();
}
