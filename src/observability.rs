//! Prometheus metrics: HTTP request count and latency, event publishes, and
//! the `/metrics` scrape endpoint.

use std::time::Instant;

use anyhow::Context;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{Request, Response},
    middleware::Next,
};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

const DURATION_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.0, 5.0];

/// Install the global Prometheus recorder. Later calls return the same handle.
pub fn init_metrics() -> anyhow::Result<&'static PrometheusHandle> {
    METRICS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full("http_request_duration_seconds".to_string()),
                DURATION_BUCKETS,
            )
            .context("configure histogram buckets")?
            .install_recorder()
            .context("install Prometheus recorder")?;

        describe_counter!("http_requests_total", "Total number of HTTP requests");
        describe_histogram!(
            "http_request_duration_seconds",
            "Duration of HTTP requests in seconds"
        );
        describe_counter!(
            "event_messages_total",
            "User events handed to the event sink, by topic and outcome"
        );

        info!("Prometheus metrics recorder initialized");
        Ok(handle)
    })
}

pub async fn metrics_handler() -> String {
    match METRICS_HANDLE.get() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

/// Records `http_requests_total` and `http_request_duration_seconds` per
/// method and matched route.
pub async fn metrics_middleware(
    matched_path: Option<MatchedPath>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = matched_path
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;

    let status_code = response.status().as_u16().to_string();
    counter!(
        "http_requests_total",
        "method" => method.clone(),
        "route" => route.clone(),
        "status_code" => status_code
    )
    .increment(1);
    histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "route" => route
    )
    .record(start.elapsed().as_secs_f64());

    response
}

pub fn record_event_message(topic: &str, ok: bool) {
    counter!(
        "event_messages_total",
        "topic" => topic.to_string(),
        "status" => if ok { "success" } else { "error" }
    )
    .increment(1);
}
