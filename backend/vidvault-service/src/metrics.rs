use std::time::Duration;

use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, TextEncoder};

static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "vidvault_http_requests_total",
            "Total HTTP requests handled by vidvault-service",
        ),
        &["method", "path", "status"],
    )
    .expect("failed to create vidvault_http_requests_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register vidvault_http_requests_total");
    counter
});

static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let histogram = HistogramVec::new(
        HistogramOpts::new(
            "vidvault_http_request_duration_seconds",
            "HTTP request latency for vidvault-service",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .expect("failed to create vidvault_http_request_duration_seconds");
    prometheus::default_registry()
        .register(Box::new(histogram.clone()))
        .expect("failed to register vidvault_http_request_duration_seconds");
    histogram
});

/// Upload URLs issued, by owner kind (user/team)
pub static UPLOADS_AUTHORIZED: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "vidvault_uploads_authorized_total",
            "Presigned upload URLs issued",
        ),
        &["owner"],
    )
    .expect("failed to create vidvault_uploads_authorized_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register vidvault_uploads_authorized_total");
    counter
});

/// Transcoding status transitions, by target status and trigger
pub static TRANSCODE_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "vidvault_transcode_transitions_total",
            "Video transcoding status transitions",
        ),
        &["status", "source"],
    )
    .expect("failed to create vidvault_transcode_transitions_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register vidvault_transcode_transitions_total");
    counter
});

/// Gateway requests, by kind (manifest/segment) and outcome
pub static STREAM_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "vidvault_stream_requests_total",
            "Streaming gateway requests",
        ),
        &["kind", "outcome"],
    )
    .expect("failed to create vidvault_stream_requests_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register vidvault_stream_requests_total");
    counter
});

/// Denied access decisions, by action (view/manage)
pub static ACCESS_DENIALS: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("vidvault_access_denials_total", "Denied access decisions"),
        &["action"],
    )
    .expect("failed to create vidvault_access_denials_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register vidvault_access_denials_total");
    counter
});

/// Storage credential faults (decrypt failures, storage auth rejections)
pub static CREDENTIAL_FAULTS: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "vidvault_credential_faults_total",
            "Storage credentials that could not be used",
        ),
        &["stage"],
    )
    .expect("failed to create vidvault_credential_faults_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register vidvault_credential_faults_total");
    counter
});

/// Latency of object storage and job API calls
pub static UPSTREAM_LATENCY_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let histogram = HistogramVec::new(
        HistogramOpts::new(
            "vidvault_upstream_latency_seconds",
            "Latency of object storage and transcode job API calls",
        )
        .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        &["upstream", "operation"],
    )
    .expect("failed to create vidvault_upstream_latency_seconds");
    prometheus::default_registry()
        .register(Box::new(histogram.clone()))
        .expect("failed to register vidvault_upstream_latency_seconds");
    histogram
});

pub fn observe_http_request(method: &str, path: &str, status: u16, elapsed: Duration) {
    let status_label = status.to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status_label])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path, &status_label])
        .observe(elapsed.as_secs_f64());
}

pub fn observe_upstream(upstream: &str, operation: &str, elapsed: Duration) {
    UPSTREAM_LATENCY_SECONDS
        .with_label_values(&[upstream, operation])
        .observe(elapsed.as_secs_f64());
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
