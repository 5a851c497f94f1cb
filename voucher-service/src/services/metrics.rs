//! Prometheus metrics for voucher-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, CounterVec, HistogramVec,
    IntCounter, TextEncoder,
};

/// HTTP request counter by method and status.
pub static HTTP_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "voucher_http_requests_total",
        "Total number of HTTP requests",
        &["method", "status"]
    )
    .expect("Failed to register http_requests_total")
});

/// HTTP request duration histogram by method.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "voucher_http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register http_request_duration")
});

/// Vouchers issued.
pub static VOUCHERS_ISSUED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("voucher_issued_total", "Total number of vouchers issued")
        .expect("Failed to register issued_total")
});

/// Redemption attempts by outcome.
pub static REDEMPTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "voucher_redemptions_total",
        "Total number of redemption attempts",
        &["outcome"] // redeemed, already_redeemed, not_found, error
    )
    .expect("Failed to register redemptions_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "voucher_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "voucher_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&HTTP_REQUESTS_TOTAL);
    Lazy::force(&HTTP_REQUEST_DURATION);
    Lazy::force(&VOUCHERS_ISSUED_TOTAL);
    Lazy::force(&REDEMPTIONS_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

pub fn record_redemption(outcome: &str) {
    REDEMPTIONS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
