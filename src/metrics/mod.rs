//! Metrics module
//!
//! Provides Prometheus metrics for the upload path.

pub mod server;

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, register_int_gauge, Counter,
    CounterVec, Histogram, IntGauge,
};

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "photo_relay_uploads_total",
        "Total number of relayed uploads",
        &["status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "photo_relay_upload_bytes_total",
        "Total bytes relayed to object storage"
    ).unwrap();

    pub static ref UPLOAD_DURATION: Histogram = register_histogram!(
        "photo_relay_upload_duration_seconds",
        "Duration of the storage put in seconds",
        vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]
    ).unwrap();

    pub static ref OPEN_UPLOAD_STREAMS: IntGauge = register_int_gauge!(
        "photo_relay_open_upload_streams",
        "Upload streams currently held by request handlers"
    ).unwrap();

    // HTTP metrics
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "photo_relay_requests_total",
        "HTTP requests by route and status code",
        &["route", "status"]
    ).unwrap();

    // Error metrics
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "photo_relay_errors_total",
        "Total errors",
        &["type"]
    ).unwrap();
}

/// Record a successful upload
pub fn record_upload_success(bytes: u64) {
    UPLOADS_TOTAL.with_label_values(&["success"]).inc();
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a failed upload
pub fn record_upload_failure() {
    UPLOADS_TOTAL.with_label_values(&["failure"]).inc();
}

/// Record upload duration
pub fn record_upload_duration(duration_secs: f64) {
    UPLOAD_DURATION.observe(duration_secs);
}

/// Record a served request
pub fn record_request(route: &str, status: u16) {
    REQUESTS_TOTAL
        .with_label_values(&[route, &status.to_string()])
        .inc();
}

/// Record an error
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_upload_success() {
        let before = UPLOAD_BYTES_TOTAL.get();
        record_upload_success(1024);
        assert!(UPLOAD_BYTES_TOTAL.get() >= before + 1024.0);
    }

    #[test]
    fn test_record_request() {
        record_request("upload", 303);
        assert!(
            REQUESTS_TOTAL
                .with_label_values(&["upload", "303"])
                .get()
                >= 1.0
        );
    }

    #[test]
    fn test_record_error() {
        record_error("s3_upload");
        // Just verify it doesn't panic
    }
}
