//! Prometheus metrics for the gate
//!
//! Exposed at the `/metrics` endpoint in Prometheus format.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use std::time::Instant;

use crate::server::AppState;

/// Metric names
pub mod names {
    /// Request outcomes: bypass, forwarded, denied
    pub const REQUESTS_TOTAL: &str = "bawwab_requests_total";
    /// Session cache outcomes: hit, miss, mismatch
    pub const SESSION_TOTAL: &str = "bawwab_session_total";
    /// Wall time of one directory authentication round
    pub const DIRECTORY_AUTH_SECONDS: &str = "bawwab_directory_auth_seconds";

    pub const UPTIME_SECONDS: &str = "bawwab_uptime_seconds";
    pub const INFO: &str = "bawwab_info";
}

// The recorder is process-global and installing it twice panics, so
// every MetricsRecorder shares one handle.
static PROMETHEUS: Lazy<PrometheusHandle> = Lazy::new(|| {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
});

/// Metrics recorder
#[derive(Clone)]
pub struct MetricsRecorder {
    handle: PrometheusHandle,
    start_time: Instant,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        let handle = PROMETHEUS.clone();
        gauge!(names::INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);

        Self {
            handle,
            start_time: Instant::now(),
        }
    }

    /// Get metrics output in Prometheus format
    pub fn render(&self) -> String {
        gauge!(names::UPTIME_SECONDS).set(self.start_time.elapsed().as_secs_f64());
        self.handle.render()
    }

    pub fn record_request(&self, outcome: &'static str) {
        counter!(names::REQUESTS_TOTAL, "outcome" => outcome).increment(1);
    }

    pub fn record_session(&self, outcome: &'static str) {
        counter!(names::SESSION_TOTAL, "outcome" => outcome).increment(1);
    }

    pub fn record_directory_auth(&self, duration_secs: f64) {
        histogram!(names::DIRECTORY_AUTH_SECONDS).record(duration_secs);
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let output = state.metrics.render();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        output,
    )
}
