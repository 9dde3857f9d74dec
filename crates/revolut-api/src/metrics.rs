//! Request metrics
//!
//! - `revolut_api_requests_total` (counter): labels `method`, `status`
//! - `revolut_api_request_duration_seconds` (histogram): label `method`
//! - `revolut_api_errors_total` (counter): label `kind`
//!
//! Without an installed recorder every call is a no-op.

use crate::error::ErrorKind;

/// Bucket boundaries for the duration histogram, 5ms up to 60s.
pub const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Record a request that received an HTTP response.
pub fn record_request(method: &str, status: u16, duration_secs: f64) {
    metrics::counter!("revolut_api_requests_total", "method" => method.to_string(), "status" => status.to_string())
        .increment(1);
    metrics::histogram!("revolut_api_request_duration_seconds", "method" => method.to_string())
        .record(duration_secs);
}

/// Record a failed request. Transport failures use `timeout` / `transport`.
pub fn record_error(kind: &str) {
    metrics::counter!("revolut_api_errors_total", "kind" => kind.to_string()).increment(1);
}

pub(crate) fn record_classified(kind: ErrorKind) {
    record_error(kind.as_str());
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full("revolut_api_request_duration_seconds".to_string()),
                DURATION_BUCKETS,
            )
            .unwrap()
            .build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn calls_without_recorder_are_noops() {
        // Library users who never install a recorder must not pay for or
        // crash on instrumentation.
        record_request("GET", 200, 0.05);
        record_error("timeout");
    }

    #[test]
    fn request_counter_carries_labels() {
        // Operators alert on request rate and latency per method and status.
        // If either label went missing the dashboards would collapse every
        // request into one series.
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_request("GET", 200, 0.042);
        record_request("DELETE", 204, 0.1);

        let output = handle.render();
        assert!(output.contains("revolut_api_requests_total"));
        assert!(output.contains("method=\"GET\""));
        assert!(output.contains("status=\"204\""));
        assert!(output.contains("revolut_api_request_duration_seconds_bucket"));
    }

    #[test]
    fn error_counter_uses_kind_label() {
        // The kind label is what separates "customer out of funds" from
        // "Revolut is down" on the error dashboard; classified kinds and
        // transport failures must land in the same counter.
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_classified(ErrorKind::InsufficientBalance);
        record_error("timeout");

        let output = handle.render();
        assert!(output.contains("kind=\"insufficient_balance\""));
        assert!(output.contains("kind=\"timeout\""));
    }
}
