//! Prometheus metrics via the `metrics` facade.
//!
//! The recorder is process-global, so [`init`] installs it at most once and
//! every later call (including from tests building many routers) reuses it.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::warn;

static HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

/// Install the Prometheus recorder if it is not installed yet.
pub fn init() -> Option<PrometheusHandle> {
    HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Prometheus recorder not installed: {}", e);
                None
            }
        })
        .clone()
}

/// Render the current metrics snapshot in Prometheus text format.
pub fn render() -> String {
    init().map(|h| h.render()).unwrap_or_default()
}

/// Count a finished proxy request. `kind` is `manifest`, `passthrough` or `error`.
pub fn record_request(kind: &'static str, status: u16) {
    metrics::counter!(
        "hls_relay_requests_total",
        "kind" => kind,
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_duration(kind: &'static str, start: Instant) {
    metrics::histogram!("hls_relay_request_duration_seconds", "kind" => kind)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_error() {
    metrics::counter!("hls_relay_upstream_errors_total").increment(1);
}

pub fn record_rewritten_references(count: usize) {
    metrics::counter!("hls_relay_rewritten_references_total").increment(count as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let first = init().is_some();
        let second = init().is_some();
        assert_eq!(first, second);
    }

    #[test]
    fn recorded_counter_shows_up_in_render() {
        if init().is_none() {
            return;
        }
        record_request("manifest", 200);
        record_upstream_error();
        let text = render();
        assert!(text.contains("hls_relay_requests_total"));
        assert!(text.contains("hls_relay_upstream_errors_total"));
    }
}
