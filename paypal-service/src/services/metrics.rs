//! Prometheus metrics for the checkout flow.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder once per process. Later calls are no-ops.
pub fn init_metrics() {
    METRICS_HANDLE.get_or_init(|| {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        if metrics::set_global_recorder(recorder).is_err() {
            tracing::warn!("A metrics recorder was already installed; /metrics may be empty");
        }
        handle
    });
}

pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Count a checkout step by operation (`checkout`, `complete`, `cancel`,
/// `refund`) and outcome.
pub fn record_transaction(operation: &'static str, status: &'static str) {
    metrics::counter!(
        "paypal_transactions_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}

pub fn record_outcome<T, E>(operation: &'static str, result: &Result<T, E>) {
    let status = if result.is_ok() { "success" } else { "failure" };
    record_transaction(operation, status);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transactions_are_rendered_with_labels() {
        init_metrics();
        init_metrics();

        record_outcome::<(), ()>("refund", &Ok(()));
        record_outcome::<(), ()>("refund", &Err(()));

        let rendered = get_metrics();
        assert!(rendered.contains("paypal_transactions_total"));
        assert!(rendered.contains(r#"operation="refund""#));
        assert!(rendered.contains(r#"status="failure""#));
    }
}
