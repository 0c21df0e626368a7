//! Prometheus metrics for mockdock.
//!
//! Tracks dispatch outcomes, injected delays, rule mutations and snapshot
//! exports.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use tracing::warn;

lazy_static! {
    /// Mock-surface requests by outcome
    pub static ref DISPATCH_TOTAL: CounterVec = register_counter_vec!(
        "mockdock_dispatch_total",
        "Total number of requests dispatched on the mock surface",
        &["method", "outcome"]  // outcome: hit|<miss code>|admin_blocked
    )
    .expect("dispatch counter registers once");

    /// Configured rule delay actually waited
    pub static ref DELAY_INJECTED_MS: HistogramVec = register_histogram_vec!(
        "mockdock_delay_injected_ms",
        "Histogram of rule delays in milliseconds",
        &["method"],
        vec![10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]
    )
    .expect("delay histogram registers once");

    /// Rule store mutations
    pub static ref RULE_MUTATIONS_TOTAL: CounterVec = register_counter_vec!(
        "mockdock_rule_mutations_total",
        "Total number of rule mutations through the admin API",
        &["operation", "result"]  // operation: create|update|delete
    )
    .expect("mutation counter registers once");

    /// Snapshot file writes
    pub static ref SNAPSHOT_EXPORTS_TOTAL: CounterVec = register_counter_vec!(
        "mockdock_snapshot_exports_total",
        "Total number of rule snapshot exports",
        &["result"]  // result: ok|error
    )
    .expect("export counter registers once");
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Clients pick the method, so anything outside the standard set shares
/// one label
fn method_label(method: &str) -> &str {
    match method {
        "GET" | "HEAD" | "POST" | "PUT" | "DELETE" | "CONNECT" | "OPTIONS" | "TRACE"
        | "PATCH" => method,
        _ => "OTHER",
    }
}

pub fn record_dispatch(method: &str, outcome: &str) {
    DISPATCH_TOTAL
        .with_label_values(&[method_label(method), outcome])
        .inc();
}

pub fn record_delay(method: &str, delay_ms: u64) {
    DELAY_INJECTED_MS
        .with_label_values(&[method_label(method)])
        .observe(delay_ms as f64);
}

pub fn record_mutation(operation: &str, success: bool) {
    let result = if success { "success" } else { "error" };
    RULE_MUTATIONS_TOTAL
        .with_label_values(&[operation, result])
        .inc();
}

pub fn record_export(result: &str) {
    SNAPSHOT_EXPORTS_TOTAL.with_label_values(&[result]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collection() {
        record_dispatch("GET", "hit");
        record_dispatch("GET", "PATH_NOT_CONFIGURED");
        record_delay("GET", 120);
        record_mutation("create", true);
        record_export("ok");

        let output = collect_metrics();
        assert!(output.contains("mockdock_dispatch_total"));
        assert!(output.contains("PATH_NOT_CONFIGURED"));
        assert!(output.contains("mockdock_delay_injected_ms"));
        assert!(output.contains("mockdock_rule_mutations_total"));
        assert!(output.contains("mockdock_snapshot_exports_total"));
    }

    #[test]
    fn test_custom_methods_share_label() {
        assert_eq!(method_label("GET"), "GET");
        assert_eq!(method_label("PATCH"), "PATCH");
        assert_eq!(method_label("PURGE"), "OTHER");
        assert_eq!(method_label("XYZZY1"), "OTHER");

        record_dispatch("XYZZY1", "PATH_NOT_CONFIGURED");
        let output = collect_metrics();
        assert!(!output.contains("XYZZY1"));
        assert!(output.contains(r#"method="OTHER""#));
    }

    #[test]
    fn test_record_mutation_results() {
        let before = RULE_MUTATIONS_TOTAL
            .with_label_values(&["delete", "error"])
            .get();
        record_mutation("delete", false);
        let after = RULE_MUTATIONS_TOTAL
            .with_label_values(&["delete", "error"])
            .get();
        assert_eq!(after - before, 1.0);
    }
}
