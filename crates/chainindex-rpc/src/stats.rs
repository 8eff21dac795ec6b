//! In-process call statistics, recorded through the `metrics` facade (§1.4:
//! ambient observability backing the per-endpoint call counters, not the
//! out-of-scope RPC-statistics dashboard tables).

use std::time::Duration;

const METRIC_CALLS_TOTAL: &str = "chainindex_rpc_calls_total";
const METRIC_CALL_LATENCY: &str = "chainindex_rpc_call_latency_ms";
const METRIC_CALL_ERRORS: &str = "chainindex_rpc_call_errors_total";

pub fn record_call(upstream: &'static str, method: &'static str, latency: Duration) {
    metrics::counter!(METRIC_CALLS_TOTAL, "upstream" => upstream, "method" => method).increment(1);
    metrics::histogram!(METRIC_CALL_LATENCY, "upstream" => upstream, "method" => method)
        .record(latency.as_secs_f64() * 1_000.0);
}

pub fn record_error(upstream: &'static str, method: &'static str, kind: &'static str) {
    metrics::counter!(METRIC_CALL_ERRORS, "upstream" => upstream, "method" => method, "kind" => kind)
        .increment(1);
}
