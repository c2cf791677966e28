//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define rpc metrics (call counts, latency)
//! - Expose Prometheus-compatible metrics endpoint
//! - Provide an rpc middleware that records every call
//!
//! # Metrics
//! - `rpc_calls_total` (counter): calls by method and outcome (`ok`/`error`)
//! - `rpc_call_duration_seconds` (histogram): latency per method
//! - `rpc_call_errors_total` (counter): failed calls by method and error code
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Labels are bounded: method names come from the registry, never the client

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::rpc::middleware::{from_fn, Middleware};
use crate::rpc::CallResult;

/// Install the Prometheus exporter, serving scrapes on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record the outcome of one call.
pub fn record_call(method: &str, result: &CallResult, start: Instant) {
    let outcome = if result.is_ok() { "ok" } else { "error" };
    metrics::counter!("rpc_calls_total", "method" => method.to_string(), "outcome" => outcome)
        .increment(1);
    metrics::histogram!("rpc_call_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());

    if let Err(err) = result {
        metrics::counter!(
            "rpc_call_errors_total",
            "method" => method.to_string(),
            "code" => err.code.to_string()
        )
        .increment(1);
    }
}

/// Middleware recording call count and latency for every invocation.
pub fn metrics_middleware() -> Middleware {
    from_fn(|handler, params, next| async move {
        let method = handler
            .request_context()
            .map(|ctx| ctx.method().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let start = Instant::now();
        let result = next(handler, params).await;
        record_call(&method, &result, start);
        result
    })
}
