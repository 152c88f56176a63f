//! Prometheus metrics exposition
//!
//! - `auth_requests_total` (counter): label `result` (`granted` | `challenged`)
//! - `token_exchanges_total` (counter): label `outcome` (`success` or an error kind)
//! - `token_exchange_duration_seconds` (histogram): label `outcome`

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const EXCHANGE_DURATION: &str = "token_exchange_duration_seconds";

/// Provider round-trips are usually sub-second; the top buckets cover the
/// transport timeout range.
const EXCHANGE_BUCKETS: &[f64] = &[0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(EXCHANGE_DURATION.to_string()), EXCHANGE_BUCKETS)
}

/// Install the global Prometheus recorder and return the render handle.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Handle backed by a recorder that is not installed globally.
#[cfg(test)]
pub fn local_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

/// Record the authenticator's decision for one protected request.
pub fn record_auth(granted: bool) {
    let result = if granted { "granted" } else { "challenged" };
    metrics::counter!("auth_requests_total", "result" => result).increment(1);
}

/// Record a finished callback, successful or not.
pub fn record_exchange(outcome: &'static str, duration_secs: f64) {
    metrics::counter!("token_exchanges_total", "outcome" => outcome).increment(1);
    metrics::histogram!(EXCHANGE_DURATION, "outcome" => outcome).record(duration_secs);
}
