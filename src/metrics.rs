// ABOUTME: Prometheus metrics initialization and counter helpers.
// ABOUTME: The handle returned by init_metrics renders the /metrics text format.

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder. Call once at server start; the
/// returned handle renders the exposition text.
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    Ok(handle)
}

/// Count a webhook request by outcome ("success", "unauthorized",
/// "bad_request", "not_ready", "error", "not_found").
pub fn record_webhook_request(outcome: &'static str) {
    metrics::counter!("hookbridge_webhook_requests_total", "outcome" => outcome).increment(1);
}

/// Count a bridged command by operation and outcome.
pub fn record_command(op: &'static str, outcome: &'static str) {
    metrics::counter!("hookbridge_commands_total", "op" => op, "outcome" => outcome).increment(1);
}

pub fn record_error(kind: &'static str) {
    metrics::counter!("hookbridge_errors_total", "kind" => kind).increment(1);
}

pub fn record_member_join() {
    metrics::counter!("hookbridge_member_joins_total").increment(1);
}

pub fn record_invite_created() {
    metrics::counter!("hookbridge_invites_created_total").increment(1);
}
