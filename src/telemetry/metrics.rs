//! Application metrics using the metrics crate.

use axum::{http::StatusCode, response::IntoResponse};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

#[derive(Clone)]
pub struct MetricsState {
    handle: Option<PrometheusHandle>,
}

impl MetricsState {
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            return Self { handle: None };
        }

        let handle = PROMETHEUS_HANDLE.get_or_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .expect("Failed to install Prometheus recorder")
        });

        Self {
            handle: Some(handle.clone()),
        }
    }

    pub fn disabled() -> Self {
        Self { handle: None }
    }

    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(|h| h.render())
    }

    pub fn is_enabled(&self) -> bool {
        self.handle.is_some()
    }
}

pub async fn metrics_handler(
    axum::extract::State(state): axum::extract::State<MetricsState>,
) -> impl IntoResponse {
    match state.render() {
        Some(metrics) => (StatusCode::OK, metrics),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Metrics not enabled".to_string(),
        ),
    }
}

#[derive(Debug, Clone, Copy)]
pub enum InviteOutcome {
    Issued,
    Accepted,
    Cancelled,
    Forbidden,
    RateLimited,
    ValidationFailed,
    Conflict,
    EmailFailed,
}

impl InviteOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            InviteOutcome::Issued => "issued",
            InviteOutcome::Accepted => "accepted",
            InviteOutcome::Cancelled => "cancelled",
            InviteOutcome::Forbidden => "forbidden",
            InviteOutcome::RateLimited => "rate_limited",
            InviteOutcome::ValidationFailed => "validation_failed",
            InviteOutcome::Conflict => "conflict",
            InviteOutcome::EmailFailed => "email_failed",
        }
    }
}

pub fn record_invite_attempt(operation: &str, outcome: InviteOutcome) {
    counter!(
        "invite_attempts_total",
        "operation" => operation.to_string(),
        "outcome" => outcome.as_str().to_string()
    )
    .increment(1);
}

pub fn record_deprovision(identity_deleted: bool, rows_deleted: u64) {
    counter!(
        "deprovisions_total",
        "identity_deleted" => identity_deleted.to_string()
    )
    .increment(1);

    histogram!("deprovision_rows_deleted").record(rows_deleted as f64);
}

pub fn record_request_latency(
    method: &str,
    path: &str,
    status: u16,
    duration: std::time::Duration,
) {
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invite_outcome_as_str() {
        assert_eq!(InviteOutcome::Issued.as_str(), "issued");
        assert_eq!(InviteOutcome::RateLimited.as_str(), "rate_limited");
        assert_eq!(InviteOutcome::EmailFailed.as_str(), "email_failed");
    }

    #[test]
    fn test_metrics_state_disabled() {
        let state = MetricsState::disabled();
        assert!(!state.is_enabled());
        assert!(state.render().is_none());
    }
}
