//! Observability: tracing, metrics, and OpenTelemetry integration.

pub mod metrics;
pub mod tracing;

pub use metrics::{record_deprovision, record_invite_attempt, InviteOutcome, MetricsState};
pub use tracing::init_telemetry;
