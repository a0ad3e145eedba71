//! Append-only audit trail for lifecycle-sensitive actions.
//!
//! Entries are written before the HTTP response goes out. The store gets
//! one retry; after that the entry is logged at error level so security
//! events survive at least in the log stream. There is no update or delete
//! path on purpose.

use serde_json::Value;
use tracing::{debug, error};
use uuid::Uuid;

use crate::models::NewAuditEntry;
use crate::store::RecordStore;

/// Stable wire names for audited actions. These strings are the contract
/// downstream reporting relies on; never rename them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    UnauthorizedInviteAttempt,
    InviteRateLimited,
    InviteConflict,
    InviteCreated,
    InviteEmailFailed,
    InviteCancelled,
    InviteAccepted,
    DriverProvisioned,
    DriverDeprovisioned,
    DeprovisionFailed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::UnauthorizedInviteAttempt => "UNAUTHORIZED_INVITE_ATTEMPT",
            AuditAction::InviteRateLimited => "INVITE_RATE_LIMITED",
            AuditAction::InviteConflict => "INVITE_CONFLICT",
            AuditAction::InviteCreated => "INVITE_CREATED",
            AuditAction::InviteEmailFailed => "INVITE_EMAIL_FAILED",
            AuditAction::InviteCancelled => "INVITE_CANCELLED",
            AuditAction::InviteAccepted => "INVITE_ACCEPTED",
            AuditAction::DriverProvisioned => "DRIVER_PROVISIONED",
            AuditAction::DriverDeprovisioned => "DRIVER_DEPROVISIONED",
            AuditAction::DeprovisionFailed => "DEPROVISION_FAILED",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client context captured by the request-id middleware and threaded down
/// to every audit write.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub ip_address: String,
    pub user_agent: String,
}

impl RequestMeta {
    pub fn unknown() -> Self {
        Self {
            ip_address: "unknown".to_string(),
            user_agent: "unknown".to_string(),
        }
    }
}

#[derive(Clone, Default)]
pub struct AuditLog;

impl AuditLog {
    pub fn new() -> Self {
        Self
    }

    pub fn record(
        &self,
        store: &dyn RecordStore,
        subject_id: Option<Uuid>,
        action: AuditAction,
        actor_id: Uuid,
        detail: Value,
        meta: &RequestMeta,
    ) {
        let entry = NewAuditEntry {
            subject_id,
            action: action.as_str().to_string(),
            actor_id,
            detail,
            ip_address: meta.ip_address.clone(),
            user_agent: meta.user_agent.clone(),
        };

        match store.append_audit(entry.clone()) {
            Ok(()) => {
                debug!(action = %action, actor_id = %actor_id, "Audit entry recorded");
            }
            Err(first) => match store.append_audit(entry) {
                Ok(()) => {
                    debug!(action = %action, "Audit entry recorded on retry");
                }
                Err(second) => {
                    error!(
                        action = %action,
                        actor_id = %actor_id,
                        subject_id = ?subject_id,
                        first_error = %first,
                        retry_error = %second,
                        "Audit entry lost after retry"
                    );
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use serde_json::json;

    #[test]
    fn test_action_wire_names_are_stable() {
        assert_eq!(
            AuditAction::UnauthorizedInviteAttempt.as_str(),
            "UNAUTHORIZED_INVITE_ATTEMPT"
        );
        assert_eq!(AuditAction::InviteRateLimited.as_str(), "INVITE_RATE_LIMITED");
        assert_eq!(AuditAction::InviteConflict.as_str(), "INVITE_CONFLICT");
        assert_eq!(AuditAction::InviteCreated.as_str(), "INVITE_CREATED");
        assert_eq!(AuditAction::InviteEmailFailed.as_str(), "INVITE_EMAIL_FAILED");
        assert_eq!(AuditAction::InviteCancelled.as_str(), "INVITE_CANCELLED");
        assert_eq!(AuditAction::InviteAccepted.as_str(), "INVITE_ACCEPTED");
        assert_eq!(AuditAction::DriverProvisioned.as_str(), "DRIVER_PROVISIONED");
        assert_eq!(
            AuditAction::DriverDeprovisioned.as_str(),
            "DRIVER_DEPROVISIONED"
        );
        assert_eq!(AuditAction::DeprovisionFailed.as_str(), "DEPROVISION_FAILED");
    }

    #[test]
    fn test_record_captures_request_meta() {
        let store = MemoryStore::new();
        let actor = Uuid::new_v4();
        let meta = RequestMeta {
            ip_address: "203.0.113.9".to_string(),
            user_agent: "curl/8.0".to_string(),
        };

        AuditLog::new().record(
            &store,
            None,
            AuditAction::InviteCreated,
            actor,
            json!({"email": "jo@example.com"}),
            &meta,
        );

        let entries = store.audit_entries("INVITE_CREATED");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].ip_address, "203.0.113.9");
        assert_eq!(entries[0].user_agent, "curl/8.0");
        assert_eq!(entries[0].actor_id, actor);
    }

    #[test]
    fn test_failure_swallowed_after_retry() {
        let store = MemoryStore::new();
        store.fail_audit(true);

        // Must not panic or propagate; callers never fail on audit loss.
        AuditLog::new().record(
            &store,
            None,
            AuditAction::InviteRateLimited,
            Uuid::new_v4(),
            json!({}),
            &RequestMeta::unknown(),
        );
        assert!(store.audit_entries("INVITE_RATE_LIMITED").is_empty());
    }
}
