use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Expired,
    Cancelled,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Expired => "expired",
            InvitationStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(InvitationStatus::Pending),
            "accepted" => Some(InvitationStatus::Accepted),
            "expired" => Some(InvitationStatus::Expired),
            "cancelled" => Some(InvitationStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverStatus {
    Pending,
    Active,
    Suspended,
}

impl DriverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverStatus::Pending => "pending",
            DriverStatus::Active => "active",
            DriverStatus::Suspended => "suspended",
        }
    }
}

impl std::fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone)]
#[diesel(table_name = crate::schema::identities)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing)]
    pub credential_hash: String,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::identities)]
pub struct NewIdentity {
    pub email: String,
    pub display_name: String,
    pub credential_hash: String,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone)]
#[diesel(table_name = crate::schema::organization_members)]
pub struct OrgMembership {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub organization_id: Uuid,
    pub role: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::organization_members)]
pub struct NewOrgMembership {
    pub identity_id: Uuid,
    pub organization_id: Uuid,
    pub role: String,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::driver_profiles)]
pub struct DriverProfile {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub organization_id: Uuid,
    #[schema(example = "active")]
    pub status: String,
    pub hourly_rate: Option<f64>,
    pub per_drop_rate: Option<f64>,
    pub assigned_vehicle_id: Option<Uuid>,
    pub documents_complete: bool,
    pub training_complete: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::driver_profiles)]
pub struct NewDriverProfile {
    pub identity_id: Uuid,
    pub organization_id: Uuid,
    pub status: String,
    pub hourly_rate: Option<f64>,
    pub per_drop_rate: Option<f64>,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone)]
#[diesel(table_name = crate::schema::invitations)]
pub struct Invitation {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub hourly_rate: Option<f64>,
    pub per_drop_rate: Option<f64>,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub accepted_at: Option<NaiveDateTime>,
    pub driver_profile_id: Option<Uuid>,
}

impl Invitation {
    /// Lazy expiry: a pending invitation whose window has passed counts as
    /// expired even if the stored status has not been rewritten yet.
    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        self.expires_at <= now
    }

    pub fn status(&self) -> Option<InvitationStatus> {
        InvitationStatus::parse(&self.status)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::invitations)]
pub struct NewInvitation {
    pub organization_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub hourly_rate: Option<f64>,
    pub per_drop_rate: Option<f64>,
    pub token_hash: String,
    pub status: String,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::invite_windows)]
pub struct InviteWindow {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub organization_id: Uuid,
    pub invite_count: i32,
    pub window_start: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::invite_windows)]
pub struct NewInviteWindow {
    pub actor_id: Uuid,
    pub organization_id: Uuid,
    pub invite_count: i32,
    pub window_start: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone)]
#[diesel(table_name = crate::schema::audit_log)]
pub struct AuditEntry {
    pub id: Uuid,
    pub subject_id: Option<Uuid>,
    pub action: String,
    pub actor_id: Uuid,
    pub detail: serde_json::Value,
    pub ip_address: String,
    pub user_agent: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = crate::schema::audit_log)]
pub struct NewAuditEntry {
    pub subject_id: Option<Uuid>,
    pub action: String,
    pub actor_id: Uuid,
    pub detail: serde_json::Value,
    pub ip_address: String,
    pub user_agent: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_invitation_status_round_trip() {
        for status in [
            InvitationStatus::Pending,
            InvitationStatus::Accepted,
            InvitationStatus::Expired,
            InvitationStatus::Cancelled,
        ] {
            assert_eq!(InvitationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(InvitationStatus::parse("nonsense"), None);
    }

    #[test]
    fn test_lazy_expiry() {
        let now = Utc::now().naive_utc();
        let invitation = Invitation {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            email: "driver@example.com".to_string(),
            first_name: "Jo".to_string(),
            last_name: "Driver".to_string(),
            phone: None,
            hourly_rate: None,
            per_drop_rate: None,
            token_hash: "hash".to_string(),
            status: "pending".to_string(),
            created_at: now - chrono::Duration::days(8),
            expires_at: now - chrono::Duration::days(1),
            accepted_at: None,
            driver_profile_id: None,
        };

        assert!(invitation.is_expired(now));
        assert_eq!(invitation.status(), Some(InvitationStatus::Pending));
    }

    #[test]
    fn test_driver_status_display() {
        assert_eq!(DriverStatus::Pending.to_string(), "pending");
        assert_eq!(DriverStatus::Active.to_string(), "active");
        assert_eq!(DriverStatus::Suspended.to_string(), "suspended");
    }
}
