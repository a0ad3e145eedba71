//! Record store collaborator.
//!
//! All relational access goes through the [`RecordStore`] trait so the
//! lifecycle services take an explicit handle instead of a module-level
//! client. [`postgres::PgStore`] is the diesel-backed production
//! implementation; [`memory::MemoryStore`] is an in-process double used by
//! the test suites.

pub mod memory;
pub mod postgres;

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::models::{
    DriverProfile, Identity, Invitation, InvitationStatus, InviteWindow, NewAuditEntry,
    NewDriverProfile, NewIdentity, NewInvitation, NewInviteWindow, NewOrgMembership, OrgMembership,
};

pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("constraint violated: {0}")]
    Constraint(String),
}

/// Dependent tables whose rows are bounded by a driver profile's lifecycle.
///
/// `DELETION_ORDER` lists children before the aggregates they feed into;
/// the profile row itself is deleted only after every entry here has been
/// attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DependentTable {
    VehicleChecks,
    Feedback,
    ShiftLogs,
    IncidentReports,
    ExpenseClaims,
    EarningsEntries,
    Achievements,
    Ratings,
    Invoices,
    Payments,
    Schedules,
    DayLogs,
}

impl DependentTable {
    pub const DELETION_ORDER: [DependentTable; 12] = [
        DependentTable::VehicleChecks,
        DependentTable::Feedback,
        DependentTable::ShiftLogs,
        DependentTable::IncidentReports,
        DependentTable::ExpenseClaims,
        DependentTable::EarningsEntries,
        DependentTable::Achievements,
        DependentTable::Ratings,
        DependentTable::Invoices,
        DependentTable::Payments,
        DependentTable::Schedules,
        DependentTable::DayLogs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DependentTable::VehicleChecks => "vehicle_checks",
            DependentTable::Feedback => "feedback",
            DependentTable::ShiftLogs => "shift_logs",
            DependentTable::IncidentReports => "incident_reports",
            DependentTable::ExpenseClaims => "expense_claims",
            DependentTable::EarningsEntries => "earnings_entries",
            DependentTable::Achievements => "achievements",
            DependentTable::Ratings => "ratings",
            DependentTable::Invoices => "invoices",
            DependentTable::Payments => "payments",
            DependentTable::Schedules => "schedules",
            DependentTable::DayLogs => "day_logs",
        }
    }
}

impl std::fmt::Display for DependentTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub trait RecordStore: Send + Sync {
    // Identities
    fn find_identity(&self, id: Uuid) -> Result<Option<Identity>, StoreError>;
    fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError>;
    fn insert_identity(&self, new: NewIdentity) -> Result<Identity, StoreError>;
    fn delete_identity(&self, id: Uuid) -> Result<u64, StoreError>;

    // Organization memberships
    fn list_memberships(&self, identity_id: Uuid) -> Result<Vec<OrgMembership>, StoreError>;
    fn insert_membership(&self, new: NewOrgMembership) -> Result<OrgMembership, StoreError>;
    /// Deletes memberships for an identity; scoped to one organization when
    /// `organization_id` is given, all of them otherwise.
    fn delete_memberships(
        &self,
        identity_id: Uuid,
        organization_id: Option<Uuid>,
    ) -> Result<u64, StoreError>;
    fn is_org_admin(&self, identity_id: Uuid, organization_id: Uuid) -> Result<bool, StoreError>;

    // Invitations
    fn find_invitation(&self, id: Uuid) -> Result<Option<Invitation>, StoreError>;
    fn find_invitation_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Invitation>, StoreError>;
    fn find_pending_invitation(
        &self,
        organization_id: Uuid,
        email: &str,
    ) -> Result<Option<Invitation>, StoreError>;
    fn insert_invitation(&self, new: NewInvitation) -> Result<Invitation, StoreError>;
    fn update_invitation_status(
        &self,
        id: Uuid,
        status: InvitationStatus,
    ) -> Result<(), StoreError>;
    fn mark_invitation_accepted(
        &self,
        id: Uuid,
        driver_profile_id: Uuid,
        accepted_at: NaiveDateTime,
    ) -> Result<(), StoreError>;
    fn delete_invitation(&self, id: Uuid) -> Result<(), StoreError>;

    // Driver profiles and dependents
    fn find_driver(&self, id: Uuid) -> Result<Option<DriverProfile>, StoreError>;
    fn insert_driver(&self, new: NewDriverProfile) -> Result<DriverProfile, StoreError>;
    fn delete_driver(&self, id: Uuid) -> Result<u64, StoreError>;
    fn has_open_shift(&self, driver_profile_id: Uuid) -> Result<bool, StoreError>;
    fn delete_dependents(
        &self,
        table: DependentTable,
        driver_profile_id: Uuid,
    ) -> Result<u64, StoreError>;

    // Invitation rate-limit windows
    fn find_invite_window(
        &self,
        actor_id: Uuid,
        organization_id: Uuid,
        since: NaiveDateTime,
    ) -> Result<Option<InviteWindow>, StoreError>;
    fn insert_invite_window(&self, new: NewInviteWindow) -> Result<InviteWindow, StoreError>;
    fn increment_invite_window(&self, id: Uuid) -> Result<(), StoreError>;

    // Audit trail (append-only; no update or delete is exposed)
    fn append_audit(&self, entry: NewAuditEntry) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deletion_order_covers_every_table() {
        let mut seen = DependentTable::DELETION_ORDER.to_vec();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), DependentTable::DELETION_ORDER.len());
    }

    #[test]
    fn test_children_precede_aggregates() {
        let order = DependentTable::DELETION_ORDER;
        let shift = order.iter().position(|t| *t == DependentTable::ShiftLogs);
        let day = order.iter().position(|t| *t == DependentTable::DayLogs);
        assert!(shift < day, "shift logs must be purged before day logs");
        assert_eq!(order.last(), Some(&DependentTable::DayLogs));
    }

    #[test]
    fn test_table_names() {
        assert_eq!(DependentTable::VehicleChecks.as_str(), "vehicle_checks");
        assert_eq!(DependentTable::DayLogs.to_string(), "day_logs");
    }
}
