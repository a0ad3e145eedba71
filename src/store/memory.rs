//! In-memory record store used as a test double.
//!
//! Mirrors the semantics the Postgres store gets from its schema (unique
//! identity emails, delete-with-count) and adds failure injection so suites
//! can exercise the degraded paths without a database.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use chrono::{NaiveDateTime, Utc};
use uuid::Uuid;

use crate::models::{
    AuditEntry, DriverProfile, Identity, Invitation, InvitationStatus, InviteWindow, NewAuditEntry,
    NewDriverProfile, NewIdentity, NewInvitation, NewInviteWindow, NewOrgMembership, OrgMembership,
};

use super::{DependentTable, RecordStore, StoreError};

#[derive(Default)]
struct Inner {
    identities: Vec<Identity>,
    memberships: Vec<OrgMembership>,
    invitations: Vec<Invitation>,
    drivers: Vec<DriverProfile>,
    windows: Vec<InviteWindow>,
    audit: Vec<AuditEntry>,
    dependents: BTreeMap<(DependentTable, Uuid), u64>,
    open_shifts: BTreeSet<Uuid>,
    failing_tables: BTreeSet<DependentTable>,
    fail_windows: bool,
    fail_audit: bool,
    fail_driver_delete: bool,
    fail_invitation_delete: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn now() -> NaiveDateTime {
        Utc::now().naive_utc()
    }

    // -- seeding and inspection helpers for tests --

    pub fn seed_dependents(&self, table: DependentTable, driver_profile_id: Uuid, rows: u64) {
        let mut inner = self.inner.lock().unwrap();
        *inner.dependents.entry((table, driver_profile_id)).or_insert(0) += rows;
    }

    pub fn seed_open_shift(&self, driver_profile_id: Uuid) {
        let mut inner = self.inner.lock().unwrap();
        inner.open_shifts.insert(driver_profile_id);
        *inner
            .dependents
            .entry((DependentTable::ShiftLogs, driver_profile_id))
            .or_insert(0) += 1;
    }

    pub fn fail_dependent_table(&self, table: DependentTable) {
        self.inner.lock().unwrap().failing_tables.insert(table);
    }

    pub fn fail_invite_windows(&self, fail: bool) {
        self.inner.lock().unwrap().fail_windows = fail;
    }

    pub fn fail_audit(&self, fail: bool) {
        self.inner.lock().unwrap().fail_audit = fail;
    }

    pub fn fail_driver_delete(&self, fail: bool) {
        self.inner.lock().unwrap().fail_driver_delete = fail;
    }

    pub fn fail_invitation_delete(&self, fail: bool) {
        self.inner.lock().unwrap().fail_invitation_delete = fail;
    }

    pub fn dependent_count(&self, table: DependentTable, driver_profile_id: Uuid) -> u64 {
        self.inner
            .lock()
            .unwrap()
            .dependents
            .get(&(table, driver_profile_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn audit_entries(&self, action: &str) -> Vec<AuditEntry> {
        self.inner
            .lock()
            .unwrap()
            .audit
            .iter()
            .filter(|e| e.action == action)
            .cloned()
            .collect()
    }

    pub fn invitations(&self) -> Vec<Invitation> {
        self.inner.lock().unwrap().invitations.clone()
    }

    pub fn identities(&self) -> Vec<Identity> {
        self.inner.lock().unwrap().identities.clone()
    }

    pub fn memberships(&self) -> Vec<OrgMembership> {
        self.inner.lock().unwrap().memberships.clone()
    }

    pub fn drivers(&self) -> Vec<DriverProfile> {
        self.inner.lock().unwrap().drivers.clone()
    }

    /// Ages the active invite window back in time, simulating window rollover.
    pub fn rewind_invite_windows(&self, by: chrono::Duration) {
        let mut inner = self.inner.lock().unwrap();
        for w in inner.windows.iter_mut() {
            w.window_start -= by;
        }
    }

    /// Ages a pending invitation past its expiry for lazy-expiry tests.
    pub fn expire_invitation(&self, id: Uuid) {
        let mut inner = self.inner.lock().unwrap();
        let now = Self::now();
        if let Some(inv) = inner.invitations.iter_mut().find(|i| i.id == id) {
            inv.expires_at = now - chrono::Duration::minutes(1);
        }
    }
}

impl RecordStore for MemoryStore {
    fn find_identity(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.identities.iter().find(|i| i.id == id).cloned())
    }

    fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.identities.iter().find(|i| i.email == email).cloned())
    }

    fn insert_identity(&self, new: NewIdentity) -> Result<Identity, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.identities.iter().any(|i| i.email == new.email) {
            return Err(StoreError::Constraint(format!(
                "identities_email_key: {}",
                new.email
            )));
        }
        let now = Self::now();
        let identity = Identity {
            id: Uuid::new_v4(),
            email: new.email,
            display_name: new.display_name,
            credential_hash: new.credential_hash,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        inner.identities.push(identity.clone());
        Ok(identity)
    }

    fn delete_identity(&self, id: Uuid) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.identities.len();
        inner.identities.retain(|i| i.id != id);
        Ok((before - inner.identities.len()) as u64)
    }

    fn list_memberships(&self, identity_id: Uuid) -> Result<Vec<OrgMembership>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .memberships
            .iter()
            .filter(|m| m.identity_id == identity_id)
            .cloned()
            .collect())
    }

    fn insert_membership(&self, new: NewOrgMembership) -> Result<OrgMembership, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let membership = OrgMembership {
            id: Uuid::new_v4(),
            identity_id: new.identity_id,
            organization_id: new.organization_id,
            role: new.role,
            created_at: Self::now(),
        };
        inner.memberships.push(membership.clone());
        Ok(membership)
    }

    fn delete_memberships(
        &self,
        identity_id: Uuid,
        organization_id: Option<Uuid>,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.memberships.len();
        inner.memberships.retain(|m| {
            if m.identity_id != identity_id {
                return true;
            }
            match organization_id {
                Some(org) => m.organization_id != org,
                None => false,
            }
        });
        Ok((before - inner.memberships.len()) as u64)
    }

    fn is_org_admin(&self, identity_id: Uuid, organization_id: Uuid) -> Result<bool, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.memberships.iter().any(|m| {
            m.identity_id == identity_id
                && m.organization_id == organization_id
                && m.role == "admin"
        }))
    }

    fn find_invitation(&self, id: Uuid) -> Result<Option<Invitation>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.invitations.iter().find(|i| i.id == id).cloned())
    }

    fn find_invitation_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Invitation>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .invitations
            .iter()
            .find(|i| i.token_hash == token_hash)
            .cloned())
    }

    fn find_pending_invitation(
        &self,
        organization_id: Uuid,
        email: &str,
    ) -> Result<Option<Invitation>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .invitations
            .iter()
            .find(|i| {
                i.organization_id == organization_id
                    && i.email == email
                    && i.status == InvitationStatus::Pending.as_str()
            })
            .cloned())
    }

    fn insert_invitation(&self, new: NewInvitation) -> Result<Invitation, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let invitation = Invitation {
            id: Uuid::new_v4(),
            organization_id: new.organization_id,
            email: new.email,
            first_name: new.first_name,
            last_name: new.last_name,
            phone: new.phone,
            hourly_rate: new.hourly_rate,
            per_drop_rate: new.per_drop_rate,
            token_hash: new.token_hash,
            status: new.status,
            created_at: Self::now(),
            expires_at: new.expires_at,
            accepted_at: None,
            driver_profile_id: None,
        };
        inner.invitations.push(invitation.clone());
        Ok(invitation)
    }

    fn update_invitation_status(
        &self,
        id: Uuid,
        status: InvitationStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(inv) = inner.invitations.iter_mut().find(|i| i.id == id) {
            inv.status = status.as_str().to_string();
        }
        Ok(())
    }

    fn mark_invitation_accepted(
        &self,
        id: Uuid,
        driver_profile_id: Uuid,
        accepted_at: NaiveDateTime,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(inv) = inner.invitations.iter_mut().find(|i| i.id == id) {
            inv.status = InvitationStatus::Accepted.as_str().to_string();
            inv.accepted_at = Some(accepted_at);
            inv.driver_profile_id = Some(driver_profile_id);
        }
        Ok(())
    }

    fn delete_invitation(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_invitation_delete {
            return Err(StoreError::Unavailable("simulated delete failure".into()));
        }
        inner.invitations.retain(|i| i.id != id);
        Ok(())
    }

    fn find_driver(&self, id: Uuid) -> Result<Option<DriverProfile>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.drivers.iter().find(|d| d.id == id).cloned())
    }

    fn insert_driver(&self, new: NewDriverProfile) -> Result<DriverProfile, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let now = Self::now();
        let driver = DriverProfile {
            id: Uuid::new_v4(),
            identity_id: new.identity_id,
            organization_id: new.organization_id,
            status: new.status,
            hourly_rate: new.hourly_rate,
            per_drop_rate: new.per_drop_rate,
            assigned_vehicle_id: None,
            documents_complete: false,
            training_complete: false,
            created_at: now,
            updated_at: now,
        };
        inner.drivers.push(driver.clone());
        Ok(driver)
    }

    fn delete_driver(&self, id: Uuid) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_driver_delete {
            return Err(StoreError::Query("simulated driver delete failure".into()));
        }
        let before = inner.drivers.len();
        inner.drivers.retain(|d| d.id != id);
        Ok((before - inner.drivers.len()) as u64)
    }

    fn has_open_shift(&self, driver_profile_id: Uuid) -> Result<bool, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.open_shifts.contains(&driver_profile_id))
    }

    fn delete_dependents(
        &self,
        table: DependentTable,
        driver_profile_id: Uuid,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.failing_tables.contains(&table) {
            return Err(StoreError::Query(format!(
                "simulated failure deleting from {}",
                table
            )));
        }
        if table == DependentTable::ShiftLogs {
            inner.open_shifts.remove(&driver_profile_id);
        }
        Ok(inner
            .dependents
            .remove(&(table, driver_profile_id))
            .unwrap_or(0))
    }

    fn find_invite_window(
        &self,
        actor_id: Uuid,
        organization_id: Uuid,
        since: NaiveDateTime,
    ) -> Result<Option<InviteWindow>, StoreError> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_windows {
            return Err(StoreError::Unavailable("simulated counter outage".into()));
        }
        Ok(inner
            .windows
            .iter()
            .filter(|w| {
                w.actor_id == actor_id
                    && w.organization_id == organization_id
                    && w.window_start > since
            })
            .max_by_key(|w| w.window_start)
            .cloned())
    }

    fn insert_invite_window(&self, new: NewInviteWindow) -> Result<InviteWindow, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_windows {
            return Err(StoreError::Unavailable("simulated counter outage".into()));
        }
        let window = InviteWindow {
            id: Uuid::new_v4(),
            actor_id: new.actor_id,
            organization_id: new.organization_id,
            invite_count: new.invite_count,
            window_start: new.window_start,
        };
        inner.windows.push(window.clone());
        Ok(window)
    }

    fn increment_invite_window(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_windows {
            return Err(StoreError::Unavailable("simulated counter outage".into()));
        }
        if let Some(w) = inner.windows.iter_mut().find(|w| w.id == id) {
            w.invite_count += 1;
        }
        Ok(())
    }

    fn append_audit(&self, entry: NewAuditEntry) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_audit {
            return Err(StoreError::Unavailable("simulated audit outage".into()));
        }
        let audit = AuditEntry {
            id: Uuid::new_v4(),
            subject_id: entry.subject_id,
            action: entry.action,
            actor_id: entry.actor_id,
            detail: entry.detail,
            ip_address: entry.ip_address,
            user_agent: entry.user_agent,
            created_at: Self::now(),
        };
        inner.audit.push(audit);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_email_unique() {
        let store = MemoryStore::new();
        store
            .insert_identity(NewIdentity {
                email: "a@b.test".into(),
                display_name: "A".into(),
                credential_hash: "h".into(),
            })
            .unwrap();
        let err = store
            .insert_identity(NewIdentity {
                email: "a@b.test".into(),
                display_name: "A2".into(),
                credential_hash: "h2".into(),
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[test]
    fn test_delete_dependents_returns_count_and_clears_shifts() {
        let store = MemoryStore::new();
        let driver = Uuid::new_v4();
        store.seed_open_shift(driver);
        store.seed_dependents(DependentTable::ShiftLogs, driver, 2);

        assert!(store.has_open_shift(driver).unwrap());
        let deleted = store
            .delete_dependents(DependentTable::ShiftLogs, driver)
            .unwrap();
        assert_eq!(deleted, 3);
        assert!(!store.has_open_shift(driver).unwrap());
        assert_eq!(
            store
                .delete_dependents(DependentTable::ShiftLogs, driver)
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_scoped_membership_delete() {
        let store = MemoryStore::new();
        let identity = Uuid::new_v4();
        let org_a = Uuid::new_v4();
        let org_b = Uuid::new_v4();
        for org in [org_a, org_b] {
            store
                .insert_membership(NewOrgMembership {
                    identity_id: identity,
                    organization_id: org,
                    role: "driver".into(),
                })
                .unwrap();
        }

        assert_eq!(store.delete_memberships(identity, Some(org_a)).unwrap(), 1);
        let remaining = store.list_memberships(identity).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].organization_id, org_b);
    }
}
