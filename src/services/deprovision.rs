//! Cascading driver deprovisioning.
//!
//! Dependent tables are purged best-effort in referential order; a failure
//! on one table is collected and skipped, never aborting the cascade. The
//! driver-profile delete itself is fatal on failure. Whether the login
//! identity survives depends on what else it is attached to: membership in
//! any other organization, or an admin role anywhere, preserves the
//! identity, its memberships and its credential untouched.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditLog, RequestMeta};
use crate::auth::{AuthActor, IdentityDirectory};
use crate::error::CoreError;
use crate::services::invitation::ADMIN_ROLE;
use crate::store::{DependentTable, RecordStore};

/// The external contract of a completed deprovision call. Every table in
/// the cascade appears in `deleted` with an explicit count, zero included;
/// callers must never have to treat an absent key as zero.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeletionSummary {
    pub deleted: BTreeMap<String, u64>,
    pub auth_user_deleted: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
    pub message: String,
}

impl DeletionSummary {
    fn with_zeroed_tables() -> Self {
        let mut deleted = BTreeMap::new();
        for table in DependentTable::DELETION_ORDER {
            deleted.insert(table.as_str().to_string(), 0);
        }
        deleted.insert("driver_profiles".to_string(), 0);
        deleted.insert("organization_members".to_string(), 0);
        deleted.insert("identities".to_string(), 0);
        Self {
            deleted,
            auth_user_deleted: false,
            failures: Vec::new(),
            message: String::new(),
        }
    }

    pub fn total_rows(&self) -> u64 {
        self.deleted.values().sum()
    }
}

#[derive(Clone)]
pub struct DeprovisionService {
    store: Arc<dyn RecordStore>,
    directory: Arc<dyn IdentityDirectory>,
    audit: AuditLog,
}

impl DeprovisionService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        directory: Arc<dyn IdentityDirectory>,
        audit: AuditLog,
    ) -> Self {
        Self {
            store,
            directory,
            audit,
        }
    }

    pub async fn deprovision(
        &self,
        actor: &AuthActor,
        driver_profile_id: Uuid,
        expected_organization_id: Option<Uuid>,
        meta: &RequestMeta,
    ) -> Result<DeletionSummary, CoreError> {
        let driver = self
            .store
            .find_driver(driver_profile_id)?
            .ok_or_else(|| CoreError::NotFound("Driver profile not found".to_string()))?;

        // Cross-tenant guard: a mismatched expected organization means the
        // caller is aiming at somebody else's driver.
        if let Some(expected) = expected_organization_id {
            if expected != driver.organization_id {
                return Err(CoreError::Forbidden(
                    "Driver profile does not belong to the expected organization".to_string(),
                ));
            }
        }

        if !self.store.is_org_admin(actor.id, driver.organization_id)? {
            return Err(CoreError::Forbidden(
                "You must be an organization admin to deprovision drivers".to_string(),
            ));
        }

        if self.store.has_open_shift(driver.id)? {
            return Err(CoreError::Conflict(
                "Driver has a shift in progress; close it before deprovisioning".to_string(),
            ));
        }

        let mut summary = DeletionSummary::with_zeroed_tables();

        for table in DependentTable::DELETION_ORDER {
            match self.store.delete_dependents(table, driver.id) {
                Ok(count) => {
                    summary.deleted.insert(table.as_str().to_string(), count);
                }
                Err(err) => {
                    warn!(
                        driver_id = %driver.id,
                        table = %table,
                        error = %err,
                        "Dependent cleanup failed, continuing cascade"
                    );
                    summary
                        .failures
                        .push(format!("{table}: cleanup failed, rows left behind"));
                }
            }
        }

        // The profile row is the one delete that must not fail.
        match self.store.delete_driver(driver.id) {
            Ok(count) => {
                summary
                    .deleted
                    .insert("driver_profiles".to_string(), count);
            }
            Err(err) => {
                warn!(
                    driver_id = %driver.id,
                    error = %err,
                    rows_deleted = summary.total_rows(),
                    "Driver profile delete failed, aborting"
                );
                self.audit.record(
                    self.store.as_ref(),
                    Some(driver.id),
                    AuditAction::DeprovisionFailed,
                    actor.id,
                    json!({
                        "organization_id": driver.organization_id,
                        "deleted_so_far": summary.deleted,
                        "failures": summary.failures,
                    }),
                    meta,
                );
                return Err(CoreError::Dependency(
                    "The driver profile could not be deleted; dependent cleanup counts were logged"
                        .to_string(),
                ));
            }
        }

        let preserved = self.identity_must_be_preserved(&driver.identity_id, driver.organization_id)?;
        if preserved {
            summary.message = format!(
                "Driver profile and {} dependent rows removed; login identity preserved \
                 (other memberships or admin role present)",
                summary.total_rows() - summary.deleted["driver_profiles"]
            );
        } else {
            let membership_count = self.store.delete_memberships(driver.identity_id, None)?;
            summary
                .deleted
                .insert("organization_members".to_string(), membership_count);

            let account_deleted = self.directory.delete_account(driver.identity_id)?;
            summary
                .deleted
                .insert("identities".to_string(), u64::from(account_deleted));
            summary.auth_user_deleted = account_deleted;
            summary.message = format!(
                "Driver fully deprovisioned; {} rows removed including the login identity",
                summary.total_rows()
            );
        }

        info!(
            driver_id = %driver.id,
            auth_user_deleted = summary.auth_user_deleted,
            rows_deleted = summary.total_rows(),
            failures = summary.failures.len(),
            "Driver deprovisioned"
        );
        self.audit.record(
            self.store.as_ref(),
            Some(driver.id),
            AuditAction::DriverDeprovisioned,
            actor.id,
            json!({
                "organization_id": driver.organization_id,
                "identity_id": driver.identity_id,
                "auth_user_deleted": summary.auth_user_deleted,
                "deleted": summary.deleted,
                "failures": summary.failures,
            }),
            meta,
        );

        Ok(summary)
    }

    /// An identity survives deprovisioning when it still matters elsewhere:
    /// any membership outside the driver's organization, or an admin role in
    /// any organization (including this one).
    fn identity_must_be_preserved(
        &self,
        identity_id: &Uuid,
        organization_id: Uuid,
    ) -> Result<bool, CoreError> {
        let memberships = self.store.list_memberships(*identity_id)?;
        Ok(memberships
            .iter()
            .any(|m| m.organization_id != organization_id || m.role == ADMIN_ROLE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_enumerates_every_table_with_zeros() {
        let summary = DeletionSummary::with_zeroed_tables();
        assert_eq!(summary.deleted.len(), 15);
        assert!(summary.deleted.values().all(|&c| c == 0));
        assert!(summary.deleted.contains_key("vehicle_checks"));
        assert!(summary.deleted.contains_key("day_logs"));
        assert!(summary.deleted.contains_key("driver_profiles"));
        assert!(summary.deleted.contains_key("organization_members"));
        assert!(summary.deleted.contains_key("identities"));
        assert!(!summary.auth_user_deleted);
    }
}
