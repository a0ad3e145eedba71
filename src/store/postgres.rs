//! Diesel-backed record store.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use uuid::Uuid;

use crate::models::{
    DriverProfile, Identity, Invitation, InvitationStatus, InviteWindow, NewAuditEntry,
    NewDriverProfile, NewIdentity, NewInvitation, NewInviteWindow, NewOrgMembership, OrgMembership,
};
use crate::schema::{
    achievements, audit_log, day_logs, driver_profiles, earnings_entries, expense_claims, feedback,
    identities, incident_reports, invitations, invite_windows, invoices, organization_members,
    payments, ratings, schedules, shift_logs, vehicle_checks,
};
use crate::DbPool;

use super::{DependentTable, RecordStore, StoreError};

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(
        &self,
    ) -> Result<
        diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<PgConnection>>,
        StoreError,
    > {
        self.pool
            .get()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

fn map_err(e: DieselError) -> StoreError {
    match e {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            StoreError::Constraint(info.message().to_string())
        }
        other => StoreError::Query(other.to_string()),
    }
}

impl RecordStore for PgStore {
    fn find_identity(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        let mut conn = self.conn()?;
        identities::table
            .filter(identities::id.eq(id))
            .select(Identity::as_select())
            .first(&mut conn)
            .optional()
            .map_err(map_err)
    }

    fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let mut conn = self.conn()?;
        identities::table
            .filter(identities::email.eq(email))
            .select(Identity::as_select())
            .first(&mut conn)
            .optional()
            .map_err(map_err)
    }

    fn insert_identity(&self, new: NewIdentity) -> Result<Identity, StoreError> {
        let mut conn = self.conn()?;
        diesel::insert_into(identities::table)
            .values(&new)
            .returning(Identity::as_returning())
            .get_result(&mut conn)
            .map_err(map_err)
    }

    fn delete_identity(&self, id: Uuid) -> Result<u64, StoreError> {
        let mut conn = self.conn()?;
        diesel::delete(identities::table.filter(identities::id.eq(id)))
            .execute(&mut conn)
            .map(|n| n as u64)
            .map_err(map_err)
    }

    fn list_memberships(&self, identity_id: Uuid) -> Result<Vec<OrgMembership>, StoreError> {
        let mut conn = self.conn()?;
        organization_members::table
            .filter(organization_members::identity_id.eq(identity_id))
            .select(OrgMembership::as_select())
            .load(&mut conn)
            .map_err(map_err)
    }

    fn insert_membership(&self, new: NewOrgMembership) -> Result<OrgMembership, StoreError> {
        let mut conn = self.conn()?;
        diesel::insert_into(organization_members::table)
            .values(&new)
            .returning(OrgMembership::as_returning())
            .get_result(&mut conn)
            .map_err(map_err)
    }

    fn delete_memberships(
        &self,
        identity_id: Uuid,
        organization_id: Option<Uuid>,
    ) -> Result<u64, StoreError> {
        let mut conn = self.conn()?;
        let result = match organization_id {
            Some(org) => diesel::delete(
                organization_members::table
                    .filter(organization_members::identity_id.eq(identity_id))
                    .filter(organization_members::organization_id.eq(org)),
            )
            .execute(&mut conn),
            None => diesel::delete(
                organization_members::table
                    .filter(organization_members::identity_id.eq(identity_id)),
            )
            .execute(&mut conn),
        };
        result.map(|n| n as u64).map_err(map_err)
    }

    fn is_org_admin(&self, identity_id: Uuid, organization_id: Uuid) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        let found: Option<Uuid> = organization_members::table
            .filter(organization_members::identity_id.eq(identity_id))
            .filter(organization_members::organization_id.eq(organization_id))
            .filter(organization_members::role.eq("admin"))
            .select(organization_members::id)
            .first(&mut conn)
            .optional()
            .map_err(map_err)?;
        Ok(found.is_some())
    }

    fn find_invitation(&self, id: Uuid) -> Result<Option<Invitation>, StoreError> {
        let mut conn = self.conn()?;
        invitations::table
            .filter(invitations::id.eq(id))
            .select(Invitation::as_select())
            .first(&mut conn)
            .optional()
            .map_err(map_err)
    }

    fn find_invitation_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Invitation>, StoreError> {
        let mut conn = self.conn()?;
        invitations::table
            .filter(invitations::token_hash.eq(token_hash))
            .select(Invitation::as_select())
            .first(&mut conn)
            .optional()
            .map_err(map_err)
    }

    fn find_pending_invitation(
        &self,
        organization_id: Uuid,
        email: &str,
    ) -> Result<Option<Invitation>, StoreError> {
        let mut conn = self.conn()?;
        invitations::table
            .filter(invitations::organization_id.eq(organization_id))
            .filter(invitations::email.eq(email))
            .filter(invitations::status.eq(InvitationStatus::Pending.as_str()))
            .select(Invitation::as_select())
            .first(&mut conn)
            .optional()
            .map_err(map_err)
    }

    fn insert_invitation(&self, new: NewInvitation) -> Result<Invitation, StoreError> {
        let mut conn = self.conn()?;
        diesel::insert_into(invitations::table)
            .values(&new)
            .returning(Invitation::as_returning())
            .get_result(&mut conn)
            .map_err(map_err)
    }

    fn update_invitation_status(
        &self,
        id: Uuid,
        status: InvitationStatus,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        diesel::update(invitations::table.filter(invitations::id.eq(id)))
            .set(invitations::status.eq(status.as_str()))
            .execute(&mut conn)
            .map(|_| ())
            .map_err(map_err)
    }

    fn mark_invitation_accepted(
        &self,
        id: Uuid,
        driver_profile_id: Uuid,
        accepted_at: NaiveDateTime,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        diesel::update(invitations::table.filter(invitations::id.eq(id)))
            .set((
                invitations::status.eq(InvitationStatus::Accepted.as_str()),
                invitations::accepted_at.eq(Some(accepted_at)),
                invitations::driver_profile_id.eq(Some(driver_profile_id)),
            ))
            .execute(&mut conn)
            .map(|_| ())
            .map_err(map_err)
    }

    fn delete_invitation(&self, id: Uuid) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        diesel::delete(invitations::table.filter(invitations::id.eq(id)))
            .execute(&mut conn)
            .map(|_| ())
            .map_err(map_err)
    }

    fn find_driver(&self, id: Uuid) -> Result<Option<DriverProfile>, StoreError> {
        let mut conn = self.conn()?;
        driver_profiles::table
            .filter(driver_profiles::id.eq(id))
            .select(DriverProfile::as_select())
            .first(&mut conn)
            .optional()
            .map_err(map_err)
    }

    fn insert_driver(&self, new: NewDriverProfile) -> Result<DriverProfile, StoreError> {
        let mut conn = self.conn()?;
        diesel::insert_into(driver_profiles::table)
            .values(&new)
            .returning(DriverProfile::as_returning())
            .get_result(&mut conn)
            .map_err(map_err)
    }

    fn delete_driver(&self, id: Uuid) -> Result<u64, StoreError> {
        let mut conn = self.conn()?;
        diesel::delete(driver_profiles::table.filter(driver_profiles::id.eq(id)))
            .execute(&mut conn)
            .map(|n| n as u64)
            .map_err(map_err)
    }

    fn has_open_shift(&self, driver_profile_id: Uuid) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        let open: i64 = shift_logs::table
            .filter(shift_logs::driver_profile_id.eq(driver_profile_id))
            .filter(shift_logs::status.eq("in_progress"))
            .count()
            .get_result(&mut conn)
            .map_err(map_err)?;
        Ok(open > 0)
    }

    fn delete_dependents(
        &self,
        table: DependentTable,
        driver_profile_id: Uuid,
    ) -> Result<u64, StoreError> {
        let mut conn = self.conn()?;
        let deleted = match table {
            DependentTable::VehicleChecks => diesel::delete(
                vehicle_checks::table
                    .filter(vehicle_checks::driver_profile_id.eq(driver_profile_id)),
            )
            .execute(&mut conn),
            DependentTable::Feedback => diesel::delete(
                feedback::table.filter(feedback::driver_profile_id.eq(driver_profile_id)),
            )
            .execute(&mut conn),
            DependentTable::ShiftLogs => diesel::delete(
                shift_logs::table.filter(shift_logs::driver_profile_id.eq(driver_profile_id)),
            )
            .execute(&mut conn),
            DependentTable::IncidentReports => diesel::delete(
                incident_reports::table
                    .filter(incident_reports::driver_profile_id.eq(driver_profile_id)),
            )
            .execute(&mut conn),
            DependentTable::ExpenseClaims => diesel::delete(
                expense_claims::table
                    .filter(expense_claims::driver_profile_id.eq(driver_profile_id)),
            )
            .execute(&mut conn),
            DependentTable::EarningsEntries => diesel::delete(
                earnings_entries::table
                    .filter(earnings_entries::driver_profile_id.eq(driver_profile_id)),
            )
            .execute(&mut conn),
            DependentTable::Achievements => diesel::delete(
                achievements::table.filter(achievements::driver_profile_id.eq(driver_profile_id)),
            )
            .execute(&mut conn),
            DependentTable::Ratings => diesel::delete(
                ratings::table.filter(ratings::driver_profile_id.eq(driver_profile_id)),
            )
            .execute(&mut conn),
            DependentTable::Invoices => diesel::delete(
                invoices::table.filter(invoices::driver_profile_id.eq(driver_profile_id)),
            )
            .execute(&mut conn),
            DependentTable::Payments => diesel::delete(
                payments::table.filter(payments::driver_profile_id.eq(driver_profile_id)),
            )
            .execute(&mut conn),
            DependentTable::Schedules => diesel::delete(
                schedules::table.filter(schedules::driver_profile_id.eq(driver_profile_id)),
            )
            .execute(&mut conn),
            DependentTable::DayLogs => diesel::delete(
                day_logs::table.filter(day_logs::driver_profile_id.eq(driver_profile_id)),
            )
            .execute(&mut conn),
        };
        deleted.map(|n| n as u64).map_err(map_err)
    }

    fn find_invite_window(
        &self,
        actor_id: Uuid,
        organization_id: Uuid,
        since: NaiveDateTime,
    ) -> Result<Option<InviteWindow>, StoreError> {
        let mut conn = self.conn()?;
        invite_windows::table
            .filter(invite_windows::actor_id.eq(actor_id))
            .filter(invite_windows::organization_id.eq(organization_id))
            .filter(invite_windows::window_start.gt(since))
            .order(invite_windows::window_start.desc())
            .select(InviteWindow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(map_err)
    }

    fn insert_invite_window(&self, new: NewInviteWindow) -> Result<InviteWindow, StoreError> {
        let mut conn = self.conn()?;
        diesel::insert_into(invite_windows::table)
            .values(&new)
            .returning(InviteWindow::as_returning())
            .get_result(&mut conn)
            .map_err(map_err)
    }

    fn increment_invite_window(&self, id: Uuid) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        diesel::update(invite_windows::table.filter(invite_windows::id.eq(id)))
            .set(invite_windows::invite_count.eq(invite_windows::invite_count + 1))
            .execute(&mut conn)
            .map(|_| ())
            .map_err(map_err)
    }

    fn append_audit(&self, entry: NewAuditEntry) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        diesel::insert_into(audit_log::table)
            .values(&entry)
            .execute(&mut conn)
            .map(|_| ())
            .map_err(map_err)
    }
}
