//! Invitation issuance, acceptance, cancellation and direct provisioning.
//!
//! The invitation lifecycle is `none -> pending -> {accepted | expired |
//! cancelled}`. Expiry is evaluated lazily: any operation that inspects a
//! pending invitation past its window treats it as expired, whether or not
//! the stored status has been rewritten yet.

use std::sync::Arc;

use chrono::{Duration, NaiveDateTime, Utc};
use rand::RngCore;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audit::{AuditAction, AuditLog, RequestMeta};
use crate::auth::{AuthActor, CredentialPolicy, CredentialService, IdentityDirectory};
use crate::config::InvitePolicy;
use crate::error::CoreError;
use crate::mailer::Mailer;
use crate::models::{
    DriverProfile, DriverStatus, Identity, Invitation, InvitationStatus, NewDriverProfile,
    NewInvitation, NewOrgMembership,
};
use crate::ratelimit::{InviteGate, InviteRateLimiter};
use crate::store::RecordStore;
use crate::validation::{validate_invite, InviteInput, ValidInvite};

pub const DRIVER_ROLE: &str = "driver";
pub const ADMIN_ROLE: &str = "admin";

/// Successful issuance. `token` is the raw capability secret; only its
/// SHA-256 hash is persisted, so this is the one chance to hand it out.
#[derive(Debug)]
pub struct IssuedInvitation {
    pub invitation: Invitation,
    pub token: String,
}

#[derive(Debug)]
pub struct ProvisionedDriver {
    pub identity: Identity,
    pub driver: DriverProfile,
    pub temp_credential: String,
    pub email_sent: bool,
    pub warning: Option<String>,
}

#[derive(Debug)]
pub struct AcceptedInvitation {
    pub identity: Identity,
    pub driver: DriverProfile,
}

#[derive(Clone)]
pub struct InvitationService {
    store: Arc<dyn RecordStore>,
    mailer: Arc<dyn Mailer>,
    directory: Arc<dyn IdentityDirectory>,
    limiter: InviteRateLimiter,
    audit: AuditLog,
    policy: InvitePolicy,
    temp_credential_length: usize,
}

impl InvitationService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn RecordStore>,
        mailer: Arc<dyn Mailer>,
        directory: Arc<dyn IdentityDirectory>,
        limiter: InviteRateLimiter,
        audit: AuditLog,
        policy: InvitePolicy,
        temp_credential_length: usize,
    ) -> Self {
        Self {
            store,
            mailer,
            directory,
            limiter,
            audit,
            policy,
            temp_credential_length,
        }
    }

    /// Issues a pending invitation and emails the onboarding link.
    ///
    /// Preconditions run in a fixed order: admin scope, rate limit,
    /// validation, no existing account, no live pending invitation. If the
    /// notification cannot be delivered the freshly-created row is deleted
    /// again so no pending invitation ever exists without a sent email.
    pub async fn issue(
        &self,
        actor: &AuthActor,
        organization_id: Uuid,
        input: InviteInput,
        meta: &RequestMeta,
    ) -> Result<IssuedInvitation, CoreError> {
        let valid = self
            .check_issue_preconditions(actor, organization_id, input, meta)
            .await?;

        let now = Utc::now().naive_utc();
        let (token, token_hash) = generate_invite_token();

        let invitation = self.store.insert_invitation(NewInvitation {
            organization_id,
            email: valid.email.clone(),
            first_name: valid.first_name.clone(),
            last_name: valid.last_name.clone(),
            phone: valid.phone.clone(),
            hourly_rate: valid.hourly_rate,
            per_drop_rate: valid.per_drop_rate,
            token_hash,
            status: InvitationStatus::Pending.as_str().to_string(),
            expires_at: now + Duration::days(self.policy.expiry_days),
        })?;

        let link = format!("{}?token={}", self.policy.accept_base_url, token);
        let body = invite_email_body(&valid.first_name, &link, invitation.expires_at);
        match self
            .mailer
            .send(&valid.email, "You're invited to drive with us", &body)
            .await
        {
            Ok(delivery_id) => {
                info!(
                    invitation_id = %invitation.id,
                    delivery_id = %delivery_id,
                    "Invitation issued"
                );
                self.audit.record(
                    self.store.as_ref(),
                    Some(invitation.id),
                    AuditAction::InviteCreated,
                    actor.id,
                    json!({
                        "email": valid.email,
                        "organization_id": organization_id,
                        "expires_at": invitation.expires_at,
                    }),
                    meta,
                );
                Ok(IssuedInvitation { invitation, token })
            }
            Err(err) => {
                warn!(
                    invitation_id = %invitation.id,
                    error = %err,
                    "Invitation email failed, rolling back row"
                );
                if let Err(delete_err) = self.store.delete_invitation(invitation.id) {
                    error!(
                        invitation_id = %invitation.id,
                        error = %delete_err,
                        "Rollback of undelivered invitation failed"
                    );
                }
                self.audit.record(
                    self.store.as_ref(),
                    Some(invitation.id),
                    AuditAction::InviteEmailFailed,
                    actor.id,
                    json!({
                        "email": valid.email,
                        "organization_id": organization_id,
                        "error": err.to_string(),
                    }),
                    meta,
                );
                Err(CoreError::EmailDelivery(
                    "The invitation email could not be delivered; no invitation was created"
                        .to_string(),
                ))
            }
        }
    }

    /// Direct provisioning: skips the invitation round-trip and creates the
    /// login account, membership and driver profile immediately. A mail
    /// failure here does NOT roll anything back; the account already exists
    /// and must not silently vanish, so the temporary credential is returned
    /// for manual hand-off instead.
    pub async fn provision_direct(
        &self,
        actor: &AuthActor,
        organization_id: Uuid,
        input: InviteInput,
        meta: &RequestMeta,
    ) -> Result<ProvisionedDriver, CoreError> {
        let valid = self
            .check_issue_preconditions(actor, organization_id, input, meta)
            .await?;

        let temp_credential = CredentialService::generate_temp(self.temp_credential_length);
        let display_name = format!("{} {}", valid.first_name, valid.last_name);
        let identity = self
            .directory
            .create_account(&valid.email, &display_name, &temp_credential)?;

        self.store.insert_membership(NewOrgMembership {
            identity_id: identity.id,
            organization_id,
            role: DRIVER_ROLE.to_string(),
        })?;

        let driver = self.store.insert_driver(NewDriverProfile {
            identity_id: identity.id,
            organization_id,
            status: DriverStatus::Pending.as_str().to_string(),
            hourly_rate: valid.hourly_rate,
            per_drop_rate: valid.per_drop_rate,
        })?;

        let body = credential_email_body(&valid.first_name, &valid.email, &temp_credential);
        let (email_sent, warning) = match self
            .mailer
            .send(&valid.email, "Your driver account is ready", &body)
            .await
        {
            Ok(delivery_id) => {
                info!(driver_id = %driver.id, delivery_id = %delivery_id, "Driver provisioned");
                (true, None)
            }
            Err(err) => {
                warn!(
                    driver_id = %driver.id,
                    error = %err,
                    "Credential email failed, account kept for manual hand-off"
                );
                self.audit.record(
                    self.store.as_ref(),
                    Some(driver.id),
                    AuditAction::InviteEmailFailed,
                    actor.id,
                    json!({
                        "email": valid.email,
                        "organization_id": organization_id,
                        "error": err.to_string(),
                    }),
                    meta,
                );
                (
                    false,
                    Some(
                        "The credential email could not be delivered. Share the temporary \
                         credential with the driver manually."
                            .to_string(),
                    ),
                )
            }
        };

        self.audit.record(
            self.store.as_ref(),
            Some(driver.id),
            AuditAction::DriverProvisioned,
            actor.id,
            json!({
                "email": valid.email,
                "organization_id": organization_id,
                "identity_id": identity.id,
                "email_sent": email_sent,
            }),
            meta,
        );

        Ok(ProvisionedDriver {
            identity,
            driver,
            temp_credential,
            email_sent,
            warning,
        })
    }

    /// Onboarding completion: the bearer of a live invitation token sets
    /// their credential and becomes a driver.
    pub async fn accept(
        &self,
        token: &str,
        credential: &str,
        meta: &RequestMeta,
    ) -> Result<AcceptedInvitation, CoreError> {
        CredentialPolicy::check(credential).map_err(|e| CoreError::Validation(vec![e]))?;

        let token_hash = hash_invite_token(token);
        let invitation = self
            .store
            .find_invitation_by_token_hash(&token_hash)?
            .ok_or_else(|| CoreError::NotFound("Invitation not found".to_string()))?;

        let now = Utc::now().naive_utc();
        match invitation.status() {
            Some(InvitationStatus::Pending) if invitation.is_expired(now) => {
                self.store
                    .update_invitation_status(invitation.id, InvitationStatus::Expired)?;
                return Err(CoreError::Conflict("This invitation has expired".to_string()));
            }
            Some(InvitationStatus::Pending) => {}
            _ => {
                return Err(CoreError::Conflict(
                    "This invitation is no longer open".to_string(),
                ));
            }
        }

        let display_name = format!("{} {}", invitation.first_name, invitation.last_name);
        let identity = self
            .directory
            .create_account(&invitation.email, &display_name, credential)?;

        self.store.insert_membership(NewOrgMembership {
            identity_id: identity.id,
            organization_id: invitation.organization_id,
            role: DRIVER_ROLE.to_string(),
        })?;

        let driver = self.store.insert_driver(NewDriverProfile {
            identity_id: identity.id,
            organization_id: invitation.organization_id,
            status: DriverStatus::Active.as_str().to_string(),
            hourly_rate: invitation.hourly_rate,
            per_drop_rate: invitation.per_drop_rate,
        })?;

        self.store
            .mark_invitation_accepted(invitation.id, driver.id, now)?;

        info!(invitation_id = %invitation.id, driver_id = %driver.id, "Invitation accepted");
        self.audit.record(
            self.store.as_ref(),
            Some(invitation.id),
            AuditAction::InviteAccepted,
            identity.id,
            json!({
                "organization_id": invitation.organization_id,
                "driver_profile_id": driver.id,
            }),
            meta,
        );

        Ok(AcceptedInvitation { identity, driver })
    }

    /// Administrator withdrawal of a pending invitation.
    pub async fn cancel(
        &self,
        actor: &AuthActor,
        invitation_id: Uuid,
        meta: &RequestMeta,
    ) -> Result<Invitation, CoreError> {
        let invitation = self
            .store
            .find_invitation(invitation_id)?
            .ok_or_else(|| CoreError::NotFound("Invitation not found".to_string()))?;

        self.require_admin(actor, invitation.organization_id, meta)?;

        let now = Utc::now().naive_utc();
        match invitation.status() {
            Some(InvitationStatus::Pending) if invitation.is_expired(now) => {
                self.store
                    .update_invitation_status(invitation.id, InvitationStatus::Expired)?;
                return Err(CoreError::Conflict(
                    "This invitation has already expired".to_string(),
                ));
            }
            Some(InvitationStatus::Pending) => {}
            _ => {
                return Err(CoreError::Conflict(
                    "Only pending invitations can be cancelled".to_string(),
                ));
            }
        }

        self.store
            .update_invitation_status(invitation.id, InvitationStatus::Cancelled)?;
        self.audit.record(
            self.store.as_ref(),
            Some(invitation.id),
            AuditAction::InviteCancelled,
            actor.id,
            json!({
                "email": invitation.email,
                "organization_id": invitation.organization_id,
            }),
            meta,
        );

        let cancelled = self
            .store
            .find_invitation(invitation.id)?
            .ok_or_else(|| CoreError::NotFound("Invitation not found".to_string()))?;
        Ok(cancelled)
    }

    /// The ordered precondition ladder shared by `issue` and
    /// `provision_direct`: admin scope, invite budget, field validation,
    /// no existing account, no live pending invitation (expired ones are
    /// transitioned out of the way first).
    async fn check_issue_preconditions(
        &self,
        actor: &AuthActor,
        organization_id: Uuid,
        input: InviteInput,
        meta: &RequestMeta,
    ) -> Result<ValidInvite, CoreError> {
        self.require_admin(actor, organization_id, meta)?;

        if let InviteGate::Denied { retry_after_secs } =
            self.limiter
                .check_and_increment(self.store.as_ref(), actor.id, organization_id)
        {
            self.audit.record(
                self.store.as_ref(),
                None,
                AuditAction::InviteRateLimited,
                actor.id,
                json!({
                    "organization_id": organization_id,
                    "retry_after_secs": retry_after_secs,
                }),
                meta,
            );
            return Err(CoreError::RateLimited { retry_after_secs });
        }

        let valid = validate_invite(&input, &self.policy).map_err(CoreError::Validation)?;

        if self.store.find_identity_by_email(&valid.email)?.is_some() {
            self.audit.record(
                self.store.as_ref(),
                None,
                AuditAction::InviteConflict,
                actor.id,
                json!({
                    "organization_id": organization_id,
                    "email": valid.email,
                    "reason": "existing_account",
                }),
                meta,
            );
            return Err(CoreError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }

        if let Some(pending) = self
            .store
            .find_pending_invitation(organization_id, &valid.email)?
        {
            let now = Utc::now().naive_utc();
            if pending.is_expired(now) {
                self.store
                    .update_invitation_status(pending.id, InvitationStatus::Expired)?;
            } else {
                self.audit.record(
                    self.store.as_ref(),
                    Some(pending.id),
                    AuditAction::InviteConflict,
                    actor.id,
                    json!({
                        "organization_id": organization_id,
                        "email": valid.email,
                        "reason": "pending_invitation",
                    }),
                    meta,
                );
                return Err(CoreError::Conflict(
                    "A pending invitation already exists for this email".to_string(),
                ));
            }
        }

        Ok(valid)
    }

    fn require_admin(
        &self,
        actor: &AuthActor,
        organization_id: Uuid,
        meta: &RequestMeta,
    ) -> Result<(), CoreError> {
        if self.store.is_org_admin(actor.id, organization_id)? {
            return Ok(());
        }
        self.audit.record(
            self.store.as_ref(),
            None,
            AuditAction::UnauthorizedInviteAttempt,
            actor.id,
            json!({"organization_id": organization_id}),
            meta,
        );
        Err(CoreError::Forbidden(
            "You must be an organization admin to manage drivers".to_string(),
        ))
    }
}

/// Opaque capability token: 32 random bytes hex-encoded. Only the SHA-256
/// hash touches the database.
fn generate_invite_token() -> (String, String) {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = hex::encode(bytes);
    let hash = hash_invite_token(&token);
    (token, hash)
}

pub fn hash_invite_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn invite_email_body(first_name: &str, link: &str, expires_at: NaiveDateTime) -> String {
    format!(
        "<p>Hi {first_name},</p>\
         <p>You've been invited to join as a driver. Follow the link below to \
         finish setting up your account:</p>\
         <p><a href=\"{link}\">{link}</a></p>\
         <p>This invitation expires on {}.</p>",
        expires_at.format("%Y-%m-%d %H:%M UTC")
    )
}

fn credential_email_body(first_name: &str, email: &str, temp_credential: &str) -> String {
    format!(
        "<p>Hi {first_name},</p>\
         <p>Your driver account is ready. Sign in with:</p>\
         <p>Email: {email}<br>Temporary credential: {temp_credential}</p>\
         <p>You'll be asked to choose a new credential on first sign-in.</p>"
    )
}
