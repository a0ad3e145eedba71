//! Invitation lifecycle handlers.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    audit::RequestMeta,
    auth::AuthActor,
    error::{ApiError, ApiResult, CoreError},
    telemetry::metrics::{record_invite_attempt, InviteOutcome},
    validation::InviteInput,
    AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateInvitationRequest {
    pub organization_id: Uuid,
    #[schema(example = "new.driver@company.test")]
    pub email: String,
    #[schema(example = "Jo")]
    pub first_name: String,
    #[schema(example = "Driver")]
    pub last_name: String,
    #[schema(example = "+44 7700 900123")]
    pub phone: Option<String>,
    #[schema(example = 14.5)]
    pub hourly_rate: Option<f64>,
    #[schema(example = 1.2)]
    pub per_drop_rate: Option<f64>,
}

impl CreateInvitationRequest {
    fn into_input(self) -> (Uuid, InviteInput) {
        (
            self.organization_id,
            InviteInput {
                email: self.email,
                first_name: self.first_name,
                last_name: self.last_name,
                phone: self.phone,
                hourly_rate: self.hourly_rate,
                per_drop_rate: self.per_drop_rate,
            },
        )
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InvitationResponse {
    pub invitation_id: Uuid,
    pub email: String,
    #[schema(example = "pending")]
    pub status: String,
    pub expires_at: NaiveDateTime,
    /// Raw onboarding token; returned exactly once at issuance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AcceptInvitationRequest {
    pub token: String,
    /// The credential the new driver will sign in with.
    pub credential: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AcceptInvitationResponse {
    pub identity_id: Uuid,
    pub driver_profile_id: Uuid,
    pub organization_id: Uuid,
    #[schema(example = "active")]
    pub status: String,
}

pub(crate) fn invite_outcome(err: &CoreError) -> InviteOutcome {
    match err {
        CoreError::Forbidden(_) | CoreError::Unauthenticated(_) => InviteOutcome::Forbidden,
        CoreError::RateLimited { .. } => InviteOutcome::RateLimited,
        CoreError::Validation(_) => InviteOutcome::ValidationFailed,
        CoreError::Conflict(_) | CoreError::NotFound(_) => InviteOutcome::Conflict,
        CoreError::EmailDelivery(_) => InviteOutcome::EmailFailed,
        CoreError::Dependency(_) => InviteOutcome::EmailFailed,
    }
}

#[utoipa::path(
    post,
    path = "/invitations",
    tag = "Invitations",
    request_body = CreateInvitationRequest,
    responses(
        (status = 201, description = "Invitation issued and emailed", body = InvitationResponse),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Not an organization admin", body = ApiError),
        (status = 409, description = "Existing account or pending invitation", body = ApiError),
        (status = 429, description = "Invite rate limit exceeded", body = ApiError),
        (status = 502, description = "Invitation email could not be delivered", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_invitation(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthActor>,
    Extension(meta): Extension<RequestMeta>,
    Json(payload): Json<CreateInvitationRequest>,
) -> ApiResult<(axum::http::StatusCode, Json<InvitationResponse>)> {
    let (organization_id, input) = payload.into_input();

    match state
        .invitations
        .issue(&actor, organization_id, input, &meta)
        .await
    {
        Ok(issued) => {
            record_invite_attempt("issue", InviteOutcome::Issued);
            Ok((
                axum::http::StatusCode::CREATED,
                Json(InvitationResponse {
                    invitation_id: issued.invitation.id,
                    email: issued.invitation.email,
                    status: issued.invitation.status,
                    expires_at: issued.invitation.expires_at,
                    token: Some(issued.token),
                }),
            ))
        }
        Err(err) => {
            record_invite_attempt("issue", invite_outcome(&err));
            Err(ApiError::from_core(err))
        }
    }
}

#[utoipa::path(
    post,
    path = "/invitations/accept",
    tag = "Invitations",
    request_body = AcceptInvitationRequest,
    responses(
        (status = 200, description = "Invitation accepted, driver created", body = AcceptInvitationResponse),
        (status = 400, description = "Credential too weak", body = ApiError),
        (status = 404, description = "Unknown invitation token", body = ApiError),
        (status = 409, description = "Invitation expired or already closed", body = ApiError),
        (status = 429, description = "Too many onboarding attempts", body = ApiError)
    )
)]
pub async fn accept_invitation(
    State(state): State<AppState>,
    Extension(meta): Extension<RequestMeta>,
    Json(payload): Json<AcceptInvitationRequest>,
) -> ApiResult<Json<AcceptInvitationResponse>> {
    match state
        .invitations
        .accept(&payload.token, &payload.credential, &meta)
        .await
    {
        Ok(accepted) => {
            record_invite_attempt("accept", InviteOutcome::Accepted);
            Ok(Json(AcceptInvitationResponse {
                identity_id: accepted.identity.id,
                driver_profile_id: accepted.driver.id,
                organization_id: accepted.driver.organization_id,
                status: accepted.driver.status,
            }))
        }
        Err(err) => {
            record_invite_attempt("accept", invite_outcome(&err));
            Err(ApiError::from_core(err))
        }
    }
}

#[utoipa::path(
    post,
    path = "/invitations/{invitation_id}/cancel",
    tag = "Invitations",
    params(("invitation_id" = Uuid, Path, description = "Invitation ID")),
    responses(
        (status = 200, description = "Invitation cancelled", body = InvitationResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Not an organization admin", body = ApiError),
        (status = 404, description = "Invitation not found", body = ApiError),
        (status = 409, description = "Invitation not pending", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn cancel_invitation(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthActor>,
    Extension(meta): Extension<RequestMeta>,
    Path(invitation_id): Path<Uuid>,
) -> ApiResult<Json<InvitationResponse>> {
    match state.invitations.cancel(&actor, invitation_id, &meta).await {
        Ok(invitation) => {
            record_invite_attempt("cancel", InviteOutcome::Cancelled);
            Ok(Json(InvitationResponse {
                invitation_id: invitation.id,
                email: invitation.email,
                status: invitation.status,
                expires_at: invitation.expires_at,
                token: None,
            }))
        }
        Err(err) => {
            record_invite_attempt("cancel", invite_outcome(&err));
            Err(ApiError::from_core(err))
        }
    }
}
