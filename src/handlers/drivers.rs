//! Driver provisioning and deprovisioning handlers.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    audit::RequestMeta,
    auth::AuthActor,
    error::{ApiError, ApiResult},
    models::DriverProfile,
    services::DeletionSummary,
    telemetry::metrics::{record_deprovision, record_invite_attempt, InviteOutcome},
    validation::InviteInput,
    AppState,
};

use super::invitations::CreateInvitationRequest;

#[derive(Debug, Serialize, ToSchema)]
pub struct ProvisionDriverResponse {
    pub driver: DriverProfile,
    pub identity_id: Uuid,
    pub email_sent: bool,
    /// Present only when the credential email failed and the admin must
    /// hand the temporary credential over manually.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_credential: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DeprovisionParams {
    /// Expected organization; a mismatch refuses the deletion.
    pub organization_id: Option<Uuid>,
}

#[utoipa::path(
    post,
    path = "/drivers",
    tag = "Drivers",
    request_body = CreateInvitationRequest,
    responses(
        (status = 201, description = "Driver account provisioned immediately", body = ProvisionDriverResponse),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Not an organization admin", body = ApiError),
        (status = 409, description = "Existing account or pending invitation", body = ApiError),
        (status = 429, description = "Invite rate limit exceeded", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn provision_driver(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthActor>,
    Extension(meta): Extension<RequestMeta>,
    Json(payload): Json<CreateInvitationRequest>,
) -> ApiResult<(axum::http::StatusCode, Json<ProvisionDriverResponse>)> {
    let organization_id = payload.organization_id;
    let input = InviteInput {
        email: payload.email,
        first_name: payload.first_name,
        last_name: payload.last_name,
        phone: payload.phone,
        hourly_rate: payload.hourly_rate,
        per_drop_rate: payload.per_drop_rate,
    };

    match state
        .invitations
        .provision_direct(&actor, organization_id, input, &meta)
        .await
    {
        Ok(provisioned) => {
            record_invite_attempt("provision", InviteOutcome::Issued);
            // Surface the temporary credential only when it could not reach
            // the driver by mail.
            let temp_credential =
                (!provisioned.email_sent).then_some(provisioned.temp_credential);
            Ok((
                axum::http::StatusCode::CREATED,
                Json(ProvisionDriverResponse {
                    driver: provisioned.driver,
                    identity_id: provisioned.identity.id,
                    email_sent: provisioned.email_sent,
                    temp_credential,
                    warning: provisioned.warning,
                }),
            ))
        }
        Err(err) => {
            record_invite_attempt("provision", super::invitations::invite_outcome(&err));
            Err(ApiError::from_core(err))
        }
    }
}

#[utoipa::path(
    delete,
    path = "/drivers/{driver_profile_id}",
    tag = "Drivers",
    params(
        ("driver_profile_id" = Uuid, Path, description = "Driver profile ID"),
        DeprovisionParams
    ),
    responses(
        (status = 200, description = "Driver deprovisioned", body = DeletionSummary),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Wrong organization or not an admin", body = ApiError),
        (status = 404, description = "Driver profile not found", body = ApiError),
        (status = 409, description = "Driver has a shift in progress", body = ApiError),
        (status = 500, description = "Profile deletion failed", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn deprovision_driver(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthActor>,
    Extension(meta): Extension<RequestMeta>,
    Path(driver_profile_id): Path<Uuid>,
    Query(params): Query<DeprovisionParams>,
) -> ApiResult<Json<DeletionSummary>> {
    let summary = state
        .deprovision
        .deprovision(&actor, driver_profile_id, params.organization_id, &meta)
        .await
        .map_err(ApiError::from_core)?;

    record_deprovision(summary.auth_user_deleted, summary.total_rows());
    Ok(Json(summary))
}
