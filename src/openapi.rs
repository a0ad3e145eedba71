//! OpenAPI documentation configuration.
//!
//! This module provides the OpenAPI (Swagger) documentation for the Convoy API.
//! It uses `utoipa` to generate the OpenAPI specification and serves it via Swagger UI.

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Convoy API",
        version = "1.0.0",
        description = "Driver lifecycle management for delivery organizations.\n\n\
        ## Features\n\
        - Tokenized driver invitations with a 7-day onboarding window\n\
        - Direct account provisioning with temporary credentials\n\
        - Per-admin invitation rate limiting\n\
        - Cascading deprovisioning with conditional identity cleanup\n\
        - Append-only audit trail of lifecycle-sensitive actions\n\n\
        ## Authentication\n\
        Administrative endpoints require a JWT bearer token:\n\
        `Authorization: Bearer <token>`.\n\
        Invitation acceptance is public; it is authorized by the invitation \
        token itself.",
        contact(
            name = "Convoy API Support"
        ),
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Invitations", description = "Driver invitation lifecycle"),
        (name = "Drivers", description = "Driver provisioning and deprovisioning")
    ),
    paths(
        crate::handlers::health::health_check_simple,
        crate::handlers::health::health_check,
        crate::handlers::health::ready_check,
        crate::handlers::health::live_check,

        crate::handlers::invitations::create_invitation,
        crate::handlers::invitations::accept_invitation,
        crate::handlers::invitations::cancel_invitation,

        crate::handlers::drivers::provision_driver,
        crate::handlers::drivers::deprovision_driver,
    ),
    components(
        schemas(
            crate::error::ApiError,

            crate::handlers::invitations::CreateInvitationRequest,
            crate::handlers::invitations::InvitationResponse,
            crate::handlers::invitations::AcceptInvitationRequest,
            crate::handlers::invitations::AcceptInvitationResponse,

            crate::models::DriverProfile,
            crate::handlers::drivers::ProvisionDriverResponse,
            crate::services::DeletionSummary,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "JWT access token for an organization admin.\n\
                            Include in requests as: `Authorization: Bearer <token>`",
                        ))
                        .build(),
                ),
            );
        }

        openapi.security = Some(vec![]);
    }
}

pub fn swagger_router() -> Router {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generation() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "Convoy API");
        assert_eq!(spec.info.version, "1.0.0");
    }

    #[test]
    fn test_openapi_has_security_scheme() {
        let spec = ApiDoc::openapi();
        assert!(spec.components.is_some());
        let components = spec.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }

    #[test]
    fn test_openapi_has_tags() {
        let spec = ApiDoc::openapi();
        assert!(spec.tags.is_some());
        let tags = spec.tags.unwrap();
        assert!(tags.iter().any(|t| t.name == "Invitations"));
        assert!(tags.iter().any(|t| t.name == "Health"));
    }
}
