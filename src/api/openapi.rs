use super::handlers::{auth, health};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::register::register,
        auth::login::login,
        auth::refresh::refresh_token,
        auth::logout::logout,
        auth::roles::add_role,
        auth::roles::assign_role,
    ),
    components(schemas(
        health::Health,
        auth::types::RegisterRequest,
        auth::types::LoginRequest,
        auth::types::RefreshTokenRequest,
        auth::types::LogoutRequest,
        auth::types::AddRoleRequest,
        auth::types::AssignRoleRequest,
        auth::types::TokenPairResponse,
        auth::types::MessageResponse,
        auth::types::ErrorResponse,
    )),
    modifiers(&BearerSecurity),
    tags(
        (name = "auth", description = "Credential and token lifecycle"),
        (name = "health", description = "Service health")
    )
)]
struct ApiDoc;

/// Register the `bearer` scheme referenced by the admin endpoints.
struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// The `OpenAPI` document served at `/api-docs/openapi.json`.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
