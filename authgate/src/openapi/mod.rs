//! OpenAPI documentation for the `/v1` API, served by Scalar at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api;

/// Security scheme for session tokens.
struct SessionSecurityAddon;

impl Modify for SessionSecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Session token from `POST /auth/login`. Include it in the `Authorization` header:\n\n\
                            ```\nAuthorization: Bearer YOUR_TOKEN\n```\n\n\
                            Only the most recently issued token for a user is accepted.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    servers(
        (url = "/v1", description = "Session and user API")
    ),
    modifiers(&SessionSecurityAddon),
    paths(
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::auth::authorize,
        api::handlers::auth::refresh,
        api::handlers::users::create_user,
        api::handlers::users::get_user,
        api::handlers::users::update_user,
        api::handlers::users::delete_user,
    ),
    components(
        schemas(
            api::models::auth::LoginRequest,
            api::models::auth::LoginResponse,
            api::models::auth::MessageResponse,
            api::models::auth::AuthorizeRequest,
            api::models::auth::AuthorizeResponse,
            api::models::users::UserCreate,
            api::models::users::UserCreatedResponse,
            api::models::users::UserSummary,
            api::models::users::UserUpdate,
            api::models::users::UserUpdatedResponse,
            api::models::users::UserResponse,
        )
    ),
    tags(
        (name = "authentication", description = "Session tokens and permission checks"),
        (name = "users", description = "User registration and self-service"),
    ),
    info(
        title = "authgate",
        description = "Session-token authentication and permission gating",
    )
)]
pub struct ApiDoc;
