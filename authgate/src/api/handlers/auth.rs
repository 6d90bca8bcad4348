use axum::{Json, extract::State};

use crate::{
    AppState,
    api::{
        extract::JsonBody,
        models::auth::{AuthorizeRequest, AuthorizeResponse, LoginRequest, LoginResponse, MessageResponse},
    },
    auth::{
        current_user::{BearerToken, CurrentSession},
        session::LOGOUT_FAILED,
    },
    errors::{Error, Result},
};

/// Log in with username and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Invalid credentials"),
        (status = 503, description = "Credential store unavailable"),
    )
)]
#[tracing::instrument(skip_all, fields(username = %request.username))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let issued = state.sessions.login(&request.username, &request.password).await?;

    Ok(Json(LoginResponse {
        message: "login successful".to_string(),
        token: issued.token,
    }))
}

/// Revoke the presented session token
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Logout successful", body = MessageResponse),
        (status = 400, description = "Logout failed"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, token: Option<BearerToken>) -> Result<Json<MessageResponse>> {
    let BearerToken(token) = token.ok_or_else(|| Error::bad_request(LOGOUT_FAILED))?;
    state.sessions.logout(&token).await?;

    Ok(Json(MessageResponse::new("logout successful")))
}

/// Check whether the session may perform an action on a resource
#[utoipa::path(
    post,
    path = "/auth/authorize",
    request_body = AuthorizeRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Access granted", body = AuthorizeResponse),
        (status = 400, description = "Missing resource or action"),
        (status = 401, description = "Invalid, expired or revoked token"),
        (status = 403, description = "Access denied by policy"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(resource = %request.resource, action = %request.action))]
pub async fn authorize(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    JsonBody(request): JsonBody<AuthorizeRequest>,
) -> Result<Json<AuthorizeResponse>> {
    let decision = state.gate.authorize(&token, &request.resource, &request.action).await?;

    if !decision.allowed {
        return Err(Error::InsufficientPermissions {
            action: request.action,
            resource: request.resource,
        });
    }

    Ok(Json(AuthorizeResponse {
        authorized: true,
        expires_in: decision.expires_in,
    }))
}

/// Exchange a live session token for a fresh one
#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "authentication",
    responses(
        (status = 200, description = "Token refreshed", body = LoginResponse),
        (status = 401, description = "Invalid, expired or revoked token"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn refresh(State(state): State<AppState>, CurrentSession(session): CurrentSession) -> Result<Json<LoginResponse>> {
    let issued = state.sessions.refresh(&session).await?;

    Ok(Json(LoginResponse {
        message: "token refreshed".to_string(),
        token: issued.token,
    }))
}
