use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    accounts::{INVALID_JWT, UserPatch},
    api::{
        extract::JsonBody,
        models::{
            auth::MessageResponse,
            users::{UserCreate, UserCreatedResponse, UserResponse, UserUpdate, UserUpdatedResponse},
        },
    },
    auth::current_user::{BearerToken, CurrentSession},
    errors::{Error, Result},
};

/// Register a new user
#[utoipa::path(
    post,
    path = "/users/create",
    request_body = UserCreate,
    tag = "users",
    responses(
        (status = 201, description = "User created", body = UserCreatedResponse),
        (status = 400, description = "Invalid username or password"),
        (status = 409, description = "Username already taken"),
    )
)]
#[tracing::instrument(skip_all, fields(username = %request.username))]
pub async fn create_user(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<UserCreate>,
) -> Result<(StatusCode, Json<UserCreatedResponse>)> {
    let user = state.accounts.create(&request.username, &request.password).await?;

    Ok((StatusCode::CREATED, Json(UserCreatedResponse { user: user.into() })))
}

/// Get a user by ID
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User ID (UUID)")),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 400, description = "Malformed user ID"),
        (status = 401, description = "Invalid, expired or revoked token"),
        (status = 404, description = "User not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %id))]
pub async fn get_user(
    State(state): State<AppState>,
    _session: CurrentSession,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>> {
    let user = state.accounts.get_by_raw_id(&id).await?;
    Ok(Json(user.into()))
}

/// Update the caller's own account
#[utoipa::path(
    put,
    path = "/users",
    request_body = UserUpdate,
    tag = "users",
    responses(
        (status = 200, description = "User updated", body = UserUpdatedResponse),
        (status = 400, description = "Nothing to update or invalid value"),
        (status = 401, description = "Invalid, expired or revoked token"),
        (status = 404, description = "User not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(username = %session.username))]
pub async fn update_user(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    JsonBody(request): JsonBody<UserUpdate>,
) -> Result<Json<UserUpdatedResponse>> {
    if let Some(username) = request.username.as_deref().filter(|u| !u.is_empty())
        && username != session.username
    {
        return Err(Error::bad_request("username does not match the session"));
    }

    let user = state
        .accounts
        .update(
            &session.username,
            UserPatch {
                password: request.password,
            },
        )
        .await?;

    Ok(Json(UserUpdatedResponse { user: user.into() }))
}

/// Delete the caller's own account
#[utoipa::path(
    delete,
    path = "/users",
    tag = "users",
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 400, description = "Token is not the live session"),
        (status = 404, description = "User not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_user(State(state): State<AppState>, token: Option<BearerToken>) -> Result<Json<MessageResponse>> {
    let BearerToken(token) = token.ok_or_else(|| Error::bad_request(INVALID_JWT))?;

    let codec = state.sessions.codec();
    let claims = codec.verify(&token).map_err(|_| Error::bad_request(INVALID_JWT))?;
    if codec.is_expired(&token) {
        return Err(Error::bad_request(INVALID_JWT));
    }

    state.accounts.delete(&claims.sub, &token).await?;

    Ok(Json(MessageResponse::new("user deleted")))
}
