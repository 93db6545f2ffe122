//! Accounts, bearer-token sessions and the authentication middleware
//!
//! `register` and `login` hand out an opaque token. Protected routes expect
//! it as `Authorization: Bearer <token>`; the middleware resolves it and
//! attaches a [`CurrentUser`] to the request.

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use xiazki_common::db::events::latest_event_kinds;
use xiazki_common::db::models::{EventKind, User};
use xiazki_common::db::users;
use xiazki_common::Error;

use super::error::ApiResult;
use crate::AppState;

/// Authenticated caller, inserted by [`auth_middleware`]
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct BookStatus {
    pub book_id: i64,
    pub status: EventKind,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: User,
    /// Latest reading status per book
    pub statuses: Vec<BookStatus>,
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Reject requests without a valid session token
///
/// Applied to protected routes only; `/health` and the register/login
/// routes stay public.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = bearer_token(&request)
        .ok_or_else(|| Error::Unauthorized("Missing bearer token".to_string()))?
        .to_string();

    let user = users::resolve_session(&state.db, &token).await?;
    debug!(user_id = %user.id, "Authenticated request");

    request.extensions_mut().insert(CurrentUser { user, token });
    Ok(next.run(request).await)
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    let Json(credentials) = payload?;

    let user = users::create_user(
        &state.db,
        credentials.username.trim(),
        &credentials.password,
        state.config.bcrypt_cost,
    )
    .await?;
    let token = users::create_session(&state.db, user.id, state.config.session_ttl()).await?;

    Ok((StatusCode::CREATED, Json(SessionResponse { token, user })))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<Json<SessionResponse>> {
    let Json(credentials) = payload?;

    let user =
        users::authenticate(&state.db, credentials.username.trim(), &credentials.password).await?;
    let token = users::create_session(&state.db, user.id, state.config.session_ttl()).await?;

    info!(user_id = %user.id, "User logged in");
    Ok(Json(SessionResponse { token, user }))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<StatusCode> {
    users::delete_session(&state.db, &current.token).await?;
    info!(user_id = %current.user.id, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/profile
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<ProfileResponse>> {
    let statuses = latest_event_kinds(&state.db, current.user.id)
        .await?
        .into_iter()
        .map(|(book_id, status)| BookStatus { book_id, status })
        .collect();

    Ok(Json(ProfileResponse { user: current.user, statuses }))
}

/// POST /api/profile/password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(request) = payload?;

    users::change_password(
        &state.db,
        current.user.id,
        &request.current_password,
        &request.new_password,
        state.config.bcrypt_cost,
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
