use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        cookies::{append_set_cookie, read_cookie, session_cookie, ACCESS_COOKIE, REFRESH_COOKIE},
        dto::{
            require, AuthResponse, ChangePasswordRequest, LoginRequest, MessageResponse,
            PublicUser, RefreshRequest, RegisterRequest,
        },
        extractors::AuthUser,
        password::hash_password,
        session::TokenPair,
    },
    error::{AppError, AppResult},
    extract::ApiJson,
    state::AppState,
    users::{
        handlers::load_user,
        repo_types::{NewUser, UserPatch},
    },
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/logout", post(logout))
        .route("/users/refresh-token", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(get_me))
        .route("/users/me/password", post(change_password))
}

fn session_cookies(state: &AppState, pair: &TokenPair) -> AppResult<HeaderMap> {
    let keys = state.sessions.keys();
    let secure = state.config.cookie_secure;
    let mut headers = HeaderMap::new();
    append_set_cookie(
        &mut headers,
        session_cookie(ACCESS_COOKIE, &pair.access_token, keys.access.ttl, secure),
    )?;
    append_set_cookie(
        &mut headers,
        session_cookie(REFRESH_COOKIE, &pair.refresh_token, keys.refresh.ttl, secure),
    )?;
    Ok(headers)
}

fn cleared_cookies(state: &AppState) -> AppResult<HeaderMap> {
    let secure = state.config.cookie_secure;
    let mut headers = HeaderMap::new();
    append_set_cookie(&mut headers, session_cookie(ACCESS_COOKIE, "", Duration::ZERO, secure))?;
    append_set_cookie(&mut headers, session_cookie(REFRESH_COOKIE, "", Duration::ZERO, secure))?;
    Ok(headers)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(mut payload): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<PublicUser>)> {
    payload.validate()?;

    if state
        .store
        .find_by_handle_or_email(Some(&payload.handle), Some(&payload.email))
        .await?
        .is_some()
    {
        warn!(handle = %payload.handle, email = %payload.email, "handle or email taken");
        return Err(AppError::Conflict(
            "User with email or handle already exists".into(),
        ));
    }

    let password_hash = hash_password(&payload.password)?;
    let user = state
        .store
        .create(NewUser {
            handle: payload.handle,
            email: payload.email,
            password_hash,
            full_name: payload.full_name,
            avatar: payload.avatar,
            cover_image: payload.cover_image,
        })
        .await?;

    info!(user_id = %user.id, handle = %user.handle, "user registered");
    Ok((StatusCode::CREATED, Json(PublicUser::from(&user))))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<(HeaderMap, Json<AuthResponse>)> {
    let (handle, email) = payload.identity()?;

    let user = state
        .store
        .find_by_handle_or_email(handle.as_deref(), email.as_deref())
        .await?
        .ok_or_else(|| {
            warn!(?handle, ?email, "login for unknown user");
            AppError::not_found("User with given email or handle not found")
        })?;

    if !state.sessions.verify_password(&user, &payload.password)? {
        warn!(user_id = %user.id, "login with incorrect password");
        return Err(AppError::IncorrectPassword);
    }

    let (user, pair) = state.sessions.issue_token_pair(&user).await?;
    let headers = session_cookies(&state, &pair)?;

    info!(user_id = %user.id, "user logged in");
    Ok((
        headers,
        Json(AuthResponse {
            user: PublicUser::from(&user),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<(HeaderMap, Json<MessageResponse>)> {
    state.sessions.invalidate_session(user_id).await?;
    let headers = cleared_cookies(&state)?;
    info!(%user_id, "user logged out");
    Ok((
        headers,
        Json(MessageResponse {
            message: "User logged out",
        }),
    ))
}

#[instrument(skip(state, headers, body))]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<ApiJson<RefreshRequest>>,
) -> AppResult<(HeaderMap, Json<AuthResponse>)> {
    let presented = read_cookie(&headers, REFRESH_COOKIE)
        .or_else(|| body.and_then(|ApiJson(b)| b.refresh_token));

    let (user, pair) = state.sessions.rotate_on_refresh(presented.as_deref()).await?;
    let headers = session_cookies(&state, &pair)?;

    Ok((
        headers,
        Json(AuthResponse {
            user: PublicUser::from(&user),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<PublicUser>> {
    let user = load_user(&state, user_id).await?;
    Ok(Json(PublicUser::from(&user)))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    require("old_password", &payload.old_password)?;
    require("new_password", &payload.new_password)?;
    let user = load_user(&state, user_id).await?;

    if !state.sessions.verify_password(&user, &payload.old_password)? {
        warn!(%user_id, "password change with incorrect old password");
        return Err(AppError::IncorrectPassword);
    }

    let patch = UserPatch {
        password_hash: Some(hash_password(&payload.new_password)?),
        ..UserPatch::default()
    };
    state
        .store
        .update_fields(user_id, patch)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    info!(%user_id, "password changed");
    Ok(Json(MessageResponse {
        message: "Password changed",
    }))
}
