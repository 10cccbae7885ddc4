use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{normalize, PublicUser},
        extractors::AuthUser,
    },
    error::{AppError, AppResult},
    extract::ApiJson,
    state::AppState,
    users::{
        dto::{HistoryEntry, UpdateAccountRequest, UpdateAvatarRequest, UpdateCoverImageRequest},
        repo_types::{ChannelProfile, User, UserPatch},
    },
};

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", patch(update_account))
        .route("/users/me/avatar", patch(update_avatar))
        .route("/users/me/cover-image", patch(update_cover_image))
        .route("/users/me/history", get(watch_history))
        .route("/channels/:handle", get(channel_profile))
}

/// Loads the user behind a verified access token.
pub(crate) async fn load_user(state: &AppState, user_id: Uuid) -> AppResult<User> {
    state.store.find_by_id(user_id).await?.ok_or_else(|| {
        warn!(%user_id, "access token for unknown user");
        AppError::unauthorized("Invalid access token")
    })
}

async fn apply_patch(state: &AppState, user_id: Uuid, patch: UserPatch) -> AppResult<PublicUser> {
    let user = state
        .store
        .update_fields(user_id, patch)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(PublicUser::from(&user))
}

#[instrument(skip(state, payload))]
pub async fn update_account(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<UpdateAccountRequest>,
) -> AppResult<Json<PublicUser>> {
    let user = apply_patch(&state, user_id, payload.into_patch()?).await?;
    info!(%user_id, "account details updated");
    Ok(Json(user))
}

#[instrument(skip(state, payload))]
pub async fn update_avatar(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<UpdateAvatarRequest>,
) -> AppResult<Json<PublicUser>> {
    let user = apply_patch(&state, user_id, payload.into_patch()?).await?;
    info!(%user_id, "avatar updated");
    Ok(Json(user))
}

#[instrument(skip(state, payload))]
pub async fn update_cover_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<UpdateCoverImageRequest>,
) -> AppResult<Json<PublicUser>> {
    let user = apply_patch(&state, user_id, payload.into_patch()?).await?;
    info!(%user_id, "cover image updated");
    Ok(Json(user))
}

#[instrument(skip(state))]
pub async fn watch_history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Vec<HistoryEntry>>> {
    load_user(&state, user_id).await?;
    let rows = state.store.watch_history(user_id).await?;
    Ok(Json(rows.into_iter().map(HistoryEntry::from).collect()))
}

#[instrument(skip(state))]
pub async fn channel_profile(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(handle): Path<String>,
) -> AppResult<Json<ChannelProfile>> {
    let handle = normalize(&handle);
    if handle.is_empty() {
        return Err(AppError::validation("handle is required"));
    }
    let profile = state
        .store
        .channel_profile(&handle, viewer)
        .await?
        .ok_or_else(|| AppError::not_found("Channel does not exist"))?;
    Ok(Json(profile))
}
