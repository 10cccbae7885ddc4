use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::dto::{is_valid_email, normalize, require};
use crate::error::{AppError, AppResult};
use crate::users::repo_types::{UserPatch, WatchedVideo};

#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    #[serde(default, alias = "fullName")]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl UpdateAccountRequest {
    pub fn into_patch(self) -> AppResult<UserPatch> {
        let full_name = self
            .full_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let email = self.email.map(|e| normalize(&e)).filter(|e| !e.is_empty());
        if full_name.is_none() && email.is_none() {
            return Err(AppError::validation("full_name or email is required"));
        }
        if let Some(email) = &email {
            if !is_valid_email(email) {
                return Err(AppError::validation("Invalid email"));
            }
        }
        Ok(UserPatch {
            full_name,
            email,
            ..UserPatch::default()
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateAvatarRequest {
    #[serde(default)]
    pub avatar: String,
}

impl UpdateAvatarRequest {
    pub fn into_patch(self) -> AppResult<UserPatch> {
        require("avatar", &self.avatar)?;
        Ok(UserPatch {
            avatar: Some(self.avatar.trim().to_string()),
            ..UserPatch::default()
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateCoverImageRequest {
    #[serde(default, alias = "coverImage")]
    pub cover_image: String,
}

impl UpdateCoverImageRequest {
    pub fn into_patch(self) -> AppResult<UserPatch> {
        require("cover_image", &self.cover_image)?;
        Ok(UserPatch {
            cover_image: Some(self.cover_image.trim().to_string()),
            ..UserPatch::default()
        })
    }
}

#[derive(Debug, Serialize)]
pub struct VideoOwner {
    pub id: Uuid,
    pub handle: String,
    pub full_name: String,
    pub avatar: String,
}

/// A watched video with its owner, as listed in the watch history.
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub duration_secs: i32,
    pub views: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub owner: VideoOwner,
}

impl From<WatchedVideo> for HistoryEntry {
    fn from(r: WatchedVideo) -> Self {
        Self {
            id: r.id,
            title: r.title,
            description: r.description,
            thumbnail: r.thumbnail,
            duration_secs: r.duration_secs,
            views: r.views,
            created_at: r.created_at,
            owner: VideoOwner {
                id: r.owner_id,
                handle: r.owner_handle,
                full_name: r.owner_full_name,
                avatar: r.owner_avatar,
            },
        }
    }
}
