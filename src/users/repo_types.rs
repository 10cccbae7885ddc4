use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub handle: String,                // lowercased, unique
    pub email: String,                 // lowercased, unique
    pub password_hash: String,         // argon2 PHC string
    pub full_name: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub watch_history: Vec<Uuid>,      // video ids, oldest first
    pub refresh_token: Option<String>, // the one live refresh token
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields needed to insert a user. Handle and email are already normalized.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub handle: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: Option<String>,
}

/// Partial update. `None` leaves a column untouched.
///
/// `refresh_token` is doubly optional: `Some(None)` clears the stored token.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    pub password_hash: Option<String>,
    pub refresh_token: Option<Option<String>>,
}

impl UserPatch {
    pub fn refresh_token(token: Option<String>) -> Self {
        Self {
            refresh_token: Some(token),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.full_name.is_none()
            && self.avatar.is_none()
            && self.cover_image.is_none()
            && self.password_hash.is_none()
            && self.refresh_token.is_none()
    }

    pub(crate) fn apply(self, user: &mut User) {
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(full_name) = self.full_name {
            user.full_name = full_name;
        }
        if let Some(avatar) = self.avatar {
            user.avatar = avatar;
        }
        if let Some(cover_image) = self.cover_image {
            user.cover_image = Some(cover_image);
        }
        if let Some(password_hash) = self.password_hash {
            user.password_hash = password_hash;
        }
        if let Some(refresh_token) = self.refresh_token {
            user.refresh_token = refresh_token;
        }
        user.updated_at = OffsetDateTime::now_utc();
    }
}

/// One watch-history row joined with the video owner.
#[derive(Debug, Clone, FromRow)]
pub struct WatchedVideo {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub duration_secs: i32,
    pub views: i64,
    pub created_at: OffsetDateTime,
    pub owner_id: Uuid,
    pub owner_handle: String,
    pub owner_full_name: String,
    pub owner_avatar: String,
}

/// Channel page summary as seen by a given viewer.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ChannelProfile {
    pub id: Uuid,
    pub handle: String,
    pub full_name: String,
    pub email: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub subscribers_count: i64,
    pub subscribed_to_count: i64,
    pub is_subscribed: bool,
}
