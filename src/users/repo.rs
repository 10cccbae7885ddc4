use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::users::repo_types::{ChannelProfile, NewUser, User, UserPatch, WatchedVideo};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate {0}")]
    Duplicate(&'static str),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Persistence for user records and the read models built on them.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// First user whose handle or email matches. Both arguments are normalized.
    async fn find_by_handle_or_email(
        &self,
        handle: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Writes only the columns set in `patch`. `Ok(None)` when the user is gone.
    async fn update_fields(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>, StoreError>;

    async fn channel_profile(
        &self,
        handle: &str,
        viewer: Uuid,
    ) -> Result<Option<ChannelProfile>, StoreError>;

    /// Watched videos in watch order, skipping videos that no longer exist.
    async fn watch_history(&self, user_id: Uuid) -> Result<Vec<WatchedVideo>, StoreError>;
}

const USER_COLUMNS: &str = "id, handle, email, password_hash, full_name, avatar, cover_image, \
                            watch_history, refresh_token, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_db_err(e: sqlx::Error) -> StoreError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            let field = match db_err.constraint() {
                Some(c) if c.contains("handle") => "handle",
                Some(c) if c.contains("email") => "email",
                _ => "handle or email",
            };
            return StoreError::Duplicate(field);
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_handle_or_email(
        &self,
        handle: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE handle = $1 OR email = $2 ORDER BY created_at LIMIT 1"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(handle)
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO users (id, handle, email, password_hash, full_name, avatar, cover_image)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new_user.handle)
            .bind(&new_user.email)
            .bind(&new_user.password_hash)
            .bind(&new_user.full_name)
            .bind(&new_user.avatar)
            .bind(&new_user.cover_image)
            .fetch_one(&self.db)
            .await
            .map_err(map_db_err)
    }

    async fn update_fields(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>, StoreError> {
        if patch.is_empty() {
            return self.find_by_id(id).await;
        }
        let sql = format!(
            r#"
            UPDATE users SET
                email         = COALESCE($2, email),
                full_name     = COALESCE($3, full_name),
                avatar        = COALESCE($4, avatar),
                cover_image   = COALESCE($5, cover_image),
                password_hash = COALESCE($6, password_hash),
                refresh_token = CASE WHEN $7 THEN $8 ELSE refresh_token END,
                updated_at    = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let set_token = patch.refresh_token.is_some();
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(patch.email)
            .bind(patch.full_name)
            .bind(patch.avatar)
            .bind(patch.cover_image)
            .bind(patch.password_hash)
            .bind(set_token)
            .bind(patch.refresh_token.flatten())
            .fetch_optional(&self.db)
            .await
            .map_err(map_db_err)
    }

    async fn channel_profile(
        &self,
        handle: &str,
        viewer: Uuid,
    ) -> Result<Option<ChannelProfile>, StoreError> {
        let profile = sqlx::query_as::<_, ChannelProfile>(
            r#"
            SELECT u.id, u.handle, u.full_name, u.email, u.avatar, u.cover_image,
                   (SELECT COUNT(*) FROM subscriptions s WHERE s.channel_id = u.id)    AS subscribers_count,
                   (SELECT COUNT(*) FROM subscriptions s WHERE s.subscriber_id = u.id) AS subscribed_to_count,
                   EXISTS (
                       SELECT 1 FROM subscriptions s
                        WHERE s.channel_id = u.id AND s.subscriber_id = $2
                   ) AS is_subscribed
              FROM users u
             WHERE u.handle = $1
            "#,
        )
        .bind(handle)
        .bind(viewer)
        .fetch_optional(&self.db)
        .await?;
        Ok(profile)
    }

    async fn watch_history(&self, user_id: Uuid) -> Result<Vec<WatchedVideo>, StoreError> {
        let rows = sqlx::query_as::<_, WatchedVideo>(
            r#"
            SELECT v.id, v.title, v.description, v.thumbnail, v.duration_secs, v.views, v.created_at,
                   o.id AS owner_id, o.handle AS owner_handle,
                   o.full_name AS owner_full_name, o.avatar AS owner_avatar
              FROM users u
             CROSS JOIN LATERAL unnest(u.watch_history) WITH ORDINALITY AS h(video_id, ord)
              JOIN videos v ON v.id = h.video_id
              JOIN users o  ON o.id = v.owner_id
             WHERE u.id = $1
             ORDER BY h.ord
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}
