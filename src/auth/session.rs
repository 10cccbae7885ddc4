//! Credential checks and the refresh-token lifecycle.
//!
//! Each user has at most one live refresh token, stored verbatim on the user
//! record. Login and refresh overwrite it, logout clears it. A refresh token is
//! accepted only if it verifies cryptographically *and* equals the stored value,
//! so a rotated or logged-out token is dead even before it expires.
//!
//! Rotation is a plain read then write with no compare-and-swap. Two concurrent
//! refreshes for the same user both succeed and the later write wins; the other
//! caller's new token fails with `TokenMismatch` on its next use.

use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::claims::AccessClaims;
use crate::auth::jwt::JwtKeys;
use crate::auth::password;
use crate::config::JwtConfig;
use crate::error::{AppError, AppResult};
use crate::users::repo::UserStore;
use crate::users::repo_types::{User, UserPatch};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn UserStore>,
    keys: JwtKeys,
}

impl SessionManager {
    pub fn new(store: Arc<dyn UserStore>, jwt: &JwtConfig) -> Self {
        Self {
            store,
            keys: JwtKeys::from_config(jwt),
        }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    /// `Ok(false)` for a wrong password. A corrupt stored hash is an internal error.
    pub fn verify_password(&self, user: &User, candidate: &str) -> AppResult<bool> {
        let ok = password::verify_password(candidate, &user.password_hash)
            .with_context(|| format!("verify password for user {}", user.id))?;
        Ok(ok)
    }

    /// Mints a new pair and makes its refresh token the only valid one for `user`.
    /// Returns the user record as stored after the write.
    pub async fn issue_token_pair(&self, user: &User) -> AppResult<(User, TokenPair)> {
        let access_token = self.keys.sign_access(user).context("sign access token")?;
        let refresh_token = self
            .keys
            .sign_refresh(user.id)
            .context("sign refresh token")?;

        let stored = self
            .store
            .update_fields(user.id, UserPatch::refresh_token(Some(refresh_token.clone())))
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        debug!(user_id = %user.id, "token pair issued");
        Ok((
            stored,
            TokenPair {
                access_token,
                refresh_token,
            },
        ))
    }

    /// Exchanges a live refresh token for a new pair. The presented token is
    /// unusable afterwards.
    pub async fn rotate_on_refresh(&self, presented: Option<&str>) -> AppResult<(User, TokenPair)> {
        let presented = presented
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::unauthorized("Unauthorized request"))?;

        let claims = self.keys.verify_refresh(presented).map_err(|e| {
            warn!(error = %e, "refresh token failed verification");
            AppError::InvalidToken
        })?;

        let Some(user) = self.store.find_by_id(claims.sub).await? else {
            warn!(user_id = %claims.sub, "refresh token for unknown user");
            return Err(AppError::TokenMismatch);
        };

        if user.refresh_token.as_deref() != Some(presented) {
            warn!(user_id = %user.id, "stale refresh token presented");
            return Err(AppError::TokenMismatch);
        }

        let rotated = self.issue_token_pair(&user).await?;
        info!(user_id = %user.id, "refresh token rotated");
        Ok(rotated)
    }

    /// Drops the stored refresh token. Calling it twice is fine.
    pub async fn invalidate_session(&self, user_id: Uuid) -> AppResult<()> {
        self.store
            .update_fields(user_id, UserPatch::refresh_token(None))
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;
        info!(user_id = %user_id, "session invalidated");
        Ok(())
    }

    pub fn verify_access(&self, token: &str) -> AppResult<AccessClaims> {
        self.keys.verify_access(token).map_err(|e| {
            debug!(error = %e, "access token failed verification");
            AppError::InvalidToken
        })
    }
}
