use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;
use uuid::Uuid;

use crate::auth::cookies::{read_cookie, ACCESS_COOKIE};
use crate::error::AppError;
use crate::state::AppState;

/// Extracts and validates the access token, returning the user ID.
///
/// The token comes from `Authorization: Bearer ...` or, failing that, the
/// `accessToken` cookie.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_token = match parts.headers.get(axum::http::header::AUTHORIZATION) {
            Some(value) => {
                let value = value
                    .to_str()
                    .map_err(|_| AppError::unauthorized("Invalid Authorization header"))?;
                let token = value
                    .strip_prefix("Bearer ")
                    .or_else(|| value.strip_prefix("bearer "))
                    .ok_or_else(|| AppError::unauthorized("Invalid auth scheme"))?;
                Some(token.trim().to_string())
            }
            None => None,
        };

        let token = header_token
            .or_else(|| read_cookie(&parts.headers, ACCESS_COOKIE))
            .ok_or_else(|| AppError::unauthorized("Unauthorized request"))?;

        let claims = state.sessions.verify_access(&token).map_err(|e| {
            warn!("invalid or expired access token");
            e
        })?;

        Ok(AuthUser(claims.sub))
    }
}
