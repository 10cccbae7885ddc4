use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::users::repo_types::User;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref HANDLE_RE: Regex = Regex::new(r"^[a-z0-9_.-]{3,30}$").unwrap();
}

pub(crate) fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_handle(handle: &str) -> bool {
    HANDLE_RE.is_match(handle)
}

pub(crate) fn require(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(())
}

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default, alias = "userName", alias = "username")]
    pub handle: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "fullName")]
    pub full_name: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default, alias = "coverImage")]
    pub cover_image: Option<String>,
}

impl RegisterRequest {
    /// Checks required fields and normalizes handle and email in place.
    pub fn validate(&mut self) -> AppResult<()> {
        require("handle", &self.handle)?;
        require("email", &self.email)?;
        require("full_name", &self.full_name)?;
        require("password", &self.password)?;
        require("avatar", &self.avatar)?;

        self.handle = normalize(&self.handle);
        self.email = normalize(&self.email);
        self.full_name = self.full_name.trim().to_string();
        self.avatar = self.avatar.trim().to_string();
        self.cover_image = self
            .cover_image
            .take()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        if !is_valid_email(&self.email) {
            return Err(AppError::validation("Invalid email"));
        }
        if !is_valid_handle(&self.handle) {
            return Err(AppError::validation(
                "Handle must be 3-30 characters of a-z, 0-9, '_', '.', '-'",
            ));
        }
        Ok(())
    }
}

/// Request body for login. Either handle or email identifies the user.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default, alias = "userName", alias = "username")]
    pub handle: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    /// Normalized `(handle, email)`; at least one is present. Also requires a password.
    pub fn identity(&self) -> AppResult<(Option<String>, Option<String>)> {
        require("password", &self.password)?;
        let handle = self.handle.as_deref().map(normalize).filter(|h| !h.is_empty());
        let email = self.email.as_deref().map(normalize).filter(|e| !e.is_empty());
        if handle.is_none() && email.is_none() {
            return Err(AppError::validation("handle or email is required"));
        }
        Ok((handle, email))
    }
}

/// Request body for token refresh. The cookie wins when both are sent.
#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    #[serde(default, alias = "refreshToken")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default, alias = "oldPassword")]
    pub old_password: String,
    #[serde(default, alias = "newPassword")]
    pub new_password: String,
}

/// Response returned after login or refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: PublicUser,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub handle: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            handle: u.handle.clone(),
            email: u.email.clone(),
            full_name: u.full_name.clone(),
            avatar: u.avatar.clone(),
            cover_image: u.cover_image.clone(),
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}
