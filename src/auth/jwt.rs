use std::time::Duration;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::auth::claims::{AccessClaims, RefreshClaims, TokenKind};
use crate::config::{JwtConfig, TokenConfig, MAX_TTL_MINUTES};
use crate::users::repo_types::User;

/// Secret and lifetime for one kind of token.
#[derive(Clone)]
pub struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
    pub ttl: Duration,
}

impl SigningKey {
    pub fn new(cfg: &TokenConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            ttl: Duration::from_secs(cfg.ttl_minutes.clamp(0, MAX_TTL_MINUTES) as u64 * 60),
        }
    }
}

/// Access and refresh signing keys plus the shared issuer/audience.
#[derive(Clone)]
pub struct JwtKeys {
    pub access: SigningKey,
    pub refresh: SigningKey,
    pub issuer: String,
    pub audience: String,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            access: SigningKey::new(&cfg.access),
            refresh: SigningKey::new(&cfg.refresh),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
        }
    }

    fn window(ttl: Duration) -> (usize, usize) {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        (now.unix_timestamp() as usize, exp.unix_timestamp() as usize)
    }

    fn sign_claims<C: Serialize>(claims: &C, key: &SigningKey) -> anyhow::Result<String> {
        Ok(encode(&Header::default(), claims, &key.encoding)?)
    }

    fn verify_claims<C: DeserializeOwned>(&self, token: &str, key: &SigningKey) -> anyhow::Result<C> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<C>(token, &key.decoding, &validation)?;
        Ok(data.claims)
    }

    pub fn sign_access(&self, user: &User) -> anyhow::Result<String> {
        let (iat, exp) = Self::window(self.access.ttl);
        let claims = AccessClaims {
            sub: user.id,
            email: user.email.clone(),
            handle: user.handle.clone(),
            full_name: user.full_name.clone(),
            iat,
            exp,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Uuid::new_v4(),
            kind: TokenKind::Access,
        };
        let token = Self::sign_claims(&claims, &self.access)?;
        debug!(user_id = %user.id, jti = %claims.jti, "access token signed");
        Ok(token)
    }

    pub fn sign_refresh(&self, user_id: Uuid) -> anyhow::Result<String> {
        let (iat, exp) = Self::window(self.refresh.ttl);
        let claims = RefreshClaims {
            sub: user_id,
            iat,
            exp,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Uuid::new_v4(),
            kind: TokenKind::Refresh,
        };
        let token = Self::sign_claims(&claims, &self.refresh)?;
        debug!(user_id = %user_id, jti = %claims.jti, "refresh token signed");
        Ok(token)
    }

    pub fn verify_access(&self, token: &str) -> anyhow::Result<AccessClaims> {
        let claims: AccessClaims = self.verify_claims(token, &self.access)?;
        if claims.kind != TokenKind::Access {
            anyhow::bail!("not an access token");
        }
        debug!(user_id = %claims.sub, "access token verified");
        Ok(claims)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<RefreshClaims> {
        let claims: RefreshClaims = self.verify_claims(token, &self.refresh)?;
        if claims.kind != TokenKind::Refresh {
            anyhow::bail!("not a refresh token");
        }
        debug!(user_id = %claims.sub, "refresh token verified");
        Ok(claims)
    }
}
