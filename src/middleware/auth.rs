//! Bearer-token authentication.
//!
//! The credential check itself is a black box behind [`AuthProvider`]; the
//! shipped provider validates HS256 JWTs whose `sub` is the user id and whose
//! `role` claim names an M&E role. Handlers receive the result as an
//! [`Actor`] extractor, so identity always travels with the request.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use anyhow::Context;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::middleware::rbac::Role;
use crate::models::Actor;
use crate::AppState;

pub trait AuthProvider: Send + Sync {
    /// Resolve the bearer credential of a request into the acting user.
    fn current_actor(&self, bearer: Option<&str>) -> Result<Actor, AppError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct JwtAuthProvider {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtAuthProvider {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Mint a token for `actor`. Used by the CLI and tests; production tokens
    /// come from the identity service.
    pub fn issue(&self, actor: &Actor, ttl: Duration) -> anyhow::Result<String> {
        let now = Utc::now();
        let expires = now
            .checked_add_signed(ttl)
            .context("token lifetime overflows the calendar")?;
        let claims = Claims {
            sub: actor.id.clone(),
            role: actor.role.to_string(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }
}

/// Token lifetime from a whole number of hours. Must be positive.
pub fn ttl_from_hours(hours: i64) -> anyhow::Result<Duration> {
    if hours <= 0 {
        anyhow::bail!("token lifetime must be a positive number of hours, got {}", hours);
    }
    Duration::try_hours(hours).with_context(|| format!("token lifetime of {} hours is out of range", hours))
}

impl AuthProvider for JwtAuthProvider {
    fn current_actor(&self, bearer: Option<&str>) -> Result<Actor, AppError> {
        let token = bearer
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;

        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            tracing::warn!("bearer token rejected: {}", e);
            AppError::Unauthorized(e.to_string())
        })?;

        let claims = data.claims;
        if claims.sub.trim().is_empty() {
            return Err(AppError::Unauthorized("token has an empty subject".into()));
        }
        Ok(Actor::new(claims.sub, Role::parse(&claims.role)))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let bearer = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);
        state.auth.current_actor(bearer)
    }
}
