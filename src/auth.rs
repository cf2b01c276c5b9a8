use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{config::AppConfig, error::AppError, repository::RepositoryState};

/// Claims
///
/// Payload of a session token. Signed with `AppConfig::jwt_secret` (HS256) when the
/// user authenticates and validated on every authenticated request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's id.
    pub sub: Uuid,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: usize,
    /// Issued At (iat), seconds since the epoch.
    pub iat: usize,
}

/// issue_token
///
/// Signs a session token for `user_id` that expires after the configured number of days.
pub fn issue_token(config: &AppConfig, user_id: Uuid) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        iat: now.timestamp() as usize,
        exp: (now + Duration::days(config.jwt_expires_in_days)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;
    Ok(token)
}

/// AuthUser
///
/// The resolved identity of an authenticated request. It carries no role: roles are
/// per organization and resolved through [`crate::membership::Membership`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
}

/// AuthUser Extractor Implementation
///
/// Makes `AuthUser` usable as a handler argument. The flow is:
/// 1. Bearer token extraction from the `Authorization` header.
/// 2. JWT decoding with expiration validation.
/// 3. Lookup of the subject so tokens of deleted users stop working.
///
/// Rejection: `AppError::Unauthenticated` (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthenticated("Missing auth token.".to_string()))?;

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => {
                    AppError::Unauthenticated("Auth token expired.".to_string())
                }
                _ => AppError::Unauthenticated("Invalid auth token.".to_string()),
            }
        })?;

        let user = repo
            .get_user_by_id(token_data.claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthenticated("Invalid auth token.".to_string()))?;

        Ok(AuthUser { id: user.id })
    }
}
