use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::Identity;
use crate::errors::AppError;

/// HS256 secret shared with the identity provider that issues session tokens.
#[derive(Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("exp_hours", &self.exp_hours)
            .finish()
    }
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>, exp_hours: i64) -> Self {
        Self {
            secret: Arc::new(secret.into().into_bytes()),
            exp_hours,
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        let exp_hours = std::env::var("JWT_EXP_HOURS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(24))
            .map_err(|_| AppError::configuration("JWT_EXP_HOURS must be a valid integer"))?;

        Ok(Self::new(secret, exp_hours))
    }

    /// Mint a token the way the identity provider does. Used by the CLI and tests.
    pub fn encode(&self, user_id: Uuid, email: &str) -> Result<String, AppError> {
        use chrono::{Duration, Utc};

        let now = Utc::now();
        let exp = now + Duration::hours(self.exp_hours);

        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::internal(format!("failed to sign token: {err}")))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::unauthenticated(format!("invalid token: {err}")))
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
    pub iat: usize,
}

/// Caller identity taken from a valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

impl AuthUser {
    pub fn identity(&self) -> &Identity {
        &self.0
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| AppError::unauthenticated("Authorization header missing"))?;
        let claims = state.config.jwt.decode(token)?;

        Ok(AuthUser(Identity::new(claims.sub, claims.email)))
    }
}

/// Like `AuthUser`, but a missing or invalid token yields `None` instead of a
/// rejection. Used where anonymous callers get a decision rather than a 401.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<Identity>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let identity = match bearer_token(parts) {
            Some(token) => match state.config.jwt.decode(token) {
                Ok(claims) => Some(Identity::new(claims.sub, claims.email)),
                Err(err) => {
                    tracing::debug!(error = %err, "ignoring invalid bearer token");
                    None
                }
            },
            None => None,
        };

        Ok(MaybeAuthUser(identity))
    }
}
