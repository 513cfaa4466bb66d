use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::session::{BackendSession, SessionError, SessionInfo};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: i64,
    pub iat: i64,
    pub anonymous: bool,
}

pub fn create_anonymous_token(secret: &str, ttl_secs: i64) -> Result<(String, Claims), SessionError> {
    let now = Utc::now();
    let claims = Claims {
        sub: Uuid::new_v4(),
        exp: (now + Duration::seconds(ttl_secs)).timestamp(),
        iat: now.timestamp(),
        anonymous: true,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok((token, claims))
}

pub fn verify_token(token: &str, secret: &str) -> Result<TokenData<Claims>, SessionError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    Ok(decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?)
}

/// Backend session made of self-issued anonymous tokens. The session is
/// live while the held token still verifies.
pub struct JwtBackendSession {
    secret: String,
    ttl_secs: i64,
    token: RwLock<Option<String>>,
}

impl JwtBackendSession {
    pub fn new(secret: impl Into<String>, ttl_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            ttl_secs,
            token: RwLock::new(None),
        }
    }
}

#[async_trait]
impl BackendSession for JwtBackendSession {
    async fn login_state(&self) -> Option<SessionInfo> {
        let token = self.token.read().await.clone()?;
        match verify_token(&token, &self.secret) {
            Ok(data) => Some(SessionInfo::from(data.claims)),
            Err(e) => {
                tracing::debug!(error = %e, "Held session token no longer valid");
                None
            }
        }
    }

    async fn sign_in_anonymously(&self) -> Result<SessionInfo, SessionError> {
        let (token, claims) = create_anonymous_token(&self.secret, self.ttl_secs)?;
        *self.token.write().await = Some(token);
        tracing::info!(session_id = %claims.sub, "Anonymous backend session started");
        Ok(SessionInfo::from(claims))
    }
}

impl From<Claims> for SessionInfo {
    fn from(claims: Claims) -> Self {
        Self {
            session_id: claims.sub,
            anonymous: claims.anonymous,
            expires_at: claims.exp,
        }
    }
}
