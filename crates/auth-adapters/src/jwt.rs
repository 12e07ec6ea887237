//! # Access tokens
//!
//! Supabase access tokens are HS256 JWTs signed with the project's JWT
//! secret, audience `authenticated`, `sub` = user id. [`JwtVerifier`]
//! checks them; [`JwtIssuer`] mints the same shape for the in-memory backend.

use chrono::Utc;
use domains::{BackendError, BackendResult, Identity, Session, TokenVerifier, UserId};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub const AUDIENCE: &str = "authenticated";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub:   UserId,
    pub aud:   String,
    pub exp:   i64,
    pub iat:   i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub role:  Option<String>,
}

pub struct JwtVerifier {
    key:        DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[AUDIENCE]);
        validation.set_required_spec_claims(&["exp", "sub", "aud"]);
        Self { key: DecodingKey::from_secret(secret), validation }
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> BackendResult<Identity> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "access token rejected");
            BackendError::new("Invalid or expired token.")
        })?;
        Ok(Identity { user_id: data.claims.sub, email: data.claims.email })
    }
}

pub struct JwtIssuer {
    key: EncodingKey,
    ttl: i64,
}

impl JwtIssuer {
    pub fn new(secret: &[u8], ttl_secs: i64) -> Self {
        Self { key: EncodingKey::from_secret(secret), ttl: ttl_secs }
    }

    pub fn issue(&self, user_id: UserId, email: Option<&str>) -> BackendResult<Session> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub:   user_id,
            aud:   AUDIENCE.to_string(),
            exp:   now + self.ttl,
            iat:   now,
            email: email.map(str::to_string),
            role:  Some(AUDIENCE.to_string()),
        };
        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| BackendError::new(format!("could not sign token: {e}")))?;
        Ok(Session { access_token, refresh_token: None, expires_in: self.ttl, user_id })
    }
}
