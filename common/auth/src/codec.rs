use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::claims::{Claims, ClaimsRepr};
use crate::error::{AuthError, AuthResult};
use crate::roles::RoleAssignment;

pub const DEFAULT_TTL_SECONDS: i64 = 86_400;

/// Runtime configuration for token issuance and verification.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Process-wide signing secret, supplied via configuration at startup.
    pub secret: String,
    /// Token lifetime in seconds.
    pub ttl_seconds: i64,
    /// Allowable clock skew in seconds when validating exp.
    pub leeway_seconds: u32,
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ttl_seconds: DEFAULT_TTL_SECONDS,
            leeway_seconds: 0,
        }
    }

    pub fn with_ttl(mut self, seconds: i64) -> Self {
        self.ttl_seconds = seconds;
        self
    }
}

/// Identity snapshot embedded into a freshly issued token.
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub roles: Vec<RoleAssignment>,
}

pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// Creates and parses self-contained HS256 session tokens.
///
/// Verification is stateless; revocation is the registry's concern.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    leeway_seconds: u32,
}

impl TokenCodec {
    pub fn new(config: TokenConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            ttl: Duration::seconds(config.ttl_seconds),
            leeway_seconds: config.leeway_seconds,
        }
    }

    pub fn issue(&self, subject: &TokenSubject) -> AuthResult<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let token_id = Uuid::new_v4();

        let repr = ClaimsRepr {
            sub: subject.user_id.to_string(),
            name: subject.name.clone(),
            email: subject.email.clone(),
            roles: subject.roles.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: token_id.to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &repr, &self.encoding_key)
            .map_err(|err| AuthError::Signing(err.to_string()))?;

        let claims = Claims::try_from(repr)?;
        debug!(user_id = claims.user_id, jti = %claims.token_id, "issued session token");

        Ok(IssuedToken { token, claims })
    }

    /// Verifies signature and expiry; never panics on malformed input.
    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.leeway_seconds.into();
        validation.validate_aud = false;

        let token_data = decode::<Value>(token, &self.decoding_key, &validation)?;
        Claims::try_from(token_data.claims)
    }
}
