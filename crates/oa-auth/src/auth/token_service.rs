//! Token Issuer
//!
//! HS256 JWTs. Access and refresh tokens share one claims shape and differ
//! only in signing secret and lifetime, so a token validated against the
//! other kind's secret is rejected.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Signed token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub user_id: String,
    pub session_id: String,
    /// Unique per token, so two pairs minted in the same second differ
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub iss: String,
    /// Always equal to the issuer
    pub aud: String,
}

impl TokenClaims {
    pub fn new(
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        issuer: impl Into<String>,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        let issuer = issuer.into();
        let iat = issued_at.timestamp();
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            jti: bson::oid::ObjectId::new().to_hex(),
            iat,
            exp: iat.saturating_add(ttl_secs),
            nbf: iat,
            aud: issuer.clone(),
            iss: issuer,
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("invalid token claims: {0}")]
    InvalidClaims(String),

    #[error("unexpected token algorithm")]
    InvalidAlgorithm,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("signing secret is empty")]
    EmptySecret,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Pluggable token format.
pub trait Authenticator: Send + Sync {
    fn issue(&self, claims: &TokenClaims, secret: &str) -> Result<String, TokenError>;

    fn validate(&self, token: &str, secret: &str) -> Result<TokenClaims, TokenError>;
}

/// JWT implementation of [`Authenticator`].
pub struct JwtAuthenticator {
    validation: Validation,
}

impl JwtAuthenticator {
    /// Tokens must name `issuer` as both issuer and audience.
    pub fn new(issuer: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[issuer]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "aud"]);
        validation.validate_nbf = true;
        validation.leeway = 0;

        Self { validation }
    }
}

impl Authenticator for JwtAuthenticator {
    fn issue(&self, claims: &TokenClaims, secret: &str) -> Result<String, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn validate(&self, token: &str, secret: &str) -> Result<TokenClaims, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }
        decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &self.validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::InvalidAlgorithm => TokenError::InvalidAlgorithm,
            ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::ImmatureSignature
            | ErrorKind::MissingRequiredClaim(_) => TokenError::InvalidClaims(e.to_string()),
            _ => TokenError::Malformed(e.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISSUER: &str = "optimize-api";

    fn claims(ttl: Duration) -> TokenClaims {
        TokenClaims::new("user-1", "session-1", ISSUER, Utc::now(), ttl)
    }

    #[test]
    fn test_issue_then_validate_recovers_claims() {
        let authenticator = JwtAuthenticator::new(ISSUER);
        let claims = claims(Duration::from_secs(900));

        let token = authenticator.issue(&claims, "access-secret").unwrap();
        let decoded = authenticator.validate(&token, "access-secret").unwrap();

        assert_eq!(decoded, claims);
        assert_eq!(decoded.aud, decoded.iss);
    }

    #[test]
    fn test_other_secret_rejected() {
        let authenticator = JwtAuthenticator::new(ISSUER);
        let token = authenticator
            .issue(&claims(Duration::from_secs(900)), "access-secret")
            .unwrap();

        assert_eq!(
            authenticator.validate(&token, "refresh-secret").unwrap_err(),
            TokenError::InvalidSignature
        );
    }

    #[test]
    fn test_expired_token_rejected() {
        let authenticator = JwtAuthenticator::new(ISSUER);
        let issued_at = Utc::now() - chrono::Duration::hours(1);
        let claims = TokenClaims::new("user-1", "session-1", ISSUER, issued_at, Duration::from_secs(60));
        let token = authenticator.issue(&claims, "access-secret").unwrap();

        assert_eq!(
            authenticator.validate(&token, "access-secret").unwrap_err(),
            TokenError::Expired
        );
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let token = JwtAuthenticator::new("someone-else")
            .issue(
                &TokenClaims::new("u", "s", "someone-else", Utc::now(), Duration::from_secs(60)),
                "access-secret",
            )
            .unwrap();

        let err = JwtAuthenticator::new(ISSUER)
            .validate(&token, "access-secret")
            .unwrap_err();
        assert!(matches!(err, TokenError::InvalidClaims(_)));
    }

    #[test]
    fn test_wrong_algorithm_rejected() {
        let claims = claims(Duration::from_secs(60));
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(b"access-secret"),
        )
        .unwrap();

        assert_eq!(
            JwtAuthenticator::new(ISSUER)
                .validate(&token, "access-secret")
                .unwrap_err(),
            TokenError::InvalidAlgorithm
        );
    }

    #[test]
    fn test_missing_expiry_rejected() {
        let token = encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({
                "user_id": "u", "session_id": "s", "jti": "j",
                "iat": 0, "nbf": 0, "iss": ISSUER, "aud": ISSUER
            }),
            &EncodingKey::from_secret(b"access-secret"),
        )
        .unwrap();

        assert!(JwtAuthenticator::new(ISSUER)
            .validate(&token, "access-secret")
            .is_err());
    }

    #[test]
    fn test_garbage_is_malformed() {
        let err = JwtAuthenticator::new(ISSUER)
            .validate("not.a.token", "access-secret")
            .unwrap_err();
        assert!(matches!(err, TokenError::Malformed(_)));
    }

    #[test]
    fn test_empty_secret_rejected() {
        let authenticator = JwtAuthenticator::new(ISSUER);
        assert_eq!(
            authenticator
                .issue(&claims(Duration::from_secs(60)), "")
                .unwrap_err(),
            TokenError::EmptySecret
        );
    }

    #[test]
    fn test_expires_at_matches_ttl() {
        let now = Utc::now();
        let claims = TokenClaims::new("u", "s", ISSUER, now, Duration::from_secs(900));
        assert_eq!(claims.expires_at().unwrap().timestamp(), now.timestamp() + 900);
    }
}
