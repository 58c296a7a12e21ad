//! Edge request and response bodies.
//!
//! Unknown fields are rejected; missing fields decode as empty and are
//! reported by the validator.

use oa_common::auth_v1::TokenPair;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::validation::{Validate, Validator};
use oa_common::FieldViolation;

/// Login request
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(default, deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Sign-up request
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(default, deny_unknown_fields)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

/// Token refresh request
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(default, deny_unknown_fields)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Issued token pair
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }
    }
}

impl Validate for LoginRequest {
    fn validate(&self, validator: &Validator, violations: &mut Vec<FieldViolation>) {
        validator.email("email", &self.email, violations);
        validator.required("password", &self.password, violations);
    }
}

impl Validate for SignUpRequest {
    fn validate(&self, validator: &Validator, violations: &mut Vec<FieldViolation>) {
        validator.email("email", &self.email, violations);
        validator.required("password", &self.password, violations);
        validator.required("full_name", &self.full_name, violations);
    }
}

impl Validate for RefreshRequest {
    fn validate(&self, validator: &Validator, violations: &mut Vec<FieldViolation>) {
        validator.required("refresh_token", &self.refresh_token, violations);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_fields_rejected() {
        let result: Result<LoginRequest, _> =
            serde_json::from_str(r#"{"email":"a@x.com","password":"p","admin":true}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let request: SignUpRequest = serde_json::from_str(r#"{"email":"a@x.com"}"#).unwrap();
        assert_eq!(request.password, "");
        assert_eq!(request.full_name, "");
    }
}
