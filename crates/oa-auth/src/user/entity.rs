//! User Entity
//!
//! Identity of record. Email is unique across all users; the uniqueness is
//! enforced by an index on the `users` collection.

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,

    pub full_name: String,

    /// Stored normalized (trimmed, lower-case)
    pub email: String,

    /// PHC-encoded Argon2id hash
    pub password_hash: String,

    #[serde(default)]
    pub verified: bool,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub verification_code: Option<String>,

    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        with = "bson::serde_helpers::chrono_datetime_as_bson_datetime_optional"
    )]
    pub verification_code_expires_at: Option<DateTime<Utc>>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        email: impl Into<String>,
        full_name: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: bson::oid::ObjectId::new().to_hex(),
            full_name: full_name.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            verified: false,
            verification_code: None,
            verification_code_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateUserParams {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub verified: Option<bool>,
    pub verification_code: Option<String>,
    pub verification_code_expires_at: Option<DateTime<Utc>>,
}

impl UpdateUserParams {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.verified.is_none()
            && self.verification_code.is_none()
            && self.verification_code_expires_at.is_none()
    }

    /// Apply to an in-memory copy.
    pub fn apply(&self, user: &mut User) {
        if let Some(full_name) = &self.full_name {
            user.full_name = full_name.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(password_hash) = &self.password_hash {
            user.password_hash = password_hash.clone();
        }
        if let Some(verified) = self.verified {
            user.verified = verified;
        }
        if let Some(code) = &self.verification_code {
            user.verification_code = Some(code.clone());
        }
        if let Some(expires_at) = self.verification_code_expires_at {
            user.verification_code_expires_at = Some(expires_at);
        }
        user.updated_at = Utc::now();
    }
}
