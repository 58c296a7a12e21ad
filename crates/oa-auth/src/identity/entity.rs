//! Identity Entity
//!
//! Links a user to an authentication provider. Keyed by
//! `(provider_id, provider)`; `user_id` is a soft reference.

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider name for local email/password credentials.
pub const EMAIL_PROVIDER: &str = "email";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "_id")]
    pub id: String,

    pub user_id: String,

    pub provider: String,

    /// Provider-specific subject id; empty for local credentials
    #[serde(default)]
    pub provider_id: String,

    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        with = "bson::serde_helpers::chrono_datetime_as_bson_datetime_optional"
    )]
    pub last_login_at: Option<DateTime<Utc>>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    pub fn new(
        user_id: impl Into<String>,
        provider: impl Into<String>,
        provider_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: bson::oid::ObjectId::new().to_hex(),
            user_id: user_id.into(),
            provider: provider.into(),
            provider_id: provider_id.into(),
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Local email/password identity.
    pub fn email(user_id: impl Into<String>) -> Self {
        Self::new(user_id, EMAIL_PROVIDER, "")
    }
}
