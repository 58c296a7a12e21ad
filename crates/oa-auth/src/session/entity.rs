//! Session Entity
//!
//! One row per authentication event. The token pair is rotated in place so
//! the session id carried in token claims always names the current pair.

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "_id")]
    pub id: String,

    pub user_id: String,

    /// Empty until the first pair is stored
    #[serde(default)]
    pub access_token: String,

    #[serde(default)]
    pub refresh_token: String,

    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        with = "bson::serde_helpers::chrono_datetime_as_bson_datetime_optional"
    )]
    pub access_token_expires_at: Option<DateTime<Utc>>,

    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        with = "bson::serde_helpers::chrono_datetime_as_bson_datetime_optional"
    )]
    pub refresh_token_expires_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ip_address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user_agent: Option<String>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: bson::oid::ObjectId::new().to_hex(),
            user_id: user_id.into(),
            access_token: String::new(),
            refresh_token: String::new(),
            access_token_expires_at: None,
            refresh_token_expires_at: None,
            ip_address: None,
            user_agent: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}

/// The complete replacement token pair written by one atomic update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateTokensParams {
    pub access_token: String,
    pub refresh_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

impl UpdateTokensParams {
    pub fn apply(&self, session: &mut Session) {
        session.access_token = self.access_token.clone();
        session.refresh_token = self.refresh_token.clone();
        session.access_token_expires_at = Some(self.access_token_expires_at);
        session.refresh_token_expires_at = Some(self.refresh_token_expires_at);
        session.updated_at = Utc::now();
    }
}
