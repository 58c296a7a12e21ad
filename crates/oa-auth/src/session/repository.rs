//! Session Store
//!
//! Token rotation is a single-document `$set`, so a session never exposes a
//! half-written pair.

use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{bson::doc, options::ReturnDocument, Collection, Database};
use oa_common::RequestContext;

use crate::session::entity::{Session, UpdateTokensParams};
use crate::shared::error::{AuthError, Result};

pub const SESSIONS_COLLECTION: &str = "sessions";

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, ctx: &RequestContext, session: Session) -> Result<Session>;

    async fn find_by_id(&self, ctx: &RequestContext, id: &str) -> Result<Option<Session>>;

    async fn find_by_user_id(&self, ctx: &RequestContext, user_id: &str) -> Result<Vec<Session>>;

    /// Atomically replace the token pair and both expiries.
    async fn update_tokens(
        &self,
        ctx: &RequestContext,
        id: &str,
        params: UpdateTokensParams,
    ) -> Result<Session>;
}

pub struct MongoSessionStore {
    collection: Collection<Session>,
}

impl MongoSessionStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(SESSIONS_COLLECTION),
        }
    }
}

#[async_trait]
impl SessionStore for MongoSessionStore {
    async fn insert(&self, ctx: &RequestContext, session: Session) -> Result<Session> {
        ctx.run(self.collection.insert_one(&session)).await??;
        Ok(session)
    }

    async fn find_by_id(&self, ctx: &RequestContext, id: &str) -> Result<Option<Session>> {
        Ok(ctx.run(self.collection.find_one(doc! { "_id": id })).await??)
    }

    async fn find_by_user_id(&self, ctx: &RequestContext, user_id: &str) -> Result<Vec<Session>> {
        let cursor = ctx
            .run(self.collection.find(doc! { "user_id": user_id }))
            .await??;
        Ok(ctx.run(cursor.try_collect()).await??)
    }

    async fn update_tokens(
        &self,
        ctx: &RequestContext,
        id: &str,
        params: UpdateTokensParams,
    ) -> Result<Session> {
        let update = doc! {
            "$set": {
                "access_token": &params.access_token,
                "refresh_token": &params.refresh_token,
                "access_token_expires_at": mongodb::bson::DateTime::from_chrono(params.access_token_expires_at),
                "refresh_token_expires_at": mongodb::bson::DateTime::from_chrono(params.refresh_token_expires_at),
                "updated_at": mongodb::bson::DateTime::from_chrono(Utc::now()),
            }
        };

        ctx.run(
            self.collection
                .find_one_and_update(doc! { "_id": id }, update)
                .return_document(ReturnDocument::After),
        )
        .await??
        .ok_or_else(|| AuthError::not_found("Session", id))
    }
}
