//! Identity Store

use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{bson::doc, Collection, Database};
use oa_common::RequestContext;

use crate::identity::entity::Identity;
use crate::shared::error::{is_duplicate_key, AuthError, Result};

pub const IDENTITIES_COLLECTION: &str = "identities";

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn insert(&self, ctx: &RequestContext, identity: Identity) -> Result<Identity>;

    async fn find_by_user_id(&self, ctx: &RequestContext, user_id: &str) -> Result<Vec<Identity>>;

    async fn find_by_provider(
        &self,
        ctx: &RequestContext,
        provider_id: &str,
        provider: &str,
    ) -> Result<Option<Identity>>;

    /// Stamp the last-login time on the user's identity. Fails with
    /// [`AuthError::NotFound`] when the user has no identity.
    async fn update_last_login(&self, ctx: &RequestContext, user_id: &str) -> Result<()>;
}

pub struct MongoIdentityStore {
    collection: Collection<Identity>,
}

impl MongoIdentityStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(IDENTITIES_COLLECTION),
        }
    }
}

#[async_trait]
impl IdentityStore for MongoIdentityStore {
    async fn insert(&self, ctx: &RequestContext, identity: Identity) -> Result<Identity> {
        match ctx.run(self.collection.insert_one(&identity)).await? {
            Ok(_) => Ok(identity),
            Err(e) if is_duplicate_key(&e) => Err(AuthError::duplicate(
                "Identity",
                "user_id",
                identity.user_id,
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_user_id(&self, ctx: &RequestContext, user_id: &str) -> Result<Vec<Identity>> {
        let cursor = ctx
            .run(self.collection.find(doc! { "user_id": user_id }))
            .await??;
        Ok(ctx.run(cursor.try_collect()).await??)
    }

    async fn find_by_provider(
        &self,
        ctx: &RequestContext,
        provider_id: &str,
        provider: &str,
    ) -> Result<Option<Identity>> {
        Ok(ctx
            .run(self.collection.find_one(doc! {
                "provider_id": provider_id,
                "provider": provider,
            }))
            .await??)
    }

    async fn update_last_login(&self, ctx: &RequestContext, user_id: &str) -> Result<()> {
        let now = mongodb::bson::DateTime::from_chrono(Utc::now());
        let result = ctx
            .run(self.collection.update_one(
                doc! { "user_id": user_id },
                doc! { "$set": { "last_login_at": now, "updated_at": now } },
            ))
            .await??;

        if result.matched_count == 0 {
            return Err(AuthError::not_found("Identity", user_id));
        }
        Ok(())
    }
}
