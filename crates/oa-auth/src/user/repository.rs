//! User Store
//!
//! Persistence abstraction for users plus its MongoDB adapter. Every call
//! honours the request deadline carried by the context.

use async_trait::async_trait;
use chrono::Utc;
use mongodb::{
    bson::{doc, Document},
    options::ReturnDocument,
    Collection, Database,
};
use oa_common::RequestContext;

use crate::shared::error::{is_duplicate_key, AuthError, Result};
use crate::user::entity::{UpdateUserParams, User};

pub const USERS_COLLECTION: &str = "users";

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. A taken email fails with
    /// [`AuthError::Duplicate`] on field `email`.
    async fn insert(&self, ctx: &RequestContext, user: User) -> Result<User>;

    async fn find_by_id(&self, ctx: &RequestContext, id: &str) -> Result<Option<User>>;

    async fn find_by_email(&self, ctx: &RequestContext, email: &str) -> Result<Option<User>>;

    /// Apply a partial update and return the updated user. An empty update
    /// is a validation error; an unknown id is [`AuthError::NotFound`].
    async fn update(
        &self,
        ctx: &RequestContext,
        id: &str,
        params: UpdateUserParams,
    ) -> Result<User>;

    /// Delete and return the removed user, if any.
    async fn delete(&self, ctx: &RequestContext, id: &str) -> Result<Option<User>>;
}

pub struct MongoUserStore {
    collection: Collection<User>,
}

impl MongoUserStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(USERS_COLLECTION),
        }
    }
}

fn update_document(params: &UpdateUserParams) -> Document {
    let mut set = doc! { "updated_at": mongodb::bson::DateTime::from_chrono(Utc::now()) };
    if let Some(full_name) = &params.full_name {
        set.insert("full_name", full_name.as_str());
    }
    if let Some(email) = &params.email {
        set.insert("email", email.as_str());
    }
    if let Some(password_hash) = &params.password_hash {
        set.insert("password_hash", password_hash.as_str());
    }
    if let Some(verified) = params.verified {
        set.insert("verified", verified);
    }
    if let Some(code) = &params.verification_code {
        set.insert("verification_code", code.as_str());
    }
    if let Some(expires_at) = params.verification_code_expires_at {
        set.insert(
            "verification_code_expires_at",
            mongodb::bson::DateTime::from_chrono(expires_at),
        );
    }
    doc! { "$set": set }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn insert(&self, ctx: &RequestContext, user: User) -> Result<User> {
        match ctx.run(self.collection.insert_one(&user)).await? {
            Ok(_) => Ok(user),
            Err(e) if is_duplicate_key(&e) => {
                Err(AuthError::duplicate("User", "email", user.email))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, ctx: &RequestContext, id: &str) -> Result<Option<User>> {
        Ok(ctx.run(self.collection.find_one(doc! { "_id": id })).await??)
    }

    async fn find_by_email(&self, ctx: &RequestContext, email: &str) -> Result<Option<User>> {
        Ok(ctx.run(self.collection.find_one(doc! { "email": email })).await??)
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        id: &str,
        params: UpdateUserParams,
    ) -> Result<User> {
        if params.is_empty() {
            return Err(AuthError::validation("no fields to update"));
        }

        let updated = ctx
            .run(
                self.collection
                    .find_one_and_update(doc! { "_id": id }, update_document(&params))
                    .return_document(ReturnDocument::After),
            )
            .await?;

        match updated {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(AuthError::not_found("User", id)),
            Err(e) if is_duplicate_key(&e) => Err(AuthError::duplicate(
                "User",
                "email",
                params.email.unwrap_or_default(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, ctx: &RequestContext, id: &str) -> Result<Option<User>> {
        Ok(ctx
            .run(self.collection.find_one_and_delete(doc! { "_id": id }))
            .await??)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_document_sets_only_present_fields() {
        let update = update_document(&UpdateUserParams {
            full_name: Some("Ada".to_string()),
            verified: Some(true),
            ..Default::default()
        });
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_str("full_name").unwrap(), "Ada");
        assert!(set.get_bool("verified").unwrap());
        assert!(set.contains_key("updated_at"));
        assert!(!set.contains_key("email"));
        assert!(!set.contains_key("password_hash"));
    }
}
