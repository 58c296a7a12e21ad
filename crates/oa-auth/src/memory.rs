//! In-memory stores.
//!
//! Same contracts as the MongoDB adapters, including email uniqueness and
//! the single-document token update, for tests and local runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use oa_common::RequestContext;
use parking_lot::RwLock;

use crate::identity::{Identity, IdentityStore};
use crate::session::{Session, SessionStore, UpdateTokensParams};
use crate::shared::error::{AuthError, Result};
use crate::user::{UpdateUserParams, User, UserStore};

#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert(&self, ctx: &RequestContext, user: User) -> Result<User> {
        ctx.check()?;
        let mut users = self.users.write();
        if users.values().any(|u| u.email == user.email) {
            return Err(AuthError::duplicate("User", "email", user.email));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, ctx: &RequestContext, id: &str) -> Result<Option<User>> {
        ctx.check()?;
        Ok(self.users.read().get(id).cloned())
    }

    async fn find_by_email(&self, ctx: &RequestContext, email: &str) -> Result<Option<User>> {
        ctx.check()?;
        Ok(self.users.read().values().find(|u| u.email == email).cloned())
    }

    async fn update(&self, ctx: &RequestContext, id: &str, params: UpdateUserParams) -> Result<User> {
        ctx.check()?;
        if params.is_empty() {
            return Err(AuthError::validation("no fields to update"));
        }
        let mut users = self.users.write();
        if let Some(email) = &params.email {
            if users.values().any(|u| u.id != id && &u.email == email) {
                return Err(AuthError::duplicate("User", "email", email.clone()));
            }
        }
        let user = users
            .get_mut(id)
            .ok_or_else(|| AuthError::not_found("User", id))?;
        params.apply(user);
        Ok(user.clone())
    }

    async fn delete(&self, ctx: &RequestContext, id: &str) -> Result<Option<User>> {
        ctx.check()?;
        Ok(self.users.write().remove(id))
    }
}

#[derive(Default)]
pub struct InMemoryIdentityStore {
    identities: RwLock<HashMap<String, Identity>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn insert(&self, ctx: &RequestContext, identity: Identity) -> Result<Identity> {
        ctx.check()?;
        let mut identities = self.identities.write();
        if identities
            .values()
            .any(|i| i.user_id == identity.user_id && i.provider == identity.provider)
        {
            return Err(AuthError::duplicate("Identity", "user_id", identity.user_id));
        }
        identities.insert(identity.id.clone(), identity.clone());
        Ok(identity)
    }

    async fn find_by_user_id(&self, ctx: &RequestContext, user_id: &str) -> Result<Vec<Identity>> {
        ctx.check()?;
        Ok(self
            .identities
            .read()
            .values()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_by_provider(
        &self,
        ctx: &RequestContext,
        provider_id: &str,
        provider: &str,
    ) -> Result<Option<Identity>> {
        ctx.check()?;
        Ok(self
            .identities
            .read()
            .values()
            .find(|i| i.provider_id == provider_id && i.provider == provider)
            .cloned())
    }

    async fn update_last_login(&self, ctx: &RequestContext, user_id: &str) -> Result<()> {
        ctx.check()?;
        let now = Utc::now();
        let mut matched = false;
        for identity in self
            .identities
            .write()
            .values_mut()
            .filter(|i| i.user_id == user_id)
        {
            identity.last_login_at = Some(now);
            identity.updated_at = now;
            matched = true;
        }
        if !matched {
            return Err(AuthError::not_found("Identity", user_id));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, ctx: &RequestContext, session: Session) -> Result<Session> {
        ctx.check()?;
        self.sessions
            .write()
            .insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn find_by_id(&self, ctx: &RequestContext, id: &str) -> Result<Option<Session>> {
        ctx.check()?;
        Ok(self.sessions.read().get(id).cloned())
    }

    async fn find_by_user_id(&self, ctx: &RequestContext, user_id: &str) -> Result<Vec<Session>> {
        ctx.check()?;
        let mut sessions: Vec<Session> = self
            .sessions
            .read()
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sessions)
    }

    async fn update_tokens(
        &self,
        ctx: &RequestContext,
        id: &str,
        params: UpdateTokensParams,
    ) -> Result<Session> {
        ctx.check()?;
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| AuthError::not_found("Session", id))?;
        params.apply(session);
        Ok(session.clone())
    }
}
