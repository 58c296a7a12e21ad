//! Auth Orchestrator
//!
//! SignIn, SignUp and RefreshToken as multi-step workflows over the stores,
//! the password service and the token issuer. No step is retried; the first
//! failure is returned.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use oa_common::auth_v1::{ClientInfo, RefreshTokenRequest, SignInRequest, SignUpRequest, TokenPair};
use oa_common::{normalize_email, EmailRule, RequestContext};
use tracing::{debug, error, info, warn};

use crate::auth::password_service::PasswordService;
use crate::auth::token_service::{Authenticator, TokenClaims, TokenError};
use crate::identity::{Identity, IdentityStore};
use crate::session::{Session, SessionStore, UpdateTokensParams};
use crate::shared::error::{AuthError, Result};
use crate::user::{User, UserStore};

/// Signing secrets and lifetimes for both token kinds.
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub issuer: String,
}

/// Behaviour switches for partial failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthPolicy {
    /// Sign in even when the last-login stamp cannot be written
    pub last_login_best_effort: bool,
}

pub struct AuthService {
    users: Arc<dyn UserStore>,
    identities: Arc<dyn IdentityStore>,
    sessions: Arc<dyn SessionStore>,
    authenticator: Arc<dyn Authenticator>,
    passwords: Arc<PasswordService>,
    tokens: TokenSettings,
    policy: AuthPolicy,
    email_rule: EmailRule,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        identities: Arc<dyn IdentityStore>,
        sessions: Arc<dyn SessionStore>,
        authenticator: Arc<dyn Authenticator>,
        passwords: Arc<PasswordService>,
        tokens: TokenSettings,
    ) -> Self {
        Self {
            users,
            identities,
            sessions,
            authenticator,
            passwords,
            tokens,
            policy: AuthPolicy::default(),
            email_rule: EmailRule::new(),
        }
    }

    pub fn with_policy(mut self, policy: AuthPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn sign_in(&self, ctx: &RequestContext, request: SignInRequest) -> Result<TokenPair> {
        require("email", &request.email)?;
        require("password", &request.password)?;
        let email = normalize_email(&request.email);

        let Some(user) = self.users.find_by_email(ctx, &email).await? else {
            let password = request.password;
            self.with_passwords(ctx, move |p| {
                p.verify_dummy(&password);
                Ok(())
            })
            .await?;
            debug!("Sign-in for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        let password = request.password;
        let hash = user.password_hash.clone();
        let matches = self
            .with_passwords(ctx, move |p| p.verify_password(&password, &hash))
            .await?;
        if !matches {
            debug!(user_id = %user.id, "Sign-in with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        if let Err(e) = self.identities.update_last_login(ctx, &user.id).await {
            if matches!(e, AuthError::DeadlineExceeded) {
                return Err(e);
            }
            if !self.policy.last_login_best_effort {
                // Store detail (e.g. a missing identity) must not reach the caller
                error!(user_id = %user.id, error = %e, "Failed to record last login");
                return Err(AuthError::internal("failed to record last login"));
            }
            warn!(user_id = %user.id, error = %e, "Failed to record last login, continuing");
        }

        let pair = self.create_auth_session(ctx, &user.id, request.client).await?;
        info!(user_id = %user.id, "User signed in");
        Ok(pair)
    }

    pub async fn sign_up(&self, ctx: &RequestContext, request: SignUpRequest) -> Result<TokenPair> {
        require("email", &request.email)?;
        require("password", &request.password)?;
        require("full_name", &request.full_name)?;
        let email = normalize_email(&request.email);
        if !self.email_rule.is_valid(&email) {
            return Err(AuthError::validation("email is not a valid address"));
        }

        let password = request.password;
        let password_hash = self
            .with_passwords(ctx, move |p| p.hash_password(&password))
            .await?;

        let user = User::new(email, request.full_name.trim(), password_hash);
        let user = match self.users.insert(ctx, user).await {
            Ok(user) => user,
            Err(e) if e.is_duplicate_of("email") => return Err(AuthError::UserAlreadyExists),
            Err(e) => return Err(e),
        };

        // Not rolled back: the user row stays without a linked identity
        if let Err(e) = self.identities.insert(ctx, Identity::email(&user.id)).await {
            error!(
                user_id = %user.id,
                error = %e,
                "Identity creation failed after user insert; user has no identity"
            );
            return Err(e);
        }

        let pair = self.create_auth_session(ctx, &user.id, request.client).await?;
        info!(user_id = %user.id, "User signed up");
        Ok(pair)
    }

    /// Rotate the pair of the session named by a current refresh token.
    pub async fn refresh_token(
        &self,
        ctx: &RequestContext,
        request: RefreshTokenRequest,
    ) -> Result<TokenPair> {
        require("refresh_token", &request.refresh_token)?;

        let claims = self
            .authenticator
            .validate(&request.refresh_token, &self.tokens.refresh_secret)
            .map_err(|e| match e {
                TokenError::Expired => AuthError::TokenExpired,
                other => AuthError::invalid_token(other.to_string()),
            })?;

        let session = self
            .sessions
            .find_by_id(ctx, &claims.session_id)
            .await?
            .ok_or_else(|| AuthError::invalid_token("session not found"))?;

        if session.user_id != claims.user_id || session.refresh_token != request.refresh_token {
            warn!(
                user_id = %claims.user_id,
                session_id = %session.id,
                "Refresh token is not the session's current token"
            );
            return Err(AuthError::invalid_token("refresh token is no longer current"));
        }

        let (pair, params) = self.issue_pair(&session.user_id, &session.id)?;
        self.sessions.update_tokens(ctx, &session.id, params).await?;

        debug!(user_id = %session.user_id, session_id = %session.id, "Tokens rotated");
        Ok(pair)
    }

    /// Create a session and store a fresh pair on it. Tokens are only
    /// returned once persisted.
    async fn create_auth_session(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        client: ClientInfo,
    ) -> Result<TokenPair> {
        let session = Session::new(user_id).with_client(client.ip_address, client.user_agent);
        let session = self.sessions.insert(ctx, session).await?;

        let (pair, params) = self.issue_pair(user_id, &session.id)?;
        self.sessions.update_tokens(ctx, &session.id, params).await?;

        Ok(pair)
    }

    fn issue_pair(&self, user_id: &str, session_id: &str) -> Result<(TokenPair, UpdateTokensParams)> {
        let now = Utc::now();
        let access = TokenClaims::new(user_id, session_id, &self.tokens.issuer, now, self.tokens.access_ttl);
        let refresh = TokenClaims::new(user_id, session_id, &self.tokens.issuer, now, self.tokens.refresh_ttl);

        let access_token = self
            .authenticator
            .issue(&access, &self.tokens.access_secret)
            .map_err(|e| AuthError::internal(format!("access token: {}", e)))?;
        let refresh_token = self
            .authenticator
            .issue(&refresh, &self.tokens.refresh_secret)
            .map_err(|e| AuthError::internal(format!("refresh token: {}", e)))?;

        let access_token_expires_at = access
            .expires_at()
            .ok_or_else(|| AuthError::internal("access token expiry out of range"))?;
        let refresh_token_expires_at = refresh
            .expires_at()
            .ok_or_else(|| AuthError::internal("refresh token expiry out of range"))?;

        let params = UpdateTokensParams {
            access_token: access_token.clone(),
            refresh_token: refresh_token.clone(),
            access_token_expires_at,
            refresh_token_expires_at,
        };
        Ok((
            TokenPair {
                access_token,
                refresh_token,
            },
            params,
        ))
    }

    /// Run CPU-bound password work off the async workers, bounded by the
    /// request deadline.
    async fn with_passwords<T, F>(&self, ctx: &RequestContext, f: F) -> Result<T>
    where
        F: FnOnce(&PasswordService) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let passwords = self.passwords.clone();
        ctx.run(tokio::task::spawn_blocking(move || f(&passwords)))
            .await?
            .map_err(|e| AuthError::internal(format!("password task failed: {}", e)))?
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AuthError::validation(format!("{} is required", field)));
    }
    Ok(())
}
