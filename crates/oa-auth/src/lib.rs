//! Authentication backend.
//!
//! - [`auth`]: password hashing, token issuance and the SignIn/SignUp/
//!   RefreshToken workflows
//! - [`user`], [`identity`], [`session`]: entities and their stores
//! - [`memory`]: in-memory stores with the same contracts
//! - [`rpc`]: the `auth.v1.AuthService` HTTP surface

pub mod auth;
pub mod identity;
pub mod memory;
pub mod rpc;
pub mod session;
pub mod shared;
pub mod user;

pub use auth::{
    Argon2Config, AuthPolicy, AuthService, Authenticator, JwtAuthenticator, PasswordService,
    TokenClaims, TokenError, TokenSettings,
};
pub use identity::{Identity, IdentityStore, MongoIdentityStore};
pub use memory::{InMemoryIdentityStore, InMemorySessionStore, InMemoryUserStore};
pub use session::{MongoSessionStore, Session, SessionStore, UpdateTokensParams};
pub use shared::error::{AuthError, Result};
pub use shared::health_api::{HealthState, MongoHealthChecker};
pub use shared::indexes::initialize_indexes;
pub use user::{MongoUserStore, UpdateUserParams, User, UserStore};
