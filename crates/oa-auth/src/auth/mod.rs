//! Credentials, tokens and the auth workflows.

pub mod auth_service;
pub mod password_service;
pub mod token_service;

pub use auth_service::{AuthPolicy, AuthService, TokenSettings};
pub use password_service::{Argon2Config, PasswordService};
pub use token_service::{Authenticator, JwtAuthenticator, TokenClaims, TokenError};
