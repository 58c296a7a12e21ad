//! Session aggregate

pub mod entity;
pub mod repository;

pub use entity::{Session, UpdateTokensParams};
pub use repository::{MongoSessionStore, SessionStore, SESSIONS_COLLECTION};
