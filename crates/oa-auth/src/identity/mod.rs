//! Identity aggregate

pub mod entity;
pub mod repository;

pub use entity::{Identity, EMAIL_PROVIDER};
pub use repository::{IdentityStore, MongoIdentityStore, IDENTITIES_COLLECTION};
