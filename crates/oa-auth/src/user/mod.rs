//! User aggregate

pub mod entity;
pub mod repository;

pub use entity::{UpdateUserParams, User};
pub use repository::{MongoUserStore, UserStore, USERS_COLLECTION};
