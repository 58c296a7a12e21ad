//! Shared infrastructure: errors, indexes and health.

pub mod error;
pub mod health_api;
pub mod indexes;
