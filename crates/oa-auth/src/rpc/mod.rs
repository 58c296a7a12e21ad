//! RPC surface of the auth backend.

pub mod server;

pub use server::{router, INTERNAL_MESSAGE};
