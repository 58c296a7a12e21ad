//! Discovery error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Registry returned {status}: {message}")]
    Registry { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;
