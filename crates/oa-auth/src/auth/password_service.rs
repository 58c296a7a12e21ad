//! Password Authentication Service
//!
//! Secure password hashing using Argon2id.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use tracing::debug;

use crate::shared::error::{AuthError, Result};

/// Verified against when the email is unknown, so that branch costs one
/// hash verification like every other.
const DUMMY_PASSWORD: &str = "oa-dummy-password";

/// Argon2id configuration
#[derive(Debug, Clone)]
pub struct Argon2Config {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub memory_cost: u32,
    /// Time cost (iterations) (default: 3)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
    /// Output hash length in bytes (default: 32)
    pub output_len: usize,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory_cost: 65536, // 64 MiB
            time_cost: 3,
            parallelism: 4,
            output_len: 32,
        }
    }
}

impl Argon2Config {
    /// Low memory config for testing (faster but less secure)
    pub fn testing() -> Self {
        Self {
            memory_cost: 4096, // 4 MiB
            time_cost: 1,
            parallelism: 1,
            output_len: 32,
        }
    }

    fn to_params(&self) -> Result<Params> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            Some(self.output_len),
        )
        .map_err(|e| AuthError::internal(format!("Invalid Argon2 params: {}", e)))
    }
}

/// Password hashing and verification.
pub struct PasswordService {
    argon2: Argon2<'static>,
    dummy_hash: String,
}

impl PasswordService {
    pub fn new(config: Argon2Config) -> Result<Self> {
        let params = config.to_params()?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut service = Self {
            argon2,
            dummy_hash: String::new(),
        };
        // Unknown-email sign-ins only ever verify against this
        service.dummy_hash = service.hash_password(DUMMY_PASSWORD)?;
        Ok(service)
    }

    /// Hash a password using Argon2id. The PHC string embeds the salt.
    pub fn hash_password(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::internal(format!("Failed to hash password: {}", e)))?;

        debug!("Password hashed successfully");
        Ok(hash.to_string())
    }

    /// Verify a password against a stored hash.
    ///
    /// `Ok(false)` means mismatch; a malformed hash or any other failure is
    /// an error.
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AuthError::internal(format!("Invalid password hash format: {}", e)))?;

        match self.argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::internal(format!(
                "Password verification error: {}",
                e
            ))),
        }
    }

    /// Spend one verification without a real hash to compare against.
    pub fn verify_dummy(&self, password: &str) {
        let _ = self.verify_password(password, &self.dummy_hash);
    }
}
