//! Field rules shared by the edge validator and the auth orchestrator.

use regex::Regex;

/// Compiled email syntax rule. Build once and share.
#[derive(Debug, Clone)]
pub struct EmailRule {
    pattern: Regex,
}

impl EmailRule {
    pub fn new() -> Self {
        let pattern = Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("email pattern is valid");
        Self { pattern }
    }

    pub fn is_valid(&self, email: &str) -> bool {
        email.len() <= 254 && self.pattern.is_match(email)
    }
}

impl Default for EmailRule {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical storage form of an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
