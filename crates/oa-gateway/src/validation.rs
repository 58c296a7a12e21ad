//! Request validation service.
//!
//! Built once at startup and shared through router state.

use oa_common::{EmailRule, FieldViolation};
use serde_json::Value;

/// Implemented by every validated request body.
pub trait Validate {
    fn validate(&self, validator: &Validator, violations: &mut Vec<FieldViolation>);
}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    email_rule: EmailRule,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// All violations of `payload`, in field order.
    pub fn check<T: Validate>(&self, payload: &T) -> Result<(), Vec<FieldViolation>> {
        let mut violations = Vec::new();
        payload.validate(self, &mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    /// Non-blank. Returns whether the rule held.
    pub fn required(&self, field: &str, value: &str, violations: &mut Vec<FieldViolation>) -> bool {
        if value.trim().is_empty() {
            violations.push(violation(field, format!("{} is a required field", field), value));
            return false;
        }
        true
    }

    /// Required, and a syntactically valid address.
    pub fn email(&self, field: &str, value: &str, violations: &mut Vec<FieldViolation>) -> bool {
        if !self.required(field, value, violations) {
            return false;
        }
        if !self.email_rule.is_valid(value.trim()) {
            violations.push(violation(
                field,
                format!("{} must be a valid email address", field),
                value,
            ));
            return false;
        }
        true
    }
}

fn violation(field: &str, error: String, value: &str) -> FieldViolation {
    FieldViolation {
        field: field.to_string(),
        error,
        value: Some(Value::String(value.to_string())),
    }
}
