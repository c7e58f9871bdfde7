//! Request validation.
//!
//! [`SchemaValidator`] is the rule engine seam; [`SignupRules`] is the rule set
//! the service ships with. [`invalid_fields`] reduces violations to the field
//! list returned to callers.

use regex::Regex;
use secrecy::ExposeSecret;

use super::region::Region;
use super::types::{FIELD_EMAIL, FIELD_FULL_NAME, FIELD_PASSWORD, FIELD_REGION, SignupRequest};

pub const FULL_NAME_MAX_CHARS: usize = 100;
pub const EMAIL_MAX_CHARS: usize = 254;
pub const PASSWORD_MIN_CHARS: usize = 4;
pub const PASSWORD_MAX_CHARS: usize = 128;

/// A single rule failure, addressed by its field path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub field_path: Vec<String>,
    pub rule_id: &'static str,
    pub message: String,
}

impl Violation {
    fn new(field: &str, rule_id: &'static str, message: impl Into<String>) -> Self {
        Self {
            field_path: vec![field.to_string()],
            rule_id,
            message: message.into(),
        }
    }
}

pub trait SchemaValidator: Send + Sync {
    /// # Errors
    /// Returns every violated rule, in field order.
    fn validate(&self, request: &SignupRequest) -> Result<(), Vec<Violation>>;
}

#[derive(Debug)]
pub struct SignupRules {
    email: Option<Regex>,
}

impl SignupRules {
    #[must_use]
    pub fn new() -> Self {
        Self {
            email: Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok(),
        }
    }

    fn valid_email(&self, email: &str) -> bool {
        self.email.as_ref().is_some_and(|re| re.is_match(email))
    }
}

impl Default for SignupRules {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaValidator for SignupRules {
    fn validate(&self, request: &SignupRequest) -> Result<(), Vec<Violation>> {
        let mut violations = Vec::new();

        if request.full_name.chars().count() > FULL_NAME_MAX_CHARS {
            violations.push(Violation::new(
                FIELD_FULL_NAME,
                "string.max_len",
                format!("value length must be at most {FULL_NAME_MAX_CHARS} characters"),
            ));
        }

        let email = request.email.trim();
        if email.is_empty() {
            violations.push(Violation::new(FIELD_EMAIL, "required", "value is required"));
        } else {
            if email.chars().count() > EMAIL_MAX_CHARS {
                violations.push(Violation::new(
                    FIELD_EMAIL,
                    "string.max_len",
                    format!("value length must be at most {EMAIL_MAX_CHARS} characters"),
                ));
            }
            if !self.valid_email(email) {
                violations.push(Violation::new(
                    FIELD_EMAIL,
                    "string.email",
                    "value must be a valid email address",
                ));
            }
        }

        let password_len = request.password.expose_secret().chars().count();
        if !(PASSWORD_MIN_CHARS..=PASSWORD_MAX_CHARS).contains(&password_len) {
            violations.push(Violation::new(
                FIELD_PASSWORD,
                "string.len",
                format!(
                    "value length must be between {PASSWORD_MIN_CHARS} and {PASSWORD_MAX_CHARS} characters"
                ),
            ));
        }

        match request.region {
            Region::Usa | Region::Eur | Region::Ind | Region::Sgp => {}
            Region::Unspecified => violations.push(Violation::new(
                FIELD_REGION,
                "enum.not_in",
                "value must not be unspecified",
            )),
            Region::Unrecognized(_) => violations.push(Violation::new(
                FIELD_REGION,
                "enum.defined_only",
                "value must be one of the defined enum values",
            )),
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

/// Top-level field names of `violations`, first occurrence order, without duplicates.
#[must_use]
pub fn invalid_fields(violations: &[Violation]) -> Vec<String> {
    let mut fields: Vec<String> = Vec::with_capacity(violations.len());
    for field in violations.iter().filter_map(|v| v.field_path.first()) {
        if !fields.contains(field) {
            fields.push(field.clone());
        }
    }
    fields
}
