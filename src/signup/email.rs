use sha2::{Digest, Sha256};

/// Normalize an email for uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Hex SHA-256 of the normalized email; the key of the global uniqueness index.
#[must_use]
pub fn email_digest(email: &str) -> String {
    hex::encode(Sha256::digest(normalize_email(email).as_bytes()))
}
