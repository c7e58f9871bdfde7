//! Account handle derivation.
//!
//! `<name><SEPARATOR><unix-seconds><12 hex><SEPARATOR><region-code>`, where
//! `<name>` is exactly [`NAME_LEN`] characters of `[a-z0-9]`.

use rand::RngCore;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub const NAME_LEN: usize = 6;
pub const SEPARATOR: char = '-';
pub const RANDOM_BYTES: usize = 6;

const ALPHANUMERIC: &[u8; 36] = b"abcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Debug, Error)]
pub enum HandleError {
    #[error("failed to read random bytes")]
    Entropy(#[source] rand::Error),
    #[error("system clock is before the Unix epoch")]
    Clock,
}

/// Derive a handle from the current time and the OS random source.
///
/// # Errors
/// Returns an error if the OS random source or the clock fails.
pub fn generate(full_name: &str, region_code: &str) -> Result<String, HandleError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| HandleError::Clock)?
        .as_secs();

    generate_with(full_name, region_code, now, &mut rand::rngs::OsRng)
}

/// Derive a handle with an explicit clock reading and random source.
///
/// Pads short names with one random byte per character (reduced modulo 36),
/// then draws [`RANDOM_BYTES`] bytes for the hex suffix. Nothing is returned
/// if any read from `rng` fails.
///
/// # Errors
/// Returns [`HandleError::Entropy`] if `rng` fails.
pub fn generate_with<R: RngCore + ?Sized>(
    full_name: &str,
    region_code: &str,
    unix_seconds: u64,
    rng: &mut R,
) -> Result<String, HandleError> {
    let mut name: String = full_name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .take(NAME_LEN)
        .collect();

    while name.len() < NAME_LEN {
        let mut byte = [0u8; 1];
        rng.try_fill_bytes(&mut byte).map_err(HandleError::Entropy)?;
        let index = usize::from(byte[0]) % ALPHANUMERIC.len();
        name.push(char::from(ALPHANUMERIC[index]));
    }

    let mut random = [0u8; RANDOM_BYTES];
    rng.try_fill_bytes(&mut random).map_err(HandleError::Entropy)?;

    Ok(format!(
        "{name}{SEPARATOR}{unix_seconds}{}{SEPARATOR}{region_code}",
        hex::encode(random)
    ))
}
