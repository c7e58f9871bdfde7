//! Transactional account storage.
//!
//! A signup writes one row into the region-partitioned `users` table and one
//! row into the unpartitioned `global_email_addresses` table inside the same
//! [`AccountTx`]. Implementations must roll back a transaction that is dropped
//! without [`AccountTx::commit`].

pub mod postgres;

#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::signup::region::Partition;

pub use postgres::PgAccountStore;

/// Unique constraint over `(region, long_handle)` on `users`.
pub const UNIQ_HANDLE: &str = "uniq_handle";
/// Primary key of `global_email_addresses` (the email digest).
pub const GLOBAL_EMAIL_PKEY: &str = "global_email_addresses_pkey";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }

    /// Constraint name for unique violations, `None` otherwise.
    #[must_use]
    pub fn violated_constraint(&self) -> Option<&str> {
        match self {
            Self::UniqueViolation { constraint } => Some(constraint),
            _ => None,
        }
    }
}

/// Account row destined for the region's partition.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub partition: Partition,
    pub long_handle: String,
    pub full_name: String,
    pub email_address: String,
    pub password_hash: String,
}

/// Row in the global uniqueness index.
#[derive(Debug, Clone)]
pub struct GlobalEmail {
    /// Hex SHA-256 of the normalized email address.
    pub email_address_sha: String,
    pub partition: Partition,
    pub user_id: Uuid,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn AccountTx>, StoreError>;

    /// Liveness check behind `/health`.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AccountTx: Send {
    /// Insert the account and return its generated id.
    async fn insert_account(&mut self, account: &NewAccount) -> Result<Uuid, StoreError>;

    async fn insert_global_email(&mut self, row: &GlobalEmail) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violated_constraint_only_for_unique_violations() {
        let err = StoreError::UniqueViolation {
            constraint: UNIQ_HANDLE.to_string(),
        };
        assert!(err.is_unique_violation());
        assert_eq!(err.violated_constraint(), Some(UNIQ_HANDLE));

        let err = StoreError::Unavailable("down".to_string());
        assert!(!err.is_unique_violation());
        assert_eq!(err.violated_constraint(), None);
    }
}
