//! Signup orchestration.
//!
//! [`Signup::signup`] validates the request, resolves the region partition,
//! derives a handle, hashes the password and then writes the account row and
//! its global email index row in one transaction. Nothing is persisted unless
//! the commit succeeds.

pub mod credentials;
pub mod email;
pub mod handle;
pub mod region;
pub mod types;
pub mod validation;

mod error;

pub use error::SignupError;

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use self::credentials::CredentialHasher;
use self::region::Partition;
use self::types::{SignupRequest, FIELD_REGION};
use self::validation::{invalid_fields, SchemaValidator};
use crate::store::{AccountStore, AccountTx, GlobalEmail, NewAccount, UNIQ_HANDLE};

/// Upper bound for [`SignupConfig::with_handle_attempts`].
pub const MAX_HANDLE_ATTEMPTS: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignupConfig {
    handle_attempts: u32,
}

impl SignupConfig {
    /// One attempt: a handle collision fails the signup.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle_attempts: 1 }
    }

    /// Retry handle collisions with a fresh handle, up to `attempts` transactions
    /// in total. Clamped to `1..=MAX_HANDLE_ATTEMPTS`.
    #[must_use]
    pub fn with_handle_attempts(mut self, attempts: u32) -> Self {
        self.handle_attempts = attempts.clamp(1, MAX_HANDLE_ATTEMPTS);
        self
    }

    #[must_use]
    pub const fn handle_attempts(&self) -> u32 {
        self.handle_attempts
    }
}

impl Default for SignupConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a signup transaction did not commit. Always rolled back.
#[derive(Debug, PartialEq, Eq)]
enum TxFailure {
    HandleCollision,
    EmailTaken,
    Internal,
}

impl From<TxFailure> for SignupError {
    fn from(failure: TxFailure) -> Self {
        match failure {
            TxFailure::EmailTaken => Self::AlreadyExists,
            TxFailure::HandleCollision | TxFailure::Internal => Self::Internal,
        }
    }
}

/// Dependencies shared read-only by every signup.
pub struct Signup {
    store: Arc<dyn AccountStore>,
    validator: Arc<dyn SchemaValidator>,
    hasher: Arc<dyn CredentialHasher>,
    config: SignupConfig,
}

impl Signup {
    #[must_use]
    pub fn new(
        store: Arc<dyn AccountStore>,
        validator: Arc<dyn SchemaValidator>,
        hasher: Arc<dyn CredentialHasher>,
        config: SignupConfig,
    ) -> Self {
        Self {
            store,
            validator,
            hasher,
            config,
        }
    }

    #[must_use]
    pub fn store(&self) -> &dyn AccountStore {
        self.store.as_ref()
    }

    #[must_use]
    pub const fn config(&self) -> &SignupConfig {
        &self.config
    }

    /// Create an account and return its handle.
    ///
    /// # Errors
    /// - [`SignupError::InvalidArgument`] before anything is written.
    /// - [`SignupError::AlreadyExists`] when the email is registered in any region.
    /// - [`SignupError::Internal`] for every other failure; the transaction is rolled back.
    #[instrument(skip_all, fields(region = ?request.region))]
    pub async fn signup(&self, request: &SignupRequest) -> Result<String, SignupError> {
        if let Err(violations) = self.validator.validate(request) {
            let fields = invalid_fields(&violations);
            debug!(?fields, "validation failed");
            return Err(SignupError::InvalidArgument { fields });
        }

        let partition = region::map(request.region).map_err(|err| {
            error!("{err}");
            SignupError::InvalidArgument {
                fields: vec![FIELD_REGION.to_string()],
            }
        })?;

        let mut long_handle = new_handle(&request.full_name, partition)?;
        let password_hash = self.hash_password(&request.password).await?;
        let email_sha = email::email_digest(&request.email);

        let attempts = self.config.handle_attempts();
        let mut attempt = 1;
        loop {
            let account = NewAccount {
                partition,
                long_handle,
                full_name: request.full_name.clone(),
                email_address: request.email.trim().to_string(),
                password_hash: password_hash.clone(),
            };

            match self.persist(&account, &email_sha).await {
                Ok(()) => {
                    info!(
                        handle = %account.long_handle,
                        region = %partition,
                        "user created successfully"
                    );
                    return Ok(account.long_handle);
                }
                Err(TxFailure::HandleCollision) if attempt < attempts => {
                    warn!(attempt, attempts, "retrying signup with a fresh handle");
                    attempt += 1;
                    long_handle = new_handle(&request.full_name, partition)?;
                }
                Err(failure) => return Err(failure.into()),
            }
        }
    }

    async fn hash_password(&self, password: &SecretString) -> Result<String, SignupError> {
        let hasher = Arc::clone(&self.hasher);
        let password = SecretString::from(password.expose_secret().to_string());

        match tokio::task::spawn_blocking(move || hasher.hash(&password)).await {
            Ok(Ok(hash)) => Ok(hash),
            Ok(Err(err)) => {
                error!("failed to hash password: {err}");
                Err(SignupError::Internal)
            }
            Err(err) => {
                error!("password hashing task failed: {err}");
                Err(SignupError::Internal)
            }
        }
    }

    /// Insert the account and its email index row, then commit.
    async fn persist(&self, account: &NewAccount, email_sha: &str) -> Result<(), TxFailure> {
        let mut tx = self.store.begin().await.map_err(|err| {
            error!("failed to begin transaction: {err}");
            TxFailure::Internal
        })?;

        let user_id = match tx.insert_account(account).await {
            Ok(user_id) => user_id,
            Err(err) => {
                rollback(tx).await;
                return Err(match err.violated_constraint() {
                    Some(UNIQ_HANDLE) => {
                        error!(handle = %account.long_handle, "duplicate long_handle generated");
                        TxFailure::HandleCollision
                    }
                    Some(constraint) => {
                        error!(constraint, "unknown unique violation");
                        TxFailure::Internal
                    }
                    None => {
                        error!(
                            handle = %account.long_handle,
                            region = %account.partition,
                            "failed to insert user: {err}"
                        );
                        TxFailure::Internal
                    }
                });
            }
        };

        let row = GlobalEmail {
            email_address_sha: email_sha.to_string(),
            partition: account.partition,
            user_id,
        };
        if let Err(err) = tx.insert_global_email(&row).await {
            rollback(tx).await;
            return Err(if err.is_unique_violation() {
                debug!(email_sha, "duplicate email address");
                TxFailure::EmailTaken
            } else {
                error!(email_sha, "failed to insert global email address: {err}");
                TxFailure::Internal
            });
        }

        tx.commit().await.map_err(|err| {
            error!("failed to commit transaction: {err}");
            TxFailure::Internal
        })
    }
}

impl std::fmt::Debug for Signup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signup")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn new_handle(full_name: &str, partition: Partition) -> Result<String, SignupError> {
    handle::generate(full_name, partition.code()).map_err(|err| {
        error!("failed to generate handle: {err}");
        SignupError::Internal
    })
}

async fn rollback(tx: Box<dyn AccountTx>) {
    if let Err(err) = tx.rollback().await {
        warn!("failed to roll back transaction: {err}");
    }
}
