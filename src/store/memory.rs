//! In-memory [`AccountStore`] for tests.
//!
//! Writes are staged per transaction and published on commit. Unique keys
//! (handle, email digest) are reserved while a transaction is open, so a
//! concurrent writer for the same key observes a violation, the same outcome
//! it gets from the database once the first writer commits. Dropping an
//! unfinished transaction releases its reservations.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::{
    AccountStore, AccountTx, GlobalEmail, NewAccount, StoreError, GLOBAL_EMAIL_PKEY, UNIQ_HANDLE,
};
use crate::signup::region::Partition;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Step {
    Begin,
    InsertAccount,
    InsertGlobalEmail,
    Commit,
    Ping,
}

#[derive(Clone, Debug)]
pub(crate) enum Fault {
    Unavailable,
    Unique(&'static str),
    /// Never completes; used to simulate a caller going away mid-transaction.
    Stall,
}

#[derive(Default)]
struct State {
    accounts: HashMap<Uuid, NewAccount>,
    handles: HashSet<(Partition, String)>,
    emails: HashMap<String, GlobalEmail>,
    reserved_handles: HashSet<(Partition, String)>,
    reserved_emails: HashSet<String>,
    faults: HashMap<Step, VecDeque<Fault>>,
}

impl State {
    fn take_fault(&mut self, step: Step) -> Option<Fault> {
        self.faults.get_mut(&step).and_then(VecDeque::pop_front)
    }
}

#[derive(Clone, Default)]
pub(crate) struct MemoryStore {
    state: Arc<Mutex<State>>,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn apply(fault: Option<Fault>) -> Result<(), StoreError> {
    match fault {
        None => Ok(()),
        Some(Fault::Unavailable) => Err(StoreError::Unavailable("injected failure".to_string())),
        Some(Fault::Unique(constraint)) => Err(StoreError::UniqueViolation {
            constraint: constraint.to_string(),
        }),
        Some(Fault::Stall) => std::future::pending().await,
    }
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue a fault for the next call of `step`. Faults are consumed in order.
    pub(crate) fn inject(&self, step: Step, fault: Fault) {
        lock(&self.state)
            .faults
            .entry(step)
            .or_default()
            .push_back(fault);
    }

    pub(crate) fn account_count(&self) -> usize {
        lock(&self.state).accounts.len()
    }

    pub(crate) fn email_count(&self) -> usize {
        lock(&self.state).emails.len()
    }

    pub(crate) fn reservation_count(&self) -> usize {
        let state = lock(&self.state);
        state.reserved_handles.len() + state.reserved_emails.len()
    }

    pub(crate) fn account_by_handle(&self, handle: &str) -> Option<(Uuid, NewAccount)> {
        lock(&self.state)
            .accounts
            .iter()
            .find(|(_, account)| account.long_handle == handle)
            .map(|(id, account)| (*id, account.clone()))
    }

    pub(crate) fn email_row(&self, digest: &str) -> Option<GlobalEmail> {
        lock(&self.state).emails.get(digest).cloned()
    }

    /// Insert a committed account directly, bypassing transactions.
    pub(crate) fn seed_handle(&self, partition: Partition, handle: &str) {
        lock(&self.state)
            .handles
            .insert((partition, handle.to_string()));
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn AccountTx>, StoreError> {
        let fault = lock(&self.state).take_fault(Step::Begin);
        apply(fault).await?;
        Ok(Box::new(MemoryTx {
            state: Arc::clone(&self.state),
            accounts: Vec::new(),
            emails: Vec::new(),
            finished: false,
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let fault = lock(&self.state).take_fault(Step::Ping);
        apply(fault).await
    }
}

struct MemoryTx {
    state: Arc<Mutex<State>>,
    accounts: Vec<(Uuid, NewAccount)>,
    emails: Vec<GlobalEmail>,
    finished: bool,
}

impl MemoryTx {
    fn release(&mut self) {
        let mut state = lock(&self.state);
        for (_, account) in self.accounts.drain(..) {
            state
                .reserved_handles
                .remove(&(account.partition, account.long_handle));
        }
        for row in self.emails.drain(..) {
            state.reserved_emails.remove(&row.email_address_sha);
        }
        self.finished = true;
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if !self.finished {
            self.release();
        }
    }
}

#[async_trait]
impl AccountTx for MemoryTx {
    async fn insert_account(&mut self, account: &NewAccount) -> Result<Uuid, StoreError> {
        let fault = lock(&self.state).take_fault(Step::InsertAccount);
        apply(fault).await?;

        let mut state = lock(&self.state);
        let key = (account.partition, account.long_handle.clone());
        if state.handles.contains(&key) || state.reserved_handles.contains(&key) {
            return Err(StoreError::UniqueViolation {
                constraint: UNIQ_HANDLE.to_string(),
            });
        }
        state.reserved_handles.insert(key);
        drop(state);

        let id = Uuid::new_v4();
        self.accounts.push((id, account.clone()));
        Ok(id)
    }

    async fn insert_global_email(&mut self, row: &GlobalEmail) -> Result<(), StoreError> {
        let fault = lock(&self.state).take_fault(Step::InsertGlobalEmail);
        apply(fault).await?;

        let mut state = lock(&self.state);
        if state.emails.contains_key(&row.email_address_sha)
            || state.reserved_emails.contains(&row.email_address_sha)
        {
            return Err(StoreError::UniqueViolation {
                constraint: GLOBAL_EMAIL_PKEY.to_string(),
            });
        }
        state.reserved_emails.insert(row.email_address_sha.clone());
        drop(state);

        self.emails.push(row.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut this = self;
        let fault = lock(&this.state).take_fault(Step::Commit);
        apply(fault).await?;

        let mut state = lock(&this.state);
        for (id, account) in &this.accounts {
            state
                .handles
                .insert((account.partition, account.long_handle.clone()));
            state.accounts.insert(*id, account.clone());
        }
        for row in &this.emails {
            state
                .emails
                .insert(row.email_address_sha.clone(), row.clone());
        }
        drop(state);

        this.release();
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let mut this = self;
        this.release();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn account(handle: &str) -> NewAccount {
        NewAccount {
            partition: Partition::Eur,
            long_handle: handle.to_string(),
            full_name: "Ada".to_string(),
            email_address: "ada@x.io".to_string(),
            password_hash: "$argon2id$stub".to_string(),
        }
    }

    #[tokio::test]
    async fn staged_rows_publish_on_commit() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let id = tx.insert_account(&account("h1")).await.unwrap();
        assert_eq!(store.account_count(), 0);
        tx.commit().await.unwrap();
        assert_eq!(store.account_count(), 1);
        assert_eq!(store.account_by_handle("h1").map(|(found, _)| found), Some(id));
        assert_eq!(store.reservation_count(), 0);
    }

    #[tokio::test]
    async fn dropped_transaction_releases_reservations() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_account(&account("h1")).await.unwrap();
            assert_eq!(store.reservation_count(), 1);
        }
        assert_eq!(store.reservation_count(), 0);
        assert_eq!(store.account_count(), 0);
    }

    #[tokio::test]
    async fn open_reservation_blocks_concurrent_writer() {
        let store = MemoryStore::new();
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.insert_account(&account("h1")).await.unwrap();
        let err = second.insert_account(&account("h1")).await.unwrap_err();
        assert_eq!(err.violated_constraint(), Some(UNIQ_HANDLE));
    }

    #[tokio::test]
    async fn injected_faults_are_consumed_in_order() {
        let store = MemoryStore::new();
        store.inject(Step::Ping, Fault::Unavailable);
        assert!(store.ping().await.is_err());
        assert!(store.ping().await.is_ok());
    }
}
