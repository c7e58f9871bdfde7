//! Postgres / `YugabyteDB` implementation of [`AccountStore`].
//!
//! Schema lives in `sql/schema.sql`. The `users` table is list-partitioned by
//! the `region` enum; `global_email_addresses` is not partitioned.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    Connection, Postgres, Row, Transaction,
};
use std::time::Duration;
use tracing::{info, info_span, warn, Instrument};
use url::Url;
use uuid::Uuid;

use super::{AccountStore, AccountTx, GlobalEmail, NewAccount, StoreError, UNIQ_HANDLE};

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone, Debug)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against the first reachable node of `dsn`.
    ///
    /// # Errors
    /// Returns an error if the DSN is malformed or no node accepts a connection.
    pub async fn connect(dsn: &str, max_connections: u32) -> Result<Self> {
        let nodes = cluster_nodes(dsn)?;
        let mut last_error = None;

        for node in &nodes {
            let label = describe_node(node);
            let span = info_span!("db.connect", db.system = "postgresql", db.node = %label);
            let result = PgPoolOptions::new()
                .min_connections(1)
                .max_connections(max_connections)
                .max_lifetime(Duration::from_secs(60 * 2))
                .acquire_timeout(Duration::from_secs(5))
                .test_before_acquire(true)
                .connect(node)
                .instrument(span)
                .await;

            match result {
                Ok(pool) => {
                    info!("Connected to database node {label}");
                    return Ok(Self::new(pool));
                }
                Err(err) => {
                    warn!("Database node {label} unavailable: {err}");
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.map_or_else(
            || anyhow!("no database nodes in connection string"),
            |err| anyhow::Error::new(err).context("Failed to connect to database"),
        ))
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn begin(&self) -> Result<Box<dyn AccountTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgAccountTx { tx }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self.pool.acquire().instrument(acquire_span).await?;
        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping().instrument(ping_span).await?;
        Ok(())
    }
}

/// Open transaction; `sqlx` rolls it back when dropped uncommitted.
struct PgAccountTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl AccountTx for PgAccountTx {
    async fn insert_account(&mut self, account: &NewAccount) -> Result<Uuid, StoreError> {
        let query = r"
            INSERT INTO users
                (region, long_handle, full_name, email_address, password_hash)
            VALUES ($1::region, $2, $3, $4, $5)
            RETURNING id
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(account.partition.key())
            .bind(&account.long_handle)
            .bind(&account.full_name)
            .bind(&account.email_address)
            .bind(&account.password_hash)
            .fetch_one(&mut *self.tx)
            .instrument(span)
            .await
            .map_err(classify)?;

        Ok(row.try_get("id")?)
    }

    async fn insert_global_email(&mut self, row: &GlobalEmail) -> Result<(), StoreError> {
        let query = r"
            INSERT INTO global_email_addresses
                (email_address_sha, region, user_id)
            VALUES ($1, $2::region, $3)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(&row.email_address_sha)
            .bind(row.partition.key())
            .bind(row.user_id)
            .execute(&mut *self.tx)
            .instrument(span)
            .await
            .map_err(classify)?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let Self { tx } = *self;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let Self { tx } = *self;
        tx.rollback().await?;
        Ok(())
    }
}

fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err
            .code()
            .is_some_and(|code| code.as_ref() == UNIQUE_VIOLATION)
        {
            return StoreError::UniqueViolation {
                constraint: unique_constraint(
                    db_err.table(),
                    db_err.constraint().unwrap_or_default(),
                ),
            };
        }
    }
    StoreError::Database(err)
}

/// Name a unique violation after the constraint declared on the parent table.
///
/// A partition of `users` reports its own index (`users_eur_region_long_handle_key`)
/// instead of `uniq_handle`.
fn unique_constraint(table: Option<&str>, constraint: &str) -> String {
    let on_users = table.map_or_else(
        || constraint.starts_with("users_"),
        |table| table == "users" || table.starts_with("users_"),
    );
    if on_users && (constraint == UNIQ_HANDLE || constraint.ends_with("_region_long_handle_key")) {
        return UNIQ_HANDLE.to_string();
    }
    constraint.to_string()
}

/// Split a multi-host connection string into one DSN per node.
///
/// `postgres://u:p@h1:5433,h2:5433/db?x=y` becomes
/// `postgres://u:p@h1:5433/db?x=y` and `postgres://u:p@h2:5433/db?x=y`.
///
/// # Errors
/// Returns an error if the scheme or hosts are missing, or a node DSN does not parse.
pub fn cluster_nodes(dsn: &str) -> Result<Vec<String>> {
    let (scheme, rest) = dsn
        .split_once("://")
        .ok_or_else(|| anyhow!("invalid connection string: missing scheme"))?;

    let (authority, tail) = rest
        .find(['/', '?'])
        .map_or((rest, ""), |index| rest.split_at(index));

    let (userinfo, hosts) = authority
        .rfind('@')
        .map_or(("", authority), |index| authority.split_at(index + 1));

    let nodes = hosts
        .split(',')
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .map(|host| {
            let node = format!("{scheme}://{userinfo}{host}{tail}");
            Url::parse(&node)
                .with_context(|| format!("invalid database node: {}", describe_node(&node)))?;
            Ok(node)
        })
        .collect::<Result<Vec<_>>>()?;

    if nodes.is_empty() {
        return Err(anyhow!("invalid connection string: no hosts"));
    }

    Ok(nodes)
}

/// `host:port` of a node DSN, safe to log.
#[must_use]
pub fn describe_node(node: &str) -> String {
    Url::parse(node).map_or_else(
        |_| "<unparseable>".to_string(),
        |url| {
            let host = url.host_str().unwrap_or("<none>");
            url.port()
                .map_or_else(|| host.to_string(), |port| format!("{host}:{port}"))
        },
    )
}
