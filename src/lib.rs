//! # ycrpc (Multi-Region Account Signup)
//!
//! `ycrpc` creates accounts on a geo-partitioned SQL cluster. Each account row
//! lives in the partition of the region it signed up in, while email addresses
//! stay unique across every region.
//!
//! ## Global Uniqueness Over Partitioned Storage
//!
//! Unique indexes on a partitioned table can only enforce uniqueness within a
//! partition. Signup therefore writes two rows in a single transaction:
//!
//! - **`users`:** the account itself, list-partitioned by region and keyed by
//!   `(region, long_handle)`.
//! - **`global_email_addresses`:** an unpartitioned table keyed by the SHA-256 of
//!   the normalized (trimmed, lowercased) email address.
//!
//! A duplicate digest aborts the whole transaction, so an email taken in any
//! region is reported as `already_exists` and no account row survives.
//!
//! ## Handles
//!
//! Handles look like `adalov-1718000000a1b2c3d4e5f6-eur`: six characters from the
//! name (padded with random alphanumerics), the Unix timestamp plus 48 random bits,
//! and the region code.

pub mod api;
pub mod cli;
pub mod signup;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
