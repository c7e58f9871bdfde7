//! Map validated CLI arguments to an [`Action`].

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{
    ARG_DSN, ARG_HANDLE_ATTEMPTS, ARG_HOST, ARG_MAX_CONNECTIONS, ARG_PORT,
};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let host = matches
        .get_one::<String>(ARG_HOST)
        .cloned()
        .context("missing required argument: --host")?;
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let max_connections = matches
        .get_one::<u32>(ARG_MAX_CONNECTIONS)
        .copied()
        .unwrap_or(5);
    let handle_attempts = matches
        .get_one::<u32>(ARG_HANDLE_ATTEMPTS)
        .copied()
        .unwrap_or(1);

    Ok(Action::Server(Args {
        host,
        port,
        dsn: SecretString::from(dsn),
        max_connections,
        handle_attempts,
    }))
}
