use crate::{
    api,
    cli::telemetry,
    signup::{credentials::Argon2Hasher, validation::SignupRules, Signup, SignupConfig},
    store::{postgres, PgAccountStore},
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub host: String,
    pub port: u16,
    pub dsn: SecretString,
    pub max_connections: u32,
    pub handle_attempts: u32,
}

/// Execute the server action.
/// # Errors
/// Returns an error if no database node is reachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let store = Arc::new(
        PgAccountStore::connect(args.dsn.expose_secret(), args.max_connections).await?,
    );
    let hasher = Argon2Hasher::new().context("Invalid password hashing parameters")?;

    let signup = Arc::new(Signup::new(
        store.clone(),
        Arc::new(SignupRules::new()),
        Arc::new(hasher),
        SignupConfig::new().with_handle_attempts(args.handle_attempts),
    ));

    let served = api::new(&args.host, args.port, signup).await;

    store.close().await;
    info!("Database pool closed");
    telemetry::shutdown_tracer();

    served
}

fn log_startup_args(args: &Args) {
    let nodes = postgres::cluster_nodes(args.dsn.expose_secret()).map_or_else(
        |_| Vec::new(),
        |nodes| nodes.iter().map(|node| postgres::describe_node(node)).collect(),
    );

    info!(
        host = %args.host,
        port = args.port,
        database_nodes = ?nodes,
        max_connections = args.max_connections,
        handle_attempts = args.handle_attempts,
        "Starting server"
    );
}
