//! Utility to check that the identification resolver function is deployed
//! with the right privileges, and optionally resolve a sample identification.
//!
//! Usage: verify-resolver [IDENTIFICATION]

use chronos_admin::config::{default_log_filter, Config};
use chronos_admin::db::{inspect_resolver_function, Database, SqlLookup};
use chronos_admin::identification::Identification;
use chronos_admin::resolver::{IdentificationResolver, RESOLVER_FUNCTION};
use std::env;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the resolver audit.
///
/// Connects over `DATABASE_URL`, prints the function's catalog status and
/// exits non-zero when it is missing or wrongly exposed.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_log_filter(env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env()?;
    let db = Database::new(config.require_database_url()?).await?;

    let status = inspect_resolver_function(&db.pool).await?;
    println!("{}:", RESOLVER_FUNCTION);
    println!("  - exists: {}", status.exists);
    println!("  - security definer: {}", status.security_definer);
    println!("  - anon can execute: {}", status.anon_can_execute);
    println!(
        "  - authenticated can execute: {}",
        status.authenticated_can_execute
    );
    println!("  - public can execute: {}", status.public_can_execute);

    if let Some(raw) = env::args().nth(1) {
        let id = Identification::parse(&raw)?;
        let resolver = IdentificationResolver::new(SqlLookup::new(db.pool.clone()))
            .with_normalization(config.normalization);
        match resolver.resolve(&id).await? {
            Some(email) => println!("  - {} resolves to {}", id, email),
            None => println!("  - {} resolves to nothing", id),
        }
    }

    if !status.is_correctly_exposed() {
        anyhow::bail!("{} is missing or wrongly exposed", RESOLVER_FUNCTION);
    }

    tracing::info!("Resolver function verified");
    Ok(())
}
