use anyhow::Context;
use chronos_admin::accounts;
use chronos_admin::auth_client::AuthClient;
use chronos_admin::config::{default_log_filter, Config};
use chronos_admin::identification::Identification;
use chronos_admin::provisioning::{AccountNaming, PlannedAccount, Provisioner};
use chronos_admin::resolver::IdentificationResolver;
use chronos_admin::rest_client::RestClient;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "chronos-admin")]
#[command(about = "One-shot admin operations for the Chronos barbershop backend")]
struct Cli {
    /// Env file to read instead of ./.env
    #[arg(short, long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the login email for an identification
    Resolve {
        identification: Identification,
        /// Caller class used for the lookup
        #[arg(long = "as", value_enum, default_value = "anon")]
        caller: Caller,
    },
    /// Sign in with an identification and password
    Login {
        identification: Identification,
        #[arg(short, long, env = "CHRONOS_PASSWORD")]
        password: String,
    },
    /// Show the profile, staff record and email behind an identification
    Inspect { identification: Identification },
    /// Set a new password (random unless given) and confirm the email
    ResetPassword {
        identification: Identification,
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Give the account the ADMIN role
    Promote { identification: Identification },
    /// Clear the account's blocked flag
    Unblock { identification: Identification },
    /// Create or refresh indexed admin accounts (admin.barber.NNN@chronos.app)
    Provision {
        #[arg(long)]
        from: u32,
        #[arg(long)]
        to: u32,
        #[arg(long, default_value = "chronos.app")]
        domain: String,
    },
    /// Create or refresh a single admin account with an explicit email
    ProvisionOne {
        identification: Identification,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "Administrador")]
        name: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Caller {
    Anon,
    Service,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_log_filter(env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match cli.env_file {
        Some(ref path) => Config::from_env_file(path)?,
        None => Config::from_env()?,
    };
    tracing::info!("Configuration loaded for {}", config.supabase_url);

    run(cli.command, &config).await
}

async fn run(command: Command, config: &Config) -> anyhow::Result<()> {
    match command {
        Command::Resolve {
            identification,
            caller,
        } => {
            let rest = match caller {
                Caller::Anon => RestClient::anonymous(config)?,
                Caller::Service => RestClient::service(config)?,
            };
            let resolver = IdentificationResolver::new(rest).with_normalization(config.normalization);
            let email = resolver
                .resolve(&identification)
                .await
                .context("resolver call failed")?;

            match email {
                Some(ref email) => tracing::info!("{} → {}", identification, email),
                None => tracing::warn!("Identification {} is not registered", identification),
            }
            println!(
                "{}",
                json!({ "identification": identification, "email": email })
            );
        }
        Command::Login {
            identification,
            password,
        } => {
            let resolver = IdentificationResolver::new(RestClient::anonymous(config)?)
                .with_normalization(config.normalization);
            let auth = AuthClient::new(config)?;
            let session =
                accounts::login_with_identification(&resolver, &auth, &identification, &password)
                    .await?;
            println!(
                "{}",
                json!({
                    "identification": identification,
                    "user_id": session.user.id,
                    "email": session.user.email,
                    "expires_in": session.expires_in,
                })
            );
        }
        Command::Inspect { identification } => {
            let rest = RestClient::service(config)?;
            let account =
                accounts::find_account(&rest, &identification, config.normalization).await?;
            let resolver = IdentificationResolver::new(rest).with_normalization(config.normalization);
            let email = resolver.resolve(&identification).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "identification": identification,
                    "email": email,
                    "account": account,
                }))?
            );
        }
        Command::ResetPassword {
            identification,
            password,
        } => {
            let resolver = IdentificationResolver::new(RestClient::service(config)?)
                .with_normalization(config.normalization);
            let auth = AuthClient::new(config)?;
            let credential =
                accounts::reset_password(&resolver, &auth, &identification, password).await?;
            println!("{}", serde_json::to_string_pretty(&credential)?);
        }
        Command::Promote { identification } => {
            let rest = RestClient::service(config)?;
            let profile =
                accounts::promote_to_admin(&rest, &identification, config.normalization).await?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Command::Unblock { identification } => {
            let rest = RestClient::service(config)?;
            let profile =
                accounts::unblock(&rest, &identification, config.normalization).await?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Command::Provision { from, to, domain } => {
            let naming = AccountNaming {
                domain,
                ..Default::default()
            };
            let plan = naming.plan(from..=to, config.normalization)?;
            provision(config, &plan).await?;
        }
        Command::ProvisionOne {
            identification,
            email,
            name,
        } => {
            let account = PlannedAccount::custom(
                config.normalization.apply(&identification),
                &email,
                &name,
            )?;
            provision(config, &[account]).await?;
        }
    }
    Ok(())
}

async fn provision(config: &Config, plan: &[PlannedAccount]) -> anyhow::Result<()> {
    let provisioner = Provisioner::new(
        AuthClient::new(config)?,
        RestClient::service(config)?,
        config.normalization,
    );
    let summary = provisioner.provision_all(plan).await?;

    tracing::info!(
        "Provisioning complete. Provisioned: {}, Errors: {}",
        summary.provisioned.len(),
        summary.failed.len()
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if !summary.failed.is_empty() {
        anyhow::bail!("{} accounts failed to provision", summary.failed.len());
    }
    Ok(())
}
