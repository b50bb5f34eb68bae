use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use ndash::{
    AppState, SharedState, api,
    auth::{self, Argon2Operator, CredentialVerifier, StaticOperator},
    config::{self, AppConfig, SessionConfig, UpstreamConfig},
    powerdns::client::PowerDnsClient,
    session::{InMemorySessionStore, SessionGate},
};
use tokio::{net::TcpListener, signal};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, rename_all = "kebab-case")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    /// Listen address for the HTTP server
    #[arg(long, env = "LISTEN", value_name = "ADDR", default_value = "0.0.0.0:3000")]
    listen: SocketAddr,
    /// PowerDNS API URL (with or without the /api/v1 suffix)
    #[arg(long, env = "PDNS_API_URL", value_name = "URL", default_value = "http://127.0.0.1:8081")]
    pdns_api_url: String,
    /// PowerDNS API key
    #[arg(long, env = "PDNS_API_KEY", value_name = "KEY", hide_env_values = true)]
    pdns_api_key: Option<String>,
    /// Per-request timeout for PowerDNS calls
    #[arg(long, env = "PDNS_TIMEOUT_SECS", value_name = "SECS", default_value_t = 10)]
    pdns_timeout_secs: u64,
    /// Operator username
    #[arg(long, env = "ADMIN_USERNAME", value_name = "NAME", default_value = "admin")]
    admin_username: String,
    /// Operator password (plain; prefer --admin-password-hash)
    #[arg(long, env = "ADMIN_PASSWORD", value_name = "PASSWORD", default_value = "admin123", hide_env_values = true)]
    admin_password: String,
    /// Argon2 PHC hash of the operator password; overrides --admin-password
    #[arg(long, env = "ADMIN_PASSWORD_HASH", value_name = "PHC", hide_env_values = true)]
    admin_password_hash: Option<String>,
    /// Session lifetime
    #[arg(long, env = "SESSION_TTL_SECS", value_name = "SECS", default_value_t = 86_400)]
    session_ttl_secs: i64,
    /// Mark the session cookie Secure (serve over HTTPS)
    #[arg(long, env = "SECURE_COOKIES")]
    secure_cookies: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print an Argon2 hash for use with --admin-password-hash
    HashPassword {
        #[arg(value_name = "PASSWORD")]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    if let Some(Command::HashPassword { password }) = &cli.command {
        println!("{}", auth::hash_password(password)?);
        return Ok(());
    }

    let config = build_app_config(&cli)?;
    let state = init_shared_state(&cli, config)?;
    let app = api::create_router(state);

    let listener = TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("failed to bind to {}", cli.listen))?;

    info!("listening on http://{}", listener.local_addr()?);
    info!("PowerDNS API: {}", cli.pdns_api_url);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited with error")?;

    Ok(())
}

fn init_shared_state(cli: &Cli, config: AppConfig) -> Result<SharedState> {
    let pdns = PowerDnsClient::new(&config.upstream).context("failed to build PowerDNS client")?;

    let verifier: Arc<dyn CredentialVerifier> = match &cli.admin_password_hash {
        Some(hash) => Arc::new(Argon2Operator::new(&cli.admin_username, hash)?),
        None => {
            if cli.admin_password == "admin123" {
                warn!("using the default operator password; set ADMIN_PASSWORD or ADMIN_PASSWORD_HASH");
            }
            Arc::new(StaticOperator::new(&cli.admin_username, &cli.admin_password))
        }
    };
    let gate = SessionGate::new(
        verifier,
        Arc::new(InMemorySessionStore::new()),
        config.session.clone(),
    );

    Ok(Arc::new(AppState {
        config,
        pdns: Arc::new(pdns),
        gate,
    }))
}

fn build_app_config(cli: &Cli) -> Result<AppConfig> {
    if cli.pdns_api_url.trim().is_empty() {
        bail!("--pdns-api-url cannot be empty");
    }
    if cli.pdns_timeout_secs == 0 {
        bail!("--pdns-timeout-secs must be at least 1");
    }
    let ttl = config::session_ttl(cli.session_ttl_secs)
        .with_context(|| format!("invalid --session-ttl-secs {}", cli.session_ttl_secs))?;
    if cli.pdns_api_key.is_none() {
        warn!("no PowerDNS API key configured; upstream calls will likely be rejected");
    }

    Ok(AppConfig {
        upstream: UpstreamConfig {
            base_url: cli.pdns_api_url.trim().to_string(),
            api_key: cli.pdns_api_key.clone().unwrap_or_default(),
            timeout: Duration::from_secs(cli.pdns_timeout_secs),
        },
        session: SessionConfig {
            ttl,
            secure_cookie: cli.secure_cookies,
        },
    })
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!("failed to install CTRL+C handler: {err}");
    }
    info!("shutdown signal received");
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
