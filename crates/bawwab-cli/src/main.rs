//! Bawwab - LDAP authentication gate for HTTP services
//!
//! Validates HTTP Basic credentials against an LDAP directory,
//! enforces user and group allow-lists, and caches verified logins in
//! a signed session cookie.

use bawwab_core::config::BawwabConfig;
use bawwab_core::SecretResolver;
use bawwab_gate::GateServer;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "bawwab")]
#[command(author = "Bawwab Team")]
#[command(version = bawwab_core::VERSION)]
#[command(about = "LDAP authentication gate for HTTP services", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Bind address
    #[arg(long, env = "BAWWAB_BIND_ADDRESS")]
    bind: Option<String>,

    /// Port number
    #[arg(short, long, env = "BAWWAB_PORT")]
    port: Option<u16>,

    /// Directory URL (ldap:// or ldaps://)
    #[arg(long, env = "BAWWAB_DIRECTORY_URL")]
    directory_url: Option<String>,

    /// Base DN for binds and searches
    #[arg(long, env = "BAWWAB_BASE_DN")]
    base_dn: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "BAWWAB_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gate server
    Server,

    /// Connect and bind to the directory, then exit
    Check,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();

    // Load or create config
    let mut config = if let Some(config_path) = &cli.config {
        BawwabConfig::from_file(config_path)?
    } else {
        BawwabConfig::from_env()
    };

    // Override with CLI args
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(url) = cli.directory_url {
        config.directory.url = url;
    }
    if let Some(base_dn) = cli.base_dn {
        config.directory.base_dn = base_dn;
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("bawwab {}", bawwab_core::VERSION);
        }
        Some(Commands::Check) => {
            check_directory(config).await?;
        }
        Some(Commands::Server) | None => {
            run_server(config).await?;
        }
    }

    Ok(())
}

/// Open a directory connection and bind once, the same way the gate
/// does on a request, then report the outcome.
async fn check_directory(mut config: BawwabConfig) -> anyhow::Result<()> {
    use bawwab_directory::DirectoryOps;

    config.validate()?;

    if !config.directory.bind_password_label.is_empty() {
        let resolved = SecretResolver::default().resolve(&config.directory.bind_password_label);
        if !resolved.is_empty() {
            config.directory.bind_password = resolved;
        }
    }

    info!("checking directory {}", config.directory.url);
    let mut conn = bawwab_directory::connect(&config.directory).await?;

    let result = if !config.directory.bind_dn.is_empty()
        && !config.directory.bind_password.is_empty()
    {
        conn.simple_bind(&config.directory.bind_dn, &config.directory.bind_password)
            .await
    } else {
        conn.simple_bind("", "").await
    };
    conn.release().await;
    result?;

    println!("directory connection OK");
    Ok(())
}

async fn run_server(config: BawwabConfig) -> anyhow::Result<()> {
    info!("Starting bawwab gate...");
    info!("Directory: {}", config.directory.url);

    let server = GateServer::new(config);
    server.run().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_check_rejects_invalid_config_before_connecting() {
        let mut config = BawwabConfig::default();
        config.directory.url = "http://not-ldap.example.com".to_string();
        config.directory.base_dn = "dc=example,dc=org".to_string();

        let err = check_directory(config).await.unwrap_err();
        assert!(err.to_string().contains("ldap:// or ldaps://"));
    }
}
