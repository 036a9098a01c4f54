//! authrelay CLI
//!
//! Sends requests through the authrelay credential layer. The credential is
//! read from `AUTHRELAY_ACCESS_TOKEN` and `AUTHRELAY_REFRESH_TOKEN` (the
//! prefix is configurable).
//!
//! # Usage
//!
//! ```bash
//! # Authenticated GET, renewing the credential on a 401
//! authrelay request GET /article/source_articles/
//!
//! # POST a JSON body
//! authrelay request POST /article/ --data '{"title": "draft"}'
//!
//! # Fire 10 concurrent requests to watch single-flight renewal
//! authrelay burst /article/source_articles/ --count 10
//!
//! # Show the effective configuration
//! authrelay config
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use authrelay_cli::commands::{self, OutputFormat};
use authrelay_cli::config::load_config;
use authrelay_core::RelayError;
use clap::{Parser, Subcommand};
use reqwest::Method;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "authrelay")]
#[command(about = "Send HTTP requests with transparent credential renewal")]
#[command(version)]
struct Cli {
    /// Path to a configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a single request
    Request {
        /// HTTP method (GET, POST, PUT, PATCH, DELETE)
        method: String,

        /// Path relative to the base URL, or an absolute URL
        path: String,

        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,

        /// Send without attaching a credential
        #[arg(long)]
        bare: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Send several concurrent GET requests through one client
    Burst {
        /// Path relative to the base URL
        path: String,

        /// Number of concurrent requests
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = load_config(cli.config.as_deref())?;
    let mut config = loaded.relay;
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url
            .parse()
            .with_context(|| format!("invalid base URL {:?}", base_url))?;
    }

    init_logging(cli.verbose, &config.log_level);

    match &loaded.source {
        Some(path) => info!("Loaded configuration from {:?}", path),
        None => info!("No configuration file found, using defaults"),
    }

    match cli.command {
        Commands::Request {
            method,
            path,
            data,
            bare,
            format,
        } => {
            let method = Method::from_bytes(method.to_uppercase().as_bytes())
                .with_context(|| format!("invalid HTTP method {:?}", method))?;

            match commands::send_request(&config, method, &path, data.as_deref(), bare).await {
                Ok(response) => println!("{}", commands::render_response(&response, format)?),
                Err(e) => return Err(explain(e)),
            }
        }
        Commands::Burst { path, count } => {
            let report = commands::burst(&config, &path, count).await?;
            for (i, outcome) in report.outcomes.iter().enumerate() {
                println!("[{}] {}", i, outcome);
            }
            println!(
                "{} succeeded, {} failed, session {}",
                report.succeeded, report.failed, report.session
            );
        }
        Commands::Config => {
            print!("{}", commands::render_config(&config)?);
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new(default_level)
        }
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Attach a sign-in hint to errors that end the session.
fn explain(error: anyhow::Error) -> anyhow::Error {
    let expired = error
        .downcast_ref::<RelayError>()
        .is_some_and(RelayError::requires_reauthentication);
    if expired {
        error.context("session expired; sign in again and update the credential environment")
    } else {
        error
    }
}
