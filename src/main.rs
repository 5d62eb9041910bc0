//! respcache - fetch API responses through a TTL disk cache
//!
//! Bodies go to stdout, logs go to stderr.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use respcache::cache::CacheKey;
use respcache::cli::{Cli, Command};
use respcache::config::Config;
use respcache::provider::{CachedClient, Source};

/// Installs the tracing subscriber
///
/// Defaults to "respcache=info", can be overridden with RUST_LOG.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "respcache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    if let Command::Key { message } = &cli.command {
        println!("{}", CacheKey::digest(message));
        return Ok(ExitCode::SUCCESS);
    }

    let config = Config::from_env_with(&cli.overrides())?;
    tracing::debug!(
        provider = %config.provider,
        base_url = %config.base_url,
        ttl_ms = u64::try_from(config.revalidate_time.as_millis()).unwrap_or(u64::MAX),
        cache_dir = %config.cache_dir.display(),
        "configuration loaded"
    );
    let client = CachedClient::new(&config)?;

    match &cli.command {
        Command::Fetch { paths } => {
            let mut failed = false;
            for (path, result) in paths.iter().zip(client.fetch_all(paths.as_slice()).await) {
                match result {
                    Ok(fetched) => {
                        if fetched.source == Source::Stale {
                            tracing::warn!(%path, "served stale cache entry");
                        }
                        println!("{}", fetched.body);
                    }
                    Err(e) => {
                        eprintln!("Error fetching {}: {}", path, e);
                        failed = true;
                    }
                }
            }
            Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
        }
        Command::Status { path } => {
            let status = client.status(path)?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Key { .. } => Ok(ExitCode::SUCCESS),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
