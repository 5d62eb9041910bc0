//! Command-line interface parsing for respcache
//!
//! This module handles parsing of CLI arguments using clap. Global flags
//! override the environment configuration for a single run.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{parse_ttl_ms, Overrides};
use crate::provider::ProviderKind;

/// respcache - fetch provider API resources through a TTL disk cache
#[derive(Parser, Debug)]
#[command(name = "respcache")]
#[command(about = "Fetch API responses through a disk cache with a time-to-live")]
#[command(version)]
pub struct Cli {
    /// Upstream provider (overrides RESPCACHE_PROVIDER)
    #[arg(long, value_enum, global = true)]
    pub provider: Option<ProviderKind>,

    /// Upstream base URL (overrides RESPCACHE_BASE_URL)
    #[arg(long, value_name = "URL", global = true)]
    pub base_url: Option<String>,

    /// Revalidate time in milliseconds (overrides RESPCACHE_TTL_MS)
    #[arg(long, value_name = "MILLIS", value_parser = parse_ttl_ms, global = true)]
    pub ttl_ms: Option<Duration>,

    /// Cache directory (overrides RESPCACHE_CACHE_DIR)
    #[arg(long, value_name = "DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// What to do
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Fetch one or more paths and print their bodies
    ///
    /// Examples:
    ///   respcache fetch /users/octocat
    ///   respcache --ttl-ms 60000 fetch /users/octocat /orgs/rust-lang
    Fetch {
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<String>,
    },
    /// Print the cache state for a path as JSON
    Status {
        #[arg(value_name = "PATH")]
        path: String,
    },
    /// Print the cache key derived from a message
    Key {
        #[arg(value_name = "MESSAGE")]
        message: String,
    },
}

impl Cli {
    /// Collects the global flags that take precedence over the environment
    pub fn overrides(&self) -> Overrides {
        Overrides {
            provider: self.provider,
            base_url: self.base_url.clone(),
            revalidate_time: self.ttl_ms,
            cache_dir: self.cache_dir.clone(),
        }
    }
}
