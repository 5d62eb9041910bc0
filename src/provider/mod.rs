//! Upstream providers and the cache-backed client that talks to them
//!
//! The provider is an ordinary configuration value handed to
//! `CachedClient::new`, so several independently configured clients can live
//! side by side.

pub mod client;

pub use client::{CachedClient, FetchError, Fetched, Source};

use clap::ValueEnum;
use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;

/// Upstream backends a client can be pointed at
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum)]
pub enum ProviderKind {
    /// The public GitHub REST API
    #[default]
    Github,
    /// Azure DevOps
    Azure,
}

impl ProviderKind {
    /// Lowercase name used in config and cache keys
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Github => "github",
            ProviderKind::Azure => "azure",
        }
    }

    /// Base URL used when none is configured
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Github => "https://api.github.com",
            ProviderKind::Azure => "https://dev.azure.com",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "github" => Ok(ProviderKind::Github),
            "azure" => Ok(ProviderKind::Azure),
            _ => Err(ConfigError::InvalidProvider(s.to_string())),
        }
    }
}
