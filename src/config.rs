//! Configuration loading
//!
//! Values come from CLI flags, then environment variables, then defaults
//! (see `cli`). Nothing is reconfigured once a client has been built.

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::provider::ProviderKind;

pub const ENV_PROVIDER: &str = "RESPCACHE_PROVIDER";
pub const ENV_BASE_URL: &str = "RESPCACHE_BASE_URL";
pub const ENV_TTL_MS: &str = "RESPCACHE_TTL_MS";
pub const ENV_CACHE_DIR: &str = "RESPCACHE_CACHE_DIR";
pub const ENV_TOKEN: &str = "RESPCACHE_TOKEN";

/// Default revalidate time (5 minutes)
const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The provider name is not one we know
    #[error("Invalid provider: '{0}'. Valid providers: github, azure")]
    InvalidProvider(String),

    /// The TTL is not a whole number of milliseconds
    #[error("Invalid TTL: '{0}'. Expected milliseconds as a whole number")]
    InvalidTtl(String),
}

/// Runtime configuration for the cached client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Upstream backend
    pub provider: ProviderKind,
    /// Base URL requests are made against
    pub base_url: String,
    /// How long a cached response stays fresh
    pub revalidate_time: Duration,
    /// Directory holding cache files
    pub cache_dir: PathBuf,
    /// Bearer token sent upstream, if any
    pub token: Option<String>,
}

/// Values supplied on the command line, taking precedence over the environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub provider: Option<ProviderKind>,
    pub base_url: Option<String>,
    pub revalidate_time: Option<Duration>,
    pub cache_dir: Option<PathBuf>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `RESPCACHE_PROVIDER` - `github` or `azure` (default: github)
    /// - `RESPCACHE_BASE_URL` - Upstream base URL (default: the provider's)
    /// - `RESPCACHE_TTL_MS` - Revalidate time in milliseconds (default: 300000)
    /// - `RESPCACHE_CACHE_DIR` - Cache directory (default: system temp dir)
    /// - `RESPCACHE_TOKEN` - Bearer token (default: none)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(&Overrides::default())
    }

    /// Like `from_env`, but overridden fields never read their variable
    pub fn from_env_with(overrides: &Overrides) -> Result<Self, ConfigError> {
        Self::resolve(|name| env::var(name).ok(), overrides)
    }

    /// Builds a Config from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::resolve(lookup, &Overrides::default())
    }

    /// Builds a Config field by field, preferring `overrides` over `lookup`
    ///
    /// A variable is only parsed when its field is not overridden, so an
    /// invalid value in the environment cannot block a valid flag. The base
    /// URL falls back to the default of the resolved provider only when
    /// neither source sets it.
    pub fn resolve<F>(lookup: F, overrides: &Overrides) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = match overrides.provider {
            Some(provider) => provider,
            None => lookup(ENV_PROVIDER)
                .map(|name| name.parse::<ProviderKind>())
                .transpose()?
                .unwrap_or_default(),
        };

        let revalidate_time = match (overrides.revalidate_time, lookup(ENV_TTL_MS)) {
            (Some(ttl), _) => ttl,
            (None, Some(raw)) => parse_ttl_ms(&raw)?,
            (None, None) => DEFAULT_TTL,
        };

        Ok(Self {
            provider,
            base_url: overrides
                .base_url
                .clone()
                .or_else(|| lookup(ENV_BASE_URL))
                .unwrap_or_else(|| provider.default_base_url().to_string()),
            revalidate_time,
            cache_dir: overrides
                .cache_dir
                .clone()
                .or_else(|| lookup(ENV_CACHE_DIR).map(PathBuf::from))
                .unwrap_or_else(env::temp_dir),
            token: lookup(ENV_TOKEN).filter(|token| !token.is_empty()),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        let provider = ProviderKind::default();
        Self {
            provider,
            base_url: provider.default_base_url().to_string(),
            revalidate_time: DEFAULT_TTL,
            cache_dir: env::temp_dir(),
            token: None,
        }
    }
}

/// Parses a millisecond count into a Duration
pub fn parse_ttl_ms(raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidTtl(raw.to_string()))
}
