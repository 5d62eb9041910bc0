//! Cache-backed HTTP client for the configured provider
//!
//! Each request URL gets its own cache file, named after the digest of the
//! provider and URL. Fresh entries are served from disk; otherwise the
//! upstream is called and the response saved. When the upstream fails, an
//! expired entry is still better than nothing.

use futures::future::join_all;
use reqwest::{Client, StatusCode};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use super::ProviderKind;
use crate::cache::{CacheError, CacheKey, CacheStatus, TtlFileCache};
use crate::config::Config;

const USER_AGENT: &str = concat!("respcache/", env!("CARGO_PKG_VERSION"));

/// Errors that can occur when fetching through the cache
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("Upstream returned {status} for {url}")]
    Status { url: String, status: StatusCode },

    /// Cache inspection failed
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Where a fetched body came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// A fresh cache entry
    Cache,
    /// The upstream, just now
    Upstream,
    /// An expired cache entry, served because the upstream failed
    Stale,
}

/// A response body along with its provenance
#[derive(Debug, Clone)]
pub struct Fetched {
    pub body: String,
    pub source: Source,
    pub key: CacheKey,
}

/// Client that fetches provider resources through a TTL file cache
#[derive(Debug, Clone)]
pub struct CachedClient {
    http_client: Client,
    provider: ProviderKind,
    base_url: String,
    revalidate_time: Duration,
    cache_dir: PathBuf,
    token: Option<String>,
}

impl CachedClient {
    /// Creates a new CachedClient from configuration
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let http_client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self::with_client(config, http_client))
    }

    /// Creates a new CachedClient with a custom HTTP client
    pub fn with_client(config: &Config, http_client: Client) -> Self {
        Self {
            http_client,
            provider: config.provider,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            revalidate_time: config.revalidate_time,
            cache_dir: config.cache_dir.clone(),
            token: config.token.clone(),
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    /// Builds the full upstream URL for `path`
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Cache key for a full URL; the provider is part of the key
    pub fn cache_key(&self, url: &str) -> CacheKey {
        CacheKey::digest(&format!("{}:{}", self.provider, url))
    }

    fn cache_for(&self, key: &CacheKey) -> TtlFileCache {
        TtlFileCache::for_key(&self.cache_dir, self.revalidate_time, key)
    }

    /// Fetches `path`, serving from cache while the entry is fresh
    ///
    /// # Returns
    /// * `Ok(Fetched)` from the cache, the upstream, or a stale entry
    /// * `Err(FetchError)` if the upstream failed and nothing was cached
    pub async fn fetch(&self, path: &str) -> Result<Fetched, FetchError> {
        let url = self.url_for(path);
        let key = self.cache_key(&url);
        let cache = self.cache_for(&key);

        match cache.read_if_valid() {
            Ok(Some(body)) => {
                tracing::debug!(%url, %key, "cache hit");
                return Ok(Fetched {
                    body: into_text(body),
                    source: Source::Cache,
                    key,
                });
            }
            Ok(None) => tracing::debug!(%url, %key, "cache miss"),
            Err(e) => tracing::warn!(%url, error = %e, "cache lookup failed, fetching upstream"),
        }

        match self.fetch_upstream(&url).await {
            Ok(body) => {
                // Failures are already logged by the cache and must not fail the request
                let _ = cache.save(Some(body.clone())).await;
                Ok(Fetched {
                    body,
                    source: Source::Upstream,
                    key,
                })
            }
            Err(e) => {
                if let Ok(Some(cached)) = cache.read() {
                    tracing::warn!(%url, error = %e, "upstream failed, serving stale cache entry");
                    return Ok(Fetched {
                        body: into_text(cached.body),
                        source: Source::Stale,
                        key,
                    });
                }
                Err(e)
            }
        }
    }

    /// Fetches several paths concurrently, keeping input order
    pub async fn fetch_all<S: AsRef<str>>(&self, paths: &[S]) -> Vec<Result<Fetched, FetchError>> {
        join_all(paths.iter().map(|path| self.fetch(path.as_ref()))).await
    }

    /// Reports the cache state for `path` without touching the upstream
    pub fn status(&self, path: &str) -> Result<CacheStatus, FetchError> {
        let key = self.cache_key(&self.url_for(path));
        Ok(self.cache_for(&key).status()?)
    }

    async fn fetch_upstream(&self, url: &str) -> Result<String, FetchError> {
        tracing::info!(%url, provider = %self.provider, "fetching from upstream");

        let mut request = self.http_client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }
        Ok(response.text().await?)
    }
}

/// Cache files hold UTF-8 text written by `save`
fn into_text(body: Vec<u8>) -> String {
    String::from_utf8(body).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}
