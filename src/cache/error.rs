//! Error types for the file cache

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that surface from cache inspection
///
/// A missing cache file is not an error: it is reported as `false` or `None`
/// by the cache. Everything else the filesystem reports ends up here.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem failure other than "not found" (permissions, I/O, ...)
    #[error("Failed to access cache file {}: {source}", .path.display())]
    Platform {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors that can occur when draining a response body
#[derive(Debug, Error)]
pub enum BodyError {
    /// Reading the HTTP body failed
    #[error("HTTP body read failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The body was already taken by someone else
    ///
    /// The built-in implementations consume the response and never return
    /// this. It is for custom `CachableResponse` implementations wrapping a
    /// shared or pre-read body.
    #[error("Response body already consumed")]
    Consumed,
}

/// Errors that can occur when persisting a response
///
/// These never need to reach the user: a failed save only means the next
/// lookup misses.
#[derive(Debug, Error)]
pub enum SaveError {
    /// The response body could not be drained
    #[error("Failed to read response body: {0}")]
    Body(#[from] BodyError),

    /// The cache file could not be written
    #[error("Failed to write cache file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
