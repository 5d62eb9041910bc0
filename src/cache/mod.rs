//! Cache module for storing upstream responses to disk
//!
//! This module provides content-derived cache keys and a TTL file cache that
//! persists one response body per file. Freshness is judged from the file's
//! modification time only. Save failures are returned and logged but never
//! need to break the request that produced the response.

mod digest;
mod error;
mod manager;
mod response;

pub use digest::CacheKey;
pub use error::{BodyError, CacheError, SaveError};
pub use manager::{CacheStatus, CachedBody, SaveOutcome, TtlFileCache};
pub use response::CachableResponse;
