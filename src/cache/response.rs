//! Responses that can be persisted by the cache

use std::future::Future;

use super::BodyError;

/// A response whose body can be drained to text exactly once
///
/// `text` consumes the response, so a body can never be read twice through
/// this trait.
pub trait CachableResponse {
    /// Drains the full body as text
    fn text(self) -> impl Future<Output = Result<String, BodyError>> + Send;
}

impl CachableResponse for reqwest::Response {
    /// Drains the body whatever the status code; deciding whether an error
    /// status is worth caching is up to the caller.
    async fn text(self) -> Result<String, BodyError> {
        Ok(reqwest::Response::text(self).await?)
    }
}

impl CachableResponse for String {
    async fn text(self) -> Result<String, BodyError> {
        Ok(self)
    }
}

impl CachableResponse for &'static str {
    async fn text(self) -> Result<String, BodyError> {
        Ok(self.to_string())
    }
}
