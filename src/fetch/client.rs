use async_trait::async_trait;
use reqwest::{Request, Response};

/// Seam between the update source and the actual HTTP stack.
///
/// Production code goes through [`crate::fetch::BasicClient`] (optionally
/// wrapped by an auth decorator); tests substitute a canned implementation.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
