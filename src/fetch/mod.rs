mod client;
mod basic;
pub mod auth;

pub use client::HttpClient;
pub use basic::BasicClient;

use anyhow::Result;
use bytes::Bytes;

/// Fetches the raw feed bytes from `url` with a single GET.
///
/// A non-2xx status is treated the same as an unreachable endpoint: the
/// caller gets an error, never a body to decode.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Bytes> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?.error_for_status()?;
    Ok(resp.bytes().await?)
}
