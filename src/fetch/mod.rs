//! Download of datasets published over HTTP.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Result, bail};

/// Returns `true` when `source` should be fetched over the network.
pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Downloads the body at `url`, failing on non-success status codes.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        bail!("server returned status {status}");
    }
    Ok(resp.bytes().await?.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://example.org/admissions.csv"));
        assert!(is_remote("http://localhost:8080/staff.csv"));
        assert!(!is_remote("data/http_logs.csv"));
        assert!(!is_remote("admissions.csv"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_invalid_url() {
        let client = BasicClient::new();
        assert!(fetch_bytes(&client, "not a url").await.is_err());
    }
}
