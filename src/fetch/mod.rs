//! HTTP fetching of CSV exports.
//!
//! [`fetch_bytes`] issues a GET through any [`HttpClient`], treating non-2xx
//! responses as [`PatronageError::Fetch`]. Transport failures and 5xx
//! responses are retried once; client errors are not.

mod app_token;
mod basic;
mod cache;
mod client;

pub use app_token::{APP_TOKEN_HEADER, AppToken};
pub use basic::{BasicClient, DEFAULT_TIMEOUT};
pub use cache::FetchCache;
pub use client::{CSV_MEDIA_TYPE, HttpClient};

use crate::error::{PatronageError, Result};
use bytes::Bytes;
use tracing::{debug, warn};

enum Failure {
    /// Worth one more attempt
    Transient(String),
    Permanent(String),
}

impl Failure {
    fn into_error(self) -> PatronageError {
        match self {
            Self::Transient(msg) | Self::Permanent(msg) => PatronageError::Fetch(msg),
        }
    }
}

/// Fetches `url`, retrying once on a transient failure.
#[tracing::instrument(skip(client))]
pub async fn fetch_bytes<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Bytes> {
    match fetch_once(client, url).await {
        Ok(bytes) => Ok(bytes),
        Err(Failure::Transient(reason)) => {
            warn!(%reason, "Fetch failed, retrying once");
            fetch_once(client, url).await.map_err(Failure::into_error)
        }
        Err(failure) => Err(failure.into_error()),
    }
}

async fn fetch_once<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
) -> std::result::Result<Bytes, Failure> {
    let parsed: reqwest::Url = url
        .parse()
        .map_err(|e| Failure::Permanent(format!("invalid url '{url}': {e}")))?;
    let resp = client
        .get_csv(parsed)
        .await
        .map_err(|e| Failure::Transient(format!("request to {url} failed: {e}")))?;

    let status = resp.status();
    if status.is_server_error() {
        return Err(Failure::Transient(format!("{url} returned status {status}")));
    }
    if !status.is_success() {
        return Err(Failure::Permanent(format!("{url} returned status {status}")));
    }

    let bytes = resp
        .bytes()
        .await
        .map_err(|e| Failure::Transient(format!("reading body from {url} failed: {e}")))?;
    debug!(bytes = bytes.len(), "Response received");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CSV: &str = "date,adult\n2023-01-01,1\n";

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/resource/4d78-rcjw.csv"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CSV))
            .expect(1)
            .mount(&server)
            .await;

        let client = BasicClient::new().unwrap();
        let url = format!("{}/resource/4d78-rcjw.csv", server.uri());
        let bytes = fetch_bytes(&client, &url).await.unwrap();

        assert_eq!(&bytes[..], CSV.as_bytes());
    }

    #[tokio::test]
    async fn test_fetch_retries_once_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CSV))
            .expect(1)
            .mount(&server)
            .await;

        let client = BasicClient::new().unwrap();
        let bytes = fetch_bytes(&client, &server.uri()).await.unwrap();

        assert_eq!(&bytes[..], CSV.as_bytes());
    }

    #[tokio::test]
    async fn test_fetch_gives_up_after_second_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let client = BasicClient::new().unwrap();
        let err = fetch_bytes(&client, &server.uri()).await.unwrap_err();

        assert!(matches!(err, PatronageError::Fetch(msg) if msg.contains("500")));
    }

    #[tokio::test]
    async fn test_fetch_does_not_retry_client_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = BasicClient::new().unwrap();
        let err = fetch_bytes(&client, &server.uri()).await.unwrap_err();

        assert!(matches!(err, PatronageError::Fetch(msg) if msg.contains("404")));
    }

    #[tokio::test]
    async fn test_fetch_times_out_and_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(CSV)
                    .set_delay(Duration::from_secs(2)),
            )
            .expect(2)
            .mount(&server)
            .await;

        let client = BasicClient::with_timeout(Duration::from_millis(200)).unwrap();
        let err = fetch_bytes(&client, &server.uri()).await.unwrap_err();

        assert!(matches!(err, PatronageError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let client = BasicClient::new().unwrap();
        let err = fetch_bytes(&client, "not a url").await.unwrap_err();
        assert!(err.to_string().contains("invalid url"));
    }

    #[tokio::test]
    async fn test_app_token_header_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header(APP_TOKEN_HEADER, "secret-token"))
            .and(header("accept", CSV_MEDIA_TYPE))
            .respond_with(ResponseTemplate::new(200).set_body_string(CSV))
            .expect(1)
            .mount(&server)
            .await;

        let client = AppToken::new(BasicClient::new().unwrap(), "secret-token").unwrap();
        assert!(fetch_bytes(&client, &server.uri()).await.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_requests_csv() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("accept", CSV_MEDIA_TYPE))
            .respond_with(ResponseTemplate::new(200).set_body_string(CSV))
            .expect(1)
            .mount(&server)
            .await;

        let client = BasicClient::new().unwrap();
        assert!(fetch_bytes(&client, &server.uri()).await.is_ok());
    }

    #[test]
    fn test_app_token_rejects_invalid_value() {
        let result = AppToken::new(BasicClient::new().unwrap(), "bad\ntoken");
        assert!(matches!(result, Err(PatronageError::Config(_))));
    }
}
