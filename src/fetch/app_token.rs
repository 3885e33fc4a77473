use super::client::HttpClient;
use crate::error::{PatronageError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};

/// Header the Socrata open-data API reads application tokens from.
pub const APP_TOKEN_HEADER: &str = "x-app-token";

/// An [`HttpClient`] wrapper that sends a Socrata application token with
/// every request, raising the portal's anonymous rate limits.
pub struct AppToken<C> {
    inner: C,
    token: HeaderValue,
}

impl<C> AppToken<C> {
    /// Wraps `inner`, failing if `token` is not a valid header value.
    pub fn new(inner: C, token: &str) -> Result<Self> {
        let mut token = HeaderValue::from_str(token)
            .map_err(|e| PatronageError::Config(format!("invalid app token: {e}")))?;
        token.set_sensitive(true);
        Ok(Self { inner, token })
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for AppToken<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.headers_mut()
            .insert(HeaderName::from_static(APP_TOKEN_HEADER), self.token.clone());
        self.inner.execute(req).await
    }
}
