use super::{HttpClient, fetch_bytes};
use crate::error::Result;
use bytes::Bytes;
use std::collections::HashMap;
use tracing::debug;

/// Caller-owned cache of fetched exports, keyed by URL.
///
/// Nothing is cached implicitly; a caller that wants to reuse a download
/// within one invocation holds a `FetchCache` and fetches through it.
#[derive(Debug, Default)]
pub struct FetchCache {
    entries: HashMap<String, Bytes>,
}

impl FetchCache {
    /// Returns the cached bytes for `url`, fetching them on first use.
    pub async fn get_or_fetch<C: HttpClient + ?Sized>(
        &mut self,
        client: &C,
        url: &str,
    ) -> Result<Bytes> {
        if let Some(bytes) = self.entries.get(url) {
            debug!(url, "Fetch cache hit");
            return Ok(bytes.clone());
        }

        let bytes = fetch_bytes(client, url).await?;
        self.entries.insert(url.to_string(), bytes.clone());
        Ok(bytes)
    }

    pub fn get(&self, url: &str) -> Option<&Bytes> {
        self.entries.get(url)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::BasicClient;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_second_lookup_is_served_from_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("date,adult\n"))
            .expect(1)
            .mount(&server)
            .await;

        let client = BasicClient::new().unwrap();
        let mut cache = FetchCache::default();

        let first = cache.get_or_fetch(&client, &server.uri()).await.unwrap();
        let second = cache.get_or_fetch(&client, &server.uri()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&server.uri()).is_some());
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = BasicClient::new().unwrap();
        let mut cache = FetchCache::default();

        assert!(cache.get_or_fetch(&client, &server.uri()).await.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut cache = FetchCache::default();
        cache.entries.insert("u".into(), Bytes::from_static(b"x"));
        cache.clear();
        assert!(cache.is_empty());
    }
}
