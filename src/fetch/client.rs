use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Method, Request, Response, Url};

/// Media type requested for dataset exports.
pub const CSV_MEDIA_TYPE: &str = "text/csv";

/// Executes HTTP requests; wrappers layer headers onto an inner client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;

    /// GETs a CSV export at `url`.
    async fn get_csv(&self, url: Url) -> reqwest::Result<Response> {
        let mut req = Request::new(Method::GET, url);
        req.headers_mut()
            .insert(ACCEPT, HeaderValue::from_static(CSV_MEDIA_TYPE));
        self.execute(req).await
    }
}
