//! Runtime settings read from the environment (and `.env`, loaded by the binary).

use std::time::Duration;

use crate::error::{PatronageError, Result};
use crate::fetch::{AppToken, BasicClient, DEFAULT_TIMEOUT, HttpClient};
use crate::sources::SourceCatalog;

pub const SOURCES_VAR: &str = "PATRONAGE_SOURCES";
pub const TIMEOUT_VAR: &str = "PATRONAGE_TIMEOUT_SECS";
pub const APP_TOKEN_VAR: &str = "PATRONAGE_APP_TOKEN";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Per-request timeout for dataset downloads
    pub timeout: Duration,
    /// Socrata application token sent with every request
    pub app_token: Option<String>,
    /// JSON catalog replacing the built-in sources
    pub sources_path: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            app_token: None,
            sources_path: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let timeout = match var(TIMEOUT_VAR) {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    PatronageError::Config(format!("{TIMEOUT_VAR} must be whole seconds, got '{raw}'"))
                })?;
                if secs == 0 {
                    return Err(PatronageError::Config(format!("{TIMEOUT_VAR} must be positive")));
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            timeout,
            app_token: var(APP_TOKEN_VAR),
            sources_path: var(SOURCES_VAR),
        })
    }

    /// The configured catalog, or the built-in one.
    pub fn catalog(&self) -> Result<SourceCatalog> {
        match &self.sources_path {
            Some(path) => SourceCatalog::load(path),
            None => Ok(SourceCatalog::builtin()),
        }
    }

    /// An HTTP client honouring the timeout and app token.
    pub fn http_client(&self) -> Result<Box<dyn HttpClient>> {
        let basic = BasicClient::with_timeout(self.timeout)?;
        let client: Box<dyn HttpClient> = match &self.app_token {
            Some(token) => Box::new(AppToken::new(basic, token)?),
            None => Box::new(basic),
        };
        Ok(client)
    }
}
