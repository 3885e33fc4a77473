//! Catalog of patronage datasets published on the ACT open-data portal.

use serde::{Deserialize, Serialize};

use crate::error::{PatronageError, Result};

/// A named CSV dataset and the metric columns it is expected to carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: String,
    pub title: String,
    pub url: String,
    /// Expected metric columns; empty accepts whatever the CSV carries
    #[serde(default)]
    pub metrics: Vec<String>,
}

impl DataSource {
    fn new(id: &str, title: &str, url: &str, metrics: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            url: url.to_string(),
            metrics: metrics.iter().map(|m| m.to_string()).collect(),
        }
    }

    /// File name for saving the raw export: the URL's last path segment,
    /// without the query string.
    pub fn file_name(&self) -> String {
        file_name_from_url(&self.url)
    }
}

/// File name for a URL's raw export, falling back to `data.csv`.
pub fn file_name_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    match path.rsplit('/').next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => "data.csv".to_string(),
    }
}

/// Where the CSV bytes for a command come from.
#[derive(Debug, Clone, PartialEq)]
pub enum Location<'a> {
    Catalog(&'a DataSource),
    Url(String),
    File(String),
}

/// The set of datasets the tool knows by id.
#[derive(Debug, Clone)]
pub struct SourceCatalog {
    sources: Vec<DataSource>,
}

impl SourceCatalog {
    /// The three ACT Transport patronage datasets.
    pub fn builtin() -> Self {
        Self {
            sources: vec![
                DataSource::new(
                    "boardings",
                    "Passenger data of daily boardings",
                    "https://www.data.act.gov.au/resource/4f52-nub8.csv?$query=SELECT%20date%2C%20local_route%2C%20light_rail%2C%20peak_service%2C%20rapid_route%2C%20school%2C%20other%20ORDER%20BY%20%3Aid%20ASC",
                    &["local_route", "light_rail", "peak_service", "rapid_route", "school", "other"],
                ),
                DataSource::new(
                    "journeys",
                    "Passenger data of daily journey",
                    "https://www.data.act.gov.au/resource/nkxy-abdj.csv",
                    &[],
                ),
                DataSource::new(
                    "passenger-groups",
                    "Daily boarding by passenger group",
                    "https://www.data.act.gov.au/resource/4d78-rcjw.csv?$query=SELECT%20date%2C%20other%2C%20adult%2C%20concession%2C%20tertiary%2C%20school_student%20ORDER%20BY%20date%20DESC",
                    &["other", "adult", "concession", "tertiary", "school_student"],
                ),
            ],
        }
    }

    /// Loads a catalog from a JSON array of sources at `path`.
    ///
    /// ```json
    /// [
    ///   { "id": "boardings", "title": "Daily boardings", "url": "https://...", "metrics": ["school"] }
    /// ]
    /// ```
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let sources: Vec<DataSource> = serde_json::from_str(content)
            .map_err(|e| PatronageError::Config(format!("invalid source catalog: {e}")))?;
        if sources.is_empty() {
            return Err(PatronageError::Config("source catalog is empty".to_string()));
        }
        Ok(Self { sources })
    }

    pub fn get(&self, id: &str) -> Option<&DataSource> {
        self.sources.iter().find(|s| s.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataSource> {
        self.sources.iter()
    }

    /// Resolves a command-line source: a catalog id, an http(s) URL, or a
    /// local file path.
    pub fn resolve<'a>(&'a self, source: &str) -> Location<'a> {
        if let Some(entry) = self.get(source) {
            Location::Catalog(entry)
        } else if source.starts_with("http://") || source.starts_with("https://") {
            Location::Url(source.to_string())
        } else {
            Location::File(source.to_string())
        }
    }
}
