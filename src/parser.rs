//! CSV parser for open-data portal exports.

use csv::{ReaderBuilder, Trim};

use crate::error::Result;

/// Rows of a CSV export, still untyped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRows {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawRows {
    /// Index of the header named `name`, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// Decodes CSV bytes with a header row into [`RawRows`].
///
/// Header names and cells are trimmed. Every row must have as many cells as
/// the header.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CSV or a row is ragged.
pub fn parse_csv(bytes: &[u8]) -> Result<RawRows> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(bytes);

    let headers = rdr.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(RawRows { headers, rows })
}
