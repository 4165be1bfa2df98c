use crate::{Result, SearchError, DOCUMENTS_FIELD};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const DEFAULT_FIELDS: [&str; 3] = ["stars", "genres", "summaries"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Posting fields. The `documents` index is always present and never listed here.
    pub fields: Vec<String>,
    /// When set, re-adding an existing doc id first removes its old postings.
    #[serde(default)]
    pub replace_on_overwrite: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { fields: DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect(), replace_on_overwrite: false }
    }
}

impl IndexConfig {
    pub fn with_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { fields: fields.into_iter().map(Into::into).collect(), replace_on_overwrite: false }
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field == DOCUMENTS_FIELD {
                return Err(SearchError::ReservedField(field.clone()));
            }
            if field.is_empty() || !seen.insert(field.as_str()) {
                return Err(SearchError::UnknownField(field.clone()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LshParams {
    pub num_hashes: usize,
    pub bands: usize,
    pub rows_per_band: usize,
    pub shingle_size: usize,
    pub seed: u64,
}

impl Default for LshParams {
    fn default() -> Self {
        Self { num_hashes: 100, bands: 10, rows_per_band: 10, shingle_size: 2, seed: 0x5eed_cafe }
    }
}

impl LshParams {
    pub fn validate(&self) -> Result<()> {
        if self.num_hashes == 0 || self.bands == 0 || self.rows_per_band == 0 {
            return Err(SearchError::InvalidLshParams("num_hashes, bands and rows_per_band must be positive".into()));
        }
        if self.shingle_size == 0 {
            return Err(SearchError::InvalidLshParams("shingle size must be at least 1".into()));
        }
        match self.bands.checked_mul(self.rows_per_band) {
            Some(rows) if rows <= self.num_hashes => Ok(()),
            _ => Err(SearchError::InvalidLshParams(format!(
                "{} bands x {} rows exceeds {} hashes",
                self.bands, self.rows_per_band, self.num_hashes
            ))),
        }
    }
}
