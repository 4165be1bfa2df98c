use crate::persist::{load_json, save_json, IndexPaths};
use crate::{InvertedIndex, Result, SearchError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Corpus-wide statistics derived from the document index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataIndex {
    // The stored key keeps the historical spelling so existing metadata files stay readable.
    #[serde(rename = "averge_document_length")]
    average_field_length: BTreeMap<String, f64>,
    document_count: usize,
}

impl MetadataIndex {
    /// Recompute from scratch. An empty corpus has no meaningful average and is rejected.
    pub fn from_index(index: &InvertedIndex) -> Result<Self> {
        let document_count = index.document_count();
        if document_count == 0 {
            return Err(SearchError::EmptyCorpus("average field length needs at least one document"));
        }
        let average_field_length = index
            .fields()
            .iter()
            .map(|field| {
                let total: usize = index.documents().map(|d| d.field_length(field)).sum();
                (field.clone(), total as f64 / document_count as f64)
            })
            .collect();
        Ok(Self { average_field_length, document_count })
    }

    pub fn document_count(&self) -> usize { self.document_count }

    pub fn average_field_length(&self, field: &str) -> Result<f64> {
        self.average_field_length.get(field).copied().ok_or_else(|| SearchError::UnknownField(field.to_string()))
    }

    pub fn store<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        save_json(&IndexPaths::new(dir).metadata(), self, true)
    }

    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        load_json(&IndexPaths::new(dir).metadata())
    }
}
