use crate::persist::{load_json_if_exists, save_json, IndexPaths};
use crate::{IndexConfig, Result, SearchError, DOCUMENTS_FIELD};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

pub type DocId = String;

/// `term -> (doc_id -> term frequency)`. Frequencies are always >= 1.
pub type FieldPostings = BTreeMap<String, BTreeMap<DocId, u32>>;

/// A preprocessed document. Each field holds entries whose whitespace-separated words are terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Vec<String>>,
}

impl Document {
    pub fn new(id: impl Into<DocId>) -> Self {
        Self { id: id.into(), title: None, fields: BTreeMap::new() }
    }

    pub fn with_field<I, S>(mut self, field: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.insert(field.to_string(), entries.into_iter().map(Into::into).collect());
        self
    }

    /// Terms of `field`, in document order.
    pub fn tokens<'a>(&'a self, field: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields.get(field).into_iter().flatten().flat_map(|entry| entry.split_whitespace())
    }

    pub fn field_length(&self, field: &str) -> usize { self.tokens(field).count() }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvertedIndex {
    config: IndexConfig,
    documents: BTreeMap<DocId, Document>,
    postings: BTreeMap<String, FieldPostings>,
}

impl InvertedIndex {
    pub fn new(config: IndexConfig) -> Result<Self> {
        config.validate()?;
        let postings = config.fields.iter().map(|f| (f.clone(), FieldPostings::new())).collect();
        Ok(Self { config, documents: BTreeMap::new(), postings })
    }

    /// Bulk-build from preprocessed documents. Each field is counted in parallel and merged once.
    /// A repeated id behaves as it would under [`add_document`](Self::add_document): with
    /// `replace_on_overwrite` only its last record is counted, otherwise every record's postings accumulate.
    pub fn build(config: IndexConfig, documents: Vec<Document>) -> Result<Self> {
        let mut index = Self::new(config)?;
        let documents = if index.config.replace_on_overwrite { keep_last_by_id(documents) } else { documents };
        for field in &index.config.fields {
            let postings = documents
                .par_iter()
                .fold(FieldPostings::new, |mut acc, doc| {
                    count_into(&mut acc, doc, field);
                    acc
                })
                .reduce(FieldPostings::new, merge_postings);
            tracing::debug!(field = field.as_str(), terms = postings.len(), "indexed field");
            index.postings.insert(field.clone(), postings);
        }
        for doc in documents {
            index.documents.insert(doc.id.clone(), doc);
        }
        tracing::info!(num_docs = index.documents.len(), fields = index.config.fields.len(), "built inverted index");
        Ok(index)
    }

    /// Create an index with `config` and fill it from `dir`; missing files leave fields empty.
    pub fn open<P: AsRef<Path>>(dir: P, config: IndexConfig) -> Result<Self> {
        let mut index = Self::new(config)?;
        index.load(dir)?;
        Ok(index)
    }

    pub fn config(&self) -> &IndexConfig { &self.config }
    pub fn fields(&self) -> &[String] { &self.config.fields }
    pub fn field(&self, field: &str) -> Option<&FieldPostings> { self.postings.get(field) }
    pub fn document(&self, doc_id: &str) -> Option<&Document> { self.documents.get(doc_id) }
    pub fn documents(&self) -> impl Iterator<Item = &Document> { self.documents.values() }
    pub fn document_count(&self) -> usize { self.documents.len() }

    /// Doc ids containing `term` in `field`. Order carries no meaning.
    pub fn posting_list(&self, term: &str, field: &str) -> Vec<&str> {
        self.postings
            .get(field)
            .and_then(|p| p.get(term))
            .map(|docs| docs.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn term_frequency(&self, term: &str, field: &str, doc_id: &str) -> u32 {
        self.postings
            .get(field)
            .and_then(|p| p.get(term))
            .and_then(|docs| docs.get(doc_id))
            .copied()
            .unwrap_or(0)
    }

    /// Token count of `field` for every indexed document.
    pub fn document_lengths(&self, field: &str) -> HashMap<DocId, usize> {
        self.documents.values().map(|d| (d.id.clone(), d.field_length(field))).collect()
    }

    /// Insert or overwrite `doc`.
    ///
    /// On overwrite the old postings are kept (counts accumulate) unless
    /// `replace_on_overwrite` is configured, in which case the old document is removed first.
    pub fn add_document(&mut self, doc: Document) {
        if self.config.replace_on_overwrite && self.documents.contains_key(&doc.id) {
            self.remove_document(&doc.id);
        }
        for field in &self.config.fields {
            let postings = self.postings.entry(field.clone()).or_default();
            count_into(postings, &doc, field);
        }
        self.documents.insert(doc.id.clone(), doc);
    }

    /// Remove `doc_id` everywhere. Terms left without postings are pruned. Returns whether a record existed.
    pub fn remove_document(&mut self, doc_id: &str) -> bool {
        let existed = self.documents.remove(doc_id).is_some();
        for postings in self.postings.values_mut() {
            postings.retain(|_, docs| {
                docs.remove(doc_id);
                !docs.is_empty()
            });
        }
        existed
    }

    /// Write one field (or `documents`) to `<dir>/<field>_index.json`.
    pub fn store<P: AsRef<Path>>(&self, dir: P, field: &str) -> Result<()> {
        let paths = IndexPaths::new(dir);
        if field == DOCUMENTS_FIELD {
            save_json(&paths.field_index(field), &self.documents, false)?;
        } else {
            let postings = self.postings.get(field).ok_or_else(|| SearchError::UnknownField(field.to_string()))?;
            save_json(&paths.field_index(field), postings, false)?;
        }
        tracing::debug!(field, dir = %paths.root.display(), "stored field index");
        Ok(())
    }

    pub fn store_all<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        self.store(dir, DOCUMENTS_FIELD)?;
        for field in &self.config.fields {
            self.store(dir, field)?;
        }
        tracing::info!(dir = %dir.display(), num_docs = self.documents.len(), "stored index");
        Ok(())
    }

    /// Load `documents` and every configured field found under `dir`.
    pub fn load<P: AsRef<Path>>(&mut self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        self.load_field(dir, DOCUMENTS_FIELD)?;
        let fields = self.config.fields.clone();
        for field in &fields {
            self.load_field(dir, field)?;
        }
        tracing::info!(dir = %dir.display(), num_docs = self.documents.len(), "loaded index");
        Ok(())
    }

    /// Load a single field. Unknown field names are a configuration error; a missing file is a no-op.
    pub fn load_field<P: AsRef<Path>>(&mut self, dir: P, field: &str) -> Result<bool> {
        let paths = IndexPaths::new(dir);
        let path = paths.field_index(field);
        if field == DOCUMENTS_FIELD {
            if let Some(docs) = load_json_if_exists::<BTreeMap<DocId, Document>>(&path)? {
                self.documents = docs;
                return Ok(true);
            }
        } else {
            if !self.postings.contains_key(field) {
                return Err(SearchError::UnknownField(field.to_string()));
            }
            if let Some(postings) = load_json_if_exists::<FieldPostings>(&path)? {
                self.postings.insert(field.to_string(), postings);
                return Ok(true);
            }
        }
        tracing::debug!(field, path = %path.display(), "no stored index for field");
        Ok(false)
    }
}

fn count_into(postings: &mut FieldPostings, doc: &Document, field: &str) {
    for token in doc.tokens(field) {
        *postings.entry(token.to_string()).or_default().entry(doc.id.clone()).or_insert(0) += 1;
    }
}

fn merge_postings(mut into: FieldPostings, from: FieldPostings) -> FieldPostings {
    for (term, docs) in from {
        let slot = into.entry(term).or_default();
        for (doc_id, tf) in docs {
            *slot.entry(doc_id).or_insert(0) += tf;
        }
    }
    into
}

fn keep_last_by_id(documents: Vec<Document>) -> Vec<Document> {
    let mut last: HashMap<DocId, usize> = HashMap::new();
    for (i, doc) in documents.iter().enumerate() {
        last.insert(doc.id.clone(), i);
    }
    documents
        .into_iter()
        .enumerate()
        .filter(|(i, doc)| last.get(&doc.id) == Some(i))
        .map(|(_, doc)| doc)
        .collect()
}
