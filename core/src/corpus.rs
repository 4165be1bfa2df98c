use crate::minhash::{duplicate_groups, MinHashLsh};
use crate::{Document, LshParams, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

/// A crawled movie record. Apart from `id` and `title`, fields are kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMovie {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl RawMovie {
    /// Text entries of `field`. The crawler writes placeholders such as `"No stars"`
    /// for missing data; those and any non-string values count as no entries.
    pub fn entries(&self, field: &str) -> Vec<String> {
        match self.fields.get(field) {
            Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
            Some(Value::String(s)) if !s.starts_with("No ") && !s.trim().is_empty() => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    pub fn text(&self, field: &str) -> String { self.entries(field).join(" ") }
}

/// The set of raw records everything else is built from. Passed explicitly, never global.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    movies: Vec<RawMovie>,
}

impl Corpus {
    pub fn new(movies: Vec<RawMovie>) -> Self { Self { movies } }

    /// Accepts a JSON array, a single JSON object, or JSON lines.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let trimmed = s.trim_start();
        if trimmed.starts_with('[') {
            return Ok(Self::new(serde_json::from_str(trimmed)?));
        }
        let mut movies = Vec::new();
        if let Ok(single) = serde_json::from_str::<RawMovie>(trimmed) {
            movies.push(single);
            return Ok(Self::new(movies));
        }
        for line in s.lines().filter(|l| !l.trim().is_empty()) {
            movies.push(serde_json::from_str(line)?);
        }
        Ok(Self::new(movies))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        let corpus = Self::from_json_str(&raw)?;
        tracing::info!(path = %path.as_ref().display(), movies = corpus.len(), "loaded corpus");
        Ok(corpus)
    }

    pub fn extend(&mut self, other: Corpus) { self.movies.extend(other.movies); }
    pub fn len(&self) -> usize { self.movies.len() }
    pub fn is_empty(&self) -> bool { self.movies.is_empty() }
    pub fn movies(&self) -> &[RawMovie] { &self.movies }

    /// Joined raw text of `field` per record, in corpus order.
    pub fn raw_texts(&self, field: &str) -> Vec<String> { self.movies.iter().map(|m| m.text(field)).collect() }

    /// Preprocess each configured field into a [`Document`].
    pub fn to_documents<F>(&self, fields: &[String], preprocess: F) -> Vec<Document>
    where
        F: Fn(&str) -> Vec<String>,
    {
        self.movies
            .iter()
            .map(|movie| {
                let mut doc = Document::new(movie.id.clone());
                doc.title = movie.title.clone();
                for field in fields {
                    doc.fields.insert(field.clone(), preprocess(&movie.text(field)));
                }
                doc
            })
            .collect()
    }

    /// Drop near-duplicates of `field`, keeping the first record of every duplicate group.
    /// Returns the groups found, as indices into the corpus before removal.
    pub fn remove_near_duplicates(&mut self, field: &str, params: LshParams) -> Result<Vec<Vec<usize>>> {
        let lsh = MinHashLsh::new(self.raw_texts(field), params)?;
        let groups = duplicate_groups(&lsh.perform_lsh()?);
        let drop: HashSet<usize> = groups.iter().flat_map(|g| g.iter().skip(1).copied()).collect();
        let mut index = 0;
        self.movies.retain(|_| {
            let keep = !drop.contains(&index);
            index += 1;
            keep
        });
        tracing::info!(field, groups = groups.len(), removed = drop.len(), "removed near duplicates");
        Ok(groups)
    }
}
