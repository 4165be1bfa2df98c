use crate::scorer::{rank, Scorer, VsmMethod};
use crate::{DocId, Document, IndexConfig, InvertedIndex, MetadataIndex, Result, SearchError};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Bm25,
    VectorSpace(VsmMethod),
}

impl FromStr for Method {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bm25" | "okapi" => Ok(Method::Bm25),
            code => Ok(Method::VectorSpace(code.parse()?)),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Bm25 => write!(f, "bm25"),
            Method::VectorSpace(m) => write!(f, "{m}"),
        }
    }
}

/// An index together with the statistics derived from it. Statistics are rebuilt after every mutation.
pub struct Engine {
    index: InvertedIndex,
    metadata: Option<MetadataIndex>,
    lengths: HashMap<String, HashMap<DocId, usize>>,
}

impl Engine {
    pub fn new(index: InvertedIndex) -> Result<Self> {
        let mut engine = Self { index, metadata: None, lengths: HashMap::new() };
        engine.refresh()?;
        Ok(engine)
    }

    pub fn open<P: AsRef<Path>>(dir: P, config: IndexConfig) -> Result<Self> {
        Self::new(InvertedIndex::open(dir, config)?)
    }

    pub fn index(&self) -> &InvertedIndex { &self.index }
    pub fn metadata(&self) -> Option<&MetadataIndex> { self.metadata.as_ref() }

    fn refresh(&mut self) -> Result<()> {
        self.metadata = match MetadataIndex::from_index(&self.index) {
            Ok(meta) => Some(meta),
            Err(SearchError::EmptyCorpus(_)) => None,
            Err(e) => return Err(e),
        };
        self.lengths = self.index.fields().iter().map(|f| (f.clone(), self.index.document_lengths(f))).collect();
        Ok(())
    }

    /// Rank documents of `field` against preprocessed query terms. An empty index yields no results.
    pub fn search<S: AsRef<str>>(&self, query: &[S], field: &str, method: &Method, k: usize) -> Result<Vec<(DocId, f64)>> {
        let postings = self.index.field(field).ok_or_else(|| SearchError::UnknownField(field.to_string()))?;
        let Some(meta) = &self.metadata else {
            return Ok(Vec::new());
        };
        let mut scorer = Scorer::new(postings, meta.document_count())?;
        let scores = match method {
            Method::VectorSpace(vsm) => scorer.compute_scores_with_vector_space_model(query, vsm),
            Method::Bm25 => {
                let avg = meta.average_field_length(field)?;
                if avg == 0.0 {
                    // nothing in this field is indexed, so nothing can match
                    return Ok(Vec::new());
                }
                let lengths = self.lengths.get(field).ok_or_else(|| SearchError::UnknownField(field.to_string()))?;
                scorer.compute_scores_with_okapi_bm25(query, avg, lengths)?
            }
        };
        tracing::debug!(field, %method, hits = scores.len(), "scored query");
        Ok(rank(scores, k))
    }

    pub fn add_documents<I: IntoIterator<Item = Document>>(&mut self, docs: I) -> Result<usize> {
        let mut added = 0;
        for doc in docs {
            self.index.add_document(doc);
            added += 1;
        }
        self.refresh()?;
        Ok(added)
    }

    pub fn remove_document(&mut self, doc_id: &str) -> Result<bool> {
        let removed = self.index.remove_document(doc_id);
        self.refresh()?;
        Ok(removed)
    }

    /// Persist every field index and, for a non-empty corpus, the metadata file.
    pub fn store<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        self.index.store_all(dir)?;
        if let Some(meta) = &self.metadata {
            meta.store(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        let docs = vec![
            Document::new("d1").with_field("summaries", ["prison escap friend"]).with_field("genres", ["drama"]),
            Document::new("d2").with_field("summaries", ["mob famili crime"]).with_field("genres", ["crime", "drama"]),
            Document::new("d3").with_field("summaries", ["prison riot"]).with_field("genres", ["action"]),
        ];
        Engine::new(InvertedIndex::build(IndexConfig::default(), docs).unwrap()).unwrap()
    }

    #[test]
    fn methods_parse() {
        assert_eq!("BM25".parse::<Method>().unwrap(), Method::Bm25);
        assert_eq!("lnc.ltc".parse::<Method>().unwrap().to_string(), "lnc.ltc");
        assert!("tfidf".parse::<Method>().is_err());
    }

    #[test]
    fn bm25_and_vector_space_rank_matching_documents() {
        let e = engine();
        let bm25 = e.search(&["prison", "escap"], "summaries", &Method::Bm25, 10).unwrap();
        assert_eq!(bm25[0].0, "d1");
        assert_eq!(bm25.len(), 2);
        let vsm = e.search(&["prison", "escap"], "summaries", &"lnc.ltc".parse().unwrap(), 1).unwrap();
        assert_eq!(vsm.len(), 1);
        assert_eq!(vsm[0].0, "d1");
    }

    #[test]
    fn unknown_field_and_empty_index() {
        let e = engine();
        assert!(e.search(&["prison"], "directors", &Method::Bm25, 5).unwrap_err().is_configuration());
        let empty = Engine::new(InvertedIndex::new(IndexConfig::default()).unwrap()).unwrap();
        assert!(empty.metadata().is_none());
        assert!(empty.search(&["prison"], "summaries", &Method::Bm25, 5).unwrap().is_empty());
        assert!(e.search(&["prison"], "stars", &Method::Bm25, 5).unwrap().is_empty());
    }

    #[test]
    fn mutations_refresh_statistics() {
        let mut e = engine();
        e.add_documents([Document::new("d4").with_field("summaries", ["heist crew"])]).unwrap();
        assert_eq!(e.metadata().unwrap().document_count(), 4);
        assert_eq!(e.search(&["heist"], "summaries", &Method::Bm25, 5).unwrap()[0].0, "d4");
        assert!(e.remove_document("d4").unwrap());
        assert!(e.search(&["heist"], "summaries", &Method::Bm25, 5).unwrap().is_empty());
        assert_eq!(e.metadata().unwrap().document_count(), 3);
    }

    #[test]
    fn store_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let e = engine();
        e.store(dir.path()).unwrap();
        assert!(dir.path().join("documents_metadata_index.json").exists());
        let reopened = Engine::open(dir.path(), IndexConfig::default()).unwrap();
        assert_eq!(reopened.index(), e.index());
        assert_eq!(reopened.metadata(), e.metadata());
    }
}
