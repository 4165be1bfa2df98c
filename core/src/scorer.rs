//! Vector space and Okapi BM25 ranking over one field's postings.

use crate::{DocId, FieldPostings, Result, SearchError};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

pub const K1: f64 = 1.5;
pub const B: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TfWeight {
    /// `n`: raw count
    Natural,
    /// `l`: `1 + ln(tf)`, zero stays zero
    Logarithm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdfWeight {
    /// `n`
    None,
    /// `t`: multiply by `ln(N / df)`
    Idf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// `n`
    None,
    /// `c`: scale to unit L2 length
    Cosine,
}

/// One side (`ddd` or `qqq`) of a SMART weighting code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Weighting {
    pub tf: TfWeight,
    pub idf: IdfWeight,
    pub norm: Normalization,
}

impl Weighting {
    fn parse(code: &str, part: &str) -> Result<Self> {
        let invalid = |reason: String| SearchError::InvalidMethod { code: code.to_string(), reason };
        let chars: Vec<char> = part.chars().collect();
        if chars.len() != 3 {
            return Err(invalid(format!("`{part}` must have three letters")));
        }
        let tf = match chars[0] {
            'n' => TfWeight::Natural,
            'l' => TfWeight::Logarithm,
            c => return Err(invalid(format!("unknown tf weighting `{c}`"))),
        };
        let idf = match chars[1] {
            'n' => IdfWeight::None,
            't' => IdfWeight::Idf,
            c => return Err(invalid(format!("unknown idf weighting `{c}`"))),
        };
        let norm = match chars[2] {
            'n' => Normalization::None,
            'c' => Normalization::Cosine,
            c => return Err(invalid(format!("unknown normalization `{c}`"))),
        };
        Ok(Self { tf, idf, norm })
    }

    fn weight(&self, tf: u32, idf: f64) -> f64 {
        let w = match self.tf {
            TfWeight::Natural => tf as f64,
            TfWeight::Logarithm if tf > 0 => 1.0 + (tf as f64).ln(),
            TfWeight::Logarithm => 0.0,
        };
        match self.idf {
            IdfWeight::None => w,
            IdfWeight::Idf => w * idf,
        }
    }

    fn normalize(&self, v: &mut [f64]) {
        if self.norm == Normalization::Cosine {
            let len = v.iter().map(|x| x * x).sum::<f64>().sqrt();
            // an all-zero vector stays zero
            if len > 0.0 {
                v.iter_mut().for_each(|x| *x /= len);
            }
        }
    }
}

impl fmt::Display for Weighting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tf = match self.tf { TfWeight::Natural => 'n', TfWeight::Logarithm => 'l' };
        let idf = match self.idf { IdfWeight::None => 'n', IdfWeight::Idf => 't' };
        let norm = match self.norm { Normalization::None => 'n', Normalization::Cosine => 'c' };
        write!(f, "{tf}{idf}{norm}")
    }
}

/// A `ddd.qqq` code such as `lnc.ltc`; the dot is optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VsmMethod {
    pub document: Weighting,
    pub query: Weighting,
}

impl FromStr for VsmMethod {
    type Err = SearchError;

    fn from_str(code: &str) -> Result<Self> {
        let (doc, query) = match code.split_once('.') {
            Some(parts) => parts,
            None if code.is_ascii() && code.len() == 6 => code.split_at(3),
            None => {
                return Err(SearchError::InvalidMethod {
                    code: code.to_string(),
                    reason: "expected `ddd.qqq`".into(),
                })
            }
        };
        Ok(Self { document: Weighting::parse(code, doc)?, query: Weighting::parse(code, query)? })
    }
}

impl fmt::Display for VsmMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.document, self.query)
    }
}

pub struct Scorer<'a> {
    postings: &'a FieldPostings,
    document_count: usize,
    idf: HashMap<String, f64>,
}

impl<'a> Scorer<'a> {
    pub fn new(postings: &'a FieldPostings, document_count: usize) -> Result<Self> {
        if document_count == 0 {
            return Err(SearchError::EmptyCorpus("idf needs at least one document"));
        }
        Ok(Self { postings, document_count, idf: HashMap::new() })
    }

    fn df(&self, term: &str) -> usize { self.postings.get(term).map_or(0, |docs| docs.len()) }

    /// Documents sharing at least one term with the query.
    pub fn candidate_documents<S: AsRef<str>>(&self, query: &[S]) -> HashSet<&'a str> {
        let postings = self.postings;
        query
            .iter()
            .filter_map(|term| postings.get(term.as_ref()))
            .flat_map(|docs| docs.keys().map(String::as_str))
            .collect()
    }

    /// `ln(N / df)`, memoized. `None` for terms absent from the index.
    pub fn idf(&mut self, term: &str) -> Option<f64> {
        if let Some(&idf) = self.idf.get(term) {
            return Some(idf);
        }
        let df = self.df(term);
        if df == 0 {
            return None;
        }
        let idf = (self.document_count as f64 / df as f64).ln();
        self.idf.insert(term.to_string(), idf);
        Some(idf)
    }

    pub fn clear_cache(&mut self) { self.idf.clear(); }

    pub fn compute_scores_with_vector_space_model<S: AsRef<str>>(
        &mut self,
        query: &[S],
        method: &VsmMethod,
    ) -> HashMap<DocId, f64> {
        let mut query_tfs: HashMap<&str, u32> = HashMap::new();
        let mut terms: Vec<&str> = Vec::new();
        for term in query.iter().map(AsRef::as_ref) {
            let tf = query_tfs.entry(term).or_insert(0);
            if *tf == 0 && self.df(term) > 0 {
                terms.push(term);
            }
            *tf += 1;
        }
        let weights: Vec<(&str, f64)> = terms.iter().filter_map(|t| self.idf(t).map(|idf| (*t, idf))).collect();

        let mut query_vector: Vec<f64> = weights.iter().map(|(t, idf)| method.query.weight(query_tfs[t], *idf)).collect();
        method.query.normalize(&mut query_vector);

        self.candidate_documents(&terms)
            .into_iter()
            .map(|doc_id| {
                let mut doc_vector: Vec<f64> = weights
                    .iter()
                    .map(|(t, idf)| {
                        let tf = self.postings.get(*t).and_then(|d| d.get(doc_id)).copied().unwrap_or(0);
                        method.document.weight(tf, *idf)
                    })
                    .collect();
                method.document.normalize(&mut doc_vector);
                let score = doc_vector.iter().zip(&query_vector).map(|(d, q)| d * q).sum();
                (doc_id.to_string(), score)
            })
            .collect()
    }

    /// Okapi BM25 with `k1 = 1.5`, `b = 0.75` and a `+1`-smoothed idf that stays non-negative.
    /// Repeated query terms contribute once per occurrence.
    pub fn compute_scores_with_okapi_bm25<S: AsRef<str>>(
        &mut self,
        query: &[S],
        average_field_length: f64,
        document_lengths: &HashMap<DocId, usize>,
    ) -> Result<HashMap<DocId, f64>> {
        if !average_field_length.is_finite() || average_field_length <= 0.0 {
            return Err(SearchError::DegenerateLength(average_field_length));
        }
        let n = self.document_count as f64;
        let postings = self.postings;
        let terms: Vec<(&str, f64)> = query
            .iter()
            .map(AsRef::as_ref)
            .filter_map(|term| {
                let df = self.df(term);
                if df == 0 {
                    return None;
                }
                let df = df as f64;
                let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                Some((term, idf))
            })
            .collect();

        let scores = self
            .candidate_documents(query)
            .into_iter()
            .map(|doc_id| {
                let dl = document_lengths.get(doc_id).copied().unwrap_or(0) as f64;
                let norm = (1.0 - B) + B * dl / average_field_length;
                let score = terms
                    .iter()
                    .map(|(term, idf)| {
                        let tf = postings.get(*term).and_then(|d| d.get(doc_id)).copied().unwrap_or(0) as f64;
                        idf * ((K1 + 1.0) * tf) / (K1 * norm + tf)
                    })
                    .sum();
                (doc_id.to_string(), score)
            })
            .collect();
        Ok(scores)
    }
}

/// Highest scores first, ties broken by doc id; at most `k` entries.
pub fn rank(scores: HashMap<DocId, f64>, k: usize) -> Vec<(DocId, f64)> {
    let mut scored: Vec<(DocId, f64)> = scores.into_iter().collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Document, IndexConfig, InvertedIndex};

    fn index(docs: Vec<Document>) -> InvertedIndex {
        InvertedIndex::build(IndexConfig::with_fields(["summaries"]), docs).unwrap()
    }

    fn two_docs() -> InvertedIndex {
        index(vec![
            Document::new("d1").with_field("summaries", ["good", "plot"]),
            Document::new("d2").with_field("summaries", ["good"]),
        ])
    }

    fn approx(a: f64, b: f64) -> bool { (a - b).abs() < 1e-9 }

    #[test]
    fn method_codes_parse_and_reject() {
        let m: VsmMethod = "lnc.ltc".parse().unwrap();
        assert_eq!(m.document, Weighting { tf: TfWeight::Logarithm, idf: IdfWeight::None, norm: Normalization::Cosine });
        assert_eq!(m.query.idf, IdfWeight::Idf);
        assert_eq!(m.to_string(), "lnc.ltc");
        assert_eq!("ntnnnc".parse::<VsmMethod>().unwrap().to_string(), "ntn.nnc");
        for bad in ["lnc", "lnx.ltc", "bnc.ltc", "lnc.lt", "lnc.ltcc", ""] {
            let err = bad.parse::<VsmMethod>().unwrap_err();
            assert!(err.is_configuration(), "{bad}");
        }
    }

    #[test]
    fn candidates_are_union_of_postings() {
        let idx = two_docs();
        let scorer = Scorer::new(idx.field("summaries").unwrap(), 2).unwrap();
        let c = scorer.candidate_documents(&["plot", "missing"]);
        assert_eq!(c, HashSet::from(["d1"]));
        assert_eq!(scorer.candidate_documents(&["good"]).len(), 2);
    }

    #[test]
    fn idf_guards_absent_terms_and_empty_corpus() {
        let idx = two_docs();
        let mut scorer = Scorer::new(idx.field("summaries").unwrap(), 2).unwrap();
        assert!(approx(scorer.idf("plot").unwrap(), 2f64.ln()));
        assert!(approx(scorer.idf("good").unwrap(), 0.0));
        assert_eq!(scorer.idf("missing"), None);
        assert!(matches!(Scorer::new(idx.field("summaries").unwrap(), 0), Err(SearchError::EmptyCorpus(_))));
    }

    #[test]
    fn vector_space_weightings() {
        let idx = two_docs();
        let mut scorer = Scorer::new(idx.field("summaries").unwrap(), 2).unwrap();
        let query = ["good", "plot"];

        let raw = scorer.compute_scores_with_vector_space_model(&query, &"nnn.nnn".parse().unwrap());
        assert!(approx(raw["d1"], 2.0));
        assert!(approx(raw["d2"], 1.0));

        let cosine = scorer.compute_scores_with_vector_space_model(&query, &"nnc.nnc".parse().unwrap());
        assert!(approx(cosine["d1"], 1.0));
        assert!(approx(cosine["d2"], 1.0 / 2f64.sqrt()));

        let tfidf = scorer.compute_scores_with_vector_space_model(&query, &"ntn.ntn".parse().unwrap());
        assert!(approx(tfidf["d1"], 2f64.ln().powi(2)));
        assert!(approx(tfidf["d2"], 0.0));
    }

    #[test]
    fn vector_space_ignores_unknown_terms_and_zero_vectors() {
        let idx = two_docs();
        let mut scorer = Scorer::new(idx.field("summaries").unwrap(), 2).unwrap();
        let with_unknown = scorer.compute_scores_with_vector_space_model(&["good", "zzz"], &"nnc.nnc".parse().unwrap());
        assert!(approx(with_unknown["d1"], 1.0));
        // idf("good") is zero, so every ltc query vector is all zeros
        let zeros = scorer.compute_scores_with_vector_space_model(&["good"], &"ltc.ltc".parse().unwrap());
        assert!(zeros.values().all(|s| *s == 0.0));
        assert!(scorer.compute_scores_with_vector_space_model(&["zzz"], &"lnc.ltc".parse().unwrap()).is_empty());
    }

    #[test]
    fn query_term_frequency_weights_the_query_side() {
        let idx = two_docs();
        let mut scorer = Scorer::new(idx.field("summaries").unwrap(), 2).unwrap();
        let once = scorer.compute_scores_with_vector_space_model(&["plot"], &"nnn.nnn".parse().unwrap());
        let twice = scorer.compute_scores_with_vector_space_model(&["plot", "plot"], &"nnn.nnn".parse().unwrap());
        assert!(approx(twice["d1"], 2.0 * once["d1"]));
    }

    #[test]
    fn bm25_scores_are_finite_and_nonnegative() {
        let idx = two_docs();
        let mut scorer = Scorer::new(idx.field("summaries").unwrap(), 2).unwrap();
        let lengths = HashMap::from([("d1".to_string(), 2), ("d2".to_string(), 1)]);
        let scores = scorer.compute_scores_with_okapi_bm25(&["good"], 1.5, &lengths).unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores.values().all(|s| s.is_finite() && *s >= 0.0));
        // the shorter document wins on an equal tf
        assert!(scores["d2"] > scores["d1"]);
    }

    #[test]
    fn bm25_is_monotone_in_tf() {
        let idx = index(vec![
            Document::new("hi").with_field("summaries", ["heist heist heist crew"]),
            Document::new("lo").with_field("summaries", ["heist crew town bank"]),
            Document::new("other").with_field("summaries", ["romance"]),
        ]);
        let lengths = idx.document_lengths("summaries");
        let mut scorer = Scorer::new(idx.field("summaries").unwrap(), idx.document_count()).unwrap();
        let scores = scorer.compute_scores_with_okapi_bm25(&["heist"], 3.0, &lengths).unwrap();
        assert!(scores["hi"] >= scores["lo"]);
    }

    #[test]
    fn bm25_prefers_shorter_documents() {
        let idx = index(vec![
            Document::new("long").with_field("summaries", ["heist a b c d e f g"]),
            Document::new("short").with_field("summaries", ["heist a"]),
            Document::new("other").with_field("summaries", ["romance x y z"]),
        ]);
        let lengths = idx.document_lengths("summaries");
        let avg = 14.0 / 3.0;
        let mut scorer = Scorer::new(idx.field("summaries").unwrap(), idx.document_count()).unwrap();
        let scores = scorer.compute_scores_with_okapi_bm25(&["heist"], avg, &lengths).unwrap();
        assert!(scores["short"] >= scores["long"]);
        assert!(!scores.contains_key("other"));
    }

    #[test]
    fn bm25_skips_absent_terms_and_missing_lengths() {
        let idx = two_docs();
        let mut scorer = Scorer::new(idx.field("summaries").unwrap(), 2).unwrap();
        let scores = scorer.compute_scores_with_okapi_bm25(&["plot", "zzz"], 1.5, &HashMap::new()).unwrap();
        assert!(scores["d1"].is_finite() && scores["d1"] > 0.0);
        assert!(matches!(
            scorer.compute_scores_with_okapi_bm25(&["good"], 0.0, &HashMap::new()),
            Err(SearchError::DegenerateLength(_))
        ));
    }

    #[test]
    fn clearing_the_idf_cache_does_not_change_scores() {
        let idx = two_docs();
        let mut scorer = Scorer::new(idx.field("summaries").unwrap(), 2).unwrap();
        let method: VsmMethod = "ltc.ltc".parse().unwrap();
        let first = scorer.compute_scores_with_vector_space_model(&["plot", "good"], &method);
        scorer.clear_cache();
        let second = scorer.compute_scores_with_vector_space_model(&["plot", "good"], &method);
        assert_eq!(first, second);
    }

    #[test]
    fn rank_orders_by_score_then_id() {
        let scores = HashMap::from([("b".to_string(), 1.0), ("a".to_string(), 1.0), ("c".to_string(), 2.0)]);
        let ranked = rank(scores, 2);
        assert_eq!(ranked, vec![("c".to_string(), 2.0), ("a".to_string(), 1.0)]);
    }
}
