//! MinHash signatures and banded LSH for near-duplicate detection over raw text.

use crate::shingle::{jaccard_score, shingle_document};
use crate::{LshParams, Result, SearchError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use sha1::{Digest, Sha1};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

/// Signature value of a document with no shingles.
pub const EMPTY_SIGNATURE: u32 = u32::MAX;

/// Binary doc × shingle matrix, stored as the sorted shingle indices present in each document.
#[derive(Debug, Clone)]
pub struct CharacteristicMatrix {
    shingles: Vec<String>,
    rows: Vec<Vec<usize>>,
}

impl CharacteristicMatrix {
    pub fn num_docs(&self) -> usize { self.rows.len() }
    pub fn num_shingles(&self) -> usize { self.shingles.len() }
    pub fn shingle(&self, index: usize) -> Option<&str> { self.shingles.get(index).map(String::as_str) }
    pub fn row(&self, doc: usize) -> &[usize] { &self.rows[doc] }
    pub fn contains(&self, doc: usize, shingle: usize) -> bool {
        self.rows.get(doc).is_some_and(|r| r.binary_search(&shingle).is_ok())
    }
}

/// `num_hashes × num_docs` minimum permuted ranks, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureMatrix {
    num_hashes: usize,
    num_docs: usize,
    values: Vec<u32>,
}

impl SignatureMatrix {
    pub fn num_hashes(&self) -> usize { self.num_hashes }
    pub fn num_docs(&self) -> usize { self.num_docs }
    pub fn get(&self, hash: usize, doc: usize) -> u32 { self.values[hash * self.num_docs + doc] }
    pub fn column(&self, doc: usize) -> Vec<u32> { (0..self.num_hashes).map(|h| self.get(h, doc)).collect() }

    fn from_columns(num_hashes: usize, columns: Vec<Vec<u32>>) -> Self {
        let num_docs = columns.len();
        let mut values = vec![EMPTY_SIGNATURE; num_hashes * num_docs];
        for (doc, column) in columns.into_iter().enumerate() {
            for (hash, v) in column.into_iter().enumerate() {
                values[hash * num_docs + doc] = v;
            }
        }
        Self { num_hashes, num_docs, values }
    }
}

/// A bucket is scoped to the band that produced it: equal digests in different bands are different buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey {
    pub band: usize,
    pub digest: [u8; 20],
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.band)?;
        for b in &self.digest[..8] {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Bucket -> ascending document indices.
pub type BucketMap = BTreeMap<BucketKey, Vec<usize>>;

pub struct MinHashLsh {
    documents: Vec<String>,
    shingles: Vec<HashSet<String>>,
    params: LshParams,
}

impl MinHashLsh {
    pub fn new(documents: Vec<String>, params: LshParams) -> Result<Self> {
        params.validate()?;
        let shingles = documents.par_iter().map(|d| shingle_document(d, params.shingle_size)).collect();
        Ok(Self { documents, shingles, params })
    }

    pub fn params(&self) -> &LshParams { &self.params }
    pub fn documents(&self) -> &[String] { &self.documents }
    pub fn len(&self) -> usize { self.documents.len() }
    pub fn is_empty(&self) -> bool { self.documents.is_empty() }
    pub fn shingles(&self, doc: usize) -> &HashSet<String> { &self.shingles[doc] }

    /// Exact Jaccard similarity of two documents' shingle sets.
    pub fn jaccard(&self, a: usize, b: usize) -> f64 { jaccard_score(&self.shingles[a], &self.shingles[b]) }

    pub fn characteristic_matrix(&self) -> CharacteristicMatrix {
        let universe: BTreeSet<&String> = self.shingles.iter().flatten().collect();
        let index: HashMap<&String, usize> = universe.iter().enumerate().map(|(i, s)| (*s, i)).collect();
        let rows = self
            .shingles
            .iter()
            .map(|set| {
                let mut row: Vec<usize> = set.iter().map(|s| index[s]).collect();
                row.sort_unstable();
                row
            })
            .collect();
        CharacteristicMatrix { shingles: universe.into_iter().cloned().collect(), rows }
    }

    /// One seeded permutation of the shingle space per hash; each document keeps its minimum rank.
    pub fn min_hash_signature(&self) -> SignatureMatrix {
        let matrix = self.characteristic_matrix();
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let permutations: Vec<Vec<u32>> = (0..self.params.num_hashes)
            .map(|_| {
                let mut perm: Vec<u32> = (0..matrix.num_shingles() as u32).collect();
                perm.shuffle(&mut rng);
                perm
            })
            .collect();
        let columns: Vec<Vec<u32>> = matrix
            .rows
            .par_iter()
            .map(|row| {
                permutations
                    .iter()
                    .map(|perm| row.iter().map(|&s| perm[s]).min().unwrap_or(EMPTY_SIGNATURE))
                    .collect()
            })
            .collect();
        tracing::debug!(
            docs = matrix.num_docs(),
            shingles = matrix.num_shingles(),
            hashes = self.params.num_hashes,
            "computed minhash signatures"
        );
        SignatureMatrix::from_columns(self.params.num_hashes, columns)
    }

    pub fn lsh_buckets(&self, signature: &SignatureMatrix) -> Result<BucketMap> {
        let LshParams { bands, rows_per_band, .. } = self.params;
        if bands * rows_per_band > signature.num_hashes() {
            return Err(SearchError::InvalidLshParams(format!(
                "{bands} bands x {rows_per_band} rows exceeds {} signature rows",
                signature.num_hashes()
            )));
        }
        let mut buckets = BucketMap::new();
        for band in 0..bands {
            let rows = band * rows_per_band..(band + 1) * rows_per_band;
            for doc in 0..signature.num_docs() {
                let key = BucketKey { band, digest: band_digest(rows.clone().map(|h| signature.get(h, doc))) };
                buckets.entry(key).or_default().push(doc);
            }
        }
        tracing::debug!(bands, buckets = buckets.len(), "hashed signature bands");
        Ok(buckets)
    }

    pub fn perform_lsh(&self) -> Result<BucketMap> {
        let signature = self.min_hash_signature();
        let buckets = self.lsh_buckets(&signature)?;
        tracing::info!(docs = self.len(), buckets = buckets.len(), "lsh complete");
        Ok(buckets)
    }

    /// Fraction of signature rows on which two documents agree; estimates their Jaccard similarity.
    pub fn estimate_similarity(signature: &SignatureMatrix, a: usize, b: usize) -> f64 {
        if signature.num_hashes() == 0 {
            return 0.0;
        }
        let agree = (0..signature.num_hashes()).filter(|&h| signature.get(h, a) == signature.get(h, b)).count();
        agree as f64 / signature.num_hashes() as f64
    }

    /// Share of bucket-mate pairs whose true Jaccard score beats five random other documents.
    ///
    /// Returns `None` when there is nothing to measure (no candidate pairs, or fewer than three documents).
    pub fn detection_quality<R: Rng>(&self, buckets: &BucketMap, rng: &mut R) -> Option<f64> {
        let n = self.len();
        let pairs = candidate_pairs(buckets);
        if n < 3 || pairs.is_empty() {
            return None;
        }
        let mut correct = 0usize;
        for &(a, b) in &pairs {
            let mate_score = self.jaccard(a, b);
            let beats_all = (0..5).all(|_| {
                let mut other = a;
                while other == a || other == b {
                    other = rng.random_range(0..n);
                }
                mate_score > self.jaccard(a, other)
            });
            if beats_all {
                correct += 1;
            }
        }
        Some(correct as f64 / pairs.len() as f64)
    }
}

fn band_digest(values: impl Iterator<Item = u32>) -> [u8; 20] {
    let mut hasher = Sha1::new();
    for v in values {
        hasher.update(v.to_le_bytes());
    }
    let mut digest = [0u8; 20];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

/// Unordered document pairs `(a, b)`, `a < b`, sharing at least one bucket.
pub fn candidate_pairs(buckets: &BucketMap) -> BTreeSet<(usize, usize)> {
    let mut pairs = BTreeSet::new();
    for docs in buckets.values().filter(|d| d.len() > 1) {
        for (i, &a) in docs.iter().enumerate() {
            for &b in &docs[i + 1..] {
                if a != b {
                    pairs.insert((a.min(b), a.max(b)));
                }
            }
        }
    }
    pairs
}

/// Connected components of the candidate-pair graph with more than one member, each sorted.
pub fn duplicate_groups(buckets: &BucketMap) -> Vec<Vec<usize>> {
    let pairs = candidate_pairs(buckets);
    let mut parent: BTreeMap<usize, usize> = BTreeMap::new();
    fn find(parent: &mut BTreeMap<usize, usize>, x: usize) -> usize {
        let p = *parent.entry(x).or_insert(x);
        if p == x {
            return x;
        }
        let root = find(parent, p);
        parent.insert(x, root);
        root
    }
    for &(a, b) in &pairs {
        let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
        if ra != rb {
            parent.insert(ra.max(rb), ra.min(rb));
        }
    }
    let nodes: Vec<usize> = parent.keys().copied().collect();
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for x in nodes {
        let root = find(&mut parent, x);
        groups.entry(root).or_default().push(x);
    }
    groups.into_values().filter(|g| g.len() > 1).collect()
}
