use crate::shingle::{jaccard_score, shingle_word};
use std::collections::{HashMap, HashSet};

const SHINGLE_SIZE: usize = 2;
const CANDIDATES: usize = 5;

/// Corrects query words against the corpus vocabulary using bigram Jaccard similarity weighted by word frequency.
pub struct SpellCorrector {
    shingled_words: HashMap<String, HashSet<String>>,
    word_counts: HashMap<String, usize>,
}

impl SpellCorrector {
    pub fn new<S: AsRef<str>>(documents: &[S]) -> Self {
        let mut shingled_words = HashMap::new();
        let mut word_counts = HashMap::new();
        for word in documents.iter().flat_map(|d| d.as_ref().split_whitespace()) {
            shingled_words.entry(word.to_string()).or_insert_with(|| shingle_word(word, SHINGLE_SIZE));
            *word_counts.entry(word.to_string()).or_insert(0) += 1;
        }
        Self { shingled_words, word_counts }
    }

    pub fn vocabulary_size(&self) -> usize { self.shingled_words.len() }

    /// Up to five vocabulary words closest to `word`, best first (ties by word).
    pub fn find_nearest_words(&self, word: &str) -> Vec<String> {
        let shingles = shingle_word(word, SHINGLE_SIZE);
        let mut scored: Vec<(&String, f64)> = self
            .shingled_words
            .iter()
            .filter(|(candidate, _)| candidate.as_str() != word)
            .map(|(candidate, s)| (candidate, jaccard_score(&shingles, s)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(b.0)));
        scored.into_iter().take(CANDIDATES).map(|(w, _)| w.clone()).collect()
    }

    pub fn spell_check(&self, query: &str) -> String {
        query.split_whitespace().map(|w| self.correct_word(w)).collect::<Vec<_>>().join(" ")
    }

    fn correct_word(&self, word: &str) -> String {
        if self.shingled_words.contains_key(word) {
            return word.to_string();
        }
        let candidates = self.find_nearest_words(word);
        let Some(max_count) = candidates.iter().filter_map(|c| self.word_counts.get(c)).max().copied() else {
            return word.to_string();
        };
        let shingles = shingle_word(word, SHINGLE_SIZE);
        candidates
            .iter()
            .map(|c| {
                let count = self.word_counts.get(c).copied().unwrap_or(0) as f64;
                (c, count / max_count as f64 * jaccard_score(&shingles, &self.shingled_words[c]))
            })
            .fold(None, |best: Option<(&String, f64)>, (c, s)| match best {
                Some((_, bs)) if bs >= s => best,
                _ => Some((c, s)),
            })
            .map(|(c, _)| c.clone())
            .unwrap_or_else(|| word.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corrector() -> SpellCorrector {
        SpellCorrector::new(&[
            "the shawshank redemption is a prison drama",
            "the godfather is a crime drama",
            "drama drama batman",
        ])
    }

    #[test]
    fn nearest_words_rank_by_similarity() {
        let c = corrector();
        let nearest = c.find_nearest_words("dramma");
        assert_eq!(nearest[0], "drama");
        assert!(nearest.len() <= 5);
        assert!(!c.find_nearest_words("drama").contains(&"drama".to_string()));
    }

    #[test]
    fn known_words_are_kept_and_typos_fixed() {
        let c = corrector();
        assert_eq!(c.spell_check("shawshenk redemption"), "shawshank redemption");
        assert_eq!(c.spell_check("godfater"), "godfather");
    }

    #[test]
    fn empty_vocabulary_keeps_input() {
        let c = SpellCorrector::new::<&str>(&[]);
        assert_eq!(c.spell_check("anything"), "anything");
        assert_eq!(c.vocabulary_size(), 0);
    }
}
