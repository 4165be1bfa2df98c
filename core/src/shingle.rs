use std::collections::HashSet;

/// Contiguous character k-grams of `word`, case preserved. Shorter words yield no shingles.
pub fn shingle_word(word: &str, k: usize) -> HashSet<String> {
    let chars: Vec<char> = word.chars().collect();
    if k == 0 || chars.len() < k {
        return HashSet::new();
    }
    chars.windows(k).map(|w| w.iter().collect()).collect()
}

/// Character k-grams of the lower-cased document, whitespace included.
pub fn shingle_document(document: &str, k: usize) -> HashSet<String> {
    shingle_word(&document.to_lowercase(), k)
}

/// `|A ∩ B| / |A ∪ B|`, or 0 when both sets are empty.
pub fn jaccard_score<T: Eq + std::hash::Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> HashSet<String> { items.iter().map(|s| s.to_string()).collect() }

    #[test]
    fn word_bigrams() {
        assert_eq!(shingle_word("apple", 2), set(&["ap", "pp", "pl", "le"]));
        assert!(shingle_word("a", 2).is_empty());
        assert_eq!(shingle_word("Ab", 2), set(&["Ab"]));
    }

    #[test]
    fn document_shingles_are_lowercased() {
        assert_eq!(shingle_document("Ab b", 2), set(&["ab", "b ", " b"]));
        assert_eq!(shingle_document("ÉTÉ", 3), set(&["été"]));
    }

    #[test]
    fn jaccard_bounds() {
        let a = set(&["ab", "bc", "cd"]);
        let b = set(&["bc", "cd", "de", "ef"]);
        let empty = HashSet::<String>::new();
        assert_eq!(jaccard_score(&a, &a), 1.0);
        assert_eq!(jaccard_score(&empty, &empty), 0.0);
        assert_eq!(jaccard_score(&a, &empty), 0.0);
        let j = jaccard_score(&a, &b);
        assert!((j - 0.4).abs() < 1e-12);
        assert_eq!(j, jaccard_score(&b, &a));
    }
}
