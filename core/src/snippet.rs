use crate::tokenizer::is_stopword;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snippet {
    /// Windows around each matched query word, joined by ` ... `; matches are wrapped in `***`.
    pub text: String,
    /// Query words (after stopword removal) that occur nowhere in the document.
    pub not_found: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct SnippetExtractor {
    pub words_on_each_side: usize,
}

impl Default for SnippetExtractor {
    fn default() -> Self { Self { words_on_each_side: 5 } }
}

impl SnippetExtractor {
    pub fn new(words_on_each_side: usize) -> Self { Self { words_on_each_side } }

    pub fn find_snippet(&self, doc: &str, query: &str) -> Snippet {
        let words: Vec<&str> = doc.split_whitespace().collect();
        let mut windows = Vec::new();
        let mut not_found = Vec::new();
        let mut seen = Vec::new();

        for token in query.split_whitespace().filter(|t| !is_stopword(t)) {
            let needle = token.to_lowercase();
            if seen.contains(&needle) {
                continue;
            }
            seen.push(needle.clone());
            let Some(pos) = words.iter().position(|w| bare(w).to_lowercase() == needle) else {
                not_found.push(token.to_string());
                continue;
            };
            let start = pos.saturating_sub(self.words_on_each_side);
            let end = (pos + self.words_on_each_side + 1).min(words.len());
            let mut window: Vec<String> = words[start..pos].iter().map(|w| w.to_string()).collect();
            window.push(highlight(words[pos]));
            window.extend(words[pos + 1..end].iter().map(|w| w.to_string()));
            windows.push(window.join(" "));
        }
        Snippet { text: windows.join(" ... "), not_found }
    }
}

/// The word without leading/trailing punctuation.
fn bare(word: &str) -> &str { word.trim_matches(|c: char| !c.is_alphanumeric()) }

fn highlight(word: &str) -> String {
    let core = bare(word);
    if core.is_empty() {
        return format!("***{word}***");
    }
    let start = word.find(core).unwrap_or(0);
    let end = start + core.len();
    format!("{}***{}***{}", &word[..start], core, &word[end..])
}
