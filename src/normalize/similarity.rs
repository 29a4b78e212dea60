use crate::config;

/// Scores two organisation names on a 0–100 scale.
pub trait SimilarityScorer: Send + Sync {
    fn score(&self, left: &str, right: &str) -> f64;
}

/// Order-insensitive comparison: both names are lowercased, split on
/// anything that is not a letter or digit, sorted, and compared by
/// normalised Levenshtein similarity.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenSortRatio;

pub fn sorted_tokens(name: &str) -> String {
    let lowered = name.to_lowercase();
    let spaced = config::NON_ALNUM_RE.replace_all(&lowered, " ");
    let mut tokens: Vec<&str> = spaced.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

impl SimilarityScorer for TokenSortRatio {
    fn score(&self, left: &str, right: &str) -> f64 {
        let a = sorted_tokens(left);
        let b = sorted_tokens(right);
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        (strsim::normalized_levenshtein(&a, &b) * 100.0).round()
    }
}
