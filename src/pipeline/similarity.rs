use super::normalize::normalize_title;
use std::collections::BTreeSet;

/// Similarity of two titles.
///
/// Implementations must be symmetric, deterministic and return values in `[0, 1]`.
pub trait TitleSimilarity: Send + Sync {
    fn similarity(&self, a: &str, b: &str) -> f64;
}

/// Larger of token Jaccard overlap and normalized Levenshtein ratio,
/// computed on lower-cased, punctuation-stripped titles.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenEditSimilarity;

impl TitleSimilarity for TokenEditSimilarity {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        let a = normalize_title(a);
        let b = normalize_title(b);
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        if a == b {
            return 1.0;
        }
        let edit = strsim::normalized_levenshtein(&a, &b);
        jaccard(&a, &b).max(edit).clamp(0.0, 1.0)
    }
}

/// Token-set Jaccard index of two normalized titles
#[must_use]
pub fn jaccard(a: &str, b: &str) -> f64 {
    let left: BTreeSet<&str> = a.split(' ').filter(|t| !t.is_empty()).collect();
    let right: BTreeSet<&str> = b.split(' ').filter(|t| !t.is_empty()).collect();
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}
