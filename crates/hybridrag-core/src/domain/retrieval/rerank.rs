//! Second-pass lexical reranking

use std::collections::HashSet;

use crate::error::Result;

use super::types::{RetrievalResult, rank_order};

/// Maximum relative boost applied for full query-token coverage
pub const MAX_LEXICAL_BOOST: f32 = 0.2;

/// Adjusts fused scores with a signal the primary retrievers do not use
pub trait Reranker: Send + Sync {
    fn rerank(&self, query: &str, results: Vec<RetrievalResult>) -> Result<Vec<RetrievalResult>>;
}

/// Boosts results whose content shares tokens with the query
///
/// Each score is multiplied by `1 + 0.2 * overlap`, where overlap is
/// `|query tokens ∩ content tokens| / |query tokens|` over distinct tokens,
/// so the boost never exceeds 20%. Tokens are runs of ASCII letters and digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexicalReranker {
    case_sensitive: bool,
}

impl Default for LexicalReranker {
    fn default() -> Self {
        Self { case_sensitive: true }
    }
}

impl LexicalReranker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare tokens after ASCII lowercasing
    pub fn case_insensitive() -> Self {
        Self { case_sensitive: false }
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    fn tokens(&self, text: &str) -> Vec<String> {
        let tokens = tokenize(text);
        if self.case_sensitive {
            tokens
        } else {
            tokens.into_iter().map(|t| t.to_ascii_lowercase()).collect()
        }
    }

    /// Fraction used for the boost; 0 for a query with no tokens
    pub fn term_overlap(&self, query: &str, content: &str) -> f32 {
        let query_set: HashSet<String> = self.tokens(query).into_iter().collect();
        if query_set.is_empty() {
            return 0.0;
        }
        let content_set: HashSet<String> = self.tokens(content).into_iter().collect();
        let matched = query_set.intersection(&content_set).count();
        matched as f32 / query_set.len() as f32
    }
}

impl Reranker for LexicalReranker {
    fn rerank(&self, query: &str, mut results: Vec<RetrievalResult>) -> Result<Vec<RetrievalResult>> {
        for result in &mut results {
            let overlap = self.term_overlap(query, &result.content);
            result.score *= 1.0 + overlap * MAX_LEXICAL_BOOST;
        }
        results.sort_by(rank_order);
        Ok(results)
    }
}

/// Split text into runs of `[A-Za-z0-9]`
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::retrieval::types::RetrievalSource;

    fn result(id: &str, content: &str, score: f32) -> RetrievalResult {
        RetrievalResult::new(id, content, score, RetrievalSource::Hybrid)
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("Hello, world! v2.0"), vec!["Hello", "world", "v2", "0"]);
        assert!(tokenize("  --  ").is_empty());
        assert_eq!(tokenize("naïve"), vec!["na", "ve"]);
    }

    #[test]
    fn test_zero_overlap_keeps_score() {
        let reranked = LexicalReranker::new()
            .rerank("tokio runtime", vec![result("a", "bread baking", 0.42)])
            .unwrap();
        assert_eq!(reranked[0].score, 0.42);
    }

    #[test]
    fn test_full_overlap_boosts_twenty_percent() {
        let reranked = LexicalReranker::new()
            .rerank("tokio runtime", vec![result("a", "the tokio runtime", 1.0)])
            .unwrap();
        assert!((reranked[0].score - 1.2).abs() < 1e-6);
    }

    #[test]
    fn test_rerank_reorders() {
        let results = vec![result("a", "nothing shared", 0.020), result("b", "test query", 0.019)];
        let reranked = LexicalReranker::new().rerank("test query", results).unwrap();
        assert_eq!(reranked[0].id, "b");
        assert!((reranked[0].score - 0.019 * 1.2).abs() < 1e-6);
    }

    #[test]
    fn test_case_sensitivity() {
        let sensitive = LexicalReranker::new();
        assert_eq!(sensitive.term_overlap("Test", "test"), 0.0);

        let insensitive = LexicalReranker::case_insensitive();
        assert_eq!(insensitive.term_overlap("Test", "test"), 1.0);
        assert!(!insensitive.is_case_sensitive());
    }

    #[test]
    fn test_repeated_tokens_do_not_exceed_max_boost() {
        let reranker = LexicalReranker::new();
        assert_eq!(reranker.term_overlap("tokio", "tokio tokio tokio"), 1.0);
        assert_eq!(reranker.term_overlap("tokio tokio serde", "tokio"), 0.5);
    }

    #[test]
    fn test_empty_query_has_no_overlap() {
        assert_eq!(LexicalReranker::new().term_overlap("!!", "anything"), 0.0);
    }
}
