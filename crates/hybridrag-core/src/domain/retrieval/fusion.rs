//! Reciprocal Rank Fusion (RRF)

use std::collections::{HashMap, HashSet};

use super::types::{RetrievalResult, RetrievalSource, rank_order};

/// Standard RRF k parameter.
///
/// From Cormack, Clarke and Buettcher, "Reciprocal Rank Fusion outperforms
/// Condorcet and individual Rank Learning Methods" (SIGIR 2009). Smaller k
/// puts more weight on the top ranks.
pub const RRF_K: f32 = 60.0;

/// Merges the vector and graph result lists into one ranking
pub trait FusionStrategy: Send + Sync {
    fn fuse(&self, vector_results: &[RetrievalResult], graph_results: &[RetrievalResult]) -> Vec<RetrievalResult>;
}

/// RRF over result identity
///
/// score(id) = sum over lists of 1 / (k + rank), where rank is the 1-based
/// position in the list as supplied. The incoming scores are ignored.
/// An id repeated within one list only counts at its first (best) position,
/// and only an id present in both lists is tagged [`RetrievalSource::Hybrid`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReciprocalRankFusion {
    k: f32,
}

impl Default for ReciprocalRankFusion {
    fn default() -> Self {
        Self { k: RRF_K }
    }
}

impl ReciprocalRankFusion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom k (non-positive values keep the default)
    pub fn with_k(k: f32) -> Self {
        if k > 0.0 { Self { k } } else { Self::default() }
    }

    pub fn k(&self) -> f32 {
        self.k
    }

    fn accumulate(
        &self,
        results: &[RetrievalResult],
        source: RetrievalSource,
        merged: &mut Vec<RetrievalResult>,
        positions: &mut HashMap<String, usize>,
    ) {
        let mut seen: HashSet<&str> = HashSet::with_capacity(results.len());

        for (i, result) in results.iter().enumerate() {
            if !seen.insert(result.id.as_str()) {
                continue;
            }
            let rrf_score = 1.0 / (self.k + (i + 1) as f32);

            match positions.get(&result.id) {
                Some(&pos) => {
                    let existing = &mut merged[pos];
                    existing.score += rrf_score;
                    for (key, value) in &result.metadata {
                        existing.metadata.insert(key.clone(), value.clone());
                    }
                    if existing.source != source {
                        existing.source = RetrievalSource::Hybrid;
                    }
                }
                None => {
                    positions.insert(result.id.clone(), merged.len());
                    merged.push(RetrievalResult {
                        id: result.id.clone(),
                        content: result.content.clone(),
                        score: rrf_score,
                        metadata: result.metadata.clone(),
                        source,
                    });
                }
            }
        }
    }
}

impl FusionStrategy for ReciprocalRankFusion {
    fn fuse(&self, vector_results: &[RetrievalResult], graph_results: &[RetrievalResult]) -> Vec<RetrievalResult> {
        // Insertion-ordered accumulation; the map only indexes into `merged`
        let mut merged = Vec::with_capacity(vector_results.len() + graph_results.len());
        let mut positions = HashMap::with_capacity(merged.capacity());

        self.accumulate(vector_results, RetrievalSource::Vector, &mut merged, &mut positions);
        self.accumulate(graph_results, RetrievalSource::Graph, &mut merged, &mut positions);

        merged.sort_by(rank_order);
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::retrieval::types::Metadata;
    use serde_json::json;

    fn result(id: &str, score: f32, source: RetrievalSource) -> RetrievalResult {
        RetrievalResult::new(id, format!("content {}", id), score, source)
    }

    #[test]
    fn test_shared_id_becomes_hybrid() {
        let vector = vec![
            result("1", 0.9, RetrievalSource::Vector),
            result("2", 0.8, RetrievalSource::Vector),
        ];
        let graph = vec![
            result("1", 0.7, RetrievalSource::Graph),
            result("3", 0.6, RetrievalSource::Graph),
        ];

        let fused = ReciprocalRankFusion::new().fuse(&vector, &graph);
        assert_eq!(fused.len(), 3);

        let one = fused.iter().find(|r| r.id == "1").unwrap();
        assert_eq!(one.source, RetrievalSource::Hybrid);
        assert!((one.score - (1.0 / 61.0 + 1.0 / 61.0)).abs() < 1e-6);

        let two = fused.iter().find(|r| r.id == "2").unwrap();
        assert_eq!(two.source, RetrievalSource::Vector);
        assert!((two.score - 1.0 / 62.0).abs() < 1e-6);

        let three = fused.iter().find(|r| r.id == "3").unwrap();
        assert_eq!(three.source, RetrievalSource::Graph);
        assert!((three.score - 1.0 / 62.0).abs() < 1e-6);

        assert_eq!(fused[0].id, "1");
    }

    #[test]
    fn test_ties_break_by_ascending_id() {
        let vector = vec![result("zeta", 0.1, RetrievalSource::Vector)];
        let graph = vec![result("alpha", 0.9, RetrievalSource::Graph)];

        let fused = ReciprocalRankFusion::new().fuse(&vector, &graph);
        let ids: Vec<&str> = fused.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_rank_is_positional_not_score_based() {
        // Input order is trusted even when scores disagree with it
        let vector = vec![
            result("low", 0.01, RetrievalSource::Vector),
            result("high", 100.0, RetrievalSource::Vector),
        ];
        let fused = ReciprocalRankFusion::new().fuse(&vector, &[]);
        assert_eq!(fused[0].id, "low");
        assert_eq!(fused[1].id, "high");
    }

    #[test]
    fn test_metadata_merges_with_graph_winning() {
        let mut vector_meta = Metadata::new();
        vector_meta.insert("origin".into(), json!("vector"));
        vector_meta.insert("vector_only".into(), json!(true));
        let mut graph_meta = Metadata::new();
        graph_meta.insert("origin".into(), json!("graph"));

        let vector = vec![result("1", 0.5, RetrievalSource::Vector).with_metadata(vector_meta.clone())];
        let graph = vec![result("1", 0.5, RetrievalSource::Graph).with_metadata(graph_meta)];

        let fused = ReciprocalRankFusion::new().fuse(&vector, &graph);
        assert_eq!(fused[0].metadata["origin"], json!("graph"));
        assert_eq!(fused[0].metadata["vector_only"], json!(true));
        // Inputs are untouched
        assert_eq!(vector[0].metadata, vector_meta);
    }

    #[test]
    fn test_fusion_is_reproducible() {
        let vector: Vec<RetrievalResult> = (0..30)
            .map(|i| result(&format!("v{}", i % 7), 0.0, RetrievalSource::Vector))
            .collect();
        let graph: Vec<RetrievalResult> = (0..30)
            .map(|i| result(&format!("v{}", (i * 3) % 11), 0.0, RetrievalSource::Graph))
            .collect();

        let rrf = ReciprocalRankFusion::new();
        let first = rrf.fuse(&vector, &graph);
        let second = rrf.fuse(&vector, &graph);
        assert_eq!(first, second);
    }

    #[test]
    fn test_repeated_id_in_one_list_keeps_its_source() {
        let vector = vec![
            result("a", 0.9, RetrievalSource::Vector),
            result("b", 0.8, RetrievalSource::Vector),
            result("a", 0.7, RetrievalSource::Vector),
        ];

        let fused = ReciprocalRankFusion::new().fuse(&vector, &[]);
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].id, "a");
        assert_eq!(fused[0].source, RetrievalSource::Vector);
        // Only the first position counts
        assert!((fused[0].score - 1.0 / 61.0).abs() < 1e-6);
    }

    #[test]
    fn test_repeated_id_still_fuses_across_lists() {
        let vector = vec![
            result("a", 0.9, RetrievalSource::Vector),
            result("a", 0.8, RetrievalSource::Vector),
        ];
        let graph = vec![
            result("b", 0.9, RetrievalSource::Graph),
            result("a", 0.5, RetrievalSource::Graph),
        ];

        let fused = ReciprocalRankFusion::new().fuse(&vector, &graph);
        let a = fused.iter().find(|r| r.id == "a").unwrap();
        assert_eq!(a.source, RetrievalSource::Hybrid);
        assert!((a.score - (1.0 / 61.0 + 1.0 / 62.0)).abs() < 1e-6);
        let b = fused.iter().find(|r| r.id == "b").unwrap();
        assert_eq!(b.source, RetrievalSource::Graph);
    }

    #[test]
    fn test_both_empty() {
        assert!(ReciprocalRankFusion::new().fuse(&[], &[]).is_empty());
    }

    #[test]
    fn test_custom_k() {
        let rrf = ReciprocalRankFusion::with_k(1.0);
        let fused = rrf.fuse(&[result("a", 0.0, RetrievalSource::Vector)], &[]);
        assert!((fused[0].score - 0.5).abs() < 1e-6);
        assert_eq!(ReciprocalRankFusion::with_k(-3.0).k(), RRF_K);
    }
}
