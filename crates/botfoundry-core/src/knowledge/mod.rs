//! Knowledge store port: precedent storage and ranked lookup.
//!
//! The backing service is external and non-deterministic (graph rebuilds,
//! learned rankings); the core treats it as best-effort and never assumes
//! reproducible outputs. [`MemoryKnowledgeStore`] is the deterministic
//! stand-in for tests and offline runs.

use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use botfoundry_types::analysis::{DecisionRecord, Precedent, PrReviewDataPoint};
use botfoundry_types::error::RepositoryError;

#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Persist a finalized governance decision; returns its id.
    async fn store(&self, decision: DecisionRecord) -> Result<Uuid, RepositoryError>;

    /// Persist a completed PR analysis data point.
    async fn store_data_point(&self, point: PrReviewDataPoint) -> Result<Uuid, RepositoryError>;

    /// Kick off an asynchronous, best-effort knowledge-graph rebuild.
    /// Failures are the implementation's problem; callers never wait on
    /// the rebuild.
    async fn cognify(&self);

    /// Ranked precedents for a query, most confident first.
    async fn search(&self, query: &str) -> Result<Vec<Precedent>, RepositoryError>;
}

/// Deterministic in-memory store. Ranking is token overlap between the
/// query and the decision summary -- crude, but stable under test.
#[derive(Debug, Default)]
pub struct MemoryKnowledgeStore {
    decisions: Mutex<Vec<(Uuid, DecisionRecord)>>,
    data_points: Mutex<Vec<(Uuid, PrReviewDataPoint)>>,
}

impl MemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decision_count(&self) -> usize {
        self.decisions.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn data_point_count(&self) -> usize {
        self.data_points.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

fn overlap_score(query: &str, summary: &str) -> f64 {
    let query_tokens: Vec<String> = query
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if query_tokens.is_empty() {
        return 0.0;
    }
    let summary_lower = summary.to_lowercase();
    let hits = query_tokens
        .iter()
        .filter(|t| summary_lower.contains(t.as_str()))
        .count();
    hits as f64 / query_tokens.len() as f64
}

#[async_trait]
impl KnowledgeStore for MemoryKnowledgeStore {
    async fn store(&self, decision: DecisionRecord) -> Result<Uuid, RepositoryError> {
        let id = Uuid::now_v7();
        self.decisions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, decision));
        Ok(id)
    }

    async fn store_data_point(&self, point: PrReviewDataPoint) -> Result<Uuid, RepositoryError> {
        let id = Uuid::now_v7();
        self.data_points
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, point));
        Ok(id)
    }

    async fn cognify(&self) {}

    async fn search(&self, query: &str) -> Result<Vec<Precedent>, RepositoryError> {
        let mut ranked: Vec<Precedent> = self
            .decisions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(id, d)| Precedent {
                decision_id: *id,
                summary: d.summary.clone(),
                confidence: overlap_score(query, &d.summary),
            })
            .filter(|p| p.confidence > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn decision(summary: &str) -> DecisionRecord {
        DecisionRecord {
            review_id: Uuid::now_v7(),
            integration_id: None,
            summary: summary.to_string(),
            outcome: "approved".to_string(),
            rationale: None,
            decided_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_search_ranks_closer_matches_first() {
        let store = MemoryKnowledgeStore::new();
        store
            .store(decision("integration ECO -> PIPE approved"))
            .await
            .unwrap();
        store
            .store(decision("integration AXIS -> PIPE rejected"))
            .await
            .unwrap();
        store.store(decision("security review of AXIS")).await.unwrap();

        let results = store.search("integration ECO PIPE").await.unwrap();
        assert!(results.len() >= 2);
        assert!(results[0].summary.contains("ECO"));
        assert!(results[0].confidence > results[1].confidence);
    }

    #[tokio::test]
    async fn test_search_with_no_match_is_empty() {
        let store = MemoryKnowledgeStore::new();
        store.store(decision("integration ECO -> PIPE approved")).await.unwrap();
        let results = store.search("zzz").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_data_points_accumulate() {
        let store = MemoryKnowledgeStore::new();
        store
            .store_data_point(PrReviewDataPoint {
                pr_url: "https://git/pr/1".into(),
                analysis_id: Uuid::now_v7(),
                risk_level: botfoundry_types::analysis::RiskLevel::Low,
                clusters: vec![],
                suggestions: vec![],
                confidence: 0.9,
                reviewer_xp: None,
                recorded_at: Utc::now(),
            })
            .await
            .unwrap();
        assert_eq!(store.data_point_count(), 1);
    }
}
