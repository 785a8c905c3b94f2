//! PR analysis service port.
//!
//! The backing service is a slow, unreliable, LLM-powered analyzer; the
//! core never assumes its outputs are deterministic. The HTTP client
//! lives in botfoundry-infra; tests substitute scripted fakes.

use async_trait::async_trait;
use uuid::Uuid;

use botfoundry_types::analysis::AnalysisPoll;
use botfoundry_types::error::AnalysisError;

#[async_trait]
pub trait PrAnalysisService: Send + Sync {
    /// Queue an analysis of the pull request; returns the analysis id to
    /// poll.
    async fn submit(&self, pr_url: &str) -> Result<Uuid, AnalysisError>;

    /// Poll an in-flight analysis.
    async fn fetch_result(&self, analysis_id: Uuid) -> Result<AnalysisPoll, AnalysisError>;

    /// Render the full analysis as a markdown report.
    async fn export_markdown(&self, analysis_id: Uuid) -> Result<String, AnalysisError>;

    /// XP the service awarded for a human-completed review.
    async fn fetch_xp(&self, review_id: Uuid) -> Result<i64, AnalysisError>;
}
