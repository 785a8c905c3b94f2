//! Governance persistence port.
//!
//! The manager writes every domain, integration, and review mutation
//! through this trait; each record is independently versioned by the
//! in-memory services and stored as-is. The SQLite implementation lives
//! in botfoundry-infra.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use botfoundry_types::error::RepositoryError;
use botfoundry_types::governance::{Domain, Integration};
use botfoundry_types::review::Review;

#[async_trait]
pub trait GovernanceRepo: Send + Sync {
    async fn save_domain(&self, domain: &Domain) -> Result<(), RepositoryError>;
    async fn save_integration(&self, integration: &Integration) -> Result<(), RepositoryError>;
    async fn save_review(&self, review: &Review) -> Result<(), RepositoryError>;

    async fn load_domains(&self) -> Result<Vec<Domain>, RepositoryError>;
    async fn load_integrations(&self) -> Result<Vec<Integration>, RepositoryError>;
    async fn load_reviews(&self) -> Result<Vec<Review>, RepositoryError>;
}

/// Process-local repo for tests and ephemeral factories.
#[derive(Debug, Default)]
pub struct MemoryGovernanceRepo {
    domains: DashMap<String, Domain>,
    integrations: DashMap<Uuid, Integration>,
    reviews: DashMap<Uuid, Review>,
}

impl MemoryGovernanceRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GovernanceRepo for MemoryGovernanceRepo {
    async fn save_domain(&self, domain: &Domain) -> Result<(), RepositoryError> {
        self.domains.insert(domain.code.clone(), domain.clone());
        Ok(())
    }

    async fn save_integration(&self, integration: &Integration) -> Result<(), RepositoryError> {
        self.integrations.insert(integration.id, integration.clone());
        Ok(())
    }

    async fn save_review(&self, review: &Review) -> Result<(), RepositoryError> {
        self.reviews.insert(review.id, review.clone());
        Ok(())
    }

    async fn load_domains(&self) -> Result<Vec<Domain>, RepositoryError> {
        Ok(self.domains.iter().map(|d| d.clone()).collect())
    }

    async fn load_integrations(&self) -> Result<Vec<Integration>, RepositoryError> {
        Ok(self.integrations.iter().map(|i| i.clone()).collect())
    }

    async fn load_reviews(&self) -> Result<Vec<Review>, RepositoryError> {
        Ok(self.reviews.iter().map(|r| r.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use botfoundry_types::review::{ReviewPriority, ReviewType};

    #[tokio::test]
    async fn test_save_and_load_reviews() {
        let repo = MemoryGovernanceRepo::new();
        let review = Review::new(ReviewType::Security, ReviewPriority::High);
        repo.save_review(&review).await.unwrap();

        let loaded = repo.load_reviews().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, review.id);
    }

    #[tokio::test]
    async fn test_save_overwrites_by_key() {
        let repo = MemoryGovernanceRepo::new();
        let mut review = Review::new(ReviewType::Quality, ReviewPriority::Low);
        repo.save_review(&review).await.unwrap();
        review.touch();
        repo.save_review(&review).await.unwrap();

        let loaded = repo.load_reviews().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].version, 2);
    }
}
