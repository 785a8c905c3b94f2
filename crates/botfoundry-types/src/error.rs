use uuid::Uuid;

use thiserror::Error;

/// Errors from governance operations.
///
/// `PolicyViolation` and the validation variants reject immediately and
/// create no records; `Conflict` signals an optimistic-versioning clash the
/// caller retries with a fresh read.
#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("policy violation: direct integration {from_domain} -> {target} must route through the hub")]
    PolicyViolation { from_domain: String, target: String },

    #[error("domain '{0}' not found")]
    DomainNotFound(String),

    #[error("domain '{0}' already registered")]
    DomainExists(String),

    #[error("review {0} not found")]
    ReviewNotFound(Uuid),

    #[error("integration {0} not found")]
    IntegrationNotFound(Uuid),

    #[error("invalid review transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("rationale is required and must be non-empty")]
    MissingRationale,

    #[error("reviewer '{0}' is not assigned to this review")]
    NotAssigned(String),

    #[error("version conflict: expected {expected}, found {actual}")]
    Conflict { expected: u64, actual: u64 },

    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors from bot state persistence.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("version conflict: expected {expected}, found {actual}")]
    Conflict { expected: u64, actual: u64 },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors from bot lifecycle management.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("bot '{0}' not found")]
    NotFound(String),

    #[error("bot '{0}' already has an active instance")]
    AlreadyRunning(String),

    #[error("invalid bot transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("initialization failed: {0}")]
    InitFailed(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

/// Errors from the external PR analysis service.
///
/// `Transient` failures are retried with backoff; `Exhausted` means the
/// retry budget ran out and the review must fall back to humans.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("transient analysis failure: {0}")]
    Transient(String),

    #[error("analysis request rejected: {0}")]
    Rejected(String),

    #[error("analysis {0} not found")]
    NotFound(Uuid),

    #[error("analysis retries exhausted after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

/// Errors from repository implementations (used by port traits in
/// botfoundry-core, implemented in botfoundry-infra).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<RepositoryError> for GovernanceError {
    fn from(e: RepositoryError) -> Self {
        GovernanceError::Storage(e.to_string())
    }
}

impl From<RepositoryError> for StateError {
    fn from(e: RepositoryError) -> Self {
        StateError::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_violation_display_names_both_domains() {
        let err = GovernanceError::PolicyViolation {
            from_domain: "AXIS".to_string(),
            target: "ECO".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("AXIS"));
        assert!(msg.contains("ECO"));
        assert!(msg.contains("hub"));
    }

    #[test]
    fn test_conflict_display() {
        let err = StateError::Conflict {
            expected: 3,
            actual: 5,
        };
        assert_eq!(err.to_string(), "version conflict: expected 3, found 5");
    }

    #[test]
    fn test_repository_error_converts_to_governance() {
        let err: GovernanceError = RepositoryError::Query("syntax".to_string()).into();
        assert!(matches!(err, GovernanceError::Storage(_)));
    }
}
