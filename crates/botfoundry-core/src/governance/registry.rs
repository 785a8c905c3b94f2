//! Domain and integration-edge bookkeeping with hub-and-spoke enforcement.
//!
//! All cross-domain traffic routes through the hub domain unless an
//! explicit direct-connection exception exists for the pair. The registry
//! is plain state: it is only ever mutated under the governance manager's
//! single-writer lock.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use uuid::Uuid;

use botfoundry_types::error::GovernanceError;
use botfoundry_types::governance::{Domain, DomainStatus, Integration, IntegrationStatus};

/// The hub every spoke connects to at registration.
pub const HUB_DOMAIN: &str = "PIPE";

#[derive(Debug, Default)]
pub struct DomainRegistry {
    domains: HashMap<String, Domain>,
    integrations: HashMap<Uuid, Integration>,
    /// Direct-connection exceptions, stored as sorted pairs.
    exceptions: HashSet<(String, String)>,
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl DomainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a domain: Active status plus a pre-connected edge to the
    /// hub. Registering the hub itself creates no self-edge.
    pub fn register_domain(
        &mut self,
        code: &str,
        capabilities: Vec<String>,
    ) -> Result<(Domain, Option<Integration>), GovernanceError> {
        if self.domains.contains_key(code) {
            return Err(GovernanceError::DomainExists(code.to_string()));
        }

        let mut domain = Domain {
            code: code.to_string(),
            capabilities,
            status: DomainStatus::Active,
            connections: Vec::new(),
            created_at: Utc::now(),
            version: 1,
        };

        let hub_edge = if code != HUB_DOMAIN {
            let edge = Integration {
                id: Uuid::now_v7(),
                source: code.to_string(),
                target: HUB_DOMAIN.to_string(),
                status: IntegrationStatus::Connected,
                review_id: None,
                pr_url: None,
                created_at: Utc::now(),
                version: 1,
            };
            domain.connections.push(edge.id);
            if let Some(hub) = self.domains.get_mut(HUB_DOMAIN) {
                hub.connections.push(edge.id);
                hub.version += 1;
            }
            self.integrations.insert(edge.id, edge.clone());
            Some(edge)
        } else {
            None
        };

        self.domains.insert(code.to_string(), domain.clone());
        Ok((domain, hub_edge))
    }

    /// Allow a direct (non-hub) connection between two domains.
    pub fn add_exception(&mut self, a: &str, b: &str) {
        self.exceptions.insert(pair_key(a, b));
    }

    pub fn has_exception(&self, a: &str, b: &str) -> bool {
        self.exceptions.contains(&pair_key(a, b))
    }

    /// Hub-and-spoke check. Rejects before any record is created when
    /// neither endpoint is the hub and no exception covers the pair.
    pub fn policy_check(&self, source: &str, target: &str) -> Result<(), GovernanceError> {
        if !self.domains.contains_key(source) {
            return Err(GovernanceError::DomainNotFound(source.to_string()));
        }
        if !self.domains.contains_key(target) {
            return Err(GovernanceError::DomainNotFound(target.to_string()));
        }
        if source != HUB_DOMAIN && target != HUB_DOMAIN && !self.has_exception(source, target) {
            return Err(GovernanceError::PolicyViolation {
                from_domain: source.to_string(),
                target: target.to_string(),
            });
        }
        Ok(())
    }

    /// Create a pending integration edge after the policy check passes.
    /// The caller supplies the review that will drive the edge's terminal
    /// status.
    pub fn create_pending_integration(
        &mut self,
        source: &str,
        target: &str,
        pr_url: Option<String>,
        review_id: Uuid,
    ) -> Result<Integration, GovernanceError> {
        self.policy_check(source, target)?;

        let edge = Integration {
            id: Uuid::now_v7(),
            source: source.to_string(),
            target: target.to_string(),
            status: IntegrationStatus::Pending,
            review_id: Some(review_id),
            pr_url,
            created_at: Utc::now(),
            version: 1,
        };
        for code in [source, target] {
            if let Some(domain) = self.domains.get_mut(code) {
                domain.connections.push(edge.id);
                domain.version += 1;
            }
        }
        self.integrations.insert(edge.id, edge.clone());
        Ok(edge)
    }

    pub fn set_integration_status(
        &mut self,
        id: Uuid,
        status: IntegrationStatus,
    ) -> Result<Integration, GovernanceError> {
        let edge = self
            .integrations
            .get_mut(&id)
            .ok_or(GovernanceError::IntegrationNotFound(id))?;
        if edge.status != status {
            edge.status = status;
            edge.version += 1;
        }
        Ok(edge.clone())
    }

    pub fn suspend_domain(&mut self, code: &str) -> Result<Domain, GovernanceError> {
        self.set_domain_status(code, DomainStatus::Suspended)
    }

    pub fn resume_domain(&mut self, code: &str) -> Result<Domain, GovernanceError> {
        self.set_domain_status(code, DomainStatus::Active)
    }

    fn set_domain_status(
        &mut self,
        code: &str,
        status: DomainStatus,
    ) -> Result<Domain, GovernanceError> {
        let domain = self
            .domains
            .get_mut(code)
            .ok_or_else(|| GovernanceError::DomainNotFound(code.to_string()))?;
        if domain.status != status {
            domain.status = status;
            domain.version += 1;
        }
        Ok(domain.clone())
    }

    pub fn domain(&self, code: &str) -> Result<&Domain, GovernanceError> {
        self.domains
            .get(code)
            .ok_or_else(|| GovernanceError::DomainNotFound(code.to_string()))
    }

    pub fn integration(&self, id: Uuid) -> Result<&Integration, GovernanceError> {
        self.integrations
            .get(&id)
            .ok_or(GovernanceError::IntegrationNotFound(id))
    }

    /// Edges a domain participates in.
    pub fn integrations_for(&self, code: &str) -> Vec<&Integration> {
        self.integrations
            .values()
            .filter(|i| i.source == code || i.target == code)
            .collect()
    }

    pub fn domains(&self) -> impl Iterator<Item = &Domain> {
        self.domains.values()
    }

    pub fn integrations(&self) -> &HashMap<Uuid, Integration> {
        &self.integrations
    }

    /// Hydration from persisted records.
    pub fn insert_domain(&mut self, domain: Domain) {
        self.domains.insert(domain.code.clone(), domain);
    }

    /// Hydration from persisted records.
    pub fn insert_integration(&mut self, integration: Integration) {
        self.integrations.insert(integration.id, integration);
    }
}
