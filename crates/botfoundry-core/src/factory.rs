//! Factory assembly: config entries in, running bots out.
//!
//! Maps each configured bot kind to its behavior implementation and hands
//! the fleet to a [`BotOrchestrator`]. The closed set of kinds lives in
//! the `BotKind` enum; adding a kind means adding a behavior and an arm
//! here.

use std::sync::Arc;

use botfoundry_types::bot::BotKind;
use botfoundry_types::config::FactoryConfig;
use botfoundry_types::error::BotError;

use crate::bot::{BotBehavior, BotOrchestrator, MonitorBot};
use crate::event::EventBus;
use crate::governance::GovernanceManager;
use crate::knowledge::KnowledgeStore;
use crate::review::{PrAnalysisService, PrReviewBot, XpLedger};
use crate::state::StateStore;

/// Everything the factory needs to assemble its bots.
pub struct FactoryServices {
    pub bus: Arc<EventBus>,
    pub state: Arc<dyn StateStore>,
    pub governance: Arc<GovernanceManager>,
    pub analysis: Arc<dyn PrAnalysisService>,
    pub knowledge: Arc<dyn KnowledgeStore>,
    pub ledger: Arc<dyn XpLedger>,
}

/// Build one bot per config entry and start them all.
///
/// Fails fast on a duplicate bot id, stopping any bots already started.
pub async fn start_bots(
    config: &FactoryConfig,
    services: &FactoryServices,
) -> Result<BotOrchestrator, BotError> {
    let orchestrator = BotOrchestrator::new(services.bus.clone(), services.state.clone());
    for entry in &config.bots {
        let behavior: Arc<dyn BotBehavior> = match entry.kind {
            BotKind::PrReview => Arc::new(PrReviewBot::new(
                services.governance.clone(),
                services.analysis.clone(),
                services.knowledge.clone(),
                services.ledger.clone(),
            )),
            BotKind::Monitor => Arc::new(MonitorBot::new()),
        };
        if let Err(err) = orchestrator.start_bot(entry.clone(), behavior) {
            orchestrator.shutdown().await;
            return Err(err);
        }
    }
    Ok(orchestrator)
}
