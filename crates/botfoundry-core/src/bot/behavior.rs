//! The capability interface every bot kind implements.
//!
//! Bot kinds are a closed set; type-specific behavior is injected as a
//! `BotBehavior` implementation composed into a [`super::BotRuntime`],
//! never inherited. The runtime owns the lifecycle state machine and
//! calls these hooks at the right points.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use botfoundry_types::bot::BotId;
use botfoundry_types::config::BotEntry;
use botfoundry_types::error::BotError;

use crate::event::{ErrorCounter, EventBus};
use crate::state::StateStore;

/// Services and identity handed to every behavior hook.
#[derive(Clone)]
pub struct BotContext {
    pub bot_id: BotId,
    pub entry: BotEntry,
    pub state: Arc<dyn StateStore>,
    pub bus: Arc<EventBus>,
    /// Shared error tally; bus subscriptions made by the behavior charge
    /// their handler failures here.
    pub errors: ErrorCounter,
    /// Cancelled when the bot is shutting down. Behaviors racing external
    /// calls against this token abandon them instead of blocking shutdown.
    pub cancel: CancellationToken,
}

/// Outcome classification for one execute tick.
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    /// Logged and counted; the bot keeps running until the configured
    /// error threshold is crossed.
    #[error(transparent)]
    Recoverable(#[from] anyhow::Error),

    /// Invariant violation. The bot transitions to Error immediately and
    /// stays there until a manual reset.
    #[error("fatal: {0}")]
    Fatal(String),
}

/// Capability interface for a bot kind: `{initialize, execute, cleanup}`.
/// Health reporting lives on the runtime, which owns the counters.
#[async_trait]
pub trait BotBehavior: Send + Sync {
    /// Runs once before the bot may enter Running. Resumes prior state via
    /// `ctx.state` -- loading must not re-trigger side effects the saved
    /// payload already captures. Failure leaves the bot in Error.
    async fn initialize(&self, ctx: &BotContext) -> Result<(), BotError>;

    /// One poll-loop tick.
    async fn execute(&self, ctx: &BotContext) -> Result<(), ExecuteError>;

    /// Runs exactly once on every exit path -- normal stop, error exit,
    /// and cancellation -- before the runtime releases its resources.
    /// Must not fail; best-effort work only.
    async fn cleanup(&self, ctx: &BotContext);
}
