//! Monitor bot: tallies factory events into persisted state.
//!
//! Subscribes to a set of event kinds, keeps running counts, and
//! checkpoints them through the state store each tick. On restart it
//! replays bus history published after its last checkpoint, so redelivered
//! and missed events converge on the same tally.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use botfoundry_types::error::BotError;
use botfoundry_types::event::EventKind;

use crate::event::EventHandler;

use super::behavior::{BotBehavior, BotContext, ExecuteError};

const WATCHED: [EventKind; 6] = [
    EventKind::DomainRegistered,
    EventKind::IntegrationRequested,
    EventKind::IntegrationApproved,
    EventKind::IntegrationRejected,
    EventKind::AnalysisFailed,
    EventKind::XpAwarded,
];

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct MonitorState {
    counts: BTreeMap<String, u64>,
    last_checkpoint: Option<DateTime<Utc>>,
}

/// Event-tally bot. Pure observer: it never mutates governance state.
#[derive(Default)]
pub struct MonitorBot {
    state: Arc<Mutex<MonitorState>>,
}

impl MonitorBot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current tally for one event kind (tests and health tooling).
    pub fn count(&self, kind: EventKind) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .counts
            .get(&kind.to_string())
            .copied()
            .unwrap_or(0)
    }

    fn bump(state: &Arc<Mutex<MonitorState>>, kind: EventKind) {
        let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
        *guard.counts.entry(kind.to_string()).or_insert(0) += 1;
    }
}

#[async_trait]
impl BotBehavior for MonitorBot {
    async fn initialize(&self, ctx: &BotContext) -> Result<(), BotError> {
        // Resume the tally from the last checkpoint; replay what the bus
        // retained since then. Replay only mutates the in-memory tally,
        // so it cannot double-apply persisted work.
        let restored = ctx
            .state
            .load(ctx.bot_id)
            .await
            .map_err(|e| BotError::InitFailed(e.to_string()))?;
        let since = if let Some(record) = restored {
            let parsed: MonitorState = serde_json::from_value(record.payload)
                .map_err(|e| BotError::InitFailed(format!("corrupt monitor state: {e}")))?;
            let since = parsed.last_checkpoint;
            *self.state.lock().unwrap_or_else(|e| e.into_inner()) = parsed;
            since
        } else {
            None
        };

        for kind in WATCHED {
            for _missed in ctx.bus.history(kind, since) {
                Self::bump(&self.state, kind);
            }
            let state = self.state.clone();
            let handler: EventHandler = Arc::new(move |event| {
                let state = state.clone();
                Box::pin(async move {
                    Self::bump(&state, event.kind);
                    Ok(())
                })
            });
            ctx.bus
                .subscribe(kind, ctx.entry.bot_id.clone(), ctx.errors.clone(), handler);
        }
        Ok(())
    }

    async fn execute(&self, ctx: &BotContext) -> Result<(), ExecuteError> {
        let snapshot = {
            let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
            guard.last_checkpoint = Some(Utc::now());
            guard.clone()
        };
        let payload = serde_json::to_value(&snapshot)
            .map_err(|e| ExecuteError::Recoverable(anyhow::anyhow!(e)))?;
        ctx.state
            .save(ctx.bot_id, payload)
            .await
            .map_err(|e| ExecuteError::Recoverable(anyhow::anyhow!(e)))?;
        debug!(bot = %ctx.entry.bot_id, "monitor checkpoint saved");
        Ok(())
    }

    async fn cleanup(&self, ctx: &BotContext) {
        for kind in WATCHED {
            ctx.bus.unsubscribe(kind, &ctx.entry.bot_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use botfoundry_types::bot::{BotId, BotKind};
    use botfoundry_types::config::BotEntry;
    use botfoundry_types::event::BusEvent;
    use botfoundry_types::review::ApprovalPolicy;
    use tokio_util::sync::CancellationToken;

    use crate::event::{ErrorCounter, EventBus};
    use crate::state::{MemoryStateStore, StateStore};

    fn ctx(bus: Arc<EventBus>, state: Arc<MemoryStateStore>) -> BotContext {
        let entry = BotEntry {
            bot_id: "monitor-1".to_string(),
            kind: BotKind::Monitor,
            poll_interval_seconds: 1,
            error_threshold: 5,
            auto_approve_confidence_threshold: 0.85,
            reviewers: vec![],
            approval_policy: ApprovalPolicy::Unanimous,
        };
        BotContext {
            bot_id: BotId::from_name(&entry.bot_id),
            entry,
            state,
            bus,
            errors: ErrorCounter::new(),
            cancel: CancellationToken::new(),
        }
    }

    fn event(kind: EventKind) -> BusEvent {
        BusEvent::new(kind, None, serde_json::Value::Null)
    }

    async fn wait_for<F: Fn() -> bool>(cond: F) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached within 1s");
    }

    #[tokio::test]
    async fn tallies_subscribed_events() {
        let bus = Arc::new(EventBus::new(16, 64));
        let state = Arc::new(MemoryStateStore::new());
        let monitor = Arc::new(MonitorBot::new());
        let ctx = ctx(bus.clone(), state);

        monitor.initialize(&ctx).await.unwrap();
        bus.publish(event(EventKind::DomainRegistered));
        bus.publish(event(EventKind::IntegrationApproved));
        bus.publish(event(EventKind::IntegrationApproved));

        let m = monitor.clone();
        wait_for(move || m.count(EventKind::IntegrationApproved) == 2).await;
        assert_eq!(monitor.count(EventKind::DomainRegistered), 1);
        monitor.cleanup(&ctx).await;
    }

    #[tokio::test]
    async fn replays_history_missed_before_subscription() {
        let bus = Arc::new(EventBus::new(16, 64));
        let state = Arc::new(MemoryStateStore::new());

        // Events land before the monitor exists.
        bus.publish(event(EventKind::IntegrationRequested));
        bus.publish(event(EventKind::IntegrationRequested));

        let monitor = MonitorBot::new();
        let ctx = ctx(bus.clone(), state);
        monitor.initialize(&ctx).await.unwrap();

        assert_eq!(monitor.count(EventKind::IntegrationRequested), 2);
        monitor.cleanup(&ctx).await;
    }

    #[tokio::test]
    async fn checkpoint_roundtrips_through_state_store() {
        let bus = Arc::new(EventBus::new(16, 64));
        let state = Arc::new(MemoryStateStore::new());
        let monitor = Arc::new(MonitorBot::new());
        let ctx = ctx(bus.clone(), state.clone());

        monitor.initialize(&ctx).await.unwrap();
        bus.publish(event(EventKind::XpAwarded));
        let m = monitor.clone();
        wait_for(move || m.count(EventKind::XpAwarded) == 1).await;

        monitor.execute(&ctx).await.unwrap();
        monitor.cleanup(&ctx).await;

        // A successor instance resumes the tally without replaying the
        // already-checkpointed event.
        let successor = MonitorBot::new();
        successor.initialize(&ctx).await.unwrap();
        assert_eq!(successor.count(EventKind::XpAwarded), 1);

        let record = state.load(ctx.bot_id).await.unwrap().unwrap();
        assert_eq!(record.payload["counts"]["xp_awarded"], 1);
        successor.cleanup(&ctx).await;
    }
}
