//! Bot orchestrator: one runtime per config entry, one active instance
//! per bot id.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::info;

use botfoundry_types::bot::{BotHealth, BotId, BotStatus};
use botfoundry_types::config::BotEntry;
use botfoundry_types::error::BotError;

use crate::event::EventBus;
use crate::state::StateStore;

use super::behavior::BotBehavior;
use super::runtime::BotRuntime;

/// How long `stop`/`shutdown` wait for a bot task before abandoning it.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

struct Instance {
    entry: BotEntry,
    behavior: Arc<dyn BotBehavior>,
    runtime: Arc<BotRuntime>,
}

/// Manages the fleet: spawning, pausing, stopping, manual error resets,
/// and health aggregation. Enforces at most one active instance per
/// configured bot id.
pub struct BotOrchestrator {
    bus: Arc<EventBus>,
    state: Arc<dyn StateStore>,
    instances: DashMap<String, Instance>,
}

impl BotOrchestrator {
    pub fn new(bus: Arc<EventBus>, state: Arc<dyn StateStore>) -> Self {
        Self {
            bus,
            state,
            instances: DashMap::new(),
        }
    }

    /// Spawn a bot for `entry`. Fails with `AlreadyRunning` while a
    /// non-terminal instance holds the id; a stopped or errored instance
    /// is replaced.
    pub fn start_bot(
        &self,
        entry: BotEntry,
        behavior: Arc<dyn BotBehavior>,
    ) -> Result<BotId, BotError> {
        let key = entry.bot_id.clone();
        if let Some(existing) = self.instances.get(&key) {
            if existing.runtime.is_active() {
                return Err(BotError::AlreadyRunning(key));
            }
        }

        let runtime = Arc::new(BotRuntime::spawn(
            entry.clone(),
            behavior.clone(),
            self.state.clone(),
            self.bus.clone(),
        ));
        let bot_id = runtime.bot_id();
        info!(bot = %key, kind = %entry.kind, "bot instance started");
        self.instances.insert(
            key,
            Instance {
                entry,
                behavior,
                runtime,
            },
        );
        Ok(bot_id)
    }

    /// Signal shutdown and wait (bounded) for the task to exit.
    pub async fn stop_bot(&self, bot_id: &str) -> Result<(), BotError> {
        let runtime = self.runtime(bot_id)?;
        runtime.shutdown();
        runtime.join(STOP_TIMEOUT).await;
        Ok(())
    }

    pub fn pause_bot(&self, bot_id: &str) -> Result<(), BotError> {
        let runtime = self.runtime(bot_id)?;
        if runtime.pause() {
            Ok(())
        } else {
            Err(BotError::InvalidTransition {
                from: runtime.status().to_string(),
                to: BotStatus::Paused.to_string(),
            })
        }
    }

    pub fn resume_bot(&self, bot_id: &str) -> Result<(), BotError> {
        let runtime = self.runtime(bot_id)?;
        if runtime.resume() {
            Ok(())
        } else {
            Err(BotError::InvalidTransition {
                from: runtime.status().to_string(),
                to: BotStatus::Running.to_string(),
            })
        }
    }

    /// Manual reset: the only way out of Error. Respawns the instance
    /// from its stored config entry and behavior.
    pub async fn reset_bot(&self, bot_id: &str) -> Result<BotId, BotError> {
        // Snapshot under the map guard, then await with the guard released.
        let (entry, behavior, runtime) = {
            let instance = self
                .instances
                .get(bot_id)
                .ok_or_else(|| BotError::NotFound(bot_id.to_string()))?;
            if instance.runtime.status() != BotStatus::Error {
                return Err(BotError::InvalidTransition {
                    from: instance.runtime.status().to_string(),
                    to: BotStatus::Initializing.to_string(),
                });
            }
            (
                instance.entry.clone(),
                instance.behavior.clone(),
                instance.runtime.clone(),
            )
        };
        runtime.join(STOP_TIMEOUT).await;
        self.instances.remove(bot_id);
        info!(bot = %bot_id, "manual reset, respawning");
        self.start_bot(entry, behavior)
    }

    pub fn health_check(&self, bot_id: &str) -> Result<BotHealth, BotError> {
        Ok(self.runtime(bot_id)?.health_check())
    }

    pub fn health_all(&self) -> Vec<BotHealth> {
        self.instances
            .iter()
            .map(|i| i.runtime.health_check())
            .collect()
    }

    /// Stop every bot. Bounded per bot; an instance stuck in an external
    /// call is abandoned rather than blocking shutdown.
    pub async fn shutdown(&self) {
        let runtimes: Vec<Arc<BotRuntime>> = self
            .instances
            .iter()
            .map(|i| i.runtime.clone())
            .collect();
        for runtime in &runtimes {
            runtime.shutdown();
        }
        for runtime in &runtimes {
            runtime.join(STOP_TIMEOUT).await;
        }
        self.bus.shutdown();
    }

    fn runtime(&self, bot_id: &str) -> Result<Arc<BotRuntime>, BotError> {
        self.instances
            .get(bot_id)
            .map(|i| i.runtime.clone())
            .ok_or_else(|| BotError::NotFound(bot_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use botfoundry_types::bot::BotKind;
    use botfoundry_types::review::ApprovalPolicy;

    use crate::bot::behavior::{BotContext, ExecuteError};
    use crate::state::MemoryStateStore;

    struct Idle;

    #[async_trait]
    impl BotBehavior for Idle {
        async fn initialize(&self, _ctx: &BotContext) -> Result<(), BotError> {
            Ok(())
        }
        async fn execute(&self, _ctx: &BotContext) -> Result<(), ExecuteError> {
            Ok(())
        }
        async fn cleanup(&self, _ctx: &BotContext) {}
    }

    fn entry(id: &str) -> BotEntry {
        BotEntry {
            bot_id: id.to_string(),
            kind: BotKind::Monitor,
            poll_interval_seconds: 1,
            error_threshold: 5,
            auto_approve_confidence_threshold: 0.85,
            reviewers: vec![],
            approval_policy: ApprovalPolicy::Unanimous,
        }
    }

    fn orchestrator() -> BotOrchestrator {
        BotOrchestrator::new(
            Arc::new(EventBus::new(16, 64)),
            Arc::new(MemoryStateStore::new()),
        )
    }

    async fn wait_running(orch: &BotOrchestrator, id: &str) {
        for _ in 0..200 {
            if orch
                .health_check(id)
                .map(|h| h.status == BotStatus::Running)
                .unwrap_or(false)
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("bot '{id}' never reached Running");
    }

    #[tokio::test]
    async fn duplicate_start_is_rejected() {
        let orch = orchestrator();
        orch.start_bot(entry("mon-1"), Arc::new(Idle)).unwrap();
        wait_running(&orch, "mon-1").await;

        let err = orch.start_bot(entry("mon-1"), Arc::new(Idle)).unwrap_err();
        assert!(matches!(err, BotError::AlreadyRunning(id) if id == "mon-1"));

        orch.shutdown().await;
    }

    #[tokio::test]
    async fn stopped_id_can_be_restarted() {
        let orch = orchestrator();
        orch.start_bot(entry("mon-1"), Arc::new(Idle)).unwrap();
        wait_running(&orch, "mon-1").await;
        orch.stop_bot("mon-1").await.unwrap();

        orch.start_bot(entry("mon-1"), Arc::new(Idle)).unwrap();
        wait_running(&orch, "mon-1").await;
        orch.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_bot_is_not_found() {
        let orch = orchestrator();
        assert!(matches!(
            orch.health_check("ghost"),
            Err(BotError::NotFound(_))
        ));
        assert!(matches!(
            orch.stop_bot("ghost").await,
            Err(BotError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn reset_requires_error_state() {
        let orch = orchestrator();
        orch.start_bot(entry("mon-1"), Arc::new(Idle)).unwrap();
        wait_running(&orch, "mon-1").await;

        let err = orch.reset_bot("mon-1").await.unwrap_err();
        assert!(matches!(err, BotError::InvalidTransition { .. }));
        orch.shutdown().await;
    }

    #[tokio::test]
    async fn reset_respawns_errored_bot() {
        struct FailInit;

        #[async_trait]
        impl BotBehavior for FailInit {
            async fn initialize(&self, _ctx: &BotContext) -> Result<(), BotError> {
                Err(BotError::InitFailed("no database".into()))
            }
            async fn execute(&self, _ctx: &BotContext) -> Result<(), ExecuteError> {
                Ok(())
            }
            async fn cleanup(&self, _ctx: &BotContext) {}
        }

        let orch = orchestrator();
        orch.start_bot(entry("mon-1"), Arc::new(FailInit)).unwrap();
        for _ in 0..200 {
            if orch.health_check("mon-1").unwrap().status == BotStatus::Error {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(orch.health_check("mon-1").unwrap().status, BotStatus::Error);

        // Reset replaces the instance; it fails init again but the slot
        // was legally respawned.
        orch.reset_bot("mon-1").await.unwrap();
        orch.shutdown().await;
    }

    #[tokio::test]
    async fn health_all_covers_every_instance() {
        let orch = orchestrator();
        orch.start_bot(entry("mon-1"), Arc::new(Idle)).unwrap();
        orch.start_bot(entry("mon-2"), Arc::new(Idle)).unwrap();
        wait_running(&orch, "mon-1").await;
        wait_running(&orch, "mon-2").await;

        let healths = orch.health_all();
        assert_eq!(healths.len(), 2);
        orch.shutdown().await;
    }
}
