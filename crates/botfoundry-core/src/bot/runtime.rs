//! Per-bot runtime: the lifecycle state machine and poll loop.
//!
//! One `BotRuntime` owns one spawned task. The start sequence is
//! Initializing -> `initialize()` -> Running -> poll loop; shutdown is
//! cancellation -> `cleanup()` -> Stopped. `cleanup()` runs on every exit
//! path, including error exits. Non-fatal execute errors are counted and
//! tolerated until the configured threshold tips the bot into Error.

use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use botfoundry_types::bot::{BotHealth, BotId, BotStatus};
use botfoundry_types::config::BotEntry;
use botfoundry_types::event::{BusEvent, EventKind};

use crate::event::{ErrorCounter, EventBus};
use crate::state::StateStore;

use super::behavior::{BotBehavior, BotContext, ExecuteError};

struct Shared {
    bot_id: BotId,
    entry: BotEntry,
    status: RwLock<BotStatus>,
    errors: ErrorCounter,
    started_at: RwLock<Option<Instant>>,
    last_heartbeat: RwLock<Option<DateTime<Utc>>>,
    bus: Arc<EventBus>,
}

impl Shared {
    fn status(&self) -> BotStatus {
        *self.status.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply a validated transition and publish the matching lifecycle
    /// event. Returns false (and logs) when the transition is illegal.
    fn transition(&self, next: BotStatus) -> bool {
        let mut status = self.status.write().unwrap_or_else(|e| e.into_inner());
        if !status.can_transition_to(next) {
            warn!(bot_id = %self.bot_id, from = %*status, to = %next, "illegal bot transition ignored");
            return false;
        }
        let previous = *status;
        *status = next;
        drop(status);

        let kind = match (previous, next) {
            (_, BotStatus::Error) => EventKind::BotErrored,
            (BotStatus::Paused, BotStatus::Running) => EventKind::BotResumed,
            (_, BotStatus::Running) => EventKind::BotStarted,
            (_, BotStatus::Paused) => EventKind::BotPaused,
            (_, BotStatus::Stopped) => EventKind::BotStopped,
            _ => return true,
        };
        self.bus.publish(BusEvent::new(
            kind,
            Some(self.bot_id),
            serde_json::json!({
                "bot_id": self.entry.bot_id,
                "kind": self.entry.kind,
                "from": previous,
                "to": next,
            }),
        ));
        true
    }
}

/// Handle to one running bot instance.
pub struct BotRuntime {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BotRuntime {
    /// Spawn a bot with the poll interval taken from its config entry.
    pub fn spawn(
        entry: BotEntry,
        behavior: Arc<dyn BotBehavior>,
        state: Arc<dyn StateStore>,
        bus: Arc<EventBus>,
    ) -> Self {
        let interval = Duration::from_secs(entry.poll_interval_seconds.max(1));
        Self::spawn_with_interval(entry, interval, behavior, state, bus)
    }

    /// Spawn with an explicit tick interval (tests use millisecond ticks).
    pub fn spawn_with_interval(
        entry: BotEntry,
        poll_interval: Duration,
        behavior: Arc<dyn BotBehavior>,
        state: Arc<dyn StateStore>,
        bus: Arc<EventBus>,
    ) -> Self {
        // Stable id per config entry, so a restart resumes the same state.
        let bot_id = BotId::from_name(&entry.bot_id);
        let errors = ErrorCounter::new();
        let cancel = CancellationToken::new();
        let shared = Arc::new(Shared {
            bot_id,
            entry: entry.clone(),
            status: RwLock::new(BotStatus::Initializing),
            errors: errors.clone(),
            started_at: RwLock::new(None),
            last_heartbeat: RwLock::new(None),
            bus: bus.clone(),
        });

        let ctx = BotContext {
            bot_id,
            entry,
            state,
            bus,
            errors,
            cancel: cancel.child_token(),
        };

        let task = tokio::spawn(run_loop(
            shared.clone(),
            behavior,
            ctx,
            poll_interval,
            cancel.clone(),
        ));

        Self {
            shared,
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn bot_id(&self) -> BotId {
        self.shared.bot_id
    }

    pub fn status(&self) -> BotStatus {
        self.shared.status()
    }

    /// `{status, uptime, error_count, last_heartbeat}` snapshot.
    pub fn health_check(&self) -> BotHealth {
        let started = *self
            .shared
            .started_at
            .read()
            .unwrap_or_else(|e| e.into_inner());
        BotHealth {
            bot_id: self.shared.bot_id,
            kind: self.shared.entry.kind,
            status: self.shared.status(),
            uptime_secs: started.map_or(0, |t| t.elapsed().as_secs()),
            error_count: self.shared.errors.get(),
            last_heartbeat: *self
                .shared
                .last_heartbeat
                .read()
                .unwrap_or_else(|e| e.into_inner()),
        }
    }

    /// Running -> Paused. The loop keeps ticking but skips `execute`.
    pub fn pause(&self) -> bool {
        self.shared.transition(BotStatus::Paused)
    }

    /// Paused -> Running.
    pub fn resume(&self) -> bool {
        self.shared.transition(BotStatus::Running)
    }

    /// Signal shutdown. The loop exits at the next suspension point,
    /// runs `cleanup()`, and transitions to Stopped.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Wait for the bot task to finish, aborting it after `timeout` so an
    /// outstanding external call can never block shutdown indefinitely.
    pub async fn join(&self, timeout: Duration) {
        let handle = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(handle) = handle else { return };
        if tokio::time::timeout(timeout, handle).await.is_err() {
            warn!(bot_id = %self.shared.bot_id, "bot did not stop in time, abandoning task");
        }
    }

    /// Whether the instance still occupies its bot id slot.
    pub fn is_active(&self) -> bool {
        !self.shared.status().is_terminal()
    }
}

async fn run_loop(
    shared: Arc<Shared>,
    behavior: Arc<dyn BotBehavior>,
    ctx: BotContext,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    let bot_label = shared.entry.bot_id.clone();

    // Initialization must complete before the bot may run.
    match behavior.initialize(&ctx).await {
        Ok(()) => {
            *shared
                .started_at
                .write()
                .unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
            shared.transition(BotStatus::Running);
            info!(bot = %bot_label, "bot running");
        }
        Err(err) => {
            error!(bot = %bot_label, "bot initialization failed: {err}");
            shared.transition(BotStatus::Error);
            behavior.cleanup(&ctx).await;
            return;
        }
    }

    let threshold = shared.entry.error_threshold.max(1);
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(bot = %bot_label, "bot cancelled");
                break;
            }
            _ = ticker.tick() => {
                if shared.status() != BotStatus::Running {
                    continue;
                }
                *shared
                    .last_heartbeat
                    .write()
                    .unwrap_or_else(|e| e.into_inner()) = Some(Utc::now());

                match behavior.execute(&ctx).await {
                    Ok(()) => {}
                    Err(ExecuteError::Recoverable(err)) => {
                        let count = shared.errors.increment();
                        warn!(bot = %bot_label, error_count = count, "execute failed: {err:#}");
                        if count >= threshold {
                            error!(bot = %bot_label, threshold, "error threshold crossed");
                            shared.transition(BotStatus::Error);
                            break;
                        }
                    }
                    Err(ExecuteError::Fatal(msg)) => {
                        error!(bot = %bot_label, "fatal execute error: {msg}");
                        shared.transition(BotStatus::Error);
                        break;
                    }
                }
            }
        }
    }

    // Cleanup runs on every exit path before resources are released.
    behavior.cleanup(&ctx).await;
    if shared.status() != BotStatus::Error {
        shared.transition(BotStatus::Stopped);
    }
    info!(bot = %bot_label, status = %shared.status(), "bot exited");
}
