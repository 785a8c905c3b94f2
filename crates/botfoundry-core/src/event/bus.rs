//! Publish/subscribe bus for factory events.
//!
//! Every subscriber gets its own bounded mpsc queue drained by a dedicated
//! worker task, so a slow subscriber never stalls the publisher or its
//! peers. Per-kind publish order is delivery order for each subscriber
//! (FIFO); there is no ordering guarantee across kinds or across
//! subscribers. Published events are retained in per-kind history so a
//! reconnecting bot can replay what it missed.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use botfoundry_types::event::{BusEvent, EventKind};

/// Shared error tally for a bot. The bus increments it when one of the
/// bot's subscriber callbacks fails; the bot runtime increments it on
/// execute failures and enforces the error threshold.
#[derive(Debug, Clone, Default)]
pub struct ErrorCounter(Arc<AtomicU32>);

impl ErrorCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment and return the new count.
    pub fn increment(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Subscriber callback. Errors are caught by the worker, logged, and
/// counted against the owning bot; they never reach the publisher.
pub type EventHandler =
    Arc<dyn Fn(BusEvent) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

struct Subscription {
    tx: mpsc::Sender<BusEvent>,
    worker: JoinHandle<()>,
}

/// In-process pub/sub bus with retained per-kind history.
pub struct EventBus {
    history: DashMap<EventKind, VecDeque<BusEvent>>,
    subscribers: DashMap<EventKind, HashMap<String, Subscription>>,
    queue_capacity: usize,
    history_cap: usize,
    cancel: CancellationToken,
}

impl EventBus {
    /// Create a bus with the given per-subscriber queue depth and
    /// per-kind history cap.
    pub fn new(queue_capacity: usize, history_cap: usize) -> Self {
        Self {
            history: DashMap::new(),
            subscribers: DashMap::new(),
            queue_capacity: queue_capacity.max(1),
            history_cap: history_cap.max(1),
            cancel: CancellationToken::new(),
        }
    }

    /// Publish an event: append it to history, then hand it to every
    /// current subscriber of its kind. Never blocks on subscribers. A
    /// subscriber whose queue is full loses this event (warn-logged);
    /// `history` replay is the recovery path.
    pub fn publish(&self, event: BusEvent) {
        let kind = event.kind;

        {
            let mut entry = self.history.entry(kind).or_default();
            entry.push_back(event.clone());
            while entry.len() > self.history_cap {
                entry.pop_front();
            }
        }

        let Some(subs) = self.subscribers.get(&kind) else {
            return;
        };
        for (subscriber_id, sub) in subs.iter() {
            match sub.tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(%kind, subscriber = %subscriber_id, "subscriber queue full, dropping event");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(%kind, subscriber = %subscriber_id, "subscriber queue closed");
                }
            }
        }
    }

    /// Register `handler` for `kind` under `subscriber_id`.
    ///
    /// Idempotent per `(kind, subscriber_id)`: re-registering is a no-op,
    /// so redelivered registration requests cannot duplicate a worker.
    /// Each registration spawns one worker that drains the subscriber's
    /// queue in FIFO order; a handler error is logged and charged to
    /// `errors`.
    pub fn subscribe(
        &self,
        kind: EventKind,
        subscriber_id: impl Into<String>,
        errors: ErrorCounter,
        handler: EventHandler,
    ) {
        let subscriber_id = subscriber_id.into();
        let mut subs = self.subscribers.entry(kind).or_default();
        if subs.contains_key(&subscriber_id) {
            debug!(%kind, subscriber = %subscriber_id, "already subscribed");
            return;
        }

        let (tx, mut rx) = mpsc::channel::<BusEvent>(self.queue_capacity);
        let cancel = self.cancel.child_token();
        let worker_id = subscriber_id.clone();
        let worker = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = rx.recv() => {
                        let Some(event) = received else { break };
                        let event_kind = event.kind;
                        if let Err(err) = (handler)(event).await {
                            let count = errors.increment();
                            warn!(
                                kind = %event_kind,
                                subscriber = %worker_id,
                                error_count = count,
                                "subscriber handler failed: {err:#}"
                            );
                        }
                    }
                }
            }
        });

        subs.insert(subscriber_id, Subscription { tx, worker });
    }

    /// Remove a subscription. The worker drains its queue and exits.
    pub fn unsubscribe(&self, kind: EventKind, subscriber_id: &str) {
        if let Some(mut subs) = self.subscribers.get_mut(&kind) {
            subs.remove(subscriber_id);
        }
    }

    /// Retained events of `kind` published strictly after `since`
    /// (all retained events when `since` is `None`), in publish order.
    pub fn history(&self, kind: EventKind, since: Option<DateTime<Utc>>) -> Vec<BusEvent> {
        let Some(entry) = self.history.get(&kind) else {
            return Vec::new();
        };
        entry
            .iter()
            .filter(|e| since.is_none_or(|t| e.published_at > t))
            .cloned()
            .collect()
    }

    /// Number of live subscriptions for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers.get(&kind).map_or(0, |s| s.len())
    }

    /// Cancel every worker task. Queued events are dropped.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        for mut entry in self.subscribers.iter_mut() {
            for (_, sub) in entry.drain() {
                sub.worker.abort();
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256, 4096)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("kinds_with_history", &self.history.len())
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::Mutex;

    fn sample_event(kind: EventKind) -> BusEvent {
        BusEvent::new(kind, None, serde_json::json!({"n": 1}))
    }

    fn collecting_handler(sink: Arc<Mutex<Vec<BusEvent>>>) -> EventHandler {
        Arc::new(move |event| {
            let sink = sink.clone();
            Box::pin(async move {
                sink.lock().await.push(event);
                Ok(())
            })
        })
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
    async fn publish_delivers_to_subscriber() {
        let bus = EventBus::new(16, 64);
        let sink = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(
            EventKind::BotStarted,
            "monitor",
            ErrorCounter::new(),
            collecting_handler(sink.clone()),
        );

        bus.publish(sample_event(EventKind::BotStarted));

        let sink2 = sink.clone();
        wait_for(|| sink2.try_lock().map(|s| s.len() == 1).unwrap_or(false)).await;
        assert_eq!(sink.lock().await[0].kind, EventKind::BotStarted);
    }

    #[tokio::test]
    async fn delivery_preserves_publish_order_per_kind() {
        let bus = EventBus::new(64, 256);
        let sink = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(
            EventKind::XpAwarded,
            "monitor",
            ErrorCounter::new(),
            collecting_handler(sink.clone()),
        );

        for n in 0..10 {
            bus.publish(BusEvent::new(
                EventKind::XpAwarded,
                None,
                serde_json::json!({"n": n}),
            ));
        }

        let sink2 = sink.clone();
        wait_for(|| sink2.try_lock().map(|s| s.len() == 10).unwrap_or(false)).await;
        let received = sink.lock().await;
        let order: Vec<i64> = received
            .iter()
            .map(|e| e.payload["n"].as_i64().unwrap())
            .collect();
        assert_eq!(order, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn subscriber_error_is_contained_and_counted() {
        let bus = EventBus::new(16, 64);
        let errors = ErrorCounter::new();
        let failing: EventHandler =
            Arc::new(|_event| Box::pin(async { Err(anyhow::anyhow!("handler exploded")) }));
        bus.subscribe(EventKind::BotErrored, "broken", errors.clone(), failing);

        let sink = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(
            EventKind::BotErrored,
            "healthy",
            ErrorCounter::new(),
            collecting_handler(sink.clone()),
        );

        bus.publish(sample_event(EventKind::BotErrored));
        bus.publish(sample_event(EventKind::BotErrored));

        // The healthy subscriber still receives everything.
        let sink2 = sink.clone();
        wait_for(|| sink2.try_lock().map(|s| s.len() == 2).unwrap_or(false)).await;
        let errors2 = errors.clone();
        wait_for(move || errors2.get() == 2).await;
    }

    #[tokio::test]
    async fn subscribe_is_idempotent() {
        let bus = EventBus::new(16, 64);
        let sink = Arc::new(Mutex::new(Vec::new()));
        let handler = collecting_handler(sink.clone());
        bus.subscribe(
            EventKind::BotStarted,
            "monitor",
            ErrorCounter::new(),
            handler.clone(),
        );
        bus.subscribe(EventKind::BotStarted, "monitor", ErrorCounter::new(), handler);
        assert_eq!(bus.subscriber_count(EventKind::BotStarted), 1);

        bus.publish(sample_event(EventKind::BotStarted));
        let sink2 = sink.clone();
        wait_for(|| sink2.try_lock().map(|s| s.len() == 1).unwrap_or(false)).await;
        // A moment later there is still exactly one delivery.
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(sink.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_is_retained_only() {
        let bus = EventBus::new(16, 64);
        bus.publish(sample_event(EventKind::DomainRegistered));
        assert_eq!(bus.history(EventKind::DomainRegistered, None).len(), 1);
    }

    #[tokio::test]
    async fn history_filters_by_since() {
        let bus = EventBus::new(16, 64);
        bus.publish(sample_event(EventKind::ReviewCreated));
        tokio::time::sleep(Duration::from_millis(10)).await;
        let cutoff = Utc::now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        bus.publish(sample_event(EventKind::ReviewCreated));

        assert_eq!(bus.history(EventKind::ReviewCreated, None).len(), 2);
        assert_eq!(bus.history(EventKind::ReviewCreated, Some(cutoff)).len(), 1);
    }

    #[tokio::test]
    async fn history_is_capped() {
        let bus = EventBus::new(16, 3);
        for n in 0..5 {
            bus.publish(BusEvent::new(
                EventKind::XpAwarded,
                None,
                serde_json::json!({"n": n}),
            ));
        }
        let retained = bus.history(EventKind::XpAwarded, None);
        assert_eq!(retained.len(), 3);
        // Oldest entries were evicted first.
        assert_eq!(retained[0].payload["n"], 2);
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking_publisher() {
        let bus = EventBus::new(1, 64);
        // A handler that never finishes keeps the queue occupied.
        let stuck: EventHandler = Arc::new(|_event| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            })
        });
        bus.subscribe(EventKind::BotStopped, "slow", ErrorCounter::new(), stuck);

        // Publishes return immediately even though the subscriber is stuck.
        for _ in 0..20 {
            bus.publish(sample_event(EventKind::BotStopped));
        }
        assert_eq!(bus.history(EventKind::BotStopped, None).len(), 20);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = EventBus::new(16, 64);
        let sink = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(
            EventKind::BotStarted,
            "monitor",
            ErrorCounter::new(),
            collecting_handler(sink.clone()),
        );
        bus.unsubscribe(EventKind::BotStarted, "monitor");
        assert_eq!(bus.subscriber_count(EventKind::BotStarted), 0);

        bus.publish(sample_event(EventKind::BotStarted));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(sink.lock().await.is_empty());
    }
}
