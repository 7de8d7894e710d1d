//! Per-project event bus built on tokio broadcast channels

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use scribe_core::ProjectStatus;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::record::{ExecutionRecord, DEFAULT_LOG_LIMIT};
use crate::types::{Event, EventEnvelope};

/// Capacity for each project's broadcast channel
const DEFAULT_CAPACITY: usize = 1000;
/// Events kept per project for late subscribers
const DEFAULT_HISTORY_LIMIT: usize = 1000;

#[derive(Debug, Clone, Copy)]
pub struct BusConfig {
    /// Buffered events per subscriber before the oldest are dropped
    pub channel_capacity: usize,
    /// Replay history kept per project
    pub history_limit: usize,
    /// Log entries kept in the execution record
    pub log_limit: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CAPACITY,
            history_limit: DEFAULT_HISTORY_LIMIT,
            log_limit: DEFAULT_LOG_LIMIT,
        }
    }
}

struct ChannelState {
    next_sequence: u64,
    history: VecDeque<EventEnvelope>,
    record: Option<ExecutionRecord>,
}

struct ProjectChannel {
    sender: broadcast::Sender<EventEnvelope>,
    state: Mutex<ChannelState>,
}

impl ProjectChannel {
    fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            state: Mutex::new(ChannelState {
                next_sequence: 1,
                history: VecDeque::new(),
                record: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Event bus for publishing and subscribing to per-project events
///
/// Publishing never waits on subscribers: a receiver that falls more than
/// `channel_capacity` events behind loses the oldest ones and observes
/// `RecvError::Lagged`.
#[derive(Clone)]
pub struct EventBus {
    channels: Arc<RwLock<HashMap<Uuid, Arc<ProjectChannel>>>>,
    config: BusConfig,
    /// Number of events published (for monitoring)
    event_count: Arc<AtomicUsize>,
}

impl EventBus {
    /// Create a new event bus with default limits
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    pub fn with_config(config: BusConfig) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            config,
            event_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn config(&self) -> BusConfig {
        self.config
    }

    fn channel(&self, project_id: Uuid) -> Arc<ProjectChannel> {
        {
            let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(channel) = channels.get(&project_id) {
                return Arc::clone(channel);
            }
        }

        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            channels
                .entry(project_id)
                .or_insert_with(|| Arc::new(ProjectChannel::new(self.config.channel_capacity))),
        )
    }

    fn existing(&self, project_id: Uuid) -> Option<Arc<ProjectChannel>> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&project_id)
            .cloned()
    }

    /// Publish an event to every subscriber of the project
    ///
    /// Non-heartbeat events get the next sequence number, are folded into
    /// the execution record and appended to the replay history before they
    /// are sent, all under the channel lock, so every subscriber sees the
    /// same order.
    pub fn publish(&self, project_id: Uuid, event: Event) -> EventEnvelope {
        let channel = self.channel(project_id);
        let mut state = channel.state();

        if event.is_heartbeat() {
            let envelope = EventEnvelope::heartbeat(project_id);
            let _ = channel.sender.send(envelope.clone());
            return envelope;
        }

        let envelope = EventEnvelope::new(project_id, state.next_sequence, event);
        state.next_sequence += 1;

        if let Some(record) = state.record.as_mut() {
            record.apply(&envelope, self.config.log_limit);
        }
        state.history.push_back(envelope.clone());
        while state.history.len() > self.config.history_limit {
            state.history.pop_front();
        }

        self.event_count.fetch_add(1, Ordering::Relaxed);
        // no receivers is fine: the event stays in history
        let _ = channel.sender.send(envelope.clone());
        envelope
    }

    /// Subscribe to events published after this call
    pub fn subscribe(&self, project_id: Uuid) -> broadcast::Receiver<EventEnvelope> {
        self.channel(project_id).sender.subscribe()
    }

    /// Recorded history plus a receiver for everything after it.
    ///
    /// Both are taken under the channel lock, so nothing is missed or
    /// delivered twice between the two.
    pub fn history_plus_stream(
        &self,
        project_id: Uuid,
    ) -> (Vec<EventEnvelope>, broadcast::Receiver<EventEnvelope>) {
        let channel = self.channel(project_id);
        let state = channel.state();
        let history = state.history.iter().cloned().collect();
        let receiver = channel.sender.subscribe();
        (history, receiver)
    }

    pub fn history(&self, project_id: Uuid) -> Vec<EventEnvelope> {
        self.existing(project_id)
            .map(|channel| channel.state().history.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Latest execution record of the project, if a run was ever started
    pub fn snapshot(&self, project_id: Uuid) -> Option<ExecutionRecord> {
        self.existing(project_id)
            .and_then(|channel| channel.state().record.clone())
    }

    /// Start a fresh record and history for a new run.
    ///
    /// Sequence numbers keep counting so live subscribers stay ordered.
    pub fn begin_run(&self, project_id: Uuid, run_id: Uuid, status: ProjectStatus) {
        let channel = self.channel(project_id);
        let mut state = channel.state();
        state.history.clear();
        state.record = Some(ExecutionRecord::new(project_id, run_id, status));
    }

    /// Drop everything held for a project
    pub fn remove(&self, project_id: Uuid) {
        self.channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&project_id);
    }

    /// Get the number of current subscribers of a project
    pub fn subscriber_count(&self, project_id: Uuid) -> usize {
        self.existing(project_id)
            .map(|channel| channel.sender.receiver_count())
            .unwrap_or(0)
    }

    /// Get the total number of events published
    pub fn event_count(&self) -> usize {
        self.event_count.load(Ordering::Relaxed)
    }

    pub fn project_count(&self) -> usize {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("projects", &self.project_count())
            .field("event_count", &self.event_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_core::LogEntry;
    use tokio::sync::broadcast::error::RecvError;

    fn log(message: &str) -> Event {
        Event::AgentLog {
            entry: LogEntry::info("Research", message),
        }
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new();
        let project_id = Uuid::new_v4();
        let mut rx = bus.subscribe(project_id);

        let sent = bus.publish(project_id, log("hello"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, sent.id);
        assert_eq!(received.sequence, 1);
    }

    #[tokio::test]
    async fn test_multiple_subscribers_see_same_order() {
        let bus = EventBus::new();
        let project_id = Uuid::new_v4();
        let mut rx1 = bus.subscribe(project_id);
        let mut rx2 = bus.subscribe(project_id);

        for i in 0..10 {
            bus.publish(project_id, log(&format!("event {}", i)));
            if i % 3 == 0 {
                bus.publish(project_id, Event::Heartbeat);
            }
        }

        let mut first = Vec::new();
        let mut second = Vec::new();
        for _ in 0..14 {
            first.push(rx1.recv().await.unwrap());
            second.push(rx2.recv().await.unwrap());
        }

        let ids1: Vec<Uuid> = first.iter().map(|e| e.id).collect();
        let ids2: Vec<Uuid> = second.iter().map(|e| e.id).collect();
        assert_eq!(ids1, ids2);

        let sequences: Vec<u64> = first
            .iter()
            .filter(|e| !e.event.is_heartbeat())
            .map(|e| e.sequence)
            .collect();
        assert_eq!(sequences, (1..=10).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_projects_are_isolated() {
        let bus = EventBus::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut rx_b = bus.subscribe(b);

        bus.publish(a, log("for a"));
        bus.publish(b, log("for b"));

        let received = rx_b.recv().await.unwrap();
        assert_eq!(received.project_id, b);
        assert_eq!(received.sequence, 1);
    }

    #[tokio::test]
    async fn test_no_subscribers_keeps_history() {
        let bus = EventBus::new();
        let project_id = Uuid::new_v4();

        bus.publish(project_id, log("one"));
        bus.publish(project_id, Event::Heartbeat);
        bus.publish(project_id, log("two"));

        let history = bus.history(project_id);
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|e| !e.event.is_heartbeat()));
        assert_eq!(bus.event_count(), 2);
    }

    #[tokio::test]
    async fn test_slow_subscriber_drops_oldest() {
        let bus = EventBus::with_config(BusConfig {
            channel_capacity: 4,
            ..Default::default()
        });
        let project_id = Uuid::new_v4();
        let mut rx = bus.subscribe(project_id);

        for i in 0..10 {
            bus.publish(project_id, log(&format!("event {}", i)));
        }

        match rx.recv().await {
            Err(RecvError::Lagged(missed)) => assert_eq!(missed, 6),
            other => panic!("expected lag, got {:?}", other),
        }
        let next = rx.recv().await.unwrap();
        assert_eq!(next.sequence, 7);
    }

    #[tokio::test]
    async fn test_snapshot_reflects_latest_event() {
        let bus = EventBus::new();
        let project_id = Uuid::new_v4();
        let run_id = Uuid::new_v4();

        assert!(bus.snapshot(project_id).is_none());

        bus.begin_run(project_id, run_id, ProjectStatus::PlanApproved);
        bus.publish(
            project_id,
            Event::StatusChanged {
                from: ProjectStatus::PlanApproved,
                to: ProjectStatus::Researching,
            },
        );
        bus.publish(
            project_id,
            Event::Progress {
                run_id,
                percent: 30,
                stage: Some("Research".to_string()),
            },
        );

        let snapshot = bus.snapshot(project_id).unwrap();
        assert_eq!(snapshot.run_id, run_id);
        assert_eq!(snapshot.status, ProjectStatus::Researching);
        assert_eq!(snapshot.progress_percent, 30);
        assert_eq!(snapshot.last_sequence, 2);
    }

    #[tokio::test]
    async fn test_begin_run_resets_record_and_history() {
        let bus = EventBus::new();
        let project_id = Uuid::new_v4();

        let first_run = Uuid::new_v4();
        bus.begin_run(project_id, first_run, ProjectStatus::PlanApproved);
        bus.publish(
            project_id,
            Event::Progress {
                run_id: first_run,
                percent: 80,
                stage: None,
            },
        );

        let second_run = Uuid::new_v4();
        bus.begin_run(project_id, second_run, ProjectStatus::Researching);
        let snapshot = bus.snapshot(project_id).unwrap();

        assert_eq!(snapshot.run_id, second_run);
        assert_eq!(snapshot.progress_percent, 0);
        assert!(bus.history(project_id).is_empty());

        let next = bus.publish(project_id, log("after restart"));
        assert_eq!(next.sequence, 2);

        bus.publish(
            project_id,
            Event::Progress {
                run_id: first_run,
                percent: 90,
                stage: None,
            },
        );
        assert_eq!(bus.snapshot(project_id).unwrap().progress_percent, 0);
    }

    #[tokio::test]
    async fn test_history_plus_stream_has_no_gap() {
        let bus = EventBus::new();
        let project_id = Uuid::new_v4();

        bus.publish(project_id, log("before 1"));
        bus.publish(project_id, log("before 2"));
        let (history, mut rx) = bus.history_plus_stream(project_id);
        bus.publish(project_id, log("after"));

        assert_eq!(history.len(), 2);
        let live = rx.recv().await.unwrap();
        assert_eq!(live.sequence, history[1].sequence + 1);
    }

    #[test]
    fn test_clone_shares_channels() {
        let bus1 = EventBus::new();
        let bus2 = bus1.clone();
        let project_id = Uuid::new_v4();

        let _rx = bus2.subscribe(project_id);
        assert_eq!(bus1.subscriber_count(project_id), 1);
        assert_eq!(bus2.subscriber_count(project_id), 1);
    }
}
