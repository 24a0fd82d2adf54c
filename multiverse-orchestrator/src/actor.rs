use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use multiverse_proto::{
    Command, ControlTickRecord, EventEnvelope, EventKind, ProtocolError, UniverseState,
    UnstampedEnvelope,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::config::OrchestratorConfig;
use crate::eventlog::EventLog;
use crate::ingress::{ActorMessage, CommandOutcome, OrchestratorHandle, SubscriberId};
use crate::metrics::OrchestratorMetrics;
use crate::registry::Registry;

fn now_ts() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

struct PendingPublish {
    source_game_id: String,
    target_game_id: Option<String>,
    event_type_detail: String,
    data: Value,
}

struct SubscriberEntry {
    sender: mpsc::Sender<EventEnvelope>,
    overrun_flag: Arc<AtomicBool>,
}

enum Fanout {
    All,
    Only(HashSet<SubscriberId>),
}

/// The control-tick core (§4.E). Owns the registry, the event log, the
/// pending cross-game-event queue, and the subscriber table. Runs
/// exclusively inside the tick task — nothing here is `Send`-shared with
/// any other task; all access is through [`OrchestratorHandle`].
struct Orchestrator {
    config: OrchestratorConfig,
    registry: Registry,
    log: EventLog,
    pending_queue: VecDeque<PendingPublish>,
    subscribers: HashMap<SubscriberId, SubscriberEntry>,
    game_owner: HashMap<String, SubscriberId>,
    next_subscriber_id: SubscriberId,
    local_tick_counter: u64,
    tick_number: u64,
    metrics: Arc<OrchestratorMetrics>,
    started_at: Instant,
}

impl Orchestrator {
    fn new(config: OrchestratorConfig, metrics: Arc<OrchestratorMetrics>) -> Self {
        let log = EventLog::new(config.buffer_max);
        Self {
            config,
            registry: Registry::new(),
            log,
            pending_queue: VecDeque::new(),
            subscribers: HashMap::new(),
            game_owner: HashMap::new(),
            next_subscriber_id: 1,
            local_tick_counter: 0,
            tick_number: 0,
            metrics,
            started_at: Instant::now(),
        }
    }

    fn universe_state(&self) -> UniverseState {
        UniverseState {
            tick_number: self.tick_number,
            registered_games: self.registry.len() as u64,
            buffered_events: self.log.len() as u64,
            uptime_ms: self.started_at.elapsed().as_millis() as u64,
        }
    }

    fn deliver(&mut self, envelope: &EventEnvelope, fanout: Fanout) {
        let mut overrun_ids = Vec::new();
        let mut closed_ids = Vec::new();
        for (&id, entry) in self.subscribers.iter() {
            let wants = match &fanout {
                Fanout::All => true,
                Fanout::Only(set) => set.contains(&id),
            };
            if !wants {
                continue;
            }
            match entry.sender.try_send(envelope.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => overrun_ids.push(id),
                Err(mpsc::error::TrySendError::Closed(_)) => closed_ids.push(id),
            }
        }
        for id in overrun_ids {
            if let Some(entry) = self.subscribers.remove(&id) {
                entry
                    .overrun_flag
                    .store(true, std::sync::atomic::Ordering::SeqCst);
                self.metrics.record_overrun();
                warn!(subscriber_id = id, "subscriber overrun, disconnecting");
            }
        }
        for id in closed_ids {
            self.subscribers.remove(&id);
        }
    }

    fn append_and_broadcast(&mut self, unstamped: UnstampedEnvelope) -> EventEnvelope {
        let envelope = self.log.append(unstamped, now_ts());
        self.deliver(&envelope, Fanout::All);
        envelope
    }

    fn handle_subscribe(
        &mut self,
        sender: mpsc::Sender<EventEnvelope>,
        overrun_flag: Arc<AtomicBool>,
    ) -> (SubscriberId, Vec<EventEnvelope>) {
        let id = self.next_subscriber_id;
        self.next_subscriber_id += 1;
        let replay = self.log.snapshot();
        self.subscribers
            .insert(id, SubscriberEntry { sender, overrun_flag });
        (id, replay)
    }

    fn handle_unsubscribe(&mut self, subscriber_id: SubscriberId) {
        self.subscribers.remove(&subscriber_id);
        self.game_owner.retain(|_, owner| *owner != subscriber_id);
    }

    fn handle_command(
        &mut self,
        subscriber_id: SubscriberId,
        command: Command,
    ) -> Result<CommandOutcome, ProtocolError> {
        // Computed before the command is consumed by the match below, since
        // `realm_coordinate` only applies to `RegisterGame` and needs a
        // reference to the still-whole command.
        let coordinate = command.realm_coordinate();

        match command {
            Command::RegisterGame {
                game_id,
                realm_id,
                developer_name,
                description,
                realm_type,
                ..
            } => {
                let coordinate = coordinate.expect("realm_coordinate always Some for RegisterGame")?;
                let registration = self.registry.register(
                    game_id.clone(),
                    realm_id,
                    developer_name,
                    description,
                    realm_type,
                    coordinate,
                    self.config.tick_period_ms,
                    &now_ts(),
                )?;
                self.game_owner.insert(game_id.clone(), subscriber_id);
                self.append_and_broadcast(UnstampedEnvelope::new(
                    EventKind::GameRegistered,
                    serde_json::json!({
                        "game_id": registration.game_id,
                        "realm_coordinate": registration.realm_coordinate,
                    }),
                ));
                Ok(CommandOutcome::Registered(registration))
            }
            Command::UnregisterGame { game_id } => {
                self.registry.begin_drain(&game_id, self.tick_number)?;
                self.game_owner.remove(&game_id);
                self.append_and_broadcast(UnstampedEnvelope::new(
                    EventKind::GameUnregistered,
                    serde_json::json!({ "game_id": game_id }),
                ));
                Ok(CommandOutcome::Unregistered)
            }
            Command::PublishEvent {
                source_game_id,
                target_game_id,
                event_type,
                data,
            } => {
                if !self.registry.is_active_source(&source_game_id) {
                    return Err(ProtocolError::unknown_source(&source_game_id));
                }
                if let Some(target) = &target_game_id {
                    if !self.registry.is_known_target(target) {
                        return Err(ProtocolError::unknown_target(target));
                    }
                }
                self.pending_queue.push_back(PendingPublish {
                    source_game_id,
                    target_game_id,
                    event_type_detail: event_type,
                    data,
                });
                Ok(CommandOutcome::Published)
            }
            Command::ListGames => Ok(CommandOutcome::GameList(self.registry.snapshot_list())),
            Command::UniverseState => Ok(CommandOutcome::Universe(self.universe_state())),
        }
    }

    /// One local-tick advance (§4.E): every registered game's logical clock
    /// moves forward; no cross-game routing happens here. Every
    /// `control_tick_divisor`-th local tick additionally runs the
    /// synchronization pass.
    fn run_local_tick(&mut self) {
        self.local_tick_counter += 1;
        self.registry.advance_local_tick(&now_ts());
        // `validate()` rejects 0 at startup; clamp here too so a directly
        // constructed config can never divide by zero.
        if self.local_tick_counter % self.config.control_tick_divisor.max(1) == 0 {
            let caught = std::panic::catch_unwind(AssertUnwindSafe(|| self.run_control_tick()));
            match caught {
                Ok(()) => self.metrics.record_tick_completed(),
                Err(_) => {
                    self.metrics.record_tick_failure();
                    warn!(tick_number = self.tick_number, "control tick panicked, skipping");
                }
            }
        }
    }

    /// The synchronization pass (§4.E): drain the pending queue in order,
    /// deliver each event, then append and broadcast `control_tick_complete`
    /// — the barrier every routed event for this tick precedes (§8 property
    /// 6).
    fn run_control_tick(&mut self) {
        self.tick_number += 1;
        let started_at = now_ts();
        let start_instant = Instant::now();

        let entries: Vec<PendingPublish> = self.pending_queue.drain(..).collect();
        let mut events_routed = 0u64;
        for entry in entries {
            let recipients = self.routing_recipients(&entry);
            let envelope = self.log.append(
                UnstampedEnvelope::new(
                    EventKind::CrossGameEvent,
                    merge_event_type_detail(entry.data.clone(), &entry.event_type_detail),
                )
                .with_source(entry.source_game_id.clone())
                .with_target(entry.target_game_id.clone()),
                now_ts(),
            );
            self.deliver(&envelope, Fanout::Only(recipients));
            self.registry.record_published(&entry.source_game_id);
            match &entry.target_game_id {
                Some(target) => self.registry.record_received(target),
                None => {
                    let game_ids: Vec<String> = self
                        .registry
                        .snapshot_list()
                        .into_iter()
                        .map(|r| r.game_id)
                        .filter(|id| *id != entry.source_game_id)
                        .collect();
                    for game_id in game_ids {
                        self.registry.record_received(&game_id);
                    }
                }
            }
            events_routed += 1;
        }
        self.metrics.record_events_routed(events_routed);

        let finished_at = now_ts();
        let duration_ms = start_instant.elapsed().as_millis() as u64;
        let record = ControlTickRecord {
            tick_number: self.tick_number,
            started_at,
            finished_at,
            games_synced: self.registry.len() as u64,
            events_routed,
            duration_ms,
        };
        self.append_and_broadcast(UnstampedEnvelope::new(
            EventKind::ControlTickComplete,
            serde_json::to_value(&record).unwrap_or(Value::Null),
        ));

        self.registry
            .retire_drained(self.tick_number, self.config.drain_timeout());
    }

    /// §4.D routing policy: broadcast events go to every subscriber;
    /// targeted events go to the target's owning subscriber plus the
    /// source's own (so the publisher observes its assigned `seq`).
    fn routing_recipients(&self, entry: &PendingPublish) -> HashSet<SubscriberId> {
        match &entry.target_game_id {
            None => self.subscribers.keys().copied().collect(),
            Some(target) => {
                let mut set = HashSet::new();
                if let Some(&id) = self.game_owner.get(target) {
                    set.insert(id);
                }
                if let Some(&id) = self.game_owner.get(&entry.source_game_id) {
                    set.insert(id);
                }
                set
            }
        }
    }

    fn close_all_subscribers(&mut self) {
        self.subscribers.clear();
    }
}

fn merge_event_type_detail(mut data: Value, detail: &str) -> Value {
    if let Value::Object(map) = &mut data {
        map.insert(
            "event_type_detail".to_string(),
            Value::String(detail.to_string()),
        );
    }
    data
}

/// Spawns the tick task and returns a handle to it. The task runs until a
/// [`ActorMessage::Shutdown`] is processed or every handle is dropped.
pub fn spawn(config: OrchestratorConfig, metrics: Arc<OrchestratorMetrics>) -> OrchestratorHandle {
    let (tx, rx) = mpsc::channel(1024);
    let handle = OrchestratorHandle::new(tx);
    tokio::spawn(run(config, metrics, rx));
    handle
}

async fn run(
    config: OrchestratorConfig,
    metrics: Arc<OrchestratorMetrics>,
    mut rx: mpsc::Receiver<ActorMessage>,
) {
    let shutdown_grace = config.shutdown_grace();
    let mut orchestrator = Orchestrator::new(config.clone(), metrics);
    let mut interval = tokio::time::interval(config.tick_period());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                orchestrator.run_local_tick();
            }
            msg = rx.recv() => {
                match msg {
                    Some(ActorMessage::Subscribe { sender, overrun_flag, reply }) => {
                        let (id, replay) = orchestrator.handle_subscribe(sender, overrun_flag);
                        let _ = reply.send((id, replay));
                    }
                    Some(ActorMessage::Unsubscribe { subscriber_id }) => {
                        orchestrator.handle_unsubscribe(subscriber_id);
                    }
                    Some(ActorMessage::Command { subscriber_id, command, reply }) => {
                        let result = orchestrator.handle_command(subscriber_id, command);
                        let _ = reply.send(result);
                    }
                    Some(ActorMessage::Snapshot { reply }) => {
                        let _ = reply.send(orchestrator.universe_state());
                    }
                    Some(ActorMessage::Shutdown { reply }) => {
                        drain_remaining(&mut orchestrator, &mut rx, shutdown_grace).await;
                        orchestrator.append_and_broadcast(UnstampedEnvelope::new(
                            EventKind::UniverseState,
                            serde_json::to_value(orchestrator.universe_state())
                                .unwrap_or(Value::Null),
                        ));
                        orchestrator.close_all_subscribers();
                        info!("orchestrator tick task shutting down");
                        let _ = reply.send(());
                        break;
                    }
                    None => break,
                }
            }
        }
    }
}

/// Drains any commands already queued (not yet-to-arrive ones) for up to
/// `grace`, per §5's "drains in-flight commands for up to
/// shutdown_grace_ms".
async fn drain_remaining(
    orchestrator: &mut Orchestrator,
    rx: &mut mpsc::Receiver<ActorMessage>,
    grace: std::time::Duration,
) {
    let deadline = Instant::now() + grace;
    loop {
        if Instant::now() >= deadline {
            break;
        }
        match rx.try_recv() {
            Ok(ActorMessage::Subscribe { sender, overrun_flag, reply }) => {
                let (id, replay) = orchestrator.handle_subscribe(sender, overrun_flag);
                let _ = reply.send((id, replay));
            }
            Ok(ActorMessage::Unsubscribe { subscriber_id }) => {
                orchestrator.handle_unsubscribe(subscriber_id);
            }
            Ok(ActorMessage::Command { subscriber_id, command, reply }) => {
                let result = orchestrator.handle_command(subscriber_id, command);
                let _ = reply.send(result);
            }
            Ok(ActorMessage::Snapshot { reply }) => {
                let _ = reply.send(orchestrator.universe_state());
            }
            Ok(ActorMessage::Shutdown { reply }) => {
                let _ = reply.send(());
            }
            Err(mpsc::error::TryRecvError::Empty) => break,
            Err(mpsc::error::TryRecvError::Disconnected) => break,
        }
    }
}
