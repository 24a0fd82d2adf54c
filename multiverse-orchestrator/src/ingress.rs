use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use multiverse_proto::{Command, EventEnvelope, ProtocolError, Registration, UniverseState};
use tokio::sync::{mpsc, oneshot};

/// Opaque per-connection subscriber identity, assigned by the tick task at
/// subscribe time.
pub type SubscriberId = u64;

/// The result of a successfully processed [`Command`], returned to the
/// originating connection only — `list_games`/`universe_state` are never
/// broadcast; the others reply so the reader task can decide whether to
/// keep going, with the actual fan-out happening separately through each
/// subscriber's envelope channel.
#[derive(Debug, Clone)]
pub enum CommandOutcome {
    Registered(Registration),
    Unregistered,
    Published,
    GameList(Vec<Registration>),
    Universe(UniverseState),
}

/// Messages the tick task accepts. Every mutation of the registry or event
/// log funnels through this enum, preserving the single-writer invariant.
pub enum ActorMessage {
    Subscribe {
        sender: mpsc::Sender<EventEnvelope>,
        /// Set by the tick task, just before it drops `sender`, when this
        /// subscriber is disconnected for exceeding
        /// `PER_SUBSCRIBER_QUEUE_MAX`. The writer task holds the other
        /// clone and consults it once its channel closes, to decide
        /// whether to report `overrun` or a plain close.
        overrun_flag: Arc<AtomicBool>,
        reply: oneshot::Sender<(SubscriberId, Vec<EventEnvelope>)>,
    },
    Unsubscribe {
        subscriber_id: SubscriberId,
    },
    Command {
        subscriber_id: SubscriberId,
        command: Command,
        reply: oneshot::Sender<Result<CommandOutcome, ProtocolError>>,
    },
    Snapshot {
        reply: oneshot::Sender<UniverseState>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// A cheap, cloneable handle to the tick task, held by every acceptor and
/// reader task: a command enum with `oneshot` reply channels, sent over a
/// bounded `mpsc::Sender`.
#[derive(Clone)]
pub struct OrchestratorHandle {
    sender: mpsc::Sender<ActorMessage>,
}

/// Raised when the tick task has already shut down and dropped its command
/// channel.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("orchestrator actor is no longer running")]
pub struct ActorGone;

impl OrchestratorHandle {
    pub(crate) fn new(sender: mpsc::Sender<ActorMessage>) -> Self {
        Self { sender }
    }

    /// Registers a new subscriber and returns its id plus the replay batch:
    /// every buffered envelope, oldest first, before any live one.
    pub async fn subscribe(
        &self,
        sender: mpsc::Sender<EventEnvelope>,
        overrun_flag: Arc<AtomicBool>,
    ) -> Result<(SubscriberId, Vec<EventEnvelope>), ActorGone> {
        let (reply, recv) = oneshot::channel();
        self.sender
            .send(ActorMessage::Subscribe {
                sender,
                overrun_flag,
                reply,
            })
            .await
            .map_err(|_| ActorGone)?;
        recv.await.map_err(|_| ActorGone)
    }

    pub async fn unsubscribe(&self, subscriber_id: SubscriberId) {
        let _ = self
            .sender
            .send(ActorMessage::Unsubscribe { subscriber_id })
            .await;
    }

    pub async fn submit_command(
        &self,
        subscriber_id: SubscriberId,
        command: Command,
    ) -> Result<Result<CommandOutcome, ProtocolError>, ActorGone> {
        let (reply, recv) = oneshot::channel();
        self.sender
            .send(ActorMessage::Command {
                subscriber_id,
                command,
                reply,
            })
            .await
            .map_err(|_| ActorGone)?;
        recv.await.map_err(|_| ActorGone)
    }

    pub async fn snapshot(&self) -> Result<UniverseState, ActorGone> {
        let (reply, recv) = oneshot::channel();
        self.sender
            .send(ActorMessage::Snapshot { reply })
            .await
            .map_err(|_| ActorGone)?;
        recv.await.map_err(|_| ActorGone)
    }

    /// Requests graceful shutdown and waits (bounded by the caller) for the
    /// tick task to confirm it has drained, emitted its final
    /// `universe_state`, and closed all connections.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), ActorGone> {
        let (reply, recv) = oneshot::channel();
        self.sender
            .send(ActorMessage::Shutdown { reply })
            .await
            .map_err(|_| ActorGone)?;
        tokio::time::timeout(timeout, recv)
            .await
            .map_err(|_| ActorGone)?
            .map_err(|_| ActorGone)
    }
}
