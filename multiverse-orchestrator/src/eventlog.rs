use std::collections::VecDeque;

use multiverse_proto::{EventEnvelope, UnstampedEnvelope};

/// Append-only, FIFO-evicting ring buffer of [`EventEnvelope`]s.
///
/// Single-producer: only the tick task ever calls [`EventLog::append`]. Many
/// consumers read a [`EventLog::snapshot`] at subscribe time and then rely on
/// the orchestrator's subscriber table to fan out everything appended after
/// that point — the log itself has no notion of subscribers.
pub struct EventLog {
    buffer: VecDeque<EventEnvelope>,
    capacity: usize,
    next_seq: u64,
    evicted_through: u64,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            next_seq: 1,
            evicted_through: 0,
        }
    }

    /// Assigns `seq` and stamps `ts`, appends, and evicts the oldest entry
    /// FIFO if the buffer is now over capacity. Client-supplied `seq`/`ts`
    /// never reach this call — callers pass an [`UnstampedEnvelope`].
    pub fn append(&mut self, unstamped: UnstampedEnvelope, ts: String) -> EventEnvelope {
        let envelope = EventEnvelope {
            seq: self.next_seq,
            event_type: unstamped.event_type,
            ts,
            source_game_id: unstamped.source_game_id,
            target_game_id: unstamped.target_game_id,
            data: unstamped.data,
            metadata: unstamped.metadata,
        };
        self.next_seq += 1;
        self.buffer.push_back(envelope.clone());
        while self.buffer.len() > self.capacity {
            if let Some(evicted) = self.buffer.pop_front() {
                self.evicted_through = evicted.seq;
            }
        }
        envelope
    }

    /// Every envelope currently retained, oldest first — the replay window
    /// handed to a newly connected subscriber before it transitions to live
    /// streaming. Delivery within the replay window is at-least-once.
    pub fn snapshot(&self) -> Vec<EventEnvelope> {
        self.buffer.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn last_seq(&self) -> u64 {
        self.next_seq.saturating_sub(1)
    }

    /// The highest `seq` no longer retained. Eviction is FIFO; events at or
    /// below this are gone forever, not recoverable from this log.
    pub fn evicted_through(&self) -> u64 {
        self.evicted_through
    }
}
