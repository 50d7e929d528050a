//! Event types for the relay event bus.
//!
//! `RelayEvent` is broadcast by every agent as a turn moves through its
//! lifecycle. All variants are Clone + Send + Sync for use with tokio
//! broadcast channels.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::{ConversationKey, MessageType, ReplyStatus};

/// Lifecycle state of one question on its conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Idle,
    Matching,
    Admitted,
    Queued,
    Dropped,
    Dispatched,
    Streaming,
    BlockedWait,
    Splitting,
    Delivering,
    CompleteWithError,
}

impl TurnState {
    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: TurnState) -> bool {
        use TurnState::*;
        matches!(
            (self, next),
            (Idle, Matching)
                | (Matching, Admitted | Queued | Dropped | Idle)
                | (Queued, Admitted | Idle)
                | (Admitted, Dispatched | Idle | CompleteWithError)
                | (Dropped, Idle)
                | (Dispatched, Streaming | BlockedWait | CompleteWithError)
                | (Streaming, Splitting | CompleteWithError)
                | (BlockedWait, Splitting | CompleteWithError)
                | (Splitting, Delivering | CompleteWithError)
                | (Delivering, Splitting | Idle | CompleteWithError)
                | (CompleteWithError, Idle)
        )
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TurnState::Idle => "idle",
            TurnState::Matching => "matching",
            TurnState::Admitted => "admitted",
            TurnState::Queued => "queued",
            TurnState::Dropped => "dropped",
            TurnState::Dispatched => "dispatched",
            TurnState::Streaming => "streaming",
            TurnState::BlockedWait => "blocked_wait",
            TurnState::Splitting => "splitting",
            TurnState::Delivering => "delivering",
            TurnState::CompleteWithError => "complete_with_error",
        };
        f.write_str(s)
    }
}

/// Events emitted while agents process messages.
///
/// Used by the event bus to report turn lifecycle, admission and delivery
/// to subscribers (CLI, logging, tests).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    /// A source event reached an agent.
    MessageReceived {
        agent: String,
        key: ConversationKey,
        message_type: MessageType,
    },

    /// A turn moved to a new state.
    TurnStateChanged {
        agent: String,
        key: ConversationKey,
        turn_id: Uuid,
        from: TurnState,
        to: TurnState,
    },

    /// A question waits behind the active answer of its conversation.
    QuestionQueued {
        agent: String,
        key: ConversationKey,
        turn_id: Uuid,
        /// Questions waiting on this conversation, including this one.
        pending: usize,
    },

    /// A question was not answered.
    QuestionDropped {
        agent: String,
        key: ConversationKey,
        reason: String,
    },

    /// An outbound message was accepted by the source.
    FragmentDelivered {
        agent: String,
        key: ConversationKey,
        seq: u64,
        status: ReplyStatus,
    },

    /// An outbound message was rejected by the source.
    DeliveryFailed {
        agent: String,
        key: ConversationKey,
        seq: u64,
        error: String,
    },

    /// The admission slot of a turn expired while the bot was still running.
    SlotTimedOut {
        agent: String,
        key: ConversationKey,
        turn_id: Uuid,
    },

    /// A turn delivered its last fragment.
    TurnCompleted {
        agent: String,
        key: ConversationKey,
        turn_id: Uuid,
        fragments: usize,
        duration_ms: u64,
    },

    /// A turn failed.
    TurnFailed {
        agent: String,
        key: ConversationKey,
        turn_id: Uuid,
        error: String,
    },

    /// History of a conversation was cleared.
    HistoryCleared { agent: String, key: ConversationKey },
}

impl RelayEvent {
    /// Name of the agent that published the event.
    pub fn agent(&self) -> &str {
        match self {
            RelayEvent::MessageReceived { agent, .. }
            | RelayEvent::TurnStateChanged { agent, .. }
            | RelayEvent::QuestionQueued { agent, .. }
            | RelayEvent::QuestionDropped { agent, .. }
            | RelayEvent::FragmentDelivered { agent, .. }
            | RelayEvent::DeliveryFailed { agent, .. }
            | RelayEvent::SlotTimedOut { agent, .. }
            | RelayEvent::TurnCompleted { agent, .. }
            | RelayEvent::TurnFailed { agent, .. }
            | RelayEvent::HistoryCleared { agent, .. } => agent,
        }
    }

    /// Conversation the event belongs to.
    pub fn key(&self) -> &ConversationKey {
        match self {
            RelayEvent::MessageReceived { key, .. }
            | RelayEvent::TurnStateChanged { key, .. }
            | RelayEvent::QuestionQueued { key, .. }
            | RelayEvent::QuestionDropped { key, .. }
            | RelayEvent::FragmentDelivered { key, .. }
            | RelayEvent::DeliveryFailed { key, .. }
            | RelayEvent::SlotTimedOut { key, .. }
            | RelayEvent::TurnCompleted { key, .. }
            | RelayEvent::TurnFailed { key, .. }
            | RelayEvent::HistoryCleared { key, .. } => key,
        }
    }
}
