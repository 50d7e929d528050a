//! Turn outcomes, errors and state tracking.

use chatrelay_types::error::{BotError, SkillError, SourceError};
use chatrelay_types::event::{RelayEvent, TurnState};
use chatrelay_types::message::ConversationKey;
use thiserror::Error;
use uuid::Uuid;

use crate::event::EventBus;

/// Why a turn did not produce an answer.
///
/// Every variant is scoped to one conversation.
#[derive(Debug, Error)]
pub enum TurnError {
    /// No rule selected a bot. Silent toward the source.
    #[error("no rule matched the message")]
    RuleMismatch,

    /// The conversation was busy and the overflow policy dropped the question.
    #[error("question rejected: {0}")]
    AdmissionRejected(String),

    #[error("bot '{bot}' failed: {error}")]
    BotInvocation {
        bot: String,
        #[source]
        error: BotError,
    },

    #[error("skill '{skill}' failed: {error}")]
    Skill {
        skill: String,
        #[source]
        error: SkillError,
    },

    /// The source rejected an outbound message. Not retried.
    #[error("delivery failed: {0}")]
    Delivery(#[source] SourceError),

    #[error("unknown source instance '{0}'")]
    UnknownSource(String),

    #[error("agent is stopped")]
    Stopped,
}

impl TurnError {
    /// Errors that are expected outcomes rather than failures.
    pub fn is_silent(&self) -> bool {
        matches!(self, TurnError::RuleMismatch | TurnError::AdmissionRejected(_))
    }
}

/// What handling one inbound message led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The answer was delivered; `fragments` messages reached the source.
    Completed { fragments: usize },
    /// The question waits behind the active answer.
    Queued { pending: usize },
    /// A skill vetoed the turn before the bot was called.
    Vetoed,
    /// A rule claimed the message and answers nothing.
    Dropped { reason: String },
    /// The message came from a source outside this agent's scope.
    Ignored,
}

/// Tracks the state of one turn and publishes its transitions.
pub(crate) struct TurnProgress {
    agent: String,
    key: ConversationKey,
    turn_id: Uuid,
    state: TurnState,
    bus: EventBus,
}

impl TurnProgress {
    pub(crate) fn new(
        agent: &str,
        key: &ConversationKey,
        turn_id: Uuid,
        state: TurnState,
        bus: &EventBus,
    ) -> Self {
        Self {
            agent: agent.to_string(),
            key: key.clone(),
            turn_id,
            state,
            bus: bus.clone(),
        }
    }

    pub(crate) fn state(&self) -> TurnState {
        self.state
    }

    pub(crate) fn advance(&mut self, to: TurnState) {
        if self.state == to {
            return;
        }
        if !self.state.can_transition_to(to) {
            tracing::warn!(
                conversation = %self.key,
                turn_id = %self.turn_id,
                from = %self.state,
                to = %to,
                "unexpected turn transition"
            );
        }
        self.bus.publish(RelayEvent::TurnStateChanged {
            agent: self.agent.clone(),
            key: self.key.clone(),
            turn_id: self.turn_id,
            from: self.state,
            to,
        });
        self.state = to;
    }

    /// Move through `Splitting` into `Delivering` from wherever output
    /// handling currently is.
    pub(crate) fn deliver_fragment(&mut self) {
        match self.state {
            TurnState::Dispatched => {
                self.advance(TurnState::Streaming);
                self.advance(TurnState::Splitting);
            }
            TurnState::Streaming | TurnState::BlockedWait | TurnState::Delivering => {
                self.advance(TurnState::Splitting);
            }
            _ => {}
        }
        self.advance(TurnState::Delivering);
    }

    /// The bot call returned without streaming anything; its answer, if
    /// any, comes from the return value.
    pub(crate) fn await_answer(&mut self) {
        if self.state == TurnState::Dispatched {
            self.advance(TurnState::BlockedWait);
        }
    }

    /// Return to `Idle` after the last fragment.
    pub(crate) fn finish(&mut self) {
        match self.state {
            TurnState::Dispatched => {
                self.advance(TurnState::BlockedWait);
                self.advance(TurnState::Splitting);
                self.advance(TurnState::Delivering);
            }
            TurnState::Streaming | TurnState::BlockedWait => {
                self.advance(TurnState::Splitting);
                self.advance(TurnState::Delivering);
            }
            _ => {}
        }
        self.advance(TurnState::Idle);
    }

    pub(crate) fn fail(&mut self) {
        self.advance(TurnState::CompleteWithError);
        self.advance(TurnState::Idle);
    }
}
