//! Conversation state tracker.
//!
//! Tracks which turns are answering on each conversation and holds the
//! questions waiting behind them. A conversation has at most one active
//! turn unless the caller allows several; overflow follows the configured
//! [`OverflowMode`].
//!
//! Per-key state lives in a `DashMap`, so mutations of one conversation are
//! serialized by its shard lock while distinct conversations proceed
//! independently.

use std::collections::VecDeque;

use chatrelay_types::config::OverflowMode;
use chatrelay_types::message::ConversationKey;
use dashmap::DashMap;
use uuid::Uuid;

/// Result of asking to answer a question.
///
/// The question is handed back unless the tracker kept it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission<Q> {
    /// The turn may run now.
    Admitted(Q),
    /// The turn waits; `pending` counts waiting turns including this one.
    Queued { pending: usize },
    /// The question was dropped.
    Rejected(Q),
}

struct ConversationSlot<Q> {
    active: Vec<Uuid>,
    pending: VecDeque<(Uuid, Q)>,
}

impl<Q> Default for ConversationSlot<Q> {
    fn default() -> Self {
        Self {
            active: Vec::new(),
            pending: VecDeque::new(),
        }
    }
}

/// Admission bookkeeping for every conversation of an agent.
///
/// `Q` is the queued question payload handed back on promotion.
pub struct ConversationStateTracker<Q> {
    overflow: OverflowMode,
    slots: DashMap<ConversationKey, ConversationSlot<Q>>,
}

impl<Q> ConversationStateTracker<Q> {
    pub fn new(overflow: OverflowMode) -> Self {
        Self {
            overflow,
            slots: DashMap::new(),
        }
    }

    pub fn overflow(&self) -> OverflowMode {
        self.overflow
    }

    /// Admit, queue or reject `question` for turn `turn_id`.
    pub fn admit(
        &self,
        key: &ConversationKey,
        turn_id: Uuid,
        question: Q,
        allow_multi_active: bool,
    ) -> Admission<Q> {
        let mut slot = self.slots.entry(key.clone()).or_default();

        if slot.active.is_empty() || allow_multi_active {
            slot.active.push(turn_id);
            return Admission::Admitted(question);
        }

        if self.overflow.queues() {
            slot.pending.push_back((turn_id, question));
            let pending = slot.pending.len();
            tracing::debug!(conversation = %key, %turn_id, pending, "question queued");
            Admission::Queued { pending }
        } else {
            tracing::debug!(conversation = %key, %turn_id, "question rejected, conversation busy");
            Admission::Rejected(question)
        }
    }

    /// Release the slot of a finished turn.
    ///
    /// Returns the next queued question, now admitted, if the conversation
    /// became idle. Releasing a turn that is no longer active (for example
    /// after its slot expired) is a no-op.
    pub fn complete(&self, key: &ConversationKey, turn_id: Uuid) -> Option<(Uuid, Q)> {
        self.release(key, turn_id)
    }

    /// Release the slot of a turn whose admission timeout fired.
    ///
    /// The turn itself keeps running; only the bookkeeping is released.
    pub fn expire(&self, key: &ConversationKey, turn_id: Uuid) -> Option<(Uuid, Q)> {
        if self.is_turn_active(key, turn_id) {
            tracing::debug!(conversation = %key, %turn_id, "admission slot expired");
        }
        self.release(key, turn_id)
    }

    fn release(&self, key: &ConversationKey, turn_id: Uuid) -> Option<(Uuid, Q)> {
        let promoted = {
            let mut slot = self.slots.get_mut(key)?;
            let position = slot.active.iter().position(|id| *id == turn_id)?;
            slot.active.swap_remove(position);

            if slot.active.is_empty() {
                let next = slot.pending.pop_front();
                if let Some((next_id, _)) = &next {
                    slot.active.push(*next_id);
                }
                next
            } else {
                None
            }
        };

        self.slots
            .remove_if(key, |_, slot| slot.active.is_empty() && slot.pending.is_empty());
        promoted
    }

    /// Whether `turn_id` currently holds an active slot.
    pub fn is_turn_active(&self, key: &ConversationKey, turn_id: Uuid) -> bool {
        self.slots
            .get(key)
            .is_some_and(|slot| slot.active.contains(&turn_id))
    }

    /// Whether any turn is answering on `key`.
    pub fn is_busy(&self, key: &ConversationKey) -> bool {
        self.slots.get(key).is_some_and(|slot| !slot.active.is_empty())
    }

    /// Number of questions waiting on `key`.
    pub fn pending_len(&self, key: &ConversationKey) -> usize {
        self.slots.get(key).map_or(0, |slot| slot.pending.len())
    }

    /// Conversations with an active or waiting turn.
    pub fn active_conversations(&self) -> Vec<ConversationKey> {
        let mut keys: Vec<ConversationKey> = self.slots.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

impl<Q> std::fmt::Debug for ConversationStateTracker<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationStateTracker")
            .field("overflow", &self.overflow)
            .field("conversations", &self.slots.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str) -> ConversationKey {
        ConversationKey::new("console", id)
    }

    #[test]
    fn first_question_is_admitted() {
        let tracker = ConversationStateTracker::new(OverflowMode::Pool);
        let turn = Uuid::now_v7();
        assert_eq!(tracker.admit(&key("a"), turn, "q1", false), Admission::Admitted("q1"));
        assert!(tracker.is_busy(&key("a")));
        assert!(tracker.is_turn_active(&key("a"), turn));
    }

    #[test]
    fn pool_queues_fifo_and_promotes_on_complete() {
        let tracker = ConversationStateTracker::new(OverflowMode::Pool);
        let k = key("a");
        let t1 = Uuid::now_v7();
        let t2 = Uuid::now_v7();
        let t3 = Uuid::now_v7();

        tracker.admit(&k, t1, "q1", false);
        assert_eq!(tracker.admit(&k, t2, "q2", false), Admission::Queued { pending: 1 });
        assert_eq!(tracker.admit(&k, t3, "q3", false), Admission::Queued { pending: 2 });

        assert_eq!(tracker.complete(&k, t1), Some((t2, "q2")));
        assert!(tracker.is_turn_active(&k, t2));
        assert_eq!(tracker.pending_len(&k), 1);

        assert_eq!(tracker.complete(&k, t2), Some((t3, "q3")));
        assert_eq!(tracker.complete(&k, t3), None);
        assert!(!tracker.is_busy(&k));
        assert!(tracker.active_conversations().is_empty());
    }

    #[test]
    fn tips_mode_rejects_when_busy() {
        let tracker = ConversationStateTracker::new(OverflowMode::Tips);
        let k = key("a");
        tracker.admit(&k, Uuid::now_v7(), "q1", false);
        assert_eq!(tracker.admit(&k, Uuid::now_v7(), "q2", false), Admission::Rejected("q2"));
        assert_eq!(tracker.pending_len(&k), 0);
    }

    #[test]
    fn pool_tips_mode_queues() {
        let tracker = ConversationStateTracker::new(OverflowMode::PoolTips);
        let k = key("a");
        tracker.admit(&k, Uuid::now_v7(), "q1", false);
        assert!(matches!(
            tracker.admit(&k, Uuid::now_v7(), "q2", false),
            Admission::Queued { .. }
        ));
    }

    #[test]
    fn multi_active_admits_everything() {
        let tracker = ConversationStateTracker::new(OverflowMode::Tips);
        let k = key("a");
        for i in 0..3 {
            assert_eq!(tracker.admit(&k, Uuid::now_v7(), i, true), Admission::Admitted(i));
        }
    }

    #[test]
    fn distinct_keys_are_independent() {
        let tracker = ConversationStateTracker::new(OverflowMode::Tips);
        assert_eq!(tracker.admit(&key("a"), Uuid::now_v7(), 1, false), Admission::Admitted(1));
        assert_eq!(tracker.admit(&key("b"), Uuid::now_v7(), 2, false), Admission::Admitted(2));
        assert_eq!(tracker.active_conversations(), vec![key("a"), key("b")]);
    }

    #[test]
    fn expire_promotes_and_late_complete_is_noop() {
        let tracker = ConversationStateTracker::new(OverflowMode::Pool);
        let k = key("a");
        let slow = Uuid::now_v7();
        let next = Uuid::now_v7();
        tracker.admit(&k, slow, "slow", false);
        tracker.admit(&k, next, "next", false);

        assert_eq!(tracker.expire(&k, slow), Some((next, "next")));
        // the slow turn finishes later; it must not release the promoted turn
        assert_eq!(tracker.complete(&k, slow), None);
        assert!(tracker.is_turn_active(&k, next));
    }

    #[test]
    fn unknown_key_release_is_noop() {
        let tracker: ConversationStateTracker<()> = ConversationStateTracker::new(OverflowMode::Pool);
        assert!(tracker.complete(&key("ghost"), Uuid::now_v7()).is_none());
    }
}
