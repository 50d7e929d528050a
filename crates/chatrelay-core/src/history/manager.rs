//! Bounded history buffer for one conversation.
//!
//! Entries are evicted oldest first when they expire or when the buffer
//! exceeds its word or item limits. Limits are enforced on every insert,
//! so the totals never exceed `HistoryOptions` after `add_message` returns.

use std::collections::VecDeque;
use std::time::Duration;

use chatrelay_types::history::{HistoryMessage, HistoryOptions};
use tokio::time::Instant;

struct HistoryEntry {
    message: HistoryMessage,
    word_count: usize,
    expires_at: Instant,
}

/// TTL and size limited turn buffer.
pub struct HistoryMessageManager {
    options: HistoryOptions,
    entries: VecDeque<HistoryEntry>,
    total_words: usize,
}

/// Word count used for history limits: non-whitespace characters.
///
/// Counting characters keeps CJK text, which has no word separators,
/// comparable with space separated languages.
pub fn count_words(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

impl HistoryMessageManager {
    pub fn new(options: HistoryOptions) -> Self {
        Self {
            options,
            entries: VecDeque::new(),
            total_words: 0,
        }
    }

    /// Append a message, then evict until the limits hold.
    ///
    /// `text_for_counting` overrides the text the word count is taken from.
    /// Returns `false` when the message alone exceeds `max_words_count` and
    /// was therefore not stored.
    pub fn add_message(&mut self, message: HistoryMessage, text_for_counting: Option<&str>) -> bool {
        let word_count = match text_for_counting {
            Some(text) => count_words(text),
            None => count_words(&message.counting_text()),
        };

        if word_count > self.options.max_words_count {
            tracing::debug!(
                word_count,
                max_words = self.options.max_words_count,
                "history entry too large, not stored"
            );
            return false;
        }

        self.entries.push_back(HistoryEntry {
            message,
            word_count,
            expires_at: Instant::now() + Duration::from_secs(self.options.expire_in_seconds),
        });
        self.total_words += word_count;

        self.evict_expired();
        while self.total_words > self.options.max_words_count
            || self.entries.len() > self.options.max_items_count
        {
            if !self.pop_oldest() {
                break;
            }
        }
        true
    }

    /// Snapshot of the live entries, oldest first.
    ///
    /// The returned vector is detached from the buffer.
    pub fn history_messages(&mut self) -> Vec<HistoryMessage> {
        self.evict_expired();
        self.entries.iter().map(|e| e.message.clone()).collect()
    }

    /// Evict expired entries and report whether any entry is left.
    pub fn has_live_entries(&mut self) -> bool {
        self.evict_expired();
        !self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear_history(&mut self) {
        self.entries.clear();
        self.total_words = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of word counts of the stored entries.
    pub fn total_words(&self) -> usize {
        self.total_words
    }

    pub fn options(&self) -> &HistoryOptions {
        &self.options
    }

    fn evict_expired(&mut self) {
        let now = Instant::now();
        while self.entries.front().is_some_and(|e| e.expires_at <= now) {
            self.pop_oldest();
        }
    }

    fn pop_oldest(&mut self) -> bool {
        match self.entries.pop_front() {
            Some(entry) => {
                self.total_words -= entry.word_count;
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for HistoryMessageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryMessageManager")
            .field("items", &self.entries.len())
            .field("total_words", &self.total_words)
            .field("options", &self.options)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
