//! Broadcast event bus for distributing `RelayEvent` to multiple subscribers.
//!
//! Built on `tokio::sync::broadcast`, the `EventBus` supports multiple
//! concurrent subscribers. Publishing with no active subscribers is a no-op.
//! Several agents share one bus, so subscribers usually narrow the stream
//! to one agent or one conversation with an [`EventFilter`].

use chatrelay_types::event::RelayEvent;
use chatrelay_types::message::ConversationKey;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Default channel capacity used by agents.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Multi-consumer event bus for relay events.
///
/// Wraps a `tokio::sync::broadcast` channel. Cloning the bus clones the
/// sender, so every agent of a relay can publish into one bus.
pub struct EventBus {
    sender: broadcast::Sender<RelayEvent>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a new subscriber that will receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.sender.subscribe()
    }

    /// Subscribe to the events matching `filter`.
    pub fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver {
        FilteredReceiver {
            rx: self.sender.subscribe(),
            filter,
        }
    }

    /// Subscribe to the events of one agent.
    pub fn subscribe_agent(&self, agent: &str) -> FilteredReceiver {
        self.subscribe_filtered(EventFilter::agent(agent))
    }

    /// Subscribe to the events of one conversation, across agents.
    pub fn subscribe_key(&self, key: &ConversationKey) -> FilteredReceiver {
        self.subscribe_filtered(EventFilter::key(key))
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no subscribers, the event is silently dropped.
    pub fn publish(&self, event: RelayEvent) {
        let _ = self.sender.send(event);
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Which events a [`FilteredReceiver`] yields. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub agent: Option<String>,
    pub key: Option<ConversationKey>,
}

impl EventFilter {
    pub fn agent(agent: &str) -> Self {
        Self {
            agent: Some(agent.to_string()),
            key: None,
        }
    }

    pub fn key(key: &ConversationKey) -> Self {
        Self {
            agent: None,
            key: Some(key.clone()),
        }
    }

    /// Narrow the filter to one conversation.
    pub fn with_key(mut self, key: &ConversationKey) -> Self {
        self.key = Some(key.clone());
        self
    }

    pub fn matches(&self, event: &RelayEvent) -> bool {
        self.agent.as_deref().is_none_or(|agent| event.agent() == agent)
            && self.key.as_ref().is_none_or(|key| event.key() == key)
    }
}

/// Broadcast receiver that skips events outside its filter.
///
/// Lag and close errors pass through unchanged.
#[derive(Debug)]
pub struct FilteredReceiver {
    rx: broadcast::Receiver<RelayEvent>,
    filter: EventFilter,
}

impl FilteredReceiver {
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Wait for the next matching event.
    pub async fn recv(&mut self) -> Result<RelayEvent, RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Next matching event already in the channel, if any.
    pub fn try_recv(&mut self) -> Result<RelayEvent, TryRecvError> {
        loop {
            let event = self.rx.try_recv()?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}
