//! Event bus for relay lifecycle events.
//!
//! Provides an `EventBus` that distributes `RelayEvent` messages to all
//! subscribers via a `tokio::sync::broadcast` channel.

pub mod bus;

pub use bus::{EventBus, EventFilter, FilteredReceiver};
