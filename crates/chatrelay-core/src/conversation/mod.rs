//! Per-conversation admission control.

pub mod tracker;

pub use tracker::{Admission, ConversationStateTracker};
