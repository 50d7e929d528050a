//! Per-conversation history buffers.

pub mod manager;

pub use manager::{HistoryMessageManager, count_words};
