//! Shared domain types for ChatRelay.
//!
//! This crate contains the types exchanged between sources, bots, skills
//! and the relay core: normalized chat messages, routing rules, history
//! entries, configuration, lifecycle events and their error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod history;
pub mod message;
pub mod rule;
