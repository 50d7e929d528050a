//! Agent execution for ChatRelay.
//!
//! The agent module turns inbound messages into delivered answers:
//! - `Agent`: matches rules, admits questions and drives each turn
//! - `ReplyPipeline`: splits bot output and applies reply skills
//! - `ReplyHandle`: lets skills answer into the same conversation
//! - `Notice`: the fixed busy, timeout, fallback and error texts

pub mod handle;
pub mod notice;
pub mod orchestrator;
mod pipeline;
pub mod turn;

pub use handle::{Outbound, ReplyHandle};
pub use notice::Notice;
pub use orchestrator::{Agent, AgentPlugins};
pub use turn::{TurnError, TurnOutcome};
