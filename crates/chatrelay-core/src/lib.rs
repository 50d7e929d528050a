//! Relay core for ChatRelay.
//!
//! This crate holds the orchestration engine and the ports that platform
//! and backend adapters implement (`Source`, `Bot`, `Skill`). It depends
//! only on `chatrelay-types` -- never on the binary or any network crate.

pub mod agent;
pub mod bot;
pub mod config;
pub mod conversation;
pub mod delivery;
pub mod event;
pub mod history;
pub mod registry;
pub mod relay;
pub mod reply;
pub mod rule;
pub mod skill;
pub mod source;
