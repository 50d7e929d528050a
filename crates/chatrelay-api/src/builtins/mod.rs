//! Plugins shipped with the `relay` binary.
//!
//! - `console` source: stdin lines in, stdout out
//! - `echo` bot: streams the question back in chunks
//! - `keyword-reply` skill: fixed answers for configured commands

pub mod console;
pub mod echo;
pub mod keyword;

use chatrelay_core::bot::{BotParams, BoxBot};
use chatrelay_core::registry::{PluginRegistry, RegistryError, parse_options};
use chatrelay_core::skill::{BoxSkill, SkillParams};
use chatrelay_core::source::{BoxSource, SourceParams};

pub use console::ConsoleSource;
pub use echo::EchoBot;
pub use keyword::KeywordReplySkill;

/// Register every built-in kind.
pub fn register_builtins(registry: &mut PluginRegistry) -> Result<(), RegistryError> {
    registry
        .sources
        .register("console", SourceParams::default(), |name, options| {
            let options = parse_options(name, options)?;
            Ok(BoxSource::new(ConsoleSource::new(name, options)))
        })?;

    registry.bots.register(
        "echo",
        BotParams {
            need_history_message: true,
            allow_multi_active_chat: false,
        },
        |name, options| {
            let options = parse_options(name, options)?;
            Ok(BoxBot::new(EchoBot::new(name, options)))
        },
    )?;

    registry
        .skills
        .register("keyword-reply", SkillParams::default(), |name, options| {
            let options = parse_options(name, options)?;
            Ok(BoxSkill::new(KeywordReplySkill::new(name, options)))
        })?;

    Ok(())
}
