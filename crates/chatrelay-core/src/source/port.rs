//! Source trait definition.

use std::future::Future;

use chatrelay_types::error::SourceError;
use chatrelay_types::message::{ChatMessage, UserInfo};

use super::{SourceEmitter, SourceParams};

/// Trait for chat platform adapters (console, IM webhooks, bot gateways).
///
/// Uses native async fn in traits (RPITIT). `BoxSource` provides the
/// object-safe wrapper used by agents.
pub trait Source: Send + Sync {
    /// Instance name, unique within a relay.
    fn name(&self) -> &str;

    /// Declared capabilities.
    fn params(&self) -> &SourceParams;

    /// The relay's own account on this platform, used for mentions.
    fn me(&self) -> Option<&UserInfo>;

    /// Receive messages until the platform connection ends.
    fn start(&self, emitter: SourceEmitter) -> impl Future<Output = Result<(), SourceError>> + Send;

    /// Deliver one outbound message, optionally answering `from`.
    fn send_message(
        &self,
        message: &ChatMessage,
        from: Option<&ChatMessage>,
    ) -> impl Future<Output = Result<(), SourceError>> + Send;

    /// Called once before the bot is invoked for `from`.
    fn before_send(&self, _from: &ChatMessage) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Called once after the last fragment answering `from` was handled.
    fn after_send(&self, _from: &ChatMessage) -> impl Future<Output = ()> + Send {
        async {}
    }
}
