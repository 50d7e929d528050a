//! BoxSource -- object-safe dynamic dispatch wrapper for Source.
//!
//! 1. `SourceDyn` is the object-safe mirror of `Source` with boxed futures
//! 2. every `T: Source` gets `SourceDyn` through a blanket impl
//! 3. `BoxSource` wraps `Box<dyn SourceDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use chatrelay_types::error::SourceError;
use chatrelay_types::message::{ChatMessage, UserInfo};

use super::port::Source;
use super::{SourceEmitter, SourceParams};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe version of [`Source`] with boxed futures.
pub trait SourceDyn: Send + Sync {
    fn name(&self) -> &str;

    fn params(&self) -> &SourceParams;

    fn me(&self) -> Option<&UserInfo>;

    fn start_boxed(&self, emitter: SourceEmitter) -> BoxFuture<'_, Result<(), SourceError>>;

    fn send_message_boxed<'a>(
        &'a self,
        message: &'a ChatMessage,
        from: Option<&'a ChatMessage>,
    ) -> BoxFuture<'a, Result<(), SourceError>>;

    fn before_send_boxed<'a>(&'a self, from: &'a ChatMessage) -> BoxFuture<'a, ()>;

    fn after_send_boxed<'a>(&'a self, from: &'a ChatMessage) -> BoxFuture<'a, ()>;
}

impl<T: Source> SourceDyn for T {
    fn name(&self) -> &str {
        Source::name(self)
    }

    fn params(&self) -> &SourceParams {
        Source::params(self)
    }

    fn me(&self) -> Option<&UserInfo> {
        Source::me(self)
    }

    fn start_boxed(&self, emitter: SourceEmitter) -> BoxFuture<'_, Result<(), SourceError>> {
        Box::pin(self.start(emitter))
    }

    fn send_message_boxed<'a>(
        &'a self,
        message: &'a ChatMessage,
        from: Option<&'a ChatMessage>,
    ) -> BoxFuture<'a, Result<(), SourceError>> {
        Box::pin(self.send_message(message, from))
    }

    fn before_send_boxed<'a>(&'a self, from: &'a ChatMessage) -> BoxFuture<'a, ()> {
        Box::pin(self.before_send(from))
    }

    fn after_send_boxed<'a>(&'a self, from: &'a ChatMessage) -> BoxFuture<'a, ()> {
        Box::pin(self.after_send(from))
    }
}

/// Type-erased source for runtime plugin selection.
pub struct BoxSource {
    inner: Box<dyn SourceDyn + Send + Sync>,
}

impl BoxSource {
    /// Wrap a concrete `Source` in a type-erased box.
    pub fn new<T: Source + 'static>(source: T) -> Self {
        Self {
            inner: Box::new(source),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn params(&self) -> &SourceParams {
        self.inner.params()
    }

    pub fn me(&self) -> Option<&UserInfo> {
        self.inner.me()
    }

    /// Receive messages until the platform connection ends.
    pub async fn start(&self, emitter: SourceEmitter) -> Result<(), SourceError> {
        self.inner.start_boxed(emitter).await
    }

    /// Deliver one outbound message.
    pub async fn send_message(
        &self,
        message: &ChatMessage,
        from: Option<&ChatMessage>,
    ) -> Result<(), SourceError> {
        self.inner.send_message_boxed(message, from).await
    }

    pub async fn before_send(&self, from: &ChatMessage) {
        self.inner.before_send_boxed(from).await
    }

    pub async fn after_send(&self, from: &ChatMessage) {
        self.inner.after_send_boxed(from).await
    }
}

impl std::fmt::Debug for BoxSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxSource").field("name", &self.name()).finish()
    }
}
