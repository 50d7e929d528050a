//! Relay runtime: runs every source and feeds its messages to the agents.

use std::sync::Arc;

use chatrelay_types::config::RelayConfig;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::Agent;
use crate::event::EventBus;
use crate::registry::{PluginRegistry, RegistryError};
use crate::source::{BoxSource, SourceEmitter, SourceEvent};

/// Inbound messages buffered between sources and agents.
const EVENT_BUFFER: usize = 256;

/// All agents of one configuration plus the sources they listen on.
pub struct Relay {
    agents: Vec<Agent>,
    sources: Vec<(String, Arc<BoxSource>)>,
    bus: EventBus,
    cancel: CancellationToken,
}

impl Relay {
    /// Build one agent per configured agent from the instances in `registry`.
    pub fn from_config(
        config: &RelayConfig,
        registry: &PluginRegistry,
        bus: EventBus,
    ) -> Result<Self, RegistryError> {
        let agents = config
            .agents
            .iter()
            .map(|agent| Agent::from_registry(agent.clone(), registry, bus.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        let sources = registry
            .sources
            .instances()
            .into_iter()
            .map(|(name, source)| (name.to_string(), source))
            .collect();
        Ok(Self::new(agents, sources, bus))
    }

    pub fn new(agents: Vec<Agent>, sources: Vec<(String, Arc<BoxSource>)>, bus: EventBus) -> Self {
        Self {
            agents,
            sources,
            bus,
            cancel: CancellationToken::new(),
        }
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Start every source and dispatch its messages until cancelled or
    /// until all sources have ended.
    ///
    /// Each message goes to every agent whose scope names its source.
    pub async fn run(&self) {
        let (tx, mut rx) = mpsc::channel::<SourceEvent>(EVENT_BUFFER);
        let mut running = JoinSet::new();
        for (name, source) in &self.sources {
            let emitter = SourceEmitter::new(name.clone(), tx.clone());
            let source = Arc::clone(source);
            let name = name.clone();
            running.spawn(async move {
                match source.start(emitter).await {
                    Ok(()) => info!(source = %name, "source stopped"),
                    Err(err) => warn!(source = %name, "source failed: {err}"),
                }
            });
        }
        drop(tx);
        info!(
            agents = self.agents.len(),
            sources = self.sources.len(),
            "relay running"
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => self.dispatch(event),
                    None => break,
                },
            }
        }

        for agent in &self.agents {
            agent.dispose();
        }
        running.abort_all();
        info!("relay stopped");
    }

    fn dispatch(&self, event: SourceEvent) {
        let mut handled = false;
        for agent in self.agents.iter().filter(|a| a.handles_source(&event.source)) {
            handled = true;
            let task = agent.spawn_message(&event.source, event.message.clone());
            let agent_name = agent.name().to_string();
            tokio::spawn(async move {
                match task.await {
                    Ok(Ok(outcome)) => debug!(agent = %agent_name, ?outcome, "message handled"),
                    Ok(Err(err)) if err.is_silent() => {
                        debug!(agent = %agent_name, "message not answered: {err}")
                    }
                    Ok(Err(err)) => warn!(agent = %agent_name, "message failed: {err}"),
                    Err(err) => warn!(agent = %agent_name, "turn task panicked: {err}"),
                }
            });
        }
        if !handled {
            debug!(source = %event.source, "no agent listens on source");
        }
    }
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("agents", &self.agents.len())
            .field("sources", &self.sources.len())
            .finish()
    }
}
