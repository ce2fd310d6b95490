//! Application context shared by every route handler.
//!
//! [`AppContext`] is cheap to clone: it only holds `Arc`s. The scheduler and
//! the aggregator share one [`EventBus`] so a single SSE subscription sees
//! queue and result changes alike.

use std::sync::Arc;

use vf_av::ToolRegistry;
use vf_core::config::Config;
use vf_core::events::EventBus;
use vf_pipeline::{BackendSet, ExecutionBackend, LocalTranscoder, ResultAggregator, Scheduler};

#[derive(Clone)]
pub struct AppContext {
    /// Immutable configuration snapshot.
    pub config: Arc<Config>,
    /// Broadcast event bus for SSE.
    pub event_bus: Arc<EventBus>,
    /// External tool registry.
    pub tools: Arc<ToolRegistry>,
    pub scheduler: Arc<Scheduler>,
    pub aggregator: Arc<ResultAggregator>,
    /// Backend that renders `/process-video` uploads.
    pub relay: Arc<dyn ExecutionBackend>,
}

impl AppContext {
    /// Wire the queue, the aggregator and the relay around explicit backends.
    pub fn new(
        config: Config,
        tools: Arc<ToolRegistry>,
        backends: BackendSet,
        relay: Arc<dyn ExecutionBackend>,
    ) -> Self {
        let event_bus = Arc::new(EventBus::default());
        let aggregator = Arc::new(ResultAggregator::new(event_bus.clone()));
        let scheduler = Arc::new(Scheduler::new(
            config.queue.clone(),
            backends,
            aggregator.clone(),
            event_bus.clone(),
        ));
        Self {
            config: Arc::new(config),
            event_bus,
            tools,
            scheduler,
            aggregator,
            relay,
        }
    }

    /// Build the context described by `config`: discovered tools, the
    /// configured video backend, and a local transcoder behind the relay.
    pub fn from_config(config: Config) -> vf_core::Result<Self> {
        let tools = Arc::new(ToolRegistry::discover(&config.tools));
        let backends = BackendSet::from_config(&config, tools.clone())?;
        let relay: Arc<dyn ExecutionBackend> = Arc::new(LocalTranscoder::new(tools.clone()));
        Ok(Self::new(config, tools, backends, relay))
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("scheduler", &self.scheduler)
            .field("aggregator", &self.aggregator)
            .field("relay", &self.relay.name())
            .finish_non_exhaustive()
    }
}
