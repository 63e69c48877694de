use std::sync::Arc;

use crate::cluster::{InMemoryCache, SharedCache};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::eval::{Evaluator, ResultHandler, RuleReader};
use crate::events::Bus;
use crate::schedule::{Clock, SystemClock};
use crate::subscribers::Subscribe;

use super::engine::Engine;

/// Builder for an [`Engine`].
///
/// The rule reader, evaluator and result handler are required. A shared
/// cache is required when clustering is enabled; otherwise a private
/// [`InMemoryCache`] is used.
pub struct EngineBuilder {
    cfg: EngineConfig,
    reader: Option<Arc<dyn RuleReader>>,
    evaluator: Option<Arc<dyn Evaluator>>,
    handler: Option<Arc<dyn ResultHandler>>,
    cache: Option<Arc<dyn SharedCache>>,
    clock: Option<Arc<dyn Clock>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl EngineBuilder {
    /// Creates a builder with the given configuration.
    pub fn new(cfg: EngineConfig) -> Self {
        Self {
            cfg,
            reader: None,
            evaluator: None,
            handler: None,
            cache: None,
            clock: None,
            subscribers: Vec::new(),
        }
    }

    /// Sets the rule catalog.
    pub fn with_rule_reader(mut self, reader: Arc<dyn RuleReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    /// Sets the evaluator.
    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Sets the result handler.
    pub fn with_result_handler(mut self, handler: Arc<dyn ResultHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Sets the cache holding the leader lease.
    pub fn with_cache(mut self, cache: Arc<dyn SharedCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Overrides the clock (simulations, tests).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive engine events through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Validates the configuration and assembles the engine.
    pub fn build(self) -> Result<Engine, EngineError> {
        self.cfg.validate()?;

        let reader = self
            .reader
            .ok_or(EngineError::MissingCollaborator("rule reader"))?;
        let evaluator = self
            .evaluator
            .ok_or(EngineError::MissingCollaborator("evaluator"))?;
        let handler = self
            .handler
            .ok_or(EngineError::MissingCollaborator("result handler"))?;
        let cache = match self.cache {
            Some(cache) => cache,
            None if self.cfg.cluster.enabled => {
                return Err(EngineError::MissingCollaborator("shared cache"));
            }
            None => Arc::new(InMemoryCache::new()),
        };
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::new()));

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        Ok(Engine::new_internal(
            self.cfg,
            bus,
            self.subscribers,
            reader,
            evaluator,
            handler,
            cache,
            clock,
        ))
    }
}
