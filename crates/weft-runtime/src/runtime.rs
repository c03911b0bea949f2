#![forbid(unsafe_code)]

//! The assembled runtime for one control context.
//!
//! [`Runtime`] owns the render context and wires the scheduler, the turn
//! queue, the removal registry, and the gesture bridge to one backend. It
//! lives on the control context (it is `!Send`); the pieces it hands to the
//! render context are `Send`.

use std::rc::Rc;
use std::sync::Arc;

use weft_core::{RenderBackend, ViewTag};

use crate::config::RuntimeConfig;
use crate::gesture::GestureBridge;
use crate::inline_props::InlinePropManager;
use crate::removal::RemovalRegistry;
use crate::render_context::{ImmediateContext, RenderContext, RenderThread};
use crate::scheduler::MapperScheduler;
use crate::turn::TurnQueue;

pub struct Runtime {
    config: RuntimeConfig,
    backend: Arc<dyn RenderBackend>,
    scheduler: MapperScheduler,
    turn: Rc<TurnQueue>,
    removals: RemovalRegistry,
    gestures: GestureBridge,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .field("scheduler", &self.scheduler)
            .field("turn", &self.turn)
            .finish()
    }
}

impl Runtime {
    /// Runtime with a dedicated render thread.
    #[must_use]
    pub fn with_render_thread(config: RuntimeConfig, backend: Arc<dyn RenderBackend>) -> Self {
        let thread = RenderThread::start(&config);
        Self::with_context(config, backend, Arc::new(thread))
    }

    /// Runtime whose render context is the calling thread.
    #[must_use]
    pub fn immediate(config: RuntimeConfig, backend: Arc<dyn RenderBackend>) -> Self {
        Self::with_context(config, backend, Arc::new(ImmediateContext))
    }

    #[must_use]
    pub fn with_context(
        config: RuntimeConfig,
        backend: Arc<dyn RenderBackend>,
        context: Arc<dyn RenderContext>,
    ) -> Self {
        let turn = TurnQueue::new();
        let scheduler = MapperScheduler::new(Arc::clone(&context));
        let removals = RemovalRegistry::new(
            Rc::clone(&turn),
            context,
            Arc::clone(&backend),
            config.environment,
            config.dev_checks,
        );
        let gestures = GestureBridge::new(Arc::clone(&backend), config.environment);
        tracing::debug!(
            environment = %config.environment,
            backend = backend.name(),
            dev_checks = config.dev_checks,
            "runtime started"
        );
        Self {
            config,
            backend,
            scheduler,
            turn,
            removals,
            gestures,
        }
    }

    /// A reconciler for one component instance.
    #[must_use]
    pub fn inline_prop_manager(&self) -> InlinePropManager {
        InlinePropManager::new(
            self.scheduler.clone(),
            Arc::clone(&self.backend),
            self.config.environment,
        )
    }

    /// Queue `tag` for batched removal at the end of this turn.
    pub fn schedule_removal(&self, tag: impl Into<ViewTag>) {
        self.removals.schedule_removal(tag);
    }

    /// End the current control turn, running deferred work.
    pub fn end_turn(&self) -> usize {
        self.turn.end_turn()
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<dyn RenderBackend> {
        &self.backend
    }

    #[must_use]
    pub fn scheduler(&self) -> &MapperScheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn turn_queue(&self) -> &Rc<TurnQueue> {
        &self.turn
    }

    #[must_use]
    pub fn removals(&self) -> &RemovalRegistry {
        &self.removals
    }

    #[must_use]
    pub fn gestures(&self) -> &GestureBridge {
        &self.gestures
    }
}
