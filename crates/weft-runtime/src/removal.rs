#![forbid(unsafe_code)]

//! Batched removal of view tags from the render side's props registry.
//!
//! Tags queued with [`RemovalRegistry::schedule_removal`] during one turn of
//! the control context are flushed together, as a single render-context job,
//! when the turn ends.
//!
//! # Design
//!
//! The queue is owned by the registry. The first enqueue of a coalescing
//! window defers one flush task on the [`TurnQueue`] and records a ticket for
//! it; the flush clears the ticket. A scheduled flush whose ticket no longer
//! matches (someone flushed manually in between) does nothing.
//!
//! # Invariants
//!
//! 1. Each window produces at most one backend call, carrying every tag
//!    queued in that window, in order.
//! 2. The queue and ticket are cleared before the batch is dispatched, so a
//!    `schedule_removal` during dispatch opens a new window.
//!
//! # Failure Modes
//!
//! With development checks on, flushing outside a Fabric environment, or
//! against a backend without batched removal, is a configuration error: [`RemovalRegistry::flush`] returns it,
//! and the end-of-turn flush logs it and panics. Without development checks
//! the capability is not probed at all.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use weft_core::{Environment, Error, RenderBackend, Result, ViewTag};

use crate::render_context::RenderContext;
use crate::turn::TurnQueue;

#[derive(Debug, Default)]
struct RemovalState {
    queue: Vec<ViewTag>,
    /// Ticket of the flush deferred for the open window, if any.
    scheduled: Option<u64>,
    next_ticket: u64,
    flushes: u64,
}

struct RegistryInner {
    state: RefCell<RemovalState>,
    turn: Rc<TurnQueue>,
    context: Arc<dyn RenderContext>,
    backend: Arc<dyn RenderBackend>,
    environment: Environment,
    dev_checks: bool,
}

/// Cheap to clone; clones share one queue.
#[derive(Clone)]
pub struct RemovalRegistry {
    inner: Rc<RegistryInner>,
}

impl std::fmt::Debug for RemovalRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemovalRegistry")
            .field("state", &self.inner.state.borrow())
            .field("backend", &self.inner.backend.name())
            .field("environment", &self.inner.environment)
            .field("dev_checks", &self.inner.dev_checks)
            .finish()
    }
}

impl RemovalRegistry {
    #[must_use]
    pub fn new(
        turn: Rc<TurnQueue>,
        context: Arc<dyn RenderContext>,
        backend: Arc<dyn RenderBackend>,
        environment: Environment,
        dev_checks: bool,
    ) -> Self {
        Self {
            inner: Rc::new(RegistryInner {
                state: RefCell::new(RemovalState::default()),
                turn,
                context,
                backend,
                environment,
                dev_checks,
            }),
        }
    }

    /// Queue `tag` for removal at the end of the current turn.
    pub fn schedule_removal(&self, tag: impl Into<ViewTag>) {
        let tag = tag.into();
        let ticket = {
            let mut state = self.inner.state.borrow_mut();
            state.queue.push(tag);
            if state.scheduled.is_some() {
                return;
            }
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            state.scheduled = Some(ticket);
            ticket
        };
        tracing::trace!(%tag, ticket, "removal window opened");

        let weak: Weak<RegistryInner> = Rc::downgrade(&self.inner);
        self.inner.turn.defer(move || {
            if let Some(inner) = weak.upgrade() {
                RemovalRegistry { inner }.run_scheduled(ticket);
            }
        });
    }

    fn run_scheduled(&self, ticket: u64) {
        if self.inner.state.borrow().scheduled != Some(ticket) {
            return;
        }
        match self.flush() {
            Ok(_) => {}
            Err(err) if err.is_configuration() => {
                tracing::error!(%err, "removal flush rejected");
                panic!("{err}");
            }
            Err(err) => tracing::warn!(%err, "removal batch dropped"),
        }
    }

    /// Dispatch everything queued so far as one batch. Returns the batch size.
    ///
    /// An empty queue dispatches nothing.
    pub fn flush(&self) -> Result<usize> {
        let inner = &self.inner;
        if inner.dev_checks && !self.has_props_registry() {
            inner.state.borrow_mut().scheduled = None;
            return Err(Error::BatchedRemovalUnsupported {
                backend: inner.backend.name().to_owned(),
                environment: inner.environment.to_string(),
            });
        }

        let batch = {
            let mut state = inner.state.borrow_mut();
            state.scheduled = None;
            if state.queue.is_empty() {
                return Ok(0);
            }
            state.flushes += 1;
            std::mem::take(&mut state.queue)
        };
        let size = batch.len();
        tracing::debug!(size, "flushing removal batch");

        let backend = Arc::clone(&inner.backend);
        inner
            .context
            .dispatch(Box::new(move || backend.remove_from_props_registry(&batch)))?;
        Ok(size)
    }

    /// Fabric renderer and a backend that can remove in batches.
    #[must_use]
    pub fn has_props_registry(&self) -> bool {
        self.inner.environment.is_fabric() && self.inner.backend.supports_batched_removal()
    }

    /// Tags queued in the open window.
    #[must_use]
    pub fn pending(&self) -> Vec<ViewTag> {
        self.inner.state.borrow().queue.clone()
    }

    /// Number of batches dispatched so far.
    #[must_use]
    pub fn flush_count(&self) -> u64 {
        self.inner.state.borrow().flushes
    }

    #[must_use]
    pub fn is_flush_scheduled(&self) -> bool {
        self.inner.state.borrow().scheduled.is_some()
    }
}
