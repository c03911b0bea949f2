#![forbid(unsafe_code)]

//! Mapper scheduler: computations re-run on the render context when any of
//! their dependency cells is written.
//!
//! # Design
//!
//! A mapper is a boxed `FnMut` plus the cells it was registered with. The
//! scheduler subscribes (through the [`DependencyTracker`]) once per cell;
//! a write resolves the cell's dependents and dispatches one run job per
//! dependent to the [`RenderContext`]. Jobs look the mapper up again when they
//! execute, so a job queued before [`stop`](MapperScheduler::stop) finds
//! nothing and does nothing.
//!
//! # Invariants
//!
//! 1. `start` runs the computation once on the render context before it
//!    returns.
//! 2. Each write to a dependency dispatches exactly one run per dependent
//!    mapper. Runs for writes to one cell are dispatched in write order.
//! 3. After `stop(id)` returns, no run of `id` starts.
//! 4. Runs of one mapper never overlap.
//! 5. Dependencies are fixed at `start`; re-registration is stop + start and
//!    is the caller's job.
//!
//! # Failure Modes
//!
//! - **Render context closed**: the initial run is skipped with a warning and
//!   write-triggered runs are dropped with a warning. `start` still returns
//!   an id and `stop` still works.
//! - **Computation panics**: on a [`RenderThread`](crate::render_context::RenderThread)
//!   the panic is caught there; the mapper stays registered.
//! - **Mapper writes one of its own dependencies**: on an
//!   [`ImmediateContext`](crate::render_context::ImmediateContext) the write
//!   runs the mapper inline while the cell's write gate and the mapper's own
//!   compute lock are held, and deadlocks. On a `RenderThread` the run is
//!   queued instead, so the mapper re-runs once per such write and never
//!   settles unless the write is conditional.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use ahash::AHashMap;
use weft_core::cell::Callback;
use weft_core::{CellId, Dependency};

use crate::render_context::RenderContext;
use crate::tracker::DependencyTracker;

/// Identifier of a registered mapper. Never reused within a scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MapperId(u64);

impl MapperId {
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MapperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mapper#{}", self.0)
    }
}

/// A mapper computation.
pub type Compute = Box<dyn FnMut() + Send + 'static>;

struct MapperEntry {
    compute: Arc<Mutex<Compute>>,
    runs: Arc<AtomicU64>,
}

#[derive(Default)]
struct SchedulerState {
    tracker: DependencyTracker,
    mappers: AHashMap<MapperId, MapperEntry>,
}

struct SchedulerShared {
    state: Mutex<SchedulerState>,
    context: Arc<dyn RenderContext>,
    next_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns mapper lifecycles. Cloning gives another handle to the same scheduler.
#[derive(Clone)]
pub struct MapperScheduler {
    shared: Arc<SchedulerShared>,
}

impl fmt::Debug for MapperScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.shared.state);
        f.debug_struct("MapperScheduler")
            .field("active", &state.mappers.len())
            .field("tracker", &state.tracker)
            .finish()
    }
}

impl MapperScheduler {
    /// Create a scheduler whose mappers run on `context`.
    #[must_use]
    pub fn new(context: Arc<dyn RenderContext>) -> Self {
        Self {
            shared: Arc::new(SchedulerShared {
                state: Mutex::new(SchedulerState::default()),
                context,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// The render context mappers run on.
    #[must_use]
    pub fn context(&self) -> &Arc<dyn RenderContext> {
        &self.shared.context
    }

    /// Register `compute` to run now and after every write to `dependencies`.
    ///
    /// Blocks until the initial run has completed on the render context.
    pub fn start(
        &self,
        compute: impl FnMut() + Send + 'static,
        dependencies: Vec<Dependency>,
    ) -> MapperId {
        let id = MapperId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let weak = Arc::downgrade(&self.shared);
        {
            let mut state = lock(&self.shared.state);
            state.mappers.insert(
                id,
                MapperEntry {
                    compute: Arc::new(Mutex::new(Box::new(compute))),
                    runs: Arc::new(AtomicU64::new(0)),
                },
            );
            state
                .tracker
                .track(id, &dependencies, |cell| write_callback(&weak, cell));
        }
        tracing::debug!(%id, dependencies = dependencies.len(), "mapper started");

        let shared = Arc::clone(&self.shared);
        if let Err(err) = self
            .shared
            .context
            .dispatch_sync(Box::new(move || shared.run(id)))
        {
            tracing::warn!(%id, %err, "initial mapper run skipped");
        }
        id
    }

    /// Unregister `id`. Unknown or already-stopped ids are ignored.
    ///
    /// Returns whether a mapper was removed.
    pub fn stop(&self, id: MapperId) -> bool {
        let removed = {
            let mut state = lock(&self.shared.state);
            let entry = state.mappers.remove(&id);
            state.tracker.untrack(id);
            entry
        };
        match removed {
            Some(entry) => {
                tracing::debug!(%id, runs = entry.runs.load(Ordering::Relaxed), "mapper stopped");
                true
            }
            None => false,
        }
    }

    /// Whether `id` is registered.
    #[must_use]
    pub fn is_active(&self, id: MapperId) -> bool {
        lock(&self.shared.state).mappers.contains_key(&id)
    }

    /// Number of registered mappers.
    #[must_use]
    pub fn active_count(&self) -> usize {
        lock(&self.shared.state).mappers.len()
    }

    /// Completed runs of `id`, or `None` once it is stopped.
    #[must_use]
    pub fn run_count(&self, id: MapperId) -> Option<u64> {
        lock(&self.shared.state)
            .mappers
            .get(&id)
            .map(|entry| entry.runs.load(Ordering::Acquire))
    }

    /// Mappers that re-run when `cell` is written, in registration order.
    #[must_use]
    pub fn dependents_of(&self, cell: CellId) -> Vec<MapperId> {
        lock(&self.shared.state).tracker.dependents(cell).to_vec()
    }

    /// Cells `id` depends on.
    #[must_use]
    pub fn dependencies_of(&self, id: MapperId) -> Option<Vec<CellId>> {
        lock(&self.shared.state)
            .tracker
            .dependencies(id)
            .map(<[CellId]>::to_vec)
    }
}

/// Subscription callback for `cell`: dispatch a run for every dependent.
fn write_callback(weak: &Weak<SchedulerShared>, cell: CellId) -> Callback {
    let weak = Weak::clone(weak);
    Arc::new(move || {
        if let Some(shared) = weak.upgrade() {
            shared.on_write(cell);
        }
    })
}

impl SchedulerShared {
    fn on_write(self: &Arc<Self>, cell: CellId) {
        // Copy out and release the lock: an inline context runs jobs right here.
        let dependents = lock(&self.state).tracker.dependents(cell).to_vec();
        for id in dependents {
            let shared = Arc::clone(self);
            if let Err(err) = self.context.dispatch(Box::new(move || shared.run(id))) {
                tracing::warn!(%id, %cell, %err, "dropping mapper run");
            }
        }
    }

    fn run(&self, id: MapperId) {
        let entry = lock(&self.state)
            .mappers
            .get(&id)
            .map(|entry| (Arc::clone(&entry.compute), Arc::clone(&entry.runs)));
        let Some((compute, runs)) = entry else {
            tracing::trace!(%id, "skipping run of stopped mapper");
            return;
        };
        let mut compute = lock(&compute);
        tracing::trace!(%id, "mapper run");
        (*compute)();
        runs.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_context::{ImmediateContext, ManualContext};
    use std::sync::atomic::AtomicUsize;
    use weft_core::ObservableCell;

    fn immediate() -> MapperScheduler {
        MapperScheduler::new(Arc::new(ImmediateContext))
    }

    fn counter() -> (Arc<AtomicUsize>, impl FnMut() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn start_runs_once_before_returning() {
        let scheduler = immediate();
        let (count, compute) = counter();
        let id = scheduler.start(compute, vec![]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.run_count(id), Some(1));
    }

    #[test]
    fn write_reruns_mapper() {
        let scheduler = immediate();
        let cell = ObservableCell::new(0);
        let (count, compute) = counter();
        let id = scheduler.start(compute, vec![cell.dependency()]);
        cell.set(1);
        cell.set(2);
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.run_count(id), Some(3));
    }

    #[test]
    fn ids_are_fresh() {
        let scheduler = immediate();
        let a = scheduler.start(|| {}, vec![]);
        let b = scheduler.start(|| {}, vec![]);
        assert_ne!(a, b);
    }

    #[test]
    fn empty_dependencies_never_rerun() {
        let scheduler = immediate();
        let unrelated = ObservableCell::new(0);
        let (count, compute) = counter();
        scheduler.start(compute, vec![]);
        unrelated.set(1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_is_idempotent_and_final() {
        let scheduler = immediate();
        let cell = ObservableCell::new(0);
        let (count, compute) = counter();
        let id = scheduler.start(compute, vec![cell.dependency()]);
        assert!(scheduler.stop(id));
        assert!(!scheduler.stop(id));
        assert!(!scheduler.stop(MapperId::from_raw(12345)));
        cell.set(1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(cell.subscriber_count(), 0);
        assert_eq!(scheduler.run_count(id), None);
    }

    #[test]
    fn queued_run_after_stop_is_skipped() {
        let ctx = Arc::new(ManualContext::new());
        let scheduler = MapperScheduler::new(ctx.clone());
        let cell = ObservableCell::new(0);
        let (count, compute) = counter();
        let id = scheduler.start(compute, vec![cell.dependency()]);
        cell.set(1);
        assert_eq!(ctx.pending(), 1);
        scheduler.stop(id);
        ctx.run_pending();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shared_cell_runs_dependents_in_registration_order() {
        let scheduler = immediate();
        let cell = ObservableCell::new(0);
        let log = Arc::new(Mutex::new(Vec::new()));
        let ids: Vec<_> = (0..3)
            .map(|i| {
                let log = Arc::clone(&log);
                scheduler.start(move || log.lock().unwrap().push(i), vec![cell.dependency()])
            })
            .collect();
        log.lock().unwrap().clear();
        cell.set(1);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(scheduler.dependents_of(cell.id()), ids);
    }

    #[test]
    fn multiple_cells_each_trigger() {
        let scheduler = immediate();
        let a = ObservableCell::new(0);
        let b = ObservableCell::new(0);
        let (count, compute) = counter();
        let id = scheduler.start(compute, vec![a.dependency(), b.dependency()]);
        a.set(1);
        b.set(1);
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.dependencies_of(id), Some(vec![a.id(), b.id()]));
    }

    #[test]
    fn mapper_reads_latest_value() {
        let scheduler = immediate();
        let cell = ObservableCell::new(1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (c, s) = (cell.clone(), Arc::clone(&seen));
        scheduler.start(move || s.lock().unwrap().push(c.get()), vec![cell.dependency()]);
        cell.set(2);
        cell.set(3);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn dropping_scheduler_leaves_cells_writable() {
        let cell = ObservableCell::new(0);
        {
            let scheduler = immediate();
            scheduler.start(|| {}, vec![cell.dependency()]);
        }
        cell.set(1);
        assert_eq!(cell.get(), 1);
    }
}
