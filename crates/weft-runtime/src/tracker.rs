#![forbid(unsafe_code)]

//! Dependency tracking between mappers and the cells they read.
//!
//! The tracker keeps a forward index (mapper → cells) and a reverse index
//! (cell → dependents, in registration order). Each tracked cell holds exactly
//! one [`Subscription`], shared by all its dependents; it is dropped when the
//! last dependent is untracked.
//!
//! The tracker does not run anything itself. The subscription callback is
//! supplied by the owner (the scheduler), which resolves dependents through
//! [`DependencyTracker::dependents`] when a cell is written.

use ahash::AHashMap;
use weft_core::cell::Callback;
use weft_core::{CellId, Dependency, Subscription};

use crate::scheduler::MapperId;

struct TrackedCell {
    _subscription: Subscription,
    dependents: Vec<MapperId>,
}

#[derive(Default)]
pub struct DependencyTracker {
    cells: AHashMap<CellId, TrackedCell>,
    mappers: AHashMap<MapperId, Vec<CellId>>,
}

impl std::fmt::Debug for DependencyTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyTracker")
            .field("cells", &self.cells.len())
            .field("mappers", &self.mappers.len())
            .finish()
    }
}

impl DependencyTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `mapper` depends on `dependencies`.
    ///
    /// Duplicate cells are collapsed, so one write triggers one run. Cells not
    /// yet tracked are subscribed with the callback produced by `watch`.
    /// Tracking an already-tracked mapper replaces nothing: callers must
    /// [`untrack`](Self::untrack) first.
    pub fn track(
        &mut self,
        mapper: MapperId,
        dependencies: &[Dependency],
        mut watch: impl FnMut(CellId) -> Callback,
    ) {
        debug_assert!(
            !self.mappers.contains_key(&mapper),
            "{mapper} is already tracked"
        );
        let mut ids = Vec::with_capacity(dependencies.len());
        for dependency in dependencies {
            let cell = dependency.cell_id();
            if ids.contains(&cell) {
                continue;
            }
            ids.push(cell);
            self.cells
                .entry(cell)
                .or_insert_with(|| TrackedCell {
                    _subscription: dependency.watch(watch(cell)),
                    dependents: Vec::new(),
                })
                .dependents
                .push(mapper);
        }
        self.mappers.insert(mapper, ids);
    }

    /// Forget `mapper`. Returns whether it was tracked.
    pub fn untrack(&mut self, mapper: MapperId) -> bool {
        let Some(ids) = self.mappers.remove(&mapper) else {
            return false;
        };
        for cell in ids {
            let now_unused = match self.cells.get_mut(&cell) {
                Some(tracked) => {
                    tracked.dependents.retain(|m| *m != mapper);
                    tracked.dependents.is_empty()
                }
                None => false,
            };
            if now_unused {
                self.cells.remove(&cell);
            }
        }
        true
    }

    /// Mappers depending on `cell`, in registration order.
    #[must_use]
    pub fn dependents(&self, cell: CellId) -> &[MapperId] {
        self.cells
            .get(&cell)
            .map_or(&[][..], |tracked| tracked.dependents.as_slice())
    }

    /// Cells `mapper` depends on, or `None` if it is not tracked.
    #[must_use]
    pub fn dependencies(&self, mapper: MapperId) -> Option<&[CellId]> {
        self.mappers.get(&mapper).map(Vec::as_slice)
    }

    /// Number of cells with at least one dependent.
    #[must_use]
    pub fn tracked_cells(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn tracked_mappers(&self) -> usize {
        self.mappers.len()
    }
}
