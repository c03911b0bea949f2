#![forbid(unsafe_code)]

//! Observable cells: shared, thread-safe value holders with write notification.
//!
//! An [`ObservableCell<T>`] is the unit of reactive state. It can be read and
//! written from any thread; every write notifies the cell's subscribers.
//! Identity is allocation identity: two handles are "the same cell" iff they
//! were cloned from one another, regardless of the values they hold.
//!
//! # Design
//!
//! - Reads are lock-free: the value lives in an [`ArcSwap`], so a reader gets
//!   a consistent `Arc<T>` snapshot even while a writer is storing.
//! - Writes to one cell are serialized by a per-cell write gate. Subscribers
//!   are notified while the gate is held, so the notifications of two writes
//!   to the same cell never interleave or reorder.
//! - The subscriber list is snapshotted before callbacks run; subscribing or
//!   unsubscribing from inside a callback is allowed.
//!
//! # Invariants
//!
//! 1. `version()` increments by exactly 1 per write.
//! 2. Every write notifies every subscriber registered before the write began,
//!    in registration order.
//! 3. Dropping a [`Subscription`] removes its callback before the next write.
//! 4. Writes are not deduplicated: storing an equal value still notifies.
//!
//! # Failure Modes
//!
//! - **Writing the same cell from inside one of its own subscriber callbacks**
//!   deadlocks on the write gate. Callbacks are expected to schedule work,
//!   not write back synchronously.
//! - **Cell dropped while subscribed**: the [`Subscription`] becomes inert and
//!   dropping it is a no-op.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use arc_swap::ArcSwap;

static NEXT_CELL_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an observable cell, stable for the cell's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u64);

impl CellId {
    fn next() -> Self {
        Self(NEXT_CELL_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric id (diagnostics only).
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell#{}", self.0)
    }
}

/// Callback invoked after a write to a cell.
pub type Callback = Arc<dyn Fn() + Send + Sync>;

struct Subscriber {
    id: u64,
    callback: Callback,
}

/// Type-erased unsubscribe target, so [`Subscription`] is not generic.
trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self, id: u64);
}

struct CellInner<T> {
    id: CellId,
    value: ArcSwap<T>,
    version: AtomicU64,
    write_gate: Mutex<()>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_subscriber: AtomicU64,
}

impl<T: Send + Sync> Unsubscribe for CellInner<T> {
    fn unsubscribe(&self, id: u64) {
        lock(&self.subscribers).retain(|s| s.id != id);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A shared, observable value.
///
/// Cloning an `ObservableCell` creates a new handle to the **same** cell.
/// Equality is identity: `a == b` iff both handles point at one cell.
pub struct ObservableCell<T> {
    inner: Arc<CellInner<T>>,
}

impl<T> Clone for ObservableCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for ObservableCell<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Eq for ObservableCell<T> {}

impl<T: fmt::Debug> fmt::Debug for ObservableCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableCell")
            .field("id", &self.inner.id)
            .field("value", &**self.inner.value.load())
            .field("version", &self.inner.version.load(Ordering::Acquire))
            .finish()
    }
}

impl<T: Send + Sync + 'static> ObservableCell<T> {
    /// Create a cell holding `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(CellInner {
                id: CellId::next(),
                value: ArcSwap::from_pointee(value),
                version: AtomicU64::new(0),
                write_gate: Mutex::new(()),
                subscribers: Mutex::new(Vec::new()),
                next_subscriber: AtomicU64::new(1),
            }),
        }
    }

    /// Identity of this cell.
    #[must_use]
    pub fn id(&self) -> CellId {
        self.inner.id
    }

    /// Whether `self` and `other` are handles to the same cell.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Clone out the current value.
    #[must_use]
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        T::clone(&**self.inner.value.load())
    }

    /// Snapshot of the current value. Stays valid across later writes.
    #[must_use]
    pub fn load(&self) -> Arc<T> {
        self.inner.value.load_full()
    }

    /// Borrow the current value for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&**self.inner.value.load())
    }

    /// Store `value` and notify subscribers.
    pub fn set(&self, value: T) {
        let _gate = lock(&self.inner.write_gate);
        self.inner.value.store(Arc::new(value));
        self.inner.version.fetch_add(1, Ordering::AcqRel);
        self.notify();
    }

    /// Replace the value with `f(current)` and notify subscribers.
    ///
    /// Read and write happen under the write gate, so concurrent `update`s
    /// on one cell never lose each other's results.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let _gate = lock(&self.inner.write_gate);
        let next = f(&**self.inner.value.load());
        self.inner.value.store(Arc::new(next));
        self.inner.version.fetch_add(1, Ordering::AcqRel);
        self.notify();
    }

    /// Number of writes since creation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    /// Register `callback` to run after every subsequent write.
    ///
    /// The callback runs on the writing thread, with the cell's write gate
    /// held. The returned guard unsubscribes on drop.
    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.subscribe_callback(Arc::new(callback))
    }

    fn subscribe_callback(&self, callback: Callback) -> Subscription {
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.subscribers).push(Subscriber { id, callback });
        let weak: Weak<CellInner<T>> = Arc::downgrade(&self.inner);
        Subscription {
            cell: weak,
            id,
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.subscribers).len()
    }

    /// Type-erased handle for dependency tracking.
    #[must_use]
    pub fn dependency(&self) -> Dependency {
        Arc::new(self.clone())
    }

    fn notify(&self) {
        let callbacks: Vec<Callback> = lock(&self.inner.subscribers)
            .iter()
            .map(|s| Arc::clone(&s.callback))
            .collect();
        for callback in callbacks {
            callback();
        }
    }
}

/// RAII guard for a cell subscription. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cell: Weak<dyn Unsubscribe>,
    id: u64,
}

impl Subscription {
    /// Whether the subscribed cell is still alive.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.cell.strong_count() > 0
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("live", &self.is_live())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cell) = self.cell.upgrade() {
            cell.unsubscribe(self.id);
        }
    }
}

/// A cell viewed only as something that can be depended on.
///
/// Lets the dependency tracker hold cells of different value types side by
/// side.
pub trait Trackable: Send + Sync {
    /// Identity of the underlying cell.
    fn cell_id(&self) -> CellId;

    /// Subscribe `callback` to writes of the underlying cell.
    fn watch(&self, callback: Callback) -> Subscription;
}

impl<T: Send + Sync + 'static> Trackable for ObservableCell<T> {
    fn cell_id(&self) -> CellId {
        self.id()
    }

    fn watch(&self, callback: Callback) -> Subscription {
        self.subscribe_callback(callback)
    }
}

/// Shared, type-erased dependency handle.
pub type Dependency = Arc<dyn Trackable>;
