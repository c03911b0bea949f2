#![forbid(unsafe_code)]

//! End-of-turn task queue for the control context.
//!
//! The control context runs in turns: a host event handler, a reconciliation
//! pass, and so on. Work deferred during a turn runs when the host calls
//! [`TurnQueue::end_turn`], after the current turn's synchronous work and
//! before the next turn starts.
//!
//! The queue is single-threaded (`Rc`), like the control context itself.
//!
//! # Invariants
//!
//! 1. Tasks run in the order they were deferred.
//! 2. Tasks deferred while draining run in the same `end_turn` call.
//! 3. A nested `end_turn` (from inside a task) is a no-op returning 0.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

/// A task deferred to the end of the current turn.
pub type TurnTask = Box<dyn FnOnce() + 'static>;

#[derive(Default)]
pub struct TurnQueue {
    tasks: RefCell<VecDeque<TurnTask>>,
    draining: Cell<bool>,
}

impl std::fmt::Debug for TurnQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnQueue")
            .field("pending", &self.pending())
            .field("draining", &self.draining.get())
            .finish()
    }
}

impl TurnQueue {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Run `task` at the end of the current turn.
    pub fn defer(&self, task: impl FnOnce() + 'static) {
        self.tasks.borrow_mut().push_back(Box::new(task));
    }

    /// Run every deferred task, including ones deferred meanwhile.
    ///
    /// Returns how many tasks ran.
    pub fn end_turn(&self) -> usize {
        if self.draining.replace(true) {
            return 0;
        }
        let _reset = DrainGuard(&self.draining);
        let mut ran = 0;
        loop {
            // The borrow ends before the task runs so it can defer more work.
            let next = self.tasks.borrow_mut().pop_front();
            let Some(task) = next else { break };
            task();
            ran += 1;
        }
        ran
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.draining.get()
    }
}

/// Clears the draining flag even if a task panics.
struct DrainGuard<'a>(&'a Cell<bool>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_in_defer_order() {
        let queue = TurnQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let log = Rc::clone(&log);
            queue.defer(move || log.borrow_mut().push(i));
        }
        assert_eq!(queue.pending(), 3);
        assert_eq!(queue.end_turn(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn tasks_deferred_while_draining_run_in_same_turn() {
        let queue = TurnQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let inner_queue = Rc::clone(&queue);
            let log = Rc::clone(&log);
            queue.defer(move || {
                log.borrow_mut().push("outer");
                let log = Rc::clone(&log);
                inner_queue.defer(move || log.borrow_mut().push("inner"));
            });
        }
        assert_eq!(queue.end_turn(), 2);
        assert_eq!(*log.borrow(), vec!["outer", "inner"]);
    }

    #[test]
    fn nested_end_turn_is_noop() {
        let queue = TurnQueue::new();
        let nested = Rc::new(Cell::new(usize::MAX));
        {
            let q = Rc::clone(&queue);
            let nested = Rc::clone(&nested);
            queue.defer(move || nested.set(q.end_turn()));
        }
        queue.end_turn();
        assert_eq!(nested.get(), 0);
        assert!(!queue.is_draining());
    }

    #[test]
    fn empty_turn() {
        assert_eq!(TurnQueue::new().end_turn(), 0);
    }
}
