#![forbid(unsafe_code)]

//! View descriptor sets: the render-tree nodes a mapper's output goes to.
//!
//! A set is written on the control context (during reconciliation) and read
//! on the render context (by mapper runs). Contents are published
//! copy-on-write through an [`ArcSwap`], so a snapshot taken for one sink
//! call never changes underneath it, even if the set is extended meanwhile.

use std::sync::Arc;

use arc_swap::ArcSwap;
use weft_core::{ViewDescriptor, ViewTag};

/// Immutable view of a set's contents at one point in time.
pub type DescriptorSnapshot = Arc<Vec<ViewDescriptor>>;

/// Append-only collection of [`ViewDescriptor`]s.
///
/// Duplicate tags are kept; deduplication is the caller's business.
pub struct ViewDescriptorSet {
    items: ArcSwap<Vec<ViewDescriptor>>,
}

impl Default for ViewDescriptorSet {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ViewDescriptorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.items.load().iter()).finish()
    }
}

impl ViewDescriptorSet {
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn add(&self, descriptor: ViewDescriptor) {
        self.items.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(descriptor.clone());
            next
        });
    }

    /// Current contents. Later `add`s do not affect the returned snapshot.
    #[must_use]
    pub fn snapshot(&self) -> DescriptorSnapshot {
        self.items.load_full()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.load().is_empty()
    }

    #[must_use]
    pub fn tags(&self) -> Vec<ViewTag> {
        self.items.load().iter().map(|d| d.tag).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn starts_empty() {
        let set = ViewDescriptorSet::new();
        assert!(set.is_empty());
        assert!(set.snapshot().is_empty());
    }

    #[test]
    fn snapshot_is_isolated_from_later_adds() {
        let set = ViewDescriptorSet::new();
        set.add(ViewDescriptor::new(1, "View"));
        let snap = set.snapshot();
        set.add(ViewDescriptor::new(2, "Text"));
        assert_eq!(snap.len(), 1);
        assert_eq!(set.len(), 2);
        assert_eq!(set.tags(), vec![ViewTag(1), ViewTag(2)]);
    }

    #[test]
    fn duplicates_are_kept() {
        let set = ViewDescriptorSet::new();
        set.add(ViewDescriptor::new(7, "View"));
        set.add(ViewDescriptor::new(7, "View"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn readers_never_see_torn_snapshots() {
        let set = Arc::new(ViewDescriptorSet::new());
        let reader = {
            let set = Arc::clone(&set);
            thread::spawn(move || {
                for _ in 0..2_000 {
                    let snap = set.snapshot();
                    // Tags are appended in order 0, 1, 2, ...
                    for (i, d) in snap.iter().enumerate() {
                        assert_eq!(d.tag, ViewTag(i as i32));
                    }
                }
            })
        };
        for i in 0..200 {
            set.add(ViewDescriptor::new(i, "View"));
        }
        reader.join().unwrap();
        assert_eq!(set.len(), 200);
    }
}
