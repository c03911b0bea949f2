//! Property-based invariant tests for inline property reconciliation.
//!
//! For any generated style bag:
//!
//! 1. The reactive set is exactly the keys whose final binding is a cell.
//! 2. Re-attaching the same bag is a no-op (no rewiring, no runs).
//! 3. Rebinding a reactive key rewires, leaving exactly one active mapper.
//! 4. Every write produces one payload; the last payload holds the last value.
//! 5. Detaching leaves no subscriptions behind.

use std::sync::Arc;

use proptest::prelude::*;
use weft_core::{
    ComponentRef, Environment, PlainValue, PropMap, PropValue, SharedValue, ViewInfo, prop_map,
};
use weft_harness::RecordingBackend;
use weft_runtime::{ImmediateContext, InlinePropManager, MapperScheduler, extract_reactive_props};

// ── Helpers ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug)]
enum Slot {
    Plain(i32),
    Reactive(i32),
    Null,
}

fn slot() -> impl Strategy<Value = Slot> {
    prop_oneof![
        (0i32..100).prop_map(Slot::Plain),
        (0i32..100).prop_map(Slot::Reactive),
        Just(Slot::Null),
    ]
}

/// (key index, slot) pairs; repeated keys overwrite earlier ones.
fn bag() -> impl Strategy<Value = Vec<(u8, Slot)>> {
    proptest::collection::vec((0u8..8, slot()), 0..24)
}

struct Built {
    style: PropMap,
    cells: Vec<(String, SharedValue)>,
}

fn build(entries: &[(u8, Slot)]) -> Built {
    let mut style = PropMap::default();
    for &(key, slot) in entries {
        let value = match slot {
            Slot::Plain(n) => PropValue::from(n),
            Slot::Reactive(n) => PropValue::from(PropValue::cell(n)),
            Slot::Null => PropValue::null(),
        };
        style.insert(format!("k{key}"), value);
    }
    let cells = style
        .iter()
        .filter_map(|(key, value)| value.as_cell().map(|cell| (key.clone(), cell.clone())))
        .collect();
    Built { style, cells }
}

fn attached(style: &PropMap) -> (Arc<RecordingBackend>, MapperScheduler, InlinePropManager) {
    let backend = Arc::new(RecordingBackend::new());
    let scheduler = MapperScheduler::new(Arc::new(ImmediateContext));
    let mut manager =
        InlinePropManager::new(scheduler.clone(), backend.clone(), Environment::default());
    manager.attach(
        &prop_map! { "style" => style.clone() },
        &ViewInfo::new(1, "RCTView", ComponentRef(1)),
    );
    (backend, scheduler, manager)
}

// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn reactive_set_is_exactly_the_cells(entries in bag()) {
        let built = build(&entries);
        let reactive = extract_reactive_props(&prop_map! { "style" => built.style.clone() });
        let expected: Vec<&str> = built.cells.iter().map(|(key, _)| key.as_str()).collect();
        prop_assert_eq!(reactive.keys().collect::<Vec<_>>(), expected);
        prop_assert_eq!(reactive.dependencies().len(), built.cells.len());
    }

    #[test]
    fn reattach_is_noop(entries in bag()) {
        let built = build(&entries);
        let (backend, scheduler, mut manager) = attached(&built.style);
        let updates = backend.update_count();
        let runs = manager.mapper_id().and_then(|id| scheduler.run_count(id));

        let again = manager.attach(
            &prop_map! { "style" => built.style.clone() },
            &ViewInfo::new(1, "RCTView", ComponentRef(1)),
        );
        prop_assert!(!again);
        prop_assert_eq!(backend.update_count(), updates);
        prop_assert_eq!(manager.mapper_id().and_then(|id| scheduler.run_count(id)), runs);
        prop_assert_eq!(manager.mapper_id().is_some(), !built.cells.is_empty());
    }

    #[test]
    fn rebinding_keeps_one_mapper(entries in bag(), pick in any::<prop::sample::Index>()) {
        let built = build(&entries);
        prop_assume!(!built.cells.is_empty());
        let (_backend, scheduler, mut manager) = attached(&built.style);

        let (key, _) = &built.cells[pick.index(built.cells.len())];
        let mut rebound = built.style.clone();
        rebound.insert(key.clone(), PropValue::from(PropValue::cell(-1)));
        let rewired = manager.attach(
            &prop_map! { "style" => rebound },
            &ViewInfo::new(1, "RCTView", ComponentRef(1)),
        );
        prop_assert!(rewired);
        prop_assert_eq!(scheduler.active_count(), 1);
        prop_assert_eq!(manager.rewire_count(), 2);
    }

    #[test]
    fn writes_push_in_order(
        entries in bag(),
        pick in any::<prop::sample::Index>(),
        writes in proptest::collection::vec(0i32..1000, 1..16),
    ) {
        let built = build(&entries);
        prop_assume!(!built.cells.is_empty());
        let (backend, _scheduler, _manager) = attached(&built.style);
        let (key, cell) = &built.cells[pick.index(built.cells.len())];
        let before = backend.update_count();

        for value in &writes {
            cell.set(PropValue::from(*value));
        }
        prop_assert_eq!(backend.update_count(), before + writes.len());
        let last = backend.last_update().unwrap();
        let expected = PlainValue::from(*writes.last().unwrap());
        prop_assert_eq!(last.payload.get(key.as_str()), Some(&expected));
    }

    #[test]
    fn detach_releases_subscriptions(entries in bag()) {
        let built = build(&entries);
        let (backend, scheduler, mut manager) = attached(&built.style);
        manager.detach();
        let before = backend.update_count();
        for (_, cell) in &built.cells {
            prop_assert_eq!(cell.subscriber_count(), 0);
            cell.set(PropValue::from(0));
        }
        prop_assert_eq!(backend.update_count(), before);
        prop_assert_eq!(scheduler.active_count(), 0);
    }
}
