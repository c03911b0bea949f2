#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use weft_core::{ComponentRef, Environment, PropMap, PropValue, SharedValue, ViewInfo};
use weft_harness::RecordingBackend;
use weft_runtime::{ImmediateContext, InlinePropManager, MapperScheduler, extract_reactive_props};

const MAX_DEPTH: usize = 6;

#[derive(Arbitrary, Debug)]
enum FuzzValue {
    Null,
    Undefined,
    Bool(bool),
    Number(f64),
    Text(String),
    Cell(Box<FuzzValue>),
    /// Reuse the n-th cell created so far.
    SharedCell(u8),
    Sequence(Vec<FuzzValue>),
    Mapping(Vec<(u8, FuzzValue)>),
}

impl FuzzValue {
    fn build(&self, depth: usize, cells: &mut Vec<SharedValue>) -> PropValue {
        if depth > MAX_DEPTH {
            return PropValue::null();
        }
        match self {
            Self::Null => PropValue::null(),
            Self::Undefined => PropValue::undefined(),
            Self::Bool(b) => PropValue::from(*b),
            // NaN never equals itself, which would make every pass look changed.
            Self::Number(n) => PropValue::from(if n.is_nan() { 0.0 } else { *n }),
            Self::Text(s) => PropValue::from(s.as_str()),
            Self::Cell(inner) => {
                let cell = PropValue::cell(inner.build(depth + 1, cells));
                cells.push(cell.clone());
                PropValue::from(cell)
            }
            Self::SharedCell(n) => match cells.get(usize::from(*n) % cells.len().max(1)) {
                Some(cell) => PropValue::from(cell),
                None => PropValue::undefined(),
            },
            Self::Sequence(items) => {
                PropValue::Sequence(items.iter().map(|i| i.build(depth + 1, cells)).collect())
            }
            Self::Mapping(entries) => PropValue::Mapping(
                entries
                    .iter()
                    .map(|(k, v)| (key(*k), v.build(depth + 1, cells)))
                    .collect(),
            ),
        }
    }
}

/// Small key space so `style`, `transform`, and collisions show up often.
fn key(k: u8) -> String {
    match k % 8 {
        0 => String::from("style"),
        1 => String::from("transform"),
        n => format!("k{n}"),
    }
}

#[derive(Arbitrary, Debug)]
struct Input {
    props: Vec<(u8, FuzzValue)>,
    writes: Vec<(u8, f64)>,
}

fuzz_target!(|input: Input| {
    let mut cells = Vec::new();
    let props: PropMap = input
        .props
        .iter()
        .take(32)
        .map(|(k, v)| (key(*k), v.build(0, &mut cells)))
        .collect();

    let reactive = extract_reactive_props(&props);
    assert!(!reactive.has_changed(&extract_reactive_props(&props)));

    let backend = Arc::new(RecordingBackend::new());
    let scheduler = MapperScheduler::new(Arc::new(ImmediateContext));
    let mut manager = InlinePropManager::new(scheduler.clone(), backend.clone(), Environment::default());
    let view = ViewInfo::new(1, "RCTView", ComponentRef(1));

    let rewired = manager.attach(&props, &view);
    assert_eq!(rewired, !reactive.is_empty());
    assert!(!manager.attach(&props, &view));
    assert!(scheduler.active_count() <= 1);

    for (n, value) in input.writes.iter().take(64) {
        if let Some(cell) = cells.get(usize::from(*n) % cells.len().max(1)) {
            cell.set(PropValue::from(*value));
        }
    }

    manager.detach();
    let before = backend.update_count();
    for cell in &cells {
        cell.set(PropValue::null());
    }
    assert_eq!(backend.update_count(), before);
    assert_eq!(scheduler.active_count(), 0);
});
