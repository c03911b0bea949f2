#![forbid(unsafe_code)]

//! Inline property reconciliation.
//!
//! On every property-bag update of a component, [`InlinePropManager::attach`]
//! decides whether the component's reactive wiring must be rebuilt.
//!
//! # Algorithm
//!
//! 1. Extract the reactive properties ([`extract_reactive_props`]):
//!    - `style` is flattened (nested sequences, null fragments skipped) into
//!      ordered fragments; a fragment entry is reactive if its value is a
//!      cell, or if it is `transform` and some element of the transform
//!      sequence is a mapping holding a cell at any depth. Later fragments
//!      win.
//!    - Any other top-level property is reactive iff its value is a cell.
//! 2. Compare with the previous pass: changed iff the key counts differ or
//!    some key's binding differs. Cells compare by identity, never by value,
//!    so writing a cell never causes rewiring; binding a *different* cell to
//!    a key does.
//! 3. Unchanged: nothing happens.
//! 4. Changed: create the descriptor set on first use (adapting the view
//!    config once), stop the previous mapper, and start a new one if there is
//!    anything reactive. The mapper materializes every reactive property and
//!    pushes the payload through [`RenderBackend::update_props`].
//!
//! # Invariants
//!
//! 1. At most one mapper is active per manager; the old one is stopped before
//!    the new one starts.
//! 2. The descriptor set is created at most once per attachment.
//! 3. An unchanged pass performs no mapper runs.

use std::sync::Arc;

use weft_core::value::materialize_map;
use weft_core::{
    Dependency, Environment, PlainMap, PropMap, PropValue, RenderBackend, ViewInfo, ViewRefSet,
};

use crate::descriptors::ViewDescriptorSet;
use crate::scheduler::{MapperId, MapperScheduler};

pub const STYLE_KEY: &str = "style";
pub const TRANSFORM_KEY: &str = "transform";

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Flatten a `style` value into its mapping fragments, in order.
///
/// Sequences are flattened recursively. Null, undefined, and non-mapping
/// leaves (e.g. `false` from a conditional style) are skipped.
#[must_use]
pub fn flatten_style(style: &PropValue) -> Vec<&PropMap> {
    let mut fragments = Vec::new();
    collect_fragments(style, &mut fragments);
    fragments
}

fn collect_fragments<'a>(value: &'a PropValue, out: &mut Vec<&'a PropMap>) {
    match value {
        PropValue::Mapping(map) => out.push(map),
        PropValue::Sequence(items) => {
            for item in items {
                collect_fragments(item, out);
            }
        }
        PropValue::Scalar(_) | PropValue::Cell(_) => {}
    }
}

/// Whether `value` is a transform sequence with an element holding a cell,
/// at any depth.
#[must_use]
pub fn is_inline_transform(value: &PropValue) -> bool {
    value.as_sequence().is_some_and(|items| {
        items.iter().any(|item| {
            item.as_mapping()
                .is_some_and(|op| op.values().any(PropValue::contains_cell))
        })
    })
}

fn is_reactive_entry(key: &str, value: &PropValue) -> bool {
    value.is_cell() || (key == TRANSFORM_KEY && is_inline_transform(value))
}

/// Whether a style fragment has at least one reactive entry.
#[must_use]
pub fn has_inline_styles(style: &PropMap) -> bool {
    style
        .iter()
        .any(|(key, value)| is_reactive_entry(key, value))
}

/// The whole fragment with every cell read: the style to render first.
#[must_use]
pub fn initial_inline_style(style: &PropMap) -> PlainMap {
    materialize_map(style)
}

/// The fragment minus its reactive entries: what the declarative path keeps.
#[must_use]
pub fn static_style(style: &PropMap) -> PropMap {
    style
        .iter()
        .filter(|(key, value)| !is_reactive_entry(key, value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// The reactive subset of a property bag.
#[must_use]
pub fn extract_reactive_props(props: &PropMap) -> ReactivePropertyMap {
    let mut entries = PropMap::default();
    for (key, value) in props {
        if key == STYLE_KEY {
            for fragment in flatten_style(value) {
                for (style_key, style_value) in fragment {
                    if is_reactive_entry(style_key, style_value) {
                        entries.insert(style_key.clone(), style_value.clone());
                    }
                }
            }
        } else if value.is_cell() {
            entries.insert(key.clone(), value.clone());
        }
    }
    ReactivePropertyMap { entries }
}

// ---------------------------------------------------------------------------
// ReactivePropertyMap
// ---------------------------------------------------------------------------

/// Property key → reactive binding (a cell, or a transform holding cells).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReactivePropertyMap {
    entries: PropMap,
}

impl ReactivePropertyMap {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Shallow comparison against the previous pass.
    ///
    /// Only key presence and binding identity are compared. Cell values are
    /// never looked at.
    #[must_use]
    pub fn has_changed(&self, previous: &Self) -> bool {
        if self.len() != previous.len() {
            return true;
        }
        self.entries
            .iter()
            .any(|(key, value)| previous.entries.get(key).is_none_or(|prev| prev != value))
    }

    /// Every cell bound in the map, looking inside composites but not inside
    /// cells. In key order, duplicates kept.
    #[must_use]
    pub fn dependencies(&self) -> Vec<Dependency> {
        let mut out = Vec::new();
        for value in self.entries.values() {
            collect_cells(value, &mut out);
        }
        out
    }

    /// Read every binding into a plain payload.
    #[must_use]
    pub fn materialize(&self) -> PlainMap {
        materialize_map(&self.entries)
    }
}

fn collect_cells(value: &PropValue, out: &mut Vec<Dependency>) {
    match value {
        PropValue::Cell(cell) => out.push(cell.dependency()),
        PropValue::Sequence(items) => items.iter().for_each(|item| collect_cells(item, out)),
        PropValue::Mapping(map) => map.values().for_each(|item| collect_cells(item, out)),
        PropValue::Scalar(_) => {}
    }
}

// ---------------------------------------------------------------------------
// InlinePropManager
// ---------------------------------------------------------------------------

/// Per-attachment reactive wiring for one component instance.
///
/// Dropping the manager detaches it.
pub struct InlinePropManager {
    scheduler: MapperScheduler,
    backend: Arc<dyn RenderBackend>,
    environment: Environment,
    descriptors: Option<Arc<ViewDescriptorSet>>,
    mapper: Option<MapperId>,
    previous: ReactivePropertyMap,
    rewires: u64,
}

impl std::fmt::Debug for InlinePropManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InlinePropManager")
            .field("mapper", &self.mapper)
            .field("reactive", &self.previous.keys().collect::<Vec<_>>())
            .field("descriptors", &self.descriptors)
            .field("rewires", &self.rewires)
            .finish()
    }
}

impl InlinePropManager {
    #[must_use]
    pub fn new(
        scheduler: MapperScheduler,
        backend: Arc<dyn RenderBackend>,
        environment: Environment,
    ) -> Self {
        Self {
            scheduler,
            backend,
            environment,
            descriptors: None,
            mapper: None,
            previous: ReactivePropertyMap::default(),
            rewires: 0,
        }
    }

    /// Reconcile against the component's current property bag.
    ///
    /// Returns whether the wiring was rebuilt.
    pub fn attach(&mut self, props: &PropMap, view: &ViewInfo) -> bool {
        let next = extract_reactive_props(props);
        if !next.has_changed(&self.previous) {
            return false;
        }

        let descriptors = self.ensure_descriptors(&next, view);
        let view_refs = self
            .environment
            .should_use_web()
            .then(|| ViewRefSet::single(view.component));

        if let Some(old) = self.mapper.take() {
            self.scheduler.stop(old);
        }
        if !next.is_empty() {
            let bindings = next.clone();
            let backend = Arc::clone(&self.backend);
            let dependencies = next.dependencies();
            let id = self.scheduler.start(
                move || {
                    let payload = bindings.materialize();
                    let snapshot = descriptors.snapshot();
                    backend.update_props(&snapshot, &payload, view_refs.as_ref());
                },
                dependencies,
            );
            self.mapper = Some(id);
        }

        tracing::debug!(
            tag = %view.tag,
            reactive = next.len(),
            mapper = ?self.mapper,
            "inline props rewired"
        );
        self.previous = next;
        self.rewires += 1;
        true
    }

    fn ensure_descriptors(
        &mut self,
        next: &ReactivePropertyMap,
        view: &ViewInfo,
    ) -> Arc<ViewDescriptorSet> {
        let backend = &self.backend;
        let set = self.descriptors.get_or_insert_with(|| {
            if !next.is_empty()
                && let Some(config) = &view.config
            {
                backend.adapt_view_config(config);
            }
            let set = ViewDescriptorSet::new();
            set.add(view.descriptor());
            Arc::new(set)
        });
        Arc::clone(set)
    }

    /// Stop the active mapper, if any, and discard the descriptor set. Safe
    /// to call repeatedly; a later `attach` starts a fresh attachment.
    pub fn detach(&mut self) {
        if let Some(id) = self.mapper.take() {
            self.scheduler.stop(id);
            tracing::debug!(mapper = %id, "inline props detached");
        }
        self.descriptors = None;
        self.previous = ReactivePropertyMap::default();
    }

    #[must_use]
    pub fn mapper_id(&self) -> Option<MapperId> {
        self.mapper
    }

    #[must_use]
    pub fn descriptors(&self) -> Option<&Arc<ViewDescriptorSet>> {
        self.descriptors.as_ref()
    }

    /// Reactive properties recorded by the last rewiring pass.
    #[must_use]
    pub fn reactive_props(&self) -> &ReactivePropertyMap {
        &self.previous
    }

    /// Number of passes that rebuilt the wiring.
    #[must_use]
    pub fn rewire_count(&self) -> u64 {
        self.rewires
    }
}

impl Drop for InlinePropManager {
    fn drop(&mut self) {
        self.detach();
    }
}
