#![forbid(unsafe_code)]

//! A [`RenderBackend`] that records every call instead of rendering.
//!
//! All accessors return owned snapshots so tests can assert while render
//! jobs are still running on another thread.

use std::sync::{Mutex, MutexGuard, PoisonError};

use weft_core::{
    GestureState, PlainMap, RenderBackend, ViewConfig, ViewDescriptor, ViewRefSet, ViewTag,
};

/// One `update_props` call.
#[derive(Clone, Debug, PartialEq)]
pub struct PropUpdate {
    pub views: Vec<ViewDescriptor>,
    pub payload: PlainMap,
    pub view_refs: Option<ViewRefSet>,
}

impl PropUpdate {
    #[must_use]
    pub fn tags(&self) -> Vec<ViewTag> {
        self.views.iter().map(|view| view.tag).collect()
    }

    #[must_use]
    pub fn targets(&self, tag: ViewTag) -> bool {
        self.views.iter().any(|view| view.tag == tag)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum BackendEvent {
    Update(PropUpdate),
    AdaptViewConfig(ViewConfig),
    Removal(Vec<ViewTag>),
    GestureState { handler_tag: i32, state: GestureState },
}

#[derive(Debug)]
pub struct RecordingBackend {
    name: String,
    batched_removal: bool,
    events: Mutex<Vec<BackendEvent>>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    /// A backend that supports batched removal.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: String::from("recording"),
            batched_removal: true,
            events: Mutex::new(Vec::new()),
        }
    }

    /// A backend without a props registry.
    #[must_use]
    pub fn without_batched_removal() -> Self {
        Self {
            name: String::from("recording-legacy"),
            batched_removal: false,
            ..Self::new()
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn lock(&self) -> MutexGuard<'_, Vec<BackendEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, event: BackendEvent) {
        tracing::trace!(backend = %self.name, ?event, "backend call");
        self.lock().push(event);
    }

    #[must_use]
    pub fn events(&self) -> Vec<BackendEvent> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    #[must_use]
    pub fn updates(&self) -> Vec<PropUpdate> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                BackendEvent::Update(update) => Some(update.clone()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn update_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|event| matches!(event, BackendEvent::Update(_)))
            .count()
    }

    #[must_use]
    pub fn last_update(&self) -> Option<PropUpdate> {
        self.lock().iter().rev().find_map(|event| match event {
            BackendEvent::Update(update) => Some(update.clone()),
            _ => None,
        })
    }

    /// Properties of `tag` as the render tree would hold them: every payload
    /// sent to it, merged in order.
    #[must_use]
    pub fn current_props(&self, tag: impl Into<ViewTag>) -> PlainMap {
        let tag = tag.into();
        let mut merged = PlainMap::default();
        for event in self.lock().iter() {
            if let BackendEvent::Update(update) = event
                && update.targets(tag)
            {
                for (key, value) in &update.payload {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
        merged
    }

    /// Batches passed to `remove_from_props_registry`, in order.
    #[must_use]
    pub fn removals(&self) -> Vec<Vec<ViewTag>> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                BackendEvent::Removal(tags) => Some(tags.clone()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn adapt_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|event| matches!(event, BackendEvent::AdaptViewConfig(_)))
            .count()
    }

    #[must_use]
    pub fn gesture_states(&self) -> Vec<(i32, GestureState)> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                BackendEvent::GestureState { handler_tag, state } => Some((*handler_tag, *state)),
                _ => None,
            })
            .collect()
    }
}

impl RenderBackend for RecordingBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn update_props(
        &self,
        views: &[ViewDescriptor],
        payload: &PlainMap,
        view_refs: Option<&ViewRefSet>,
    ) {
        self.record(BackendEvent::Update(PropUpdate {
            views: views.to_vec(),
            payload: payload.clone(),
            view_refs: view_refs.cloned(),
        }));
    }

    fn adapt_view_config(&self, config: &ViewConfig) {
        self.record(BackendEvent::AdaptViewConfig(config.clone()));
    }

    fn supports_batched_removal(&self) -> bool {
        self.batched_removal
    }

    fn remove_from_props_registry(&self, tags: &[ViewTag]) {
        self.record(BackendEvent::Removal(tags.to_vec()));
    }

    fn set_gesture_state(&self, handler_tag: i32, state: GestureState) {
        self.record(BackendEvent::GestureState { handler_tag, state });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::plain_map;

    #[test]
    fn current_props_merge_in_order() {
        let backend = RecordingBackend::new();
        let a = [ViewDescriptor::new(1, "View")];
        let b = [ViewDescriptor::new(2, "View")];
        backend.update_props(&a, &plain_map! { "x" => 1.0, "y" => 1.0 }, None);
        backend.update_props(&b, &plain_map! { "x" => 9.0 }, None);
        backend.update_props(&a, &plain_map! { "x" => 2.0 }, None);
        assert_eq!(backend.current_props(1), plain_map! { "x" => 2.0, "y" => 1.0 });
        assert_eq!(backend.current_props(2), plain_map! { "x" => 9.0 });
        assert!(backend.current_props(3).is_empty());
        assert_eq!(backend.update_count(), 3);
        assert_eq!(backend.last_update().unwrap().tags(), vec![ViewTag(1)]);
    }

    #[test]
    fn capability_flags() {
        assert!(RecordingBackend::new().supports_batched_removal());
        let legacy = RecordingBackend::without_batched_removal();
        assert!(!legacy.supports_batched_removal());
        assert_eq!(legacy.name(), "recording-legacy");
        assert_eq!(legacy.with_name("paper").name(), "paper");
    }

    #[test]
    fn events_are_kept_by_kind() {
        let backend = RecordingBackend::new();
        backend.adapt_view_config(&ViewConfig::new("RCTView"));
        backend.remove_from_props_registry(&[ViewTag(4), ViewTag(5)]);
        backend.set_gesture_state(2, GestureState::Began);
        assert_eq!(backend.events().len(), 3);
        assert_eq!(backend.adapt_count(), 1);
        assert_eq!(backend.removals(), vec![vec![ViewTag(4), ViewTag(5)]]);
        assert_eq!(backend.gesture_states(), vec![(2, GestureState::Began)]);
        backend.clear();
        assert!(backend.events().is_empty());
    }
}
