#![forbid(unsafe_code)]

//! The render-tree side of the boundary.
//!
//! A [`RenderBackend`] is everything this workspace needs from the native
//! (or web) render tree. Implementations are called from the render context
//! and must be `Send + Sync`.

use crate::value::PlainMap;
use crate::view::{ViewConfig, ViewDescriptor, ViewRefSet, ViewTag};

/// Gesture handler states understood by the gesture system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GestureState {
    Undetermined = 0,
    Failed = 1,
    Began = 2,
    Cancelled = 3,
    Active = 4,
    End = 5,
}

pub trait RenderBackend: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &str {
        "render-backend"
    }

    /// Apply `payload` to every view in `views`.
    ///
    /// `view_refs` is set on web environments, where component refs are
    /// updated directly instead of native nodes.
    fn update_props(&self, views: &[ViewDescriptor], payload: &PlainMap, view_refs: Option<&ViewRefSet>);

    /// One-time upgrade of a view class so it accepts out-of-band payloads.
    fn adapt_view_config(&self, _config: &ViewConfig) {}

    /// Whether [`remove_from_props_registry`](Self::remove_from_props_registry)
    /// is available.
    fn supports_batched_removal(&self) -> bool {
        false
    }

    /// Forget the given nodes in the native props registry.
    fn remove_from_props_registry(&self, _tags: &[ViewTag]) {}

    fn set_gesture_state(&self, _handler_tag: i32, _state: GestureState) {}
}
