#![forbid(unsafe_code)]

//! Gesture-state bridge.
//!
//! Forwards gesture handler state changes to the render backend. Only native
//! environments have a gesture system, and only render-context code may drive
//! it; every other call is a no-op with a warning.

use std::sync::Arc;

use weft_core::{Environment, Error, GestureState, Platform, RenderBackend};

use crate::render_context::on_render_context;

const CAPABILITY: &str = "set_gesture_state";

/// What happened to a gesture state request.
#[derive(Debug)]
pub enum GestureOutcome {
    Applied,
    Skipped(Error),
}

impl GestureOutcome {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

#[derive(Clone)]
pub struct GestureBridge {
    backend: Arc<dyn RenderBackend>,
    environment: Environment,
}

impl std::fmt::Debug for GestureBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GestureBridge")
            .field("backend", &self.backend.name())
            .field("environment", &self.environment)
            .finish()
    }
}

impl GestureBridge {
    #[must_use]
    pub fn new(backend: Arc<dyn RenderBackend>, environment: Environment) -> Self {
        Self {
            backend,
            environment,
        }
    }

    /// Move gesture handler `handler_tag` to `state`.
    pub fn set_gesture_state(&self, handler_tag: i32, state: GestureState) -> GestureOutcome {
        if self.environment.should_use_web() {
            let err = Error::unsupported(CAPABILITY, self.environment);
            match self.environment.platform() {
                Platform::Jest => tracing::warn!("{CAPABILITY}() cannot be used with Jest"),
                Platform::ChromeDebugger => {
                    tracing::warn!("{CAPABILITY}() cannot be used with Chrome Debugger");
                }
                _ => tracing::warn!("{CAPABILITY}() is not supported on this configuration"),
            }
            return GestureOutcome::Skipped(err);
        }
        if !on_render_context() {
            tracing::warn!(handler_tag, "cannot use {CAPABILITY}() outside the render context");
            return GestureOutcome::Skipped(Error::NotOnRenderContext {
                capability: CAPABILITY,
            });
        }
        tracing::trace!(handler_tag, ?state, "gesture state");
        self.backend.set_gesture_state(handler_tag, state);
        GestureOutcome::Applied
    }
}
