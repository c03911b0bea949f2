#![forbid(unsafe_code)]

//! Runtime: mapper scheduling, inline property reconciliation, and batched
//! removal.
//!
//! # Role in Weft
//! `weft-runtime` connects observable cells (from `weft-core`) to a
//! [`RenderBackend`](weft_core::RenderBackend). Components hand their
//! property bags to an [`InlinePropManager`]; it extracts the reactive
//! properties and registers a mapper with the [`MapperScheduler`], which
//! re-runs it on the [`RenderContext`] whenever a dependency is written.
//! Torn-down nodes are forgotten through the [`RemovalRegistry`].
//!
//! # Contexts
//! The *control* context reconciles and schedules removals; it is a single
//! thread and uses `Rc` types ([`TurnQueue`], [`RemovalRegistry`],
//! [`Runtime`]). The *render* context runs mapper computations and backend
//! calls; everything sent there is `Send`.

pub mod config;
pub mod descriptors;
pub mod gesture;
pub mod inline_props;
pub mod removal;
pub mod render_context;
pub mod runtime;
pub mod scheduler;
pub mod tracker;
pub mod turn;

pub use config::RuntimeConfig;
pub use descriptors::{DescriptorSnapshot, ViewDescriptorSet};
pub use gesture::{GestureBridge, GestureOutcome};
pub use inline_props::{
    InlinePropManager, ReactivePropertyMap, extract_reactive_props, flatten_style,
    has_inline_styles, initial_inline_style, is_inline_transform, static_style,
};
pub use removal::RemovalRegistry;
pub use render_context::{
    ImmediateContext, ManualContext, RenderContext, RenderJob, RenderThread, on_render_context,
};
pub use runtime::Runtime;
pub use scheduler::{MapperId, MapperScheduler};
pub use tracker::DependencyTracker;
pub use turn::TurnQueue;
