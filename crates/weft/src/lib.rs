#![forbid(unsafe_code)]

//! Weft public facade crate.
//!
//! Reactive cells drive view properties off the control context: attach a
//! component's property bag once, then write cells and the render backend
//! receives fresh payloads without another reconciliation pass.

pub use weft_core as core;
#[cfg(feature = "runtime")]
pub use weft_runtime as runtime;

pub use weft_core::{
    Environment, Error, PlainMap, PlainValue, PropMap, PropValue, RenderBackend, Result,
    SharedValue, ViewInfo, ViewTag, plain_map, prop_map,
};
#[cfg(feature = "runtime")]
pub use weft_runtime::{InlinePropManager, Runtime, RuntimeConfig};

pub mod prelude {
    pub use weft_core as core;
    #[cfg(feature = "runtime")]
    pub use weft_runtime as runtime;

    pub use weft_core::{
        ComponentRef, Environment, GestureState, ObservableCell, PropMap, PropValue,
        RenderBackend, SharedValue, ViewConfig, ViewInfo, ViewTag, prop_map,
    };
    #[cfg(feature = "runtime")]
    pub use weft_runtime::{InlinePropManager, Runtime, RuntimeConfig};
}
