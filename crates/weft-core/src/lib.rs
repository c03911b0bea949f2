#![forbid(unsafe_code)]

//! Core: observable cells, property values, view identities, and environment.

pub mod backend;
pub mod cell;
pub mod environment;
pub mod error;
pub mod value;
pub mod view;

pub use backend::{GestureState, RenderBackend};
pub use cell::{CellId, Dependency, ObservableCell, Subscription, Trackable};
pub use environment::{Environment, Platform};
pub use error::{Error, Result};
pub use value::{PlainMap, PlainValue, PropMap, PropValue, Scalar, SharedValue};
pub use view::{ComponentRef, NativeRef, ViewConfig, ViewDescriptor, ViewInfo, ViewRefSet, ViewTag};
