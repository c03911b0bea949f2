#![forbid(unsafe_code)]

//! Test harness for Weft: a recording render backend and style assertions.

pub mod recording;
pub mod style;

pub use recording::{BackendEvent, PropUpdate, RecordingBackend};
pub use style::{
    PropDiff, StyleDiff, assert_style, check_equal, compare_style, current_style, find_style_diff,
};
