#![forbid(unsafe_code)]

//! Text storage and measurement for the quill editor.
//!
//! - [`measure`]: grapheme- and column-accurate measurement over raw bytes,
//!   the oracle behind cursor movement, word wrap, and rendering
//! - [`buffer`]: the gap-buffer document store with undo/redo, selection,
//!   and wrap-aware cursor tracking

pub mod buffer;
pub mod measure;

pub use buffer::{Cursor, Selection, SelectionState, TextBuffer};
pub use measure::{
    measure_backward, measure_forward, measure_forward_with_break, newlines_backward,
    newlines_forward, Measurement, StopReason,
};
