#![forbid(unsafe_code)]

//! Immediate-mode terminal UI engine.
//!
//! The widget tree is rebuilt from scratch every frame; state that must
//! survive (focus, scroll offsets, rects consulted by widgets) is recovered
//! through stable 64-bit ids looked up in the *previous* frame's tree.
//!
//! A frame runs in three phases:
//!
//! 1. [`Ui::begin_frame`] rotates the two frame slabs, seeds a fresh root,
//!    and classifies the incoming input event (hit-testing the previous
//!    frame for mouse events).
//! 2. The host builds the tree with [`Ui::container_begin`]/[`Ui::container_end`],
//!    attribute setters, and the widget helpers in [`widgets`].
//! 3. [`Ui::render`] finalizes (id table, intrinsic sizes, grid/float/scroll
//!    layout), paints into character+color planes, and diffs them into one
//!    ANSI byte string.

pub mod context;
pub mod layout;
pub mod node;
pub mod render;
pub mod widgets;

pub use context::Ui;
pub use node::{Attributes, Content, FloatSpec, Node, NodeId, Padding, TextChunk};
