#![forbid(unsafe_code)]

//! Widget helpers: labels, buttons, scrollareas, the textarea, and the
//! menubar.
//!
//! Widgets are plain functions over [`Ui`]: each call builds its nodes for
//! this frame, reads back retained state (rects, scroll offsets) from the
//! previous frame, and reports interactions through its return value.

use std::cell::RefCell;
use std::rc::Rc;

use quill_core::event::{KeyCode, Modifiers, MouseAction, Shortcut};
use quill_core::geometry::{Point, Size, COORD_SAFE_MAX};
use quill_text::measure::measure_forward;
use quill_text::TextBuffer;

use crate::context::{hash_bytes, Ui};
use crate::node::{Content, FloatSpec, Padding, TextChunk};

impl Ui {
    // ── Labels ──────────────────────────────────────────────────────────

    /// A single-run text label, identified by its own text.
    pub fn label(&mut self, text: &str) {
        self.styled_label_begin(text);
        self.styled_label_add_text(text);
        self.styled_label_end();
    }

    /// Open a label that mixes differently colored runs.
    pub fn styled_label_begin(&mut self, name: &str) {
        self.container_begin_named(name);
        let node = self.frame.node_mut(self.attr_node);
        node.content = Content::Text(vec![TextChunk::default()]);
    }

    /// Switch the label's current color; starts a new run when text was
    /// already written. Index 0 means "inherit the node foreground".
    pub fn styled_label_set_foreground_indexed(&mut self, fg: u32) {
        let Content::Text(chunks) = &mut self.frame.node_mut(self.attr_node).content else {
            return;
        };
        let last = chunks.last_mut().expect("label holds at least one chunk");
        if last.text.is_empty() {
            last.fg = fg;
        } else if last.fg != fg {
            chunks.push(TextChunk {
                text: String::new(),
                fg,
            });
        }
    }

    /// Append text to the label's current run.
    pub fn styled_label_add_text(&mut self, text: &str) {
        if let Content::Text(chunks) = &mut self.frame.node_mut(self.attr_node).content {
            let last = chunks.last_mut().expect("label holds at least one chunk");
            last.text.push_str(text);
        }
    }

    /// Close the label, measuring its intrinsic size.
    pub fn styled_label_end(&mut self) {
        let node = self.frame.node_mut(self.attr_node);
        if let Content::Text(chunks) = &node.content {
            let mut pos = Point::default();
            for chunk in chunks {
                let m = measure_forward(chunk.text.as_bytes(), 0, pos, None, None);
                pos = m.pos;
            }
            node.intrinsic_size = Size::new(pos.x, 1);
            node.intrinsic_size_set = true;
        }
        self.container_end();
    }

    // ── Button ──────────────────────────────────────────────────────────

    /// A clickable label; returns true on a completed click.
    pub fn button(&mut self, text: &str) -> bool {
        self.label(text);
        self.attr_background_rgba(0xa0ff_ffff);
        self.attr_foreground_rgba(0xff00_0000);
        if self.has_focus() {
            self.attr_background_rgba(0xa000_0000);
            self.attr_foreground_rgba(0xffff_ffff);
        }
        self.was_clicked()
    }

    // ── Scrollarea ──────────────────────────────────────────────────────

    /// Open a scroll viewport around a single content container.
    ///
    /// The scroll offset is carried over from the previous frame's node
    /// with the same id; layout clamps it against the content size.
    /// Attribute setters between begin and end target the *outer*
    /// scrollarea node.
    pub fn scrollarea_begin(&mut self, name: &str, intrinsic_size: Size) {
        self.container_begin_named(name);
        let outer = self.attr_node;
        let outer_id = self.frame.node(outer).id;

        let mut offset = Point::default();
        if let Some(prev) = self.prev_node(outer_id) {
            if let Content::ScrollArea(prev_offset) = prev.content {
                offset = prev_offset;
            }
        }
        {
            let node = self.frame.node_mut(outer);
            node.content = Content::ScrollArea(offset);
            if intrinsic_size.width > 0 || intrinsic_size.height > 0 {
                node.intrinsic_size = intrinsic_size;
                node.intrinsic_size_set = true;
            }
        }

        self.focus_next_by_default();
        self.container_begin_named("inner");

        // Attribute modifications apply to the outer container.
        self.attr_node = outer;
    }

    /// Close a scroll viewport, applying hover-wheel scrolling.
    pub fn scrollarea_end(&mut self) {
        self.container_end();
        self.container_end();

        if self.is_hovering() && self.input_mouse() == MouseAction::Scroll {
            let delta = self.scroll_delta();
            if let Content::ScrollArea(offset) =
                &mut self.frame.node_mut(self.attr_node).content
            {
                offset.x += delta.x;
                offset.y += delta.y;
            }
        }
    }

    // ── Textarea ────────────────────────────────────────────────────────

    /// An editable multi-line document view inside a scrollarea.
    ///
    /// Reflows the buffer to the previous frame's viewport width, feeds it
    /// the frame's input when focused, and keeps the cursor scrolled into
    /// view.
    pub fn textarea(&mut self, buffer: &Rc<RefCell<TextBuffer>>, intrinsic_size: Size) {
        self.scrollarea_begin("textarea", intrinsic_size);

        // The scrollarea's content node doubles as the textarea.
        let inner = self.parent;
        {
            let lines = buffer.borrow().line_count();
            let node = self.frame.node_mut(inner);
            node.content = Content::TextArea(Rc::clone(buffer));
            node.intrinsic_size.height = lines;
            node.intrinsic_size_set = true;
        }

        let inner_id = self.frame.node(inner).id;
        if let Some(prev) = self.prev_node(inner_id) {
            let width = prev.inner.right - prev.inner.left;
            buffer.borrow_mut().reflow(width);
        }

        // `has_focus` would test the outer node; focus lives on the content
        // node the autofocus migration landed on.
        if inner_id == self.focused_id {
            self.textarea_handle_input(buffer);
        }

        self.scrollarea_end();
    }

    fn textarea_handle_input(&mut self, buffer: &Rc<RefCell<TextBuffer>>) {
        let outer = self.attr_node;
        let inner = self.parent;
        let outer_id = self.frame.node(outer).id;
        let inner_id = self.frame.node(inner).id;

        let (Some(outer_prev), Some(inner_prev)) =
            (self.prev_rects(outer_id), self.prev_rects(inner_id))
        else {
            return;
        };
        if self.input_consumed {
            return;
        }

        let text = self.input_text().to_vec();
        if !text.is_empty() {
            buffer.borrow_mut().write(&text);
            self.consume_input();
            return;
        }

        let mouse = self.input_mouse();
        if mouse != MouseAction::None {
            let pos = self.mouse_position();
            let content_pos = Point::new(
                pos.x - inner_prev.0.left,
                pos.y - inner_prev.0.top,
            );
            match mouse {
                MouseAction::Left => {
                    if !outer_prev.1.contains(pos) {
                        return;
                    }
                    buffer.borrow_mut().selection_update(content_pos);
                }
                MouseAction::Release => {
                    if !outer_prev.1.contains(pos) {
                        return;
                    }
                    let mut tb = buffer.borrow_mut();
                    if !tb.selection_end() {
                        tb.cursor_move_to_visual(content_pos);
                    }
                }
                _ => return,
            }
            self.consume_input();
            return;
        }

        let Some(key) = self.input_keyboard() else {
            return;
        };

        let viewport = outer_prev.1;
        let width = viewport.right - viewport.left;
        let height = viewport.bottom - viewport.top;
        let mut keep_cursor_visible = true;
        let mut scroll_step: i32 = 0;

        {
            let mut tb = buffer.borrow_mut();
            let visual = tb.cursor().visual_pos;
            match key.code {
                KeyCode::Backspace => tb.delete(-1),
                KeyCode::Tab => tb.write(b"    "),
                KeyCode::Enter => tb.write(b"\n"),
                KeyCode::PageUp => {
                    tb.cursor_move_to_visual(Point::new(visual.x, visual.y - height));
                    scroll_step = -height;
                }
                KeyCode::PageDown => {
                    tb.cursor_move_to_visual(Point::new(visual.x, visual.y + height));
                    scroll_step = height;
                }
                KeyCode::End => {
                    tb.cursor_move_to_visual(Point::new(COORD_SAFE_MAX, visual.y));
                }
                KeyCode::Home => {
                    tb.cursor_move_to_visual(Point::new(0, visual.y));
                }
                KeyCode::Left => {
                    tb.cursor_move_delta(-1);
                }
                KeyCode::Right => {
                    tb.cursor_move_delta(1);
                }
                KeyCode::Up => {
                    if key.modifiers == Modifiers::NONE {
                        tb.cursor_move_to_visual(Point::new(visual.x, visual.y - 1));
                    } else if key.modifiers == Modifiers::CTRL {
                        scroll_step = -1;
                        keep_cursor_visible = false;
                    } else {
                        return;
                    }
                }
                KeyCode::Down => {
                    if key.modifiers == Modifiers::NONE {
                        tb.cursor_move_to_visual(Point::new(visual.x, visual.y + 1));
                    } else if key.modifiers == Modifiers::CTRL {
                        scroll_step = 1;
                        keep_cursor_visible = false;
                    } else {
                        return;
                    }
                }
                KeyCode::Insert => {
                    let overtype = tb.overtype();
                    tb.set_overtype(!overtype);
                }
                KeyCode::Delete => tb.delete(1),
                KeyCode::Char('Y') if key.modifiers == Modifiers::CTRL => tb.redo(),
                KeyCode::Char('Z') if key.modifiers == Modifiers::CTRL => tb.undo(),
                _ => return,
            }
        }

        if scroll_step != 0 {
            if let Content::ScrollArea(offset) = &mut self.frame.node_mut(outer).content {
                offset.y += scroll_step;
            }
        }

        if keep_cursor_visible {
            let cursor = buffer.borrow().cursor().visual_pos;
            let mut min_width = 0;
            if let Content::ScrollArea(offset) = &mut self.frame.node_mut(outer).content {
                offset.x = offset.x.min(cursor.x).max(cursor.x - width + 1);
                offset.y = offset.y.min(cursor.y).max(cursor.y - height + 1);
                min_width = offset.x + width;
            }
            let node = self.frame.node_mut(inner);
            node.intrinsic_size.width = node.intrinsic_size.width.max(min_width);
        }

        self.consume_input();
    }

    // ── Menubar ─────────────────────────────────────────────────────────

    /// Open the menubar container.
    pub fn menubar_begin(&mut self) {
        self.container_begin_named("menubar");
    }

    /// One top-level menu. Returns true when the menu is open (focused);
    /// build its items and call [`Ui::menubar_menu_end`] in that case.
    pub fn menubar_menu_begin(&mut self, text: &str, accelerator: char) -> bool {
        // Each menu title occupies one intrinsic-width menubar column.
        self.frame
            .node_mut(self.parent)
            .attributes
            .grid_columns
            .push(0);

        self.accelerated_label(text, accelerator);
        self.attr_padding(Padding::new(1, 0, 1, 0));

        if self.has_focus() {
            self.attr_background_indexed(15);
            self.attr_foreground_indexed(0);

            let seed = self.attr_node_id();
            self.container_begin(hash_bytes(seed, b"flyout"));
            self.attr_float(FloatSpec {
                offset_y: 1,
                ..FloatSpec::default()
            });
            self.attr_grid_columns(&[0, 0]);
            self.attr_border();
            self.attr_background_indexed(15);
            self.attr_foreground_indexed(0);
            return true;
        }

        false
    }

    /// One menu item row: label plus shortcut column. Returns true on a
    /// completed click on either cell.
    pub fn menubar_menu_item(
        &mut self,
        text: &str,
        accelerator: char,
        shortcut: Option<Shortcut>,
    ) -> bool {
        self.accelerated_label(text, accelerator);
        let item_id = self.attr_node_id();

        let shortcut_id = match shortcut {
            Some(shortcut) => {
                let mut caption = String::new();
                if shortcut.modifiers.contains(Modifiers::CTRL) {
                    caption.push_str("Ctrl+");
                }
                if shortcut.modifiers.contains(Modifiers::ALT) {
                    caption.push_str("Alt+");
                }
                if shortcut.modifiers.contains(Modifiers::SHIFT) {
                    caption.push_str("Shift+");
                }
                if let KeyCode::Char(c) = shortcut.code {
                    caption.push(c);
                }
                self.label(&caption);
                self.attr_padding(Padding::new(2, 0, 0, 0));
                self.attr_node_id()
            }
            None => {
                let seed = self.attr_node_id();
                self.container_begin(hash_bytes(seed, b"spacer"));
                self.container_end();
                self.attr_node_id()
            }
        };

        let released = self.input_mouse() == MouseAction::Release;
        released && (self.focused_item_id() == item_id || self.focused_item_id() == shortcut_id)
    }

    /// Close an open menu's flyout.
    pub fn menubar_menu_end(&mut self) {
        self.container_end();
    }

    /// Close the menubar container.
    pub fn menubar_end(&mut self) {
        self.container_end();
    }

    /// A label with its accelerator letter highlighted in red, or appended
    /// in parentheses when the letter does not occur in the text.
    fn accelerated_label(&mut self, text: &str, accelerator: char) {
        if !accelerator.is_ascii_uppercase() {
            self.label(text);
            return;
        }

        let split = text
            .char_indices()
            .find(|(_, c)| c.to_ascii_uppercase() == accelerator)
            .map(|(i, c)| (i, c.len_utf8()));

        self.styled_label_begin(text);
        match split {
            Some((at, len)) => {
                self.styled_label_add_text(&text[..at]);
                self.styled_label_set_foreground_indexed(9);
                self.styled_label_add_text(&text[at..at + len]);
                self.styled_label_set_foreground_indexed(0);
                self.styled_label_add_text(&text[at + len..]);
            }
            None => {
                self.styled_label_add_text(text);
                self.styled_label_add_text("(");
                self.styled_label_set_foreground_indexed(9);
                self.styled_label_add_text(&accelerator.to_string());
                self.styled_label_set_foreground_indexed(0);
                self.styled_label_add_text(")");
            }
        }
        self.styled_label_end();
    }
}
