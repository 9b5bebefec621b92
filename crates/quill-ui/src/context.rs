#![forbid(unsafe_code)]

//! The UI context: frame rotation, input classification, tree building,
//! focus, and retained-state lookup.

use quill_core::event::{InputEvent, KeyInput, MouseAction, Shortcut};
use quill_core::geometry::{Coord, Point, Rect, Size};
use tracing::trace;

use crate::node::{Attributes, FloatSpec, Frame, Node, NodeId, Padding};

/// Stable id of the document root. Also the initial focus, so the first
/// `focus_next_by_default` call can claim it.
pub(crate) const ROOT_ID: u64 = 0x0123_4567_89ab_cdef;

/// FNV-1a over `bytes`, chained from `seed`. Chaining the parent id into a
/// child's name hash keeps equally-named widgets in different containers
/// distinct.
#[must_use]
pub fn hash_bytes(seed: u64, bytes: &[u8]) -> u64 {
    let mut hash = seed ^ 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// The immediate-mode UI context.
///
/// Owns two frame slabs whose roles rotate at every [`Ui::begin_frame`]:
/// the current frame is built into one while the previous frame stays
/// readable for hit tests and retained-state lookups.
#[derive(Debug)]
pub struct Ui {
    pub(crate) frame: Frame,
    pub(crate) prev: Frame,

    pub(crate) palette: [u32; 16],
    pub(crate) size: Size,

    pub(crate) input_text: Vec<u8>,
    pub(crate) input_keyboard: Option<KeyInput>,
    pub(crate) input_mouse_action: MouseAction,
    pub(crate) input_mouse_position: Point,
    pub(crate) input_scroll_delta: Point,
    pub(crate) input_consumed: bool,

    pub(crate) focused_id: u64,

    /// Last node in the root-level list (the document root, then floaters).
    pub(crate) root_last: NodeId,
    /// Attribute target: the most recently begun or ended node.
    pub(crate) attr_node: NodeId,
    /// Current container.
    pub(crate) parent: NodeId,
    pub(crate) node_count: usize,
    pub(crate) autofocus_next: bool,
    pub(crate) finalized: bool,
}

impl Default for Ui {
    fn default() -> Self {
        Self::new()
    }
}

impl Ui {
    /// Create a context with an empty 0×0 screen and a grayscale fallback
    /// palette; the host is expected to deliver a resize event and, if it
    /// can, a measured palette before the first real frame.
    #[must_use]
    pub fn new() -> Self {
        let mut ui = Self {
            frame: Frame::default(),
            prev: Frame::default(),
            palette: DEFAULT_PALETTE,
            size: Size::default(),
            input_text: Vec::new(),
            input_keyboard: None,
            input_mouse_action: MouseAction::None,
            input_mouse_position: Point::new(-1, -1),
            input_scroll_delta: Point::default(),
            input_consumed: true,
            focused_id: ROOT_ID,
            root_last: NodeId(0),
            attr_node: NodeId(0),
            parent: NodeId(0),
            node_count: 0,
            autofocus_next: false,
            finalized: false,
        };
        ui.seed_root();
        ui
    }

    /// Install the terminal's 16-color palette (`0xAARRGGBB`).
    pub fn set_palette(&mut self, colors: [u32; 16]) {
        self.palette = colors;
    }

    /// The palette entry for `index & 15`.
    #[must_use]
    pub fn palette_color(&self, index: u32) -> u32 {
        self.palette[(index & 15) as usize]
    }

    /// The installed 16-color palette.
    #[must_use]
    pub fn palette(&self) -> [u32; 16] {
        self.palette
    }

    /// Current screen size.
    #[must_use]
    pub fn size(&self) -> Size {
        self.size
    }

    /// The id holding keyboard focus.
    #[must_use]
    pub fn focused_item_id(&self) -> u64 {
        self.focused_id
    }

    fn seed_root(&mut self) {
        let root = self.frame.alloc(Node {
            id: ROOT_ID,
            attributes: Attributes {
                bg: self.palette[0],
                fg: self.palette[15],
                ..Attributes::default()
            },
            ..Node::default()
        });
        self.root_last = root;
        self.attr_node = root;
        self.parent = root;
        self.node_count = 1;
        self.autofocus_next = false;
        self.finalized = false;
    }

    /// Start a new frame.
    ///
    /// Finalizes the frame under construction if the host never rendered it
    /// (its layout is still needed for hit tests), rotates the slabs, seeds
    /// a fresh root, and classifies `input`. Mouse events are hit-tested
    /// against the previous frame; a left press moves focus to the deepest
    /// node under the pointer, and a buttonless report after a press
    /// becomes a synthesised release.
    pub fn begin_frame(&mut self, input: Option<&InputEvent>) {
        if !self.finalized {
            self.finalize_frame();
        }

        std::mem::swap(&mut self.frame, &mut self.prev);
        self.frame.clear();
        self.seed_root();

        self.input_text.clear();
        self.input_keyboard = None;
        self.input_scroll_delta = Point::default();

        match input {
            None => {
                // Keep the previous mouse action so widgets still see a
                // sustained press, but nothing is consumable this frame.
                self.input_consumed = true;
            }
            Some(InputEvent::Resize(size)) => {
                debug_assert!(size.width > 0 && size.height > 0);
                debug_assert!(size.width < 32768 && size.height < 32768);
                self.size = *size;
                self.input_mouse_action = MouseAction::None;
                self.input_consumed = false;
            }
            Some(InputEvent::Text(text)) => {
                self.input_text.extend_from_slice(text);
                self.input_mouse_action = MouseAction::None;
                self.input_consumed = false;
            }
            Some(InputEvent::Key(key)) => {
                self.input_keyboard = Some(*key);
                self.input_mouse_action = MouseAction::None;
                self.input_consumed = false;
            }
            Some(InputEvent::Mouse(mouse)) => {
                let best = self.hit_test_prev(mouse.position);

                let mut action = mouse.action;
                if self.input_mouse_action.is_press() && action == MouseAction::None {
                    action = MouseAction::Release;
                }

                self.input_mouse_action = action;
                self.input_mouse_position = mouse.position;
                self.input_scroll_delta = mouse.scroll;
                self.input_consumed = false;

                if action == MouseAction::Left {
                    if let Some(best) = best {
                        self.focused_id = self.prev.node(best).id;
                    }
                }
            }
        }

        trace!(node_count = self.node_count, ?input, "frame begin");
    }

    /// Deepest previous-frame node whose clipped interior contains `pos`.
    fn hit_test_prev(&self, pos: Point) -> Option<NodeId> {
        if self.prev.nodes.is_empty() {
            return None;
        }
        let mut best = None;
        let mut stack = vec![NodeId(0)];
        while let Some(id) = stack.pop() {
            let node = self.prev.node(id);
            if node.inner_clipped.contains(pos) {
                best = Some(id);
            }
            // Sibling first so the child subtree is visited before it.
            if let Some(sibling) = node.next_sibling {
                stack.push(sibling);
            }
            if let Some(child) = node.first_child {
                stack.push(child);
            }
        }
        best
    }

    // ── Tree building ───────────────────────────────────────────────────

    /// Open a container with an explicit stable id.
    pub fn container_begin(&mut self, id: u64) {
        let parent = self.parent;
        let node = self.frame.alloc(Node {
            id,
            stack_parent: Some(parent),
            ..Node::default()
        });
        self.frame.append_child(parent, node);

        self.attr_node = node;
        self.parent = node;
        self.node_count += 1;

        if self.autofocus_next {
            self.autofocus_next = false;
            if self.focused_id == self.frame.node(parent).id {
                self.focused_id = id;
            }
        }
    }

    /// Open a container named relative to the current container.
    pub fn container_begin_named(&mut self, name: &str) {
        let seed = self.frame.node(self.parent).id;
        self.container_begin(hash_bytes(seed, name.as_bytes()));
    }

    /// Close the current container.
    pub fn container_end(&mut self) {
        self.attr_node = self.parent;
        self.parent = self
            .frame
            .node(self.parent)
            .stack_parent
            .unwrap_or(NodeId(0));
        self.autofocus_next = false;
    }

    /// Id of the current attribute target.
    #[must_use]
    pub fn attr_node_id(&self) -> u64 {
        self.frame.node(self.attr_node).id
    }

    // ── Attributes ──────────────────────────────────────────────────────

    /// Detach the attribute target from its logical parent and float it.
    ///
    /// The node moves to the root-level list and is positioned after the
    /// main layout pass, relative to its logical parent, by gravity and
    /// offset.
    pub fn attr_float(&mut self, mut spec: FloatSpec) {
        let node = self.attr_node;
        if node == NodeId(0) {
            return;
        }

        let parent = self.frame.node(node).parent;
        self.frame.remove_child(node);
        {
            let root_last = self.root_last;
            self.frame.node_mut(node).parent = parent;
            self.frame.node_mut(node).prev_sibling = Some(root_last);
            self.frame.node_mut(root_last).next_sibling = Some(node);
        }
        self.root_last = node;

        spec.gravity_x = spec.gravity_x.clamp(0.0, 1.0);
        spec.gravity_y = spec.gravity_y.clamp(0.0, 1.0);
        let attrs = &mut self.frame.node_mut(node).attributes;
        attrs.float_spec = spec;
        attrs.floating = true;
    }

    /// Draw a box border around the attribute target.
    pub fn attr_border(&mut self) {
        self.frame.node_mut(self.attr_node).attributes.bordered = true;
    }

    /// Pad the attribute target's interior.
    pub fn attr_padding(&mut self, padding: Padding) {
        self.frame.node_mut(self.attr_node).attributes.padding = padding;
    }

    /// Lay the attribute target's children out in grid columns.
    ///
    /// Positive widths are absolute; negative widths share the remaining
    /// space proportionally; zero collapses to the column's intrinsic width.
    pub fn attr_grid_columns(&mut self, widths: &[Coord]) {
        self.frame.node_mut(self.attr_node).attributes.grid_columns = widths.to_vec();
    }

    /// Background color, `0xAARRGGBB`.
    pub fn attr_background_rgba(&mut self, bg: u32) {
        self.frame.node_mut(self.attr_node).attributes.bg = bg;
    }

    /// Foreground color, `0xAARRGGBB`.
    pub fn attr_foreground_rgba(&mut self, fg: u32) {
        self.frame.node_mut(self.attr_node).attributes.fg = fg;
    }

    /// Background from the indexed palette.
    pub fn attr_background_indexed(&mut self, index: u32) {
        let color = self.palette_color(index);
        self.frame.node_mut(self.attr_node).attributes.bg = color;
    }

    /// Foreground from the indexed palette.
    pub fn attr_foreground_indexed(&mut self, index: u32) {
        let color = self.palette_color(index);
        self.frame.node_mut(self.attr_node).attributes.fg = color;
    }

    // ── Focus and input ─────────────────────────────────────────────────

    /// Arm focus migration: if the current container holds focus, the next
    /// `container_begin` takes it over.
    pub fn focus_next_by_default(&mut self) {
        self.autofocus_next = true;
    }

    /// Whether the attribute target holds keyboard focus.
    #[must_use]
    pub fn has_focus(&self) -> bool {
        self.frame.node(self.attr_node).id == self.focused_id
    }

    /// Whether the live mouse position is inside the attribute target's
    /// previous-frame rect.
    #[must_use]
    pub fn is_hovering(&self) -> bool {
        let id = self.frame.node(self.attr_node).id;
        match self.prev.lookup(id) {
            Some(node) => self
                .prev
                .node(node)
                .outer
                .contains(self.input_mouse_position),
            None => false,
        }
    }

    /// Focused and released: a completed click on the attribute target.
    #[must_use]
    pub fn was_clicked(&self) -> bool {
        self.has_focus() && self.input_mouse() == MouseAction::Release
    }

    /// Mark the frame's input as handled.
    pub fn consume_input(&mut self) {
        debug_assert!(!self.input_consumed);
        self.input_consumed = true;
    }

    /// Consume the keyboard input if it matches `shortcut` exactly.
    pub fn consume_shortcut(&mut self, shortcut: Shortcut) -> bool {
        if self.input_consumed {
            return false;
        }
        match self.input_keyboard {
            Some(key) if shortcut.matches(key) => {
                self.consume_input();
                true
            }
            _ => false,
        }
    }

    /// The frame's mouse action, unless input was consumed.
    #[must_use]
    pub fn input_mouse(&self) -> MouseAction {
        if self.input_consumed {
            MouseAction::None
        } else {
            self.input_mouse_action
        }
    }

    /// The frame's text payload, unless input was consumed.
    #[must_use]
    pub fn input_text(&self) -> &[u8] {
        if self.input_consumed {
            &[]
        } else {
            &self.input_text
        }
    }

    /// The frame's keyboard payload, unless input was consumed.
    #[must_use]
    pub fn input_keyboard(&self) -> Option<KeyInput> {
        if self.input_consumed {
            None
        } else {
            self.input_keyboard
        }
    }

    /// Live mouse position (kept across frames).
    #[must_use]
    pub fn mouse_position(&self) -> Point {
        self.input_mouse_position
    }

    /// Scroll delta of the frame's mouse event.
    #[must_use]
    pub fn scroll_delta(&self) -> Point {
        self.input_scroll_delta
    }

    // ── Retained-state lookup ───────────────────────────────────────────

    /// The previous frame's node with stable id `id`, if it existed.
    #[must_use]
    pub fn prev_node(&self, id: u64) -> Option<&Node> {
        self.prev.lookup(id).map(|n| self.prev.node(n))
    }

    /// Previous-frame rects for `id`: `(outer, inner, inner_clipped)`.
    #[must_use]
    pub fn prev_rects(&self, id: u64) -> Option<(Rect, Rect, Rect)> {
        self.prev_node(id)
            .map(|n| (n.outer, n.inner, n.inner_clipped))
    }
}

/// Fallback palette used until the host installs a measured one
/// (VGA-ish, fully opaque).
const DEFAULT_PALETTE: [u32; 16] = [
    0xff00_0000,
    0xffbe_2c21,
    0xff3f_ae3a,
    0xffbe_9a4a,
    0xff20_4dbe,
    0xffbb_54be,
    0xff00_a7b2,
    0xffbe_bebe,
    0xff80_8080,
    0xffff_3e30,
    0xff58_ea51,
    0xffff_c944,
    0xff2f_6aff,
    0xfffc_74ff,
    0xff00_e1f0,
    0xffff_ffff,
];
