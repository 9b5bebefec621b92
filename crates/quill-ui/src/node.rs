#![forbid(unsafe_code)]

//! Frame-transient UI nodes.
//!
//! Nodes live in a per-frame slab ([`Frame`]) and reference each other by
//! index, so the tree (which is naturally cyclic through parent and sibling
//! back-links) needs no reference counting and dies wholesale when the slab
//! is cleared at the next frame swap.

use std::cell::RefCell;
use std::rc::Rc;

use quill_core::geometry::{Coord, Point, Rect, Size};
use quill_text::TextBuffer;

/// Index of a node within its frame's slab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Placement spec for floating nodes.
///
/// The float's origin is the logical parent's top-left corner plus
/// `offset`, pulled back by `gravity · size`: gravity `(0.5, 0.5)` centres
/// the float on the offset point, `(1.0, 1.0)` hangs it up-left of it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FloatSpec {
    /// Origin within the float, as a fraction of its size. Clamped to [0, 1].
    pub gravity_x: f32,
    pub gravity_y: f32,
    /// Offset from the logical parent's top-left corner, in cells.
    pub offset_x: Coord,
    pub offset_y: Coord,
}

/// Per-side padding in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Padding {
    pub left: Coord,
    pub top: Coord,
    pub right: Coord,
    pub bottom: Coord,
}

impl Padding {
    /// Create padding, clamping negative values to zero.
    #[must_use]
    pub fn new(left: Coord, top: Coord, right: Coord, bottom: Coord) -> Self {
        Self {
            left: left.max(0),
            top: top.max(0),
            right: right.max(0),
            bottom: bottom.max(0),
        }
    }
}

/// Styling and layout attributes of a node.
///
/// Colors are `0xAARRGGBB`; a zero alpha leaves the underlying cell alone.
/// Grid column widths are positive for absolute columns and non-positive
/// for flexible ones: a negative value is a fraction of the remaining width
/// (like the CSS `fr` unit), zero collapses to the intrinsic width.
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    pub float_spec: FloatSpec,
    pub padding: Padding,
    pub grid_columns: Vec<Coord>,
    pub bg: u32,
    pub fg: u32,
    pub floating: bool,
    pub bordered: bool,
}

/// One run of uniformly colored label text.
#[derive(Debug, Clone, Default)]
pub struct TextChunk {
    pub text: String,
    /// Foreground, `0xAARRGGBB`; zero inherits the node color.
    pub fg: u32,
}

/// Node content payload.
#[derive(Debug, Clone, Default)]
pub enum Content {
    /// Pure layout node.
    #[default]
    Container,
    /// Styled label text.
    Text(Vec<TextChunk>),
    /// An editable document view backed by a shared text buffer.
    TextArea(Rc<RefCell<TextBuffer>>),
    /// A scroll viewport; the payload is the scroll offset in cells.
    ScrollArea(Point),
}

/// A transient UI node; lives exactly one frame.
#[derive(Debug, Default)]
pub struct Node {
    /// Stable identity across frames.
    pub id: u64,
    /// Parent for layout purposes. Floaters keep their logical parent here
    /// even after moving to the root list.
    pub parent: Option<NodeId>,
    pub first_child: Option<NodeId>,
    pub last_child: Option<NodeId>,
    pub prev_sibling: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    /// The container that was current when this node began; `container_end`
    /// pops back to it (distinct from `parent` once the node floats).
    pub stack_parent: Option<NodeId>,

    pub attributes: Attributes,
    pub content: Content,

    pub intrinsic_size: Size,
    pub intrinsic_size_set: bool,

    /// Screen-space rects, filled in by layout.
    pub outer: Rect,
    pub inner: Rect,
    /// Same, restricted to the ambient clip.
    pub outer_clipped: Rect,
    pub inner_clipped: Rect,
}

/// Open-addressed id → node table for one finalized frame.
///
/// Sized to the next power of two above `4 · node_count`, so load stays at
/// or below 25%. The top `width` bits of the id pick the starting slot;
/// collisions probe linearly.
#[derive(Debug, Default)]
pub struct NodeMap {
    slots: Vec<Option<NodeId>>,
    shift: u32,
    mask: usize,
}

impl NodeMap {
    /// Build the table for `count` nodes.
    pub(crate) fn with_capacity(count: usize) -> Self {
        let width = u64::BITS - (4 * count.max(1) as u64).leading_zeros();
        let slots = 1usize << width;
        Self {
            slots: vec![None; slots],
            shift: 64 - width,
            mask: slots - 1,
        }
    }

    pub(crate) fn insert(&mut self, id: u64, node: NodeId) {
        let mut slot = (id >> self.shift) as usize & self.mask;
        while self.slots[slot].is_some() {
            slot = (slot + 1) & self.mask;
        }
        self.slots[slot] = Some(node);
    }

    pub(crate) fn get(&self, nodes: &[Node], id: u64) -> Option<NodeId> {
        if self.slots.is_empty() {
            return None;
        }
        let mut slot = (id >> self.shift) as usize & self.mask;
        loop {
            let node = self.slots[slot]?;
            if nodes[node.index()].id == id {
                return Some(node);
            }
            slot = (slot + 1) & self.mask;
        }
    }
}

/// One frame's node storage plus its finalized id table.
#[derive(Debug, Default)]
pub struct Frame {
    pub(crate) nodes: Vec<Node>,
    pub(crate) map: NodeMap,
}

impl Frame {
    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.map = NodeMap::default();
    }

    pub(crate) fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    #[inline]
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Look a node up by its stable id (valid after finalize).
    pub(crate) fn lookup(&self, id: u64) -> Option<NodeId> {
        self.map.get(&self.nodes, id)
    }

    /// Append `child` under `parent` at the end of the sibling list.
    pub(crate) fn append_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(self.node(child).prev_sibling.is_none());
        debug_assert!(self.node(child).next_sibling.is_none());

        let prev_last = self.node(parent).last_child;
        {
            let node = self.node_mut(child);
            node.parent = Some(parent);
            node.prev_sibling = prev_last;
        }
        if let Some(last) = prev_last {
            self.node_mut(last).next_sibling = Some(child);
        }
        let parent_node = self.node_mut(parent);
        if parent_node.first_child.is_none() {
            parent_node.first_child = Some(child);
        }
        parent_node.last_child = Some(child);
    }

    /// Unlink `child` from its parent's child list.
    pub(crate) fn remove_child(&mut self, child: NodeId) {
        let (parent, prev, next) = {
            let node = self.node(child);
            (node.parent, node.prev_sibling, node.next_sibling)
        };
        let Some(parent) = parent else { return };

        if let Some(prev) = prev {
            self.node_mut(prev).next_sibling = next;
        }
        if let Some(next) = next {
            self.node_mut(next).prev_sibling = prev;
        }
        let parent_node = self.node_mut(parent);
        if parent_node.first_child == Some(child) {
            parent_node.first_child = next;
        }
        if parent_node.last_child == Some(child) {
            parent_node.last_child = prev;
        }

        let node = self.node_mut(child);
        node.parent = None;
        node.prev_sibling = None;
        node.next_sibling = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_children(n: usize) -> (Frame, NodeId, Vec<NodeId>) {
        let mut frame = Frame::default();
        let root = frame.alloc(Node::default());
        let children: Vec<_> = (0..n)
            .map(|i| {
                let id = frame.alloc(Node {
                    id: i as u64 + 1,
                    ..Node::default()
                });
                frame.append_child(root, id);
                id
            })
            .collect();
        (frame, root, children)
    }

    fn collect_children(frame: &Frame, parent: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = frame.node(parent).first_child;
        while let Some(id) = cur {
            out.push(id);
            cur = frame.node(id).next_sibling;
        }
        out
    }

    #[test]
    fn append_preserves_insertion_order() {
        let (frame, root, children) = frame_with_children(3);
        assert_eq!(collect_children(&frame, root), children);
        assert_eq!(frame.node(root).last_child, Some(children[2]));
    }

    #[test]
    fn remove_middle_child_relinks_siblings() {
        let (mut frame, root, children) = frame_with_children(3);
        frame.remove_child(children[1]);
        assert_eq!(
            collect_children(&frame, root),
            vec![children[0], children[2]]
        );
        assert_eq!(frame.node(children[2]).prev_sibling, Some(children[0]));
        assert!(frame.node(children[1]).parent.is_none());
    }

    #[test]
    fn remove_first_and_last_update_parent_links() {
        let (mut frame, root, children) = frame_with_children(3);
        frame.remove_child(children[0]);
        assert_eq!(frame.node(root).first_child, Some(children[1]));
        frame.remove_child(children[2]);
        assert_eq!(frame.node(root).last_child, Some(children[1]));
    }

    #[test]
    fn node_map_finds_every_inserted_id() {
        let mut frame = Frame::default();
        let ids: Vec<u64> = (0..100).map(|i| i * 0x9e3779b97f4a7c15).collect();
        let nodes: Vec<NodeId> = ids
            .iter()
            .map(|&id| frame.alloc(Node { id, ..Node::default() }))
            .collect();

        let mut map = NodeMap::with_capacity(frame.nodes.len());
        for (&id, &node) in ids.iter().zip(&nodes) {
            map.insert(id, node);
        }
        frame.map = map;

        for (&id, &node) in ids.iter().zip(&nodes) {
            assert_eq!(frame.lookup(id), Some(node));
        }
        assert_eq!(frame.lookup(0xdead_beef), None);
    }

    #[test]
    fn node_map_capacity_is_a_power_of_two_above_4n() {
        for count in [1usize, 2, 3, 7, 16, 100] {
            let map = NodeMap::with_capacity(count);
            assert!(map.slots.len().is_power_of_two());
            assert!(map.slots.len() > 4 * count.saturating_sub(1));
        }
    }
}
