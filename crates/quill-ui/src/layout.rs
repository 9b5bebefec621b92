#![forbid(unsafe_code)]

//! Finalize: id table, intrinsic sizing, and grid/float/scroll layout.
//!
//! Finalize runs exactly once per frame, either from [`Ui::render`] or from
//! the next [`Ui::begin_frame`] when the host skipped rendering (hit tests
//! still need the rects).

use quill_core::geometry::{Coord, Point, Rect, Size};

use crate::context::Ui;
use crate::node::{Content, Frame, Node, NodeId, NodeMap};

/// Insets a node's chrome adds on each edge: a one-cell border on
/// top/left/bottom/right when bordered, plus a one-cell scrollbar gutter on
/// the right for scrollareas.
fn chrome_insets(node: &Node) -> (Coord, Coord, Coord, Coord) {
    let b = Coord::from(node.attributes.bordered);
    let gutter = Coord::from(matches!(node.content, Content::ScrollArea(_)));
    (b, b, b | gutter, b)
}

/// Shrink an outer rect to the node's interior.
pub(crate) fn outer_to_inner(node: &Node, outer: Rect) -> Rect {
    let (l, t, r, b) = chrome_insets(node);
    let p = node.attributes.padding;
    Rect::new(
        outer.left + p.left + l,
        outer.top + p.top + t,
        outer.right - p.right - r,
        outer.bottom - p.bottom - b,
    )
}

/// Grow a node's intrinsic size by its padding and chrome.
pub(crate) fn intrinsic_to_outer(node: &Node) -> Size {
    let (l, t, r, b) = chrome_insets(node);
    let p = node.attributes.padding;
    Size::new(
        node.intrinsic_size.width + p.left + p.right + l + r,
        node.intrinsic_size.height + p.top + p.bottom + t + b,
    )
}

/// Depth-first intrinsic sizing: accumulate children into grid rows,
/// widening each cell to its column's declared width.
fn compute_intrinsic_size(frame: &mut Frame, id: NodeId) {
    if frame.node(id).intrinsic_size_set {
        return;
    }

    let columns = frame.node(id).attributes.grid_columns.clone();
    let columns: &[Coord] = if columns.is_empty() { &[-1] } else { &columns };

    let mut row = Size::default();
    let mut total = Size::default();
    let mut column = 0;

    let mut child = frame.node(id).first_child;
    while let Some(c) = child {
        compute_intrinsic_size(frame, c);

        let mut size = intrinsic_to_outer(frame.node(c));
        size.width = size.width.max(columns[column]);

        row.width += size.width;
        row.height = row.height.max(size.height);

        column += 1;
        if column >= columns.len() {
            total.width = total.width.max(row.width);
            total.height += row.height;
            row = Size::default();
            column = 0;
        }

        child = frame.node(c).next_sibling;
    }

    total.width = total.width.max(row.width);
    total.height += row.height;

    let node = frame.node_mut(id);
    node.intrinsic_size = total;
    node.intrinsic_size_set = true;
}

/// Resolve declared column widths against the available inner width.
///
/// Absolute columns keep their width. Flexible columns share the width left
/// over after the absolute ones, proportionally to their (negative)
/// weights, floored at their intrinsic width; zero-weight columns collapse
/// to intrinsic.
fn resolve_columns(declared: &[Coord], intrinsic: &[Coord], inner_width: Coord) -> Vec<Coord> {
    let total_abs: Coord = declared.iter().map(|&c| c.max(0)).sum();
    let total_fr: Coord = declared.iter().map(|&c| c.min(0)).sum();

    let fr_scale = if total_fr < 0 {
        let remaining = (inner_width - total_abs).max(0);
        f64::from(remaining) / f64::from(total_fr)
    } else {
        0.0
    };

    declared
        .iter()
        .zip(intrinsic)
        .map(|(&declared, &intrinsic)| {
            if declared > 0 {
                declared
            } else if declared < 0 {
                let share = (f64::from(declared) * fr_scale + 0.5) as Coord;
                intrinsic.max(share)
            } else {
                intrinsic
            }
        })
        .collect()
}

/// Lay out a node's children within its inner rect, then recurse.
fn layout_children(frame: &mut Frame, id: NodeId, clip: Rect) {
    if frame.node(id).first_child.is_none() || frame.node(id).inner.is_empty() {
        return;
    }

    if let Content::ScrollArea(offset) = frame.node(id).content {
        layout_scrollarea(frame, id, offset);
        return;
    }

    let declared = {
        let cols = frame.node(id).attributes.grid_columns.clone();
        if cols.is_empty() { vec![-1] } else { cols }
    };

    // First pass: intrinsic width per column.
    let mut intrinsic = vec![0 as Coord; declared.len()];
    let mut column = 0;
    let mut child = frame.node(id).first_child;
    while let Some(c) = child {
        let size = intrinsic_to_outer(frame.node(c));
        intrinsic[column] = intrinsic[column].max(size.width);
        column = (column + 1) % declared.len();
        child = frame.node(c).next_sibling;
    }

    let inner = frame.node(id).inner;
    let widths = resolve_columns(&declared, &intrinsic, inner.right - inner.left);

    // Second pass: place children row-major.
    let mut x = inner.left;
    let mut y = inner.top;
    let mut row_height = 0;
    column = 0;
    child = frame.node(id).first_child;
    while let Some(c) = child {
        let mut size = intrinsic_to_outer(frame.node(c));
        size.width = widths[column];

        let outer = Rect::new(x, y, x + size.width, y + size.height).intersect(inner);
        let node = frame.node_mut(c);
        node.outer = outer;
        node.inner = outer_to_inner(node, outer);
        node.outer_clipped = node.outer.intersect(clip);
        node.inner_clipped = node.inner.intersect(clip);

        x += size.width;
        row_height = row_height.max(size.height);
        column += 1;
        if column >= widths.len() {
            x = inner.left;
            y += row_height;
            row_height = 0;
            column = 0;
        }

        child = frame.node(c).next_sibling;
    }

    child = frame.node(id).first_child;
    while let Some(c) = child {
        layout_children(frame, c, clip);
        child = frame.node(c).next_sibling;
    }
}

/// Place a scrollarea's single child: sized to the larger of its intrinsic
/// size and the viewport, shifted by the clamped scroll offset, and clipped
/// to the scrollarea's interior.
fn layout_scrollarea(frame: &mut Frame, id: NodeId, offset: Point) {
    let Some(child) = frame.node(id).first_child else {
        return;
    };

    let inner = frame.node(id).inner;
    let inner_clipped = frame.node(id).inner_clipped;
    let viewport = Size::new(inner.right - inner.left, inner.bottom - inner.top);
    let content = frame.node(child).intrinsic_size;
    let content = Size::new(
        content.width.max(viewport.width),
        content.height.max(viewport.height),
    );

    let ox = offset.x.clamp(0, content.width - viewport.width);
    let oy = offset.y.clamp(0, content.height - viewport.height);

    {
        let node = frame.node_mut(child);
        node.outer = Rect::new(
            inner.left - ox,
            inner.top - oy,
            inner.left - ox + content.width,
            inner.top - oy + content.height,
        );
        node.inner = outer_to_inner(node, node.outer);
        node.outer_clipped = node.outer.intersect(inner_clipped);
        node.inner_clipped = node.inner.intersect(inner_clipped);
    }

    frame.node_mut(id).content = Content::ScrollArea(Point::new(ox, oy));

    layout_children(frame, child, inner_clipped);
}

impl Ui {
    /// Build the id table, compute intrinsic sizes, and lay out the
    /// document root and every floater. Idempotent within a frame.
    pub(crate) fn finalize_frame(&mut self) {
        if self.finalized {
            return;
        }

        // Id table over every node, floaters included.
        let mut map = NodeMap::with_capacity(self.node_count);
        let mut stack = vec![NodeId(0)];
        while let Some(id) = stack.pop() {
            map.insert(self.frame.node(id).id, id);
            if let Some(sibling) = self.frame.node(id).next_sibling {
                stack.push(sibling);
            }
            if let Some(child) = self.frame.node(id).first_child {
                stack.push(child);
            }
        }
        self.frame.map = map;

        // Intrinsic sizes for each root-level tree.
        let mut root = Some(NodeId(0));
        while let Some(r) = root {
            compute_intrinsic_size(&mut self.frame, r);
            root = self.frame.node(r).next_sibling;
        }

        // The document root fills the screen.
        let screen = Rect::from_size(self.size);
        {
            let node = self.frame.node_mut(NodeId(0));
            node.outer = screen;
            node.inner = outer_to_inner(node, screen);
            node.outer_clipped = node.outer;
            node.inner_clipped = node.inner;
        }
        layout_children(&mut self.frame, NodeId(0), screen);

        // Floaters: positioned relative to their logical parent by gravity
        // and offset, clipped to the root's interior.
        let root_inner_clipped = self.frame.node(NodeId(0)).inner_clipped;
        let mut floater = self.frame.node(NodeId(0)).next_sibling;
        while let Some(f) = floater {
            let size = intrinsic_to_outer(self.frame.node(f));
            let parent_origin = match self.frame.node(f).parent {
                Some(p) => Point::new(self.frame.node(p).outer.left, self.frame.node(p).outer.top),
                None => Point::default(),
            };

            let spec = self.frame.node(f).attributes.float_spec;
            let x = parent_origin.x + spec.offset_x
                - (spec.gravity_x * size.width as f32 + 0.5) as Coord;
            let y = parent_origin.y + spec.offset_y
                - (spec.gravity_y * size.height as f32 + 0.5) as Coord;

            let outer = Rect::new(x, y, x + size.width, y + size.height);
            {
                let node = self.frame.node_mut(f);
                node.outer = outer;
                node.inner = outer_to_inner(node, outer);
                node.outer_clipped = node.outer.intersect(root_inner_clipped);
                node.inner_clipped = node.inner.intersect(root_inner_clipped);
            }

            layout_children(&mut self.frame, f, outer);
            floater = self.frame.node(f).next_sibling;
        }

        self.finalized = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sized_node(width: Coord, height: Coord) -> Node {
        Node {
            intrinsic_size: Size::new(width, height),
            intrinsic_size_set: true,
            ..Node::default()
        }
    }

    #[test]
    fn intrinsic_single_column_stacks_vertically() {
        let mut frame = Frame::default();
        let root = frame.alloc(Node::default());
        for (w, h) in [(10, 1), (4, 2), (7, 1)] {
            let c = frame.alloc(sized_node(w, h));
            frame.append_child(root, c);
        }
        compute_intrinsic_size(&mut frame, root);
        assert_eq!(frame.node(root).intrinsic_size, Size::new(10, 4));
    }

    #[test]
    fn intrinsic_two_columns_sum_widths_per_row() {
        let mut frame = Frame::default();
        let root = frame.alloc(Node {
            attributes: crate::node::Attributes {
                grid_columns: vec![0, 0],
                ..Default::default()
            },
            ..Node::default()
        });
        for (w, h) in [(3, 1), (5, 1), (2, 2), (4, 1)] {
            let c = frame.alloc(sized_node(w, h));
            frame.append_child(root, c);
        }
        compute_intrinsic_size(&mut frame, root);
        // Rows: (3+5)×1 and (2+4)×2.
        assert_eq!(frame.node(root).intrinsic_size, Size::new(8, 3));
    }

    #[test]
    fn intrinsic_respects_declared_column_minimums() {
        let mut frame = Frame::default();
        let root = frame.alloc(Node {
            attributes: crate::node::Attributes {
                grid_columns: vec![12],
                ..Default::default()
            },
            ..Node::default()
        });
        let c = frame.alloc(sized_node(5, 1));
        frame.append_child(root, c);
        compute_intrinsic_size(&mut frame, root);
        assert_eq!(frame.node(root).intrinsic_size.width, 12);
    }

    #[test]
    fn border_and_padding_grow_outer_size() {
        let mut node = sized_node(5, 1);
        node.attributes.bordered = true;
        node.attributes.padding = crate::node::Padding::new(2, 0, 1, 0);
        let outer = intrinsic_to_outer(&node);
        assert_eq!(outer, Size::new(5 + 2 + 1 + 2, 1 + 2));
    }

    #[test]
    fn scrollarea_reserves_right_gutter() {
        let mut node = sized_node(5, 2);
        node.content = Content::ScrollArea(Point::default());
        assert_eq!(intrinsic_to_outer(&node), Size::new(6, 2));
        let inner = outer_to_inner(&node, Rect::new(0, 0, 10, 5));
        assert_eq!(inner, Rect::new(0, 0, 9, 5));
    }

    #[test]
    fn resolve_columns_absolute_and_fractional() {
        // 20 wide: 6 absolute, the rest split 1:1 between two -1 columns.
        let widths = resolve_columns(&[6, -1, -1], &[0, 0, 0], 20);
        assert_eq!(widths, vec![6, 7, 7]);
    }

    #[test]
    fn resolve_columns_weighted_fractions() {
        let widths = resolve_columns(&[-1, -3], &[0, 0], 16);
        assert_eq!(widths, vec![4, 12]);
    }

    #[test]
    fn resolve_columns_fraction_floors_at_intrinsic() {
        let widths = resolve_columns(&[-1, -1], &[9, 0], 10);
        assert_eq!(widths, vec![9, 5]);
    }

    #[test]
    fn resolve_columns_zero_weight_collapses_to_intrinsic() {
        // The zero-weight column takes no share of the remaining width; the
        // flexible one claims all of it (placement clips any overflow).
        let widths = resolve_columns(&[0, -1], &[4, 2], 20);
        assert_eq!(widths, vec![4, 20]);
    }

    #[test]
    fn resolve_columns_overflowing_absolute_leaves_no_remaining() {
        let widths = resolve_columns(&[30, -1], &[0, 3], 20);
        assert_eq!(widths, vec![30, 3]);
    }
}
