//! Property-based invariant tests for the UI engine.
//!
//! These verify structural invariants that must hold for **any** widget
//! tree, screen size, and input sequence:
//!
//! 1. Rendering is deterministic: the same tree at the same size always
//!    produces the same bytes.
//! 2. Layout never leaks a visible rect outside the screen, and clipped
//!    interiors stay inside clipped exteriors.
//! 3. A left press moves focus to a node that actually exists (or leaves
//!    it alone), wherever the pointer lands — on-screen or not.
//! 4. Scroll offsets survive any wheel sequence clamped to
//!    `[0, content − viewport]`.

use proptest::prelude::*;
use quill_core::event::{InputEvent, MouseAction, MouseInput};
use quill_core::geometry::{Point, Size};
use quill_ui::{Content, Ui};

/// One top-level panel with a handful of labels; enough to exercise grid
/// columns, borders, padding-by-chrome, and id hashing.
#[derive(Debug, Clone)]
struct Panel {
    bordered: bool,
    columns: Vec<i32>,
    labels: Vec<String>,
}

fn panel() -> impl Strategy<Value = Panel> {
    (
        any::<bool>(),
        prop::collection::vec(-2..=4i32, 0..3),
        prop::collection::vec("[a-z 世]{0,10}", 0..4),
    )
        .prop_map(|(bordered, columns, labels)| Panel {
            bordered,
            columns,
            labels,
        })
}

/// Build the tree and return every stable id it created.
fn build(ui: &mut Ui, panels: &[Panel]) -> Vec<u64> {
    let mut ids = Vec::new();
    for (i, panel) in panels.iter().enumerate() {
        ui.container_begin_named(&format!("panel{i}"));
        ids.push(ui.attr_node_id());
        if !panel.columns.is_empty() {
            ui.attr_grid_columns(&panel.columns);
        }
        if panel.bordered {
            ui.attr_border();
        }
        for (j, text) in panel.labels.iter().enumerate() {
            ui.styled_label_begin(&format!("label{j}"));
            ui.styled_label_add_text(text);
            ui.styled_label_end();
            ids.push(ui.attr_node_id());
        }
        ui.container_end();
    }
    ids
}

fn resize(ui: &mut Ui, width: i32, height: i32) {
    ui.begin_frame(Some(&InputEvent::Resize(Size::new(width, height))));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn rendering_any_tree_is_deterministic(
        panels in prop::collection::vec(panel(), 0..6),
        width in 1..60i32,
        height in 1..30i32,
    ) {
        let run = || {
            let mut ui = Ui::new();
            resize(&mut ui, width, height);
            build(&mut ui, &panels);
            ui.render()
        };
        prop_assert_eq!(run(), run());
    }

    #[test]
    fn layout_keeps_visible_rects_inside_the_screen(
        panels in prop::collection::vec(panel(), 0..6),
        width in 1..60i32,
        height in 1..30i32,
    ) {
        let mut ui = Ui::new();
        resize(&mut ui, width, height);
        let ids = build(&mut ui, &panels);
        ui.render();

        // Rotate so the finalized frame is readable through prev_node.
        ui.begin_frame(None);

        for id in ids {
            let node = ui.prev_node(id).expect("built nodes survive finalize");

            let oc = node.outer_clipped;
            if !oc.is_empty() {
                prop_assert!(oc.left >= 0 && oc.top >= 0, "{oc:?}");
                prop_assert!(oc.right <= width && oc.bottom <= height, "{oc:?}");
            }

            let ic = node.inner_clipped;
            if !ic.is_empty() {
                prop_assert!(
                    ic.left >= oc.left
                        && ic.top >= oc.top
                        && ic.right <= oc.right
                        && ic.bottom <= oc.bottom,
                    "inner {ic:?} escapes outer {oc:?}"
                );
            }
        }
    }

    #[test]
    fn press_moves_focus_to_a_known_node(
        panels in prop::collection::vec(panel(), 0..6),
        width in 1..60i32,
        height in 1..30i32,
        x in -5..70i32,
        y in -5..35i32,
    ) {
        let mut ui = Ui::new();
        resize(&mut ui, width, height);
        let ids = build(&mut ui, &panels);
        ui.render();
        let before = ui.focused_item_id();

        let press = InputEvent::Mouse(MouseInput {
            action: MouseAction::Left,
            position: Point::new(x, y),
            ..MouseInput::default()
        });
        ui.begin_frame(Some(&press));
        build(&mut ui, &panels);
        ui.render();

        let focused = ui.focused_item_id();
        prop_assert!(
            focused == before || ids.contains(&focused),
            "focus moved to an id nothing built: {focused:#x}"
        );
    }

    #[test]
    fn scroll_offset_is_always_clamped(
        rows in 1..60i32,
        viewport in 2..12i32,
        steps in prop::collection::vec(-9..=9i32, 0..12),
    ) {
        let build = |ui: &mut Ui| {
            ui.scrollarea_begin("list", Size::new(0, viewport));
            for i in 0..rows {
                ui.label(&format!("row{i}"));
            }
            ui.scrollarea_end();
            ui.attr_node_id()
        };

        let mut ui = Ui::new();
        resize(&mut ui, 16, viewport);
        let id = build(&mut ui);
        ui.render();

        for step in steps {
            let wheel = InputEvent::Mouse(MouseInput {
                action: MouseAction::Scroll,
                position: Point::new(3, 1),
                scroll: Point::new(0, step),
                ..MouseInput::default()
            });
            ui.begin_frame(Some(&wheel));
            build(&mut ui);
            ui.render();
        }

        ui.begin_frame(None);
        let node = ui.prev_node(id).expect("scrollarea retained");
        let Content::ScrollArea(offset) = &node.content else {
            panic!("expected scrollarea content");
        };

        let max_offset = (rows - viewport).max(0);
        prop_assert!(
            offset.y >= 0 && offset.y <= max_offset,
            "offset {} outside [0, {max_offset}]",
            offset.y
        );
        prop_assert!(offset.x == 0);
    }
}
