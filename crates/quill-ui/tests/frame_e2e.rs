//! End-to-end frame tests: build → layout → hit test → render.

use std::cell::RefCell;
use std::rc::Rc;

use quill_core::event::{InputEvent, MouseAction, MouseInput};
use quill_core::geometry::{Point, Size};
use quill_text::TextBuffer;
use quill_ui::Ui;

fn resize(ui: &mut Ui, w: i32, h: i32) {
    ui.begin_frame(Some(&InputEvent::Resize(Size::new(w, h))));
}

fn mouse(action: MouseAction, x: i32, y: i32) -> InputEvent {
    InputEvent::Mouse(MouseInput {
        action,
        position: Point::new(x, y),
        ..MouseInput::default()
    })
}

/// Two buttons side by side; ids captured for assertions.
fn two_buttons(ui: &mut Ui) -> (u64, u64, bool, bool) {
    ui.container_begin_named("row");
    ui.attr_grid_columns(&[10, 10]);
    ui.label("left");
    let left = ui.attr_node_id();
    let left_clicked = ui.was_clicked();
    ui.label("right");
    let right = ui.attr_node_id();
    let right_clicked = ui.was_clicked();
    ui.container_end();
    (left, right, left_clicked, right_clicked)
}

#[test]
fn left_press_focuses_the_button_under_the_pointer() {
    let mut ui = Ui::new();
    resize(&mut ui, 40, 10);
    let (_, right, ..) = two_buttons(&mut ui);
    ui.render();

    // Press inside the second button (columns 10..20 of row 0).
    ui.begin_frame(Some(&mouse(MouseAction::Left, 12, 0)));
    two_buttons(&mut ui);
    ui.render();
    assert_eq!(ui.focused_item_id(), right);

    // Buttonless report synthesises the release and completes the click.
    ui.begin_frame(Some(&mouse(MouseAction::None, 12, 0)));
    let (.., right_clicked) = two_buttons(&mut ui);
    assert!(right_clicked);
    ui.render();
}

#[test]
fn press_on_empty_area_focuses_the_root() {
    let mut ui = Ui::new();
    resize(&mut ui, 40, 10);
    two_buttons(&mut ui);
    ui.render();

    ui.begin_frame(Some(&mouse(MouseAction::Left, 12, 0)));
    let (_, right, ..) = two_buttons(&mut ui);
    ui.render();
    assert_eq!(ui.focused_item_id(), right);

    // Row 5 is empty; only the root contains the point, and the root is a
    // legitimate focus target, so focus moves to it rather than the button.
    ui.begin_frame(Some(&mouse(MouseAction::Left, 12, 5)));
    two_buttons(&mut ui);
    ui.render();
    assert_ne!(ui.focused_item_id(), right);
}

#[test]
fn rendering_is_deterministic() {
    let build = |ui: &mut Ui| {
        ui.container_begin_named("panel");
        ui.attr_border();
        ui.label("alpha");
        ui.label("beta");
        ui.container_end();
    };

    let run = || {
        let mut ui = Ui::new();
        resize(&mut ui, 30, 8);
        build(&mut ui);
        let first = ui.render();
        ui.begin_frame(None);
        build(&mut ui);
        let second = ui.render();
        (first, second)
    };

    let (a1, a2) = run();
    let (b1, b2) = run();
    assert_eq!(a1, b1);
    assert_eq!(a2, b2);
}

#[test]
fn identical_frames_render_identical_bytes() {
    let mut ui = Ui::new();
    resize(&mut ui, 20, 5);
    ui.label("steady");
    let first = ui.render();

    ui.begin_frame(None);
    ui.label("steady");
    let second = ui.render();

    assert_eq!(first, second);
}

#[test]
fn single_cell_background_change_emits_one_bg_transition() {
    // Frame A: plain label row. Frame B: the same, plus a 1×1 colored cell.
    let base = |ui: &mut Ui| {
        ui.container_begin_named("cell");
        ui.attr_grid_columns(&[1]);
        ui.label("x");
        ui.container_end();
    };

    let mut ui = Ui::new();
    resize(&mut ui, 10, 2);
    base(&mut ui);
    let plain = ui.render();

    ui.begin_frame(None);
    ui.container_begin_named("cell");
    ui.attr_grid_columns(&[1]);
    ui.label("x");
    ui.attr_background_rgba(0xffff0000);
    ui.container_end();
    let colored = ui.render();

    let count = |bytes: &[u8], needle: &[u8]| {
        bytes
            .windows(needle.len())
            .filter(|w| *w == needle)
            .count()
    };

    // The colored frame carries exactly one extra background entry (the
    // red cell's 48;2 sequence) plus the return to the default background.
    let reds = count(&colored, b"\x1b[48;2;255;0;0m");
    assert_eq!(reds, 1);
    assert_eq!(count(&plain, b"\x1b[48;2;255;0;0m"), 0);

    // Both frames start with a cursor home.
    assert!(plain.starts_with(b"\x1b[H"));
    assert!(colored.starts_with(b"\x1b[H"));
}

#[test]
fn focused_textarea_places_the_terminal_cursor() {
    let mut ui = Ui::new();
    resize(&mut ui, 20, 6);
    let tb = Rc::new(RefCell::new(TextBuffer::new()));
    tb.borrow_mut().write(b"hello");

    let frame = |ui: &mut Ui, input: Option<&InputEvent>| {
        ui.begin_frame(input);
        ui.focus_next_by_default();
        ui.textarea(&tb, Size::new(0, 4));
        ui.render()
    };

    frame(&mut ui, Some(&InputEvent::Resize(Size::new(20, 6))));
    let out = frame(&mut ui, None);

    // Cursor on row 1, column 6 (after "hello"), bar style, shown.
    let text = String::from_utf8_lossy(&out);
    assert!(text.contains("\x1b[1;6H\x1b[5 q\x1b[?25h"), "{text:?}");
}

#[test]
fn unfocused_frame_hides_the_cursor() {
    let mut ui = Ui::new();
    resize(&mut ui, 20, 4);
    ui.label("no cursor here");
    let out = ui.render();
    assert!(out.ends_with(b"\x1b[?25l"));
}

#[test]
fn floating_dialog_is_painted_over_content() {
    let mut ui = Ui::new();
    resize(&mut ui, 30, 9);

    ui.label("underneath underneath under");
    ui.container_begin_named("dialog");
    ui.attr_border();
    ui.attr_float(quill_ui::FloatSpec {
        gravity_x: 0.5,
        gravity_y: 0.5,
        offset_x: 15,
        offset_y: 4,
    });
    ui.label("hi");
    ui.container_end();
    let out = String::from_utf8_lossy(&ui.render()).into_owned();

    assert!(out.contains('┌'), "border top-left present: {out:?}");
    assert!(out.contains("hi"));
}

#[test]
fn scroll_wheel_scrolls_content_rows() {
    let mut ui = Ui::new();
    resize(&mut ui, 12, 4);

    let build = |ui: &mut Ui| {
        ui.scrollarea_begin("log", Size::new(0, 4));
        for i in 0..20 {
            ui.label(&format!("line{i}"));
        }
        ui.scrollarea_end();
    };

    build(&mut ui);
    let before = String::from_utf8_lossy(&ui.render()).into_owned();
    assert!(before.contains("line0"));
    assert!(!before.contains("line5"));

    let scroll = InputEvent::Mouse(MouseInput {
        action: MouseAction::Scroll,
        position: Point::new(3, 1),
        scroll: Point::new(0, 3),
        ..MouseInput::default()
    });
    ui.begin_frame(Some(&scroll));
    build(&mut ui);
    let after = String::from_utf8_lossy(&ui.render()).into_owned();
    assert!(!after.contains("line0"));
    assert!(after.contains("line3"));
}

#[test]
fn wrapped_textarea_renders_rows_under_the_wrap_width() {
    let mut ui = Ui::new();
    resize(&mut ui, 9, 5);
    let tb = Rc::new(RefCell::new(TextBuffer::new()));
    tb.borrow_mut().write(b"foo bar baz");

    let frame = |ui: &mut Ui, input: Option<&InputEvent>| {
        ui.begin_frame(input);
        ui.textarea(&tb, Size::new(0, 4));
        ui.render()
    };

    frame(&mut ui, Some(&InputEvent::Resize(Size::new(9, 5))));
    // Second frame has previous-frame rects, so the buffer reflows to the
    // 8-column viewport (9 minus the scrollbar gutter).
    let out = String::from_utf8_lossy(&frame(&mut ui, None)).into_owned();

    assert_eq!(tb.borrow().word_wrap_columns(), Some(8));
    assert!(out.contains("foo bar"));
    assert!(out.contains("baz"));
}
