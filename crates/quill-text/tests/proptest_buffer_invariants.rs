//! Property-based invariant tests for the gap-buffer text store.
//!
//! A `String` shadow model mirrors every edit; after any script of
//! operations the buffer must agree with the model byte for byte, keep its
//! cursor and line statistics consistent, and honour the undo/redo laws.

use proptest::prelude::*;
use quill_core::geometry::Point;
use quill_text::TextBuffer;

#[derive(Debug, Clone)]
enum Op {
    Write(String),
    Delete(i32),
    MoveLogical(i32, i32),
    MoveVisual(i32, i32),
    MoveDelta(i32),
    Reflow(i32),
    Undo,
    Redo,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => "[a-z 世é\n]{1,8}".prop_map(Op::Write),
        2 => (-3..=3i32).prop_map(Op::Delete),
        2 => ((0..20i32), (0..6i32)).prop_map(|(x, y)| Op::MoveLogical(x, y)),
        2 => ((0..20i32), (0..8i32)).prop_map(|(x, y)| Op::MoveVisual(x, y)),
        2 => (-4..=4i32).prop_map(Op::MoveDelta),
        1 => (-1..=12i32).prop_map(Op::Reflow),
        2 => Just(Op::Undo),
        2 => Just(Op::Redo),
    ]
}

fn contents(tb: &TextBuffer) -> Vec<u8> {
    tb.extract(0, tb.text_length())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn buffer_matches_model_and_keeps_invariants(ops in prop::collection::vec(op(), 0..40)) {
        let mut tb = TextBuffer::new();

        for op in ops {
            match op {
                Op::Write(s) => tb.write(s.as_bytes()),
                Op::Delete(n) => tb.delete(n),
                Op::MoveLogical(x, y) => { tb.cursor_move_to_logical(Point::new(x, y)); }
                Op::MoveVisual(x, y) => { tb.cursor_move_to_visual(Point::new(x, y)); }
                Op::MoveDelta(n) => { tb.cursor_move_delta(n); }
                Op::Reflow(w) => tb.reflow(w),
                Op::Undo => tb.undo(),
                Op::Redo => tb.redo(),
            }

            let text = contents(&tb);
            prop_assert_eq!(text.len(), tb.text_length());

            let newlines = text.iter().filter(|&&b| b == b'\n').count() as i32;
            prop_assert_eq!(tb.line_count(), newlines + 1);

            let cursor = tb.cursor();
            prop_assert!(cursor.offset <= tb.text_length());
            prop_assert!(cursor.logical_pos.x >= 0);
            prop_assert!(cursor.logical_pos.y >= 0);
            prop_assert!(cursor.logical_pos.y < tb.line_count());
        }
    }

    #[test]
    fn logical_moves_are_idempotent(
        text in "[a-z 世\n]{0,40}",
        x in 0..24i32,
        y in 0..6i32,
        wrap in prop_oneof![Just(-1i32), (4..12i32)],
    ) {
        let mut tb = TextBuffer::new();
        tb.write(text.as_bytes());
        tb.reflow(wrap);

        let first = tb.cursor_move_to_logical(Point::new(x, y));
        let cursor = tb.cursor();
        let second = tb.cursor_move_to_logical(Point::new(x, y));
        prop_assert_eq!(first, second);
        prop_assert_eq!(cursor, tb.cursor());
    }

    #[test]
    fn reflow_roundtrip_preserves_logical_position(
        text in "[a-z 世é\n]{0,60}",
        x in 0..24i32,
        y in 0..6i32,
        w in 1..16i32,
    ) {
        let mut tb = TextBuffer::new();
        tb.write(text.as_bytes());
        tb.cursor_move_to_logical(Point::new(x, y));
        let logical = tb.cursor().logical_pos;

        tb.reflow(w);
        prop_assert_eq!(tb.cursor().logical_pos, logical);
        tb.reflow(-1);
        prop_assert_eq!(tb.cursor().logical_pos, logical);
        prop_assert_eq!(tb.cursor().visual_pos.y, logical.y);
    }

    #[test]
    fn full_undo_chain_restores_every_prefix(
        writes in prop::collection::vec("[a-z \n]{1,6}", 1..8),
    ) {
        let mut tb = TextBuffer::new();
        let mut snapshots = vec![contents(&tb)];
        for w in &writes {
            tb.write(w.as_bytes());
            snapshots.push(contents(&tb));
        }

        // Undo all the way down, checking each prefix snapshot.
        for snap in snapshots.iter().rev().skip(1) {
            tb.undo();
            prop_assert_eq!(&contents(&tb), snap);
        }

        // Redo all the way back up.
        for snap in snapshots.iter().skip(1) {
            tb.redo();
            prop_assert_eq!(&contents(&tb), snap);
        }
    }

    #[test]
    fn undo_redo_with_deletes_roundtrips(
        seed in "[a-z\n]{4,24}",
        edits in prop::collection::vec(prop_oneof![
            "[a-z]{1,4}".prop_map(Some),
            Just(None),
        ], 1..8),
    ) {
        let mut tb = TextBuffer::new();
        tb.write(seed.as_bytes());
        let base = contents(&tb);

        let mut count = 1usize;
        for edit in &edits {
            match edit {
                Some(s) => tb.write(s.as_bytes()),
                None => {
                    let before = tb.text_length();
                    tb.delete(-2);
                    if tb.text_length() == before {
                        continue; // nothing removed, no record pushed
                    }
                }
            }
            count += 1;
        }
        let after = contents(&tb);

        for _ in 0..count {
            tb.undo();
        }
        prop_assert_eq!(contents(&tb), Vec::<u8>::new());
        for _ in 0..count {
            tb.redo();
        }
        prop_assert_eq!(contents(&tb), after);
        let _ = base;
    }
}
