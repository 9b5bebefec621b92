#![forbid(unsafe_code)]

//! Gap-buffer text store.
//!
//! The document lives in one contiguous allocation with a movable hole (the
//! gap) at the last edit point, so localised edits are O(gap distance) moves
//! plus O(1) byte writes. Callers address the document through *native*
//! byte offsets that do not count the gap; the gap can therefore move
//! without invalidating any caller-held offset.
//!
//! The cursor is tracked in three coordinate systems at once:
//!
//! - `offset`: native byte offset
//! - `logical_pos`: graphemes into the line / line number (wrap-agnostic)
//! - `visual_pos`: terminal cells into the row / row number, where word
//!   wrap introduces extra rows
//!
//! Undo is a linear log of change records. Applying a record swaps its
//! removed/inserted payloads in place, so the same record serves undo and
//! redo; pushing while rewound truncates the redo branch.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use quill_core::geometry::{Coord, Point, COORD_SAFE_MAX};
use tracing::debug;

use crate::measure::{
    measure_backward, measure_forward, measure_forward_with_break, newlines_backward,
    newlines_forward, StopReason,
};

/// Gap growth granularity; growth overshoots by half a chunk to amortise
/// subsequent inserts.
const GAP_CHUNK: usize = 0x1000;

/// Read granularity for file ingest after the initial size-guessed chunk.
const READ_CHUNK: usize = 0x10000;

/// The cursor, simultaneously in byte, grapheme, and cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    /// Native byte offset in `[0, text_length]`.
    pub offset: usize,
    /// Graphemes into the line (`x`) and line number (`y`).
    pub logical_pos: Point,
    /// Cells into the row (`x`) and row number (`y`), wrap included.
    pub visual_pos: Point,
}

/// Selection protocol state.
///
/// A mouse press *may* start a selection (`Maybe`); it becomes `Active` once
/// the pointer moves, and `Done` on release. Without movement the release
/// collapses back to `None` (it was a click, not a drag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionState {
    #[default]
    None,
    Maybe,
    Active,
    Done,
}

/// A selection in visual coordinates.
///
/// `beg` is where the drag started and may lie after `end`; the renderer
/// orders them for drawing but the store never mutates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub beg: Point,
    pub end: Point,
    pub state: SelectionState,
}

/// One edit record.
///
/// `removed`/`inserted` are the pre- and postimage of the edited range;
/// applying the record swaps them, so it describes the reverse edit
/// afterwards. `cursor` anchors the edit: its offset is the edit start.
#[derive(Debug, Default)]
struct Change {
    cursor: Cursor,
    removed: Vec<u8>,
    inserted: Vec<u8>,
}

/// The gap-buffer document store.
#[derive(Debug, Default)]
pub struct TextBuffer {
    /// Backing storage; always exactly `text_length + gap_len` bytes.
    storage: Vec<u8>,
    /// Document length in bytes, excluding the gap.
    text_length: usize,
    /// Native offset of the gap.
    gap_off: usize,
    /// Gap size in bytes.
    gap_len: usize,

    changes: Vec<Change>,
    /// Number of applied records; `changes[undo_tail..]` is the redo branch.
    undo_tail: usize,

    /// Number of lines; an empty document has one.
    lines: Coord,
    cursor: Cursor,
    selection: Selection,
    /// Word-wrap column count; `None` disables wrapping.
    word_wrap_columns: Option<Coord>,
    dirty: bool,
    overtype: bool,
}

fn count_newlines(bytes: &[u8]) -> Coord {
    bytes.iter().filter(|&&b| b == b'\n').count() as Coord
}

/// Compute the logical position just past `text.len()` when the bytes from
/// `insert_at` onward were newly inserted, together with the number of
/// grapheme movements the insertion added.
///
/// The walk anchors one cluster *before* the insertion point so that
/// inserted bytes which combine with their predecessor (combining marks,
/// regional indicators) count as zero new movements. Tab and newline
/// predecessors never combine and anchor at the insertion point directly.
fn measure_inserted(text: &[u8], insert_at: usize, cursor_logical: Point) -> (Point, Coord) {
    let end = text.len();
    let anchored = insert_at == 0 || matches!(text[insert_at - 1], b'\t' | b'\n');
    let (mut off, mut logical) = if anchored {
        (insert_at, cursor_logical)
    } else {
        let bck = measure_backward(text, insert_at, Point::default(), None, Some(1));
        let fwd = measure_forward(text, bck.offset, Point::default(), None, Some(1));
        let mut logical = cursor_logical;
        logical.x = (logical.x - bck.movements + fwd.movements).max(0);
        (fwd.offset, logical)
    };

    let mut movements = 0;
    while off < end {
        let m = measure_forward(text, off, Point::default(), None, None);
        logical.x += m.movements;
        movements += m.movements;
        if m.newline {
            let (adv, _) = newlines_forward(text, m.offset, 0, 1);
            off = adv;
            logical.x = 0;
            logical.y += 1;
        } else {
            break;
        }
    }
    (logical, movements)
}

impl TextBuffer {
    /// Create an empty document (one empty line).
    #[must_use]
    pub fn new() -> Self {
        Self {
            lines: 1,
            ..Self::default()
        }
    }

    /// Document length in bytes (the gap does not count).
    #[must_use]
    pub fn text_length(&self) -> usize {
        self.text_length
    }

    /// Number of lines; at least 1.
    #[must_use]
    pub fn line_count(&self) -> Coord {
        self.lines
    }

    /// The cursor.
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// The selection.
    #[must_use]
    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Whether the document changed since the last successful write.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Overtype (insert/replace) mode.
    #[must_use]
    pub fn overtype(&self) -> bool {
        self.overtype
    }

    /// Toggle or set overtype mode.
    pub fn set_overtype(&mut self, overtype: bool) {
        self.overtype = overtype;
    }

    /// Current word-wrap column count, `None` when wrapping is off.
    #[must_use]
    pub fn word_wrap_columns(&self) -> Option<Coord> {
        self.word_wrap_columns
    }

    // ── Gap management ──────────────────────────────────────────────────

    /// Move the gap to `off` and ensure it holds at least `len` bytes.
    fn allocate_gap(&mut self, off: usize, len: usize) {
        let off = off.min(self.text_length);

        if off != self.gap_off {
            if self.gap_len > 0 {
                if off < self.gap_off {
                    // |ABCDEFGHIJKLMN   OPQ|  ->  |ABCDEFGHI   JKLMNOPQ|
                    self.storage
                        .copy_within(off..self.gap_off, off + self.gap_len);
                } else {
                    // |ABCDEFGHI   JKLMNOPQ|  ->  |ABCDEFGHIJKLMN   OPQ|
                    self.storage
                        .copy_within(self.gap_off + self.gap_len..off + self.gap_len, self.gap_off);
                }
            }
            self.gap_off = off;
        }

        if len > self.gap_len {
            let new_gap = (len + GAP_CHUNK / 2 + GAP_CHUNK - 1) & !(GAP_CHUNK - 1);
            let old_gap = self.gap_len;
            let tail_start = self.gap_off + old_gap;
            let tail_len = self.text_length - self.gap_off;
            self.storage.resize(self.text_length + new_gap, 0);
            self.storage
                .copy_within(tail_start..tail_start + tail_len, self.gap_off + new_gap);
            self.gap_len = new_gap;
        }
    }

    /// Absorb `len` freshly written gap bytes into the document.
    fn commit_gap(&mut self, len: usize) {
        let len = len.min(self.gap_len);
        self.gap_off += len;
        self.gap_len -= len;
        self.text_length += len;
    }

    /// Remove `count` bytes immediately after the gap by growing it.
    fn delete_after_gap(&mut self, count: usize) {
        let count = count.min(self.text_length - self.gap_off);
        let start = self.gap_off + self.gap_len;
        self.lines -= count_newlines(&self.storage[start..start + count]);
        self.gap_len += count;
        self.text_length -= count;
    }

    // ── Reading ─────────────────────────────────────────────────────────

    /// The contiguous bytes from `off` forward, up to the gap or the end.
    ///
    /// Zero-copy; invalidated by any mutation.
    #[must_use]
    pub fn read_forward(&self, off: usize) -> &[u8] {
        let off = off.min(self.text_length);
        if off < self.gap_off {
            &self.storage[off..self.gap_off]
        } else {
            &self.storage[off + self.gap_len..self.text_length + self.gap_len]
        }
    }

    /// The contiguous bytes ending at `off`, back to the gap or the start.
    #[must_use]
    pub fn read_backward(&self, off: usize) -> &[u8] {
        let off = off.min(self.text_length);
        if off <= self.gap_off {
            &self.storage[..off]
        } else {
            &self.storage[self.gap_off + self.gap_len..off + self.gap_len]
        }
    }

    /// Append `[beg, end)` (native offsets, gap-straddling) to `dst`.
    ///
    /// Out-of-range requests are clamped; an empty or inverted range copies
    /// nothing and returns 0.
    pub fn extract_into(&self, beg: usize, end: usize, dst: &mut Vec<u8>) -> usize {
        let end = end.min(self.text_length);
        if beg >= end {
            return 0;
        }

        let mut copied = 0;
        if beg < self.gap_off {
            let stop = end.min(self.gap_off);
            dst.extend_from_slice(&self.storage[beg..stop]);
            copied += stop - beg;
        }
        if end > self.gap_off {
            let start = beg.max(self.gap_off);
            dst.extend_from_slice(&self.storage[start + self.gap_len..end + self.gap_len]);
            copied += end - start;
        }
        copied
    }

    /// Copy `[beg, end)` into a fresh vector.
    #[must_use]
    pub fn extract(&self, beg: usize, end: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(end.saturating_sub(beg));
        self.extract_into(beg, end, &mut out);
        out
    }

    /// Copy `[beg, end)` into a string, lossily.
    #[must_use]
    pub fn extract_string(&self, beg: usize, end: usize) -> String {
        String::from_utf8_lossy(&self.extract(beg, end)).into_owned()
    }

    // ── Selection ───────────────────────────────────────────────────────

    /// Feed a pointer position into the selection protocol.
    pub fn selection_update(&mut self, pos: Point) {
        match self.selection.state {
            SelectionState::None | SelectionState::Done => {
                self.selection.state = SelectionState::Maybe;
                self.selection.beg = pos;
            }
            SelectionState::Maybe | SelectionState::Active => {
                self.selection.state = SelectionState::Active;
                self.selection.end = pos;
            }
        }
    }

    /// Finish the selection gesture. Returns true when a drag selection was
    /// completed; a plain click resets to `None` and returns false.
    pub fn selection_end(&mut self) -> bool {
        let active = self.selection.state == SelectionState::Active;
        self.selection.state = if active {
            SelectionState::Done
        } else {
            SelectionState::None
        };
        active
    }

    // ── Cursor movement ─────────────────────────────────────────────────

    /// Move the cursor to the start of logical line `y` (clamped to the
    /// document), updating the visual position, including wrap rows.
    fn goto_line_start(&mut self, y: Coord) {
        let y = y.max(0);
        let start_offset = self.cursor.offset;
        let start_visual = self.cursor.visual_pos;

        if y > self.cursor.logical_pos.y {
            loop {
                let chunk = self.read_forward(self.cursor.offset);
                if chunk.is_empty() {
                    break;
                }
                let (adv, line) = newlines_forward(chunk, 0, self.cursor.logical_pos.y, y);
                self.cursor.offset += adv;
                self.cursor.logical_pos.y = line;
                if line >= y {
                    break;
                }
            }
        }

        // Walk back to the start of the target line. When the forward scan
        // ran out of text mid-line, the target is the line we ended up on.
        let target = y.min(self.cursor.logical_pos.y);
        while self.cursor.offset > 0 {
            let chunk = self.read_backward(self.cursor.offset);
            if chunk.is_empty() {
                break;
            }
            let len = chunk.len();
            let (rel, line) = newlines_backward(chunk, len, self.cursor.logical_pos.y, target);
            self.cursor.offset -= len - rel;
            self.cursor.logical_pos.y = line;
            if rel > 0 {
                break;
            }
        }

        self.cursor.logical_pos.x = 0;

        match self.word_wrap_columns {
            None => {
                // Without wrap the visual line number equals the logical one.
                self.cursor.visual_pos.x = 0;
                self.cursor.visual_pos.y = self.cursor.logical_pos.y;
            }
            Some(w) => {
                // Count the visual rows crossed between the old and new
                // offsets. Walking down starts mid-row at the old position;
                // walking up starts at the new line start. A transition
                // landing exactly on the goal does not count: boundary
                // positions belong to the end of the row before them.
                let moved_down = start_offset <= self.cursor.offset;
                let (mut off, goal, mut col) = if moved_down {
                    (start_offset, self.cursor.offset, start_visual.x)
                } else {
                    (self.cursor.offset, start_offset, 0)
                };

                let mut delta: Coord = 0;
                while off < goal {
                    let chunk = self.read_forward(off);
                    if chunk.is_empty() {
                        break;
                    }
                    let (m, wrap) =
                        measure_forward_with_break(chunk, 0, Point::new(col, 0), Some(w), None);
                    match m.reason {
                        StopReason::ColumnStop => {
                            let wrap_abs = off + wrap.offset;
                            if wrap_abs >= goal {
                                break;
                            }
                            if wrap.offset == 0 {
                                // A cluster wider than the row: at the row
                                // start let it overflow, mid-row wrap first.
                                if col <= 0 {
                                    let m1 =
                                        measure_forward(chunk, 0, Point::new(col, 0), None, Some(1));
                                    off += m1.offset;
                                    col = m1.pos.x;
                                } else {
                                    col = 0;
                                    delta += 1;
                                }
                                continue;
                            }
                            off = wrap_abs;
                            col = 0;
                            delta += 1;
                        }
                        StopReason::Newline => {
                            if off + m.offset >= goal {
                                break;
                            }
                            let (adv, _) = newlines_forward(chunk, m.offset, 0, 1);
                            off += adv;
                            col = 0;
                            delta += 1;
                        }
                        _ => {
                            off += m.offset;
                            col = m.pos.x;
                        }
                    }
                }

                self.cursor.visual_pos.x = 0;
                self.cursor.visual_pos.y = start_visual.y + if moved_down { delta } else { -delta };
            }
        }
    }

    /// Move the cursor to a logical (grapheme, line) position, clamped to
    /// the document. Returns the byte offset. Idempotent.
    pub fn cursor_move_to_logical(&mut self, pos: Point) -> usize {
        let x = pos.x.max(0);
        let y = pos.y.max(0);

        self.goto_line_start(y);

        match self.word_wrap_columns {
            None => {
                while x > self.cursor.logical_pos.x {
                    let chunk = self.read_forward(self.cursor.offset);
                    if chunk.is_empty() {
                        break;
                    }
                    let len = chunk.len();
                    let m = measure_forward(
                        chunk,
                        0,
                        self.cursor.visual_pos,
                        None,
                        Some(x - self.cursor.logical_pos.x),
                    );
                    self.cursor.offset += m.offset;
                    self.cursor.logical_pos.x += m.movements;
                    self.cursor.visual_pos = m.pos;
                    if m.offset < len {
                        break;
                    }
                }
            }
            Some(w) => {
                while x > self.cursor.logical_pos.x {
                    let chunk = self.read_forward(self.cursor.offset);
                    if chunk.is_empty() {
                        break;
                    }
                    let remaining = x - self.cursor.logical_pos.x;

                    // Scan the whole visual row first: where it wraps is
                    // only known once the column limit overflows, and the
                    // target's row depends on it.
                    let (row, wrap) = measure_forward_with_break(
                        chunk,
                        0,
                        self.cursor.visual_pos,
                        Some(w),
                        None,
                    );
                    if row.reason == StopReason::ColumnStop && wrap.movements < remaining {
                        if wrap.offset == 0 {
                            // A cluster wider than the row: at the row start
                            // let it overflow, mid-row wrap first.
                            if self.cursor.visual_pos.x <= 0 {
                                let m1 = measure_forward(
                                    chunk,
                                    0,
                                    self.cursor.visual_pos,
                                    None,
                                    Some(1),
                                );
                                self.cursor.offset += m1.offset;
                                self.cursor.logical_pos.x += m1.movements;
                                self.cursor.visual_pos = m1.pos;
                            } else {
                                self.cursor.visual_pos.x = 0;
                                self.cursor.visual_pos.y += 1;
                            }
                            continue;
                        }
                        // Target lies beyond this row; consume it and wrap.
                        self.cursor.offset += wrap.offset;
                        self.cursor.logical_pos.x += wrap.movements;
                        self.cursor.visual_pos.x = 0;
                        self.cursor.visual_pos.y += 1;
                        continue;
                    }

                    // The target (or the line/chunk end) falls within this
                    // row; walk to it precisely.
                    let m =
                        measure_forward(chunk, 0, self.cursor.visual_pos, None, Some(remaining));
                    self.cursor.offset += m.offset;
                    self.cursor.logical_pos.x += m.movements;
                    self.cursor.visual_pos = m.pos;
                    if m.reason != StopReason::Exhausted {
                        break;
                    }
                }
            }
        }

        debug_assert!(self.cursor.offset <= self.text_length);
        debug_assert!(self.cursor.logical_pos.x >= 0);
        debug_assert!(self.cursor.logical_pos.y >= 0);
        debug_assert!(self.cursor.logical_pos.y < self.lines);
        self.cursor.offset
    }

    /// Move the cursor to a visual (cell, row) position, clamped to the
    /// document. Returns the byte offset.
    pub fn cursor_move_to_visual(&mut self, pos: Point) -> usize {
        let x = pos.x.max(0);
        let y = pos.y.max(0);

        match self.word_wrap_columns {
            None => {
                self.cursor_move_to_logical(Point::new(0, y));
                loop {
                    if x <= self.cursor.visual_pos.x {
                        break;
                    }
                    let chunk = self.read_forward(self.cursor.offset);
                    if chunk.is_empty() {
                        break;
                    }
                    let len = chunk.len();
                    let m = measure_forward(chunk, 0, self.cursor.visual_pos, Some(x), None);
                    self.cursor.offset += m.offset;
                    self.cursor.logical_pos.x += m.movements;
                    self.cursor.visual_pos = m.pos;
                    if m.offset < len {
                        break;
                    }
                }
            }
            Some(w) => {
                while y < self.cursor.visual_pos.y && self.cursor.logical_pos.y > 0 {
                    let prev = self.cursor.logical_pos.y - 1;
                    self.cursor_move_to_logical(Point::new(0, prev));
                }
                if y < self.cursor.visual_pos.y {
                    self.cursor_move_to_logical(Point::new(0, 0));
                }
                if y == self.cursor.visual_pos.y && x < self.cursor.visual_pos.x {
                    // Moving left within a row: restart from the line start
                    // and let the forward walk descend again.
                    let line = self.cursor.logical_pos.y;
                    self.cursor_move_to_logical(Point::new(0, line));
                }

                if y > self.cursor.visual_pos.y || x > self.cursor.visual_pos.x {
                    loop {
                        let chunk = self.read_forward(self.cursor.offset);
                        if chunk.is_empty() {
                            break;
                        }
                        if self.cursor.visual_pos.y >= y {
                            // Target row: walk to the requested column, but
                            // never past where the row wraps.
                            let stop = x.min(w);
                            let (m, wrap) = measure_forward_with_break(
                                chunk,
                                0,
                                self.cursor.visual_pos,
                                Some(stop),
                                None,
                            );
                            if m.reason == StopReason::ColumnStop && x >= w {
                                // Requested past the row end; settle at the
                                // wrap point.
                                self.cursor.offset += wrap.offset;
                                self.cursor.logical_pos.x += wrap.movements;
                                self.cursor.visual_pos = wrap.pos;
                                break;
                            }
                            self.cursor.offset += m.offset;
                            self.cursor.logical_pos.x += m.movements;
                            self.cursor.visual_pos = m.pos;
                            if m.reason != StopReason::Exhausted {
                                break;
                            }
                        } else {
                            // Below the target row: wrap row by row.
                            let (m, wrap) = measure_forward_with_break(
                                chunk,
                                0,
                                self.cursor.visual_pos,
                                Some(w),
                                None,
                            );
                            match m.reason {
                                StopReason::ColumnStop => {
                                    if wrap.offset == 0 {
                                        if self.cursor.visual_pos.x <= 0 {
                                            let m1 = measure_forward(
                                                chunk,
                                                0,
                                                self.cursor.visual_pos,
                                                None,
                                                Some(1),
                                            );
                                            self.cursor.offset += m1.offset;
                                            self.cursor.logical_pos.x += m1.movements;
                                            self.cursor.visual_pos = m1.pos;
                                        } else {
                                            self.cursor.visual_pos.x = 0;
                                            self.cursor.visual_pos.y += 1;
                                        }
                                        continue;
                                    }
                                    self.cursor.offset += wrap.offset;
                                    self.cursor.logical_pos.x += wrap.movements;
                                    self.cursor.visual_pos = wrap.pos;
                                    self.cursor.visual_pos.x = 0;
                                    self.cursor.visual_pos.y += 1;
                                }
                                StopReason::Newline => {
                                    let line = self.cursor.logical_pos.y;
                                    let (adv, line) =
                                        newlines_forward(chunk, m.offset, line, line + 1);
                                    self.cursor.offset += adv;
                                    self.cursor.logical_pos.x = 0;
                                    self.cursor.logical_pos.y = line;
                                    self.cursor.visual_pos.x = 0;
                                    self.cursor.visual_pos.y += 1;
                                }
                                _ => {
                                    self.cursor.offset += m.offset;
                                    self.cursor.logical_pos.x += m.movements;
                                    self.cursor.visual_pos = m.pos;
                                }
                            }
                        }
                    }
                }
            }
        }

        debug_assert!(self.cursor.offset <= self.text_length);
        debug_assert!(self.cursor.logical_pos.y < self.lines);
        self.cursor.offset
    }

    /// Move the cursor by whole grapheme steps, crossing line boundaries.
    /// Returns the byte offset.
    pub fn cursor_move_delta(&mut self, movements: Coord) -> usize {
        let mut remaining = movements;
        while remaining < 0 {
            let offset = self.cursor.offset;
            let lp = self.cursor.logical_pos;
            self.cursor_move_to_logical(Point::new(lp.x - 1, lp.y));
            if self.cursor.offset == offset {
                if lp.y == 0 {
                    break;
                }
                self.cursor_move_to_logical(Point::new(COORD_SAFE_MAX, lp.y - 1));
            }
            remaining += 1;
        }
        while remaining > 0 {
            let offset = self.cursor.offset;
            let lp = self.cursor.logical_pos;
            self.cursor_move_to_logical(Point::new(lp.x + 1, lp.y));
            if self.cursor.offset == offset {
                if lp.y + 1 >= self.lines {
                    break;
                }
                self.cursor_move_to_logical(Point::new(0, lp.y + 1));
            }
            remaining -= 1;
        }
        self.cursor.offset
    }

    /// Set the word-wrap width (values `<= 0` disable wrapping) and rebuild
    /// the visual cursor position under the new width.
    pub fn reflow(&mut self, width: Coord) {
        let wrap = if width <= 0 { None } else { Some(width) };
        if wrap == self.word_wrap_columns {
            return;
        }

        let pos = self.cursor.logical_pos;
        self.word_wrap_columns = wrap;
        self.cursor = Cursor::default();
        self.cursor_move_to_logical(pos);
    }

    // ── Editing ─────────────────────────────────────────────────────────

    /// Record an edit of `[beg, end)` replaced by `replacement`, capturing
    /// the preimage before the buffer is mutated. Truncates the redo branch.
    fn push_change(&mut self, beg: usize, end: usize, replacement: &[u8]) {
        debug_assert!(beg <= end && end <= self.text_length);

        let mut removed = Vec::with_capacity(end - beg);
        self.extract_into(beg, end, &mut removed);

        self.changes.truncate(self.undo_tail);
        self.changes.push(Change {
            cursor: self.cursor,
            removed,
            inserted: replacement.to_vec(),
        });
        self.undo_tail = self.changes.len();
        self.dirty = true;
    }

    /// Insert `bytes` at the cursor; in overtype mode, replace as many
    /// graphemes after the cursor as the insertion added. Pushes one undo
    /// record and leaves the cursor just past the insertion.
    pub fn write(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }

        let insert_at = self.cursor.offset;
        self.allocate_gap(insert_at, bytes.len());
        self.storage[self.gap_off..self.gap_off + bytes.len()].copy_from_slice(bytes);

        // The contiguous prefix now ends with the uncommitted insertion.
        let prefix = &self.storage[..self.gap_off + bytes.len()];
        let (target, added_movements) =
            measure_inserted(prefix, insert_at, self.cursor.logical_pos);

        let mut replace_end = insert_at;
        if self.overtype && added_movements > 0 {
            // The grapheme walk stops at newlines, so overtype at a line
            // end degrades to a plain insert.
            let after = self.read_forward(insert_at);
            let fwd = measure_forward(after, 0, Point::default(), None, Some(added_movements));
            replace_end = insert_at + fwd.offset;
        }

        self.push_change(insert_at, replace_end, bytes);
        self.commit_gap(bytes.len());
        self.lines += count_newlines(bytes);
        if replace_end > insert_at {
            self.delete_after_gap(replace_end - insert_at);
        }

        self.cursor_move_to_logical(target);
    }

    /// Remove the byte range covered by `movements` grapheme steps from the
    /// cursor (negative = backward). Pushes one undo record.
    pub fn delete(&mut self, movements: Coord) {
        let from = self.cursor;
        self.cursor_move_delta(movements);
        let to = self.cursor;

        if from.offset == to.offset {
            return;
        }
        let (beg, end) = if from.offset <= to.offset {
            (from, to)
        } else {
            (to, from)
        };

        self.cursor = beg;
        self.allocate_gap(beg.offset, 0);
        self.push_change(beg.offset, end.offset, &[]);
        self.delete_after_gap(end.offset - beg.offset);
    }

    // ── Undo/redo ───────────────────────────────────────────────────────

    /// Apply the record at `idx`: replace its in-buffer postimage with its
    /// preimage, then swap the payloads so the record describes the reverse
    /// edit. The cursor lands after the re-inserted payload.
    fn apply_change(&mut self, idx: usize) {
        let mut change = std::mem::take(&mut self.changes[idx]);

        self.cursor = change.cursor;
        self.allocate_gap(self.cursor.offset, change.removed.len());
        self.delete_after_gap(change.inserted.len());

        let insert_len = change.removed.len();
        self.storage[self.gap_off..self.gap_off + insert_len].copy_from_slice(&change.removed);
        self.lines += count_newlines(&change.removed);
        self.commit_gap(insert_len);

        let (target, _) = measure_inserted(
            &self.storage[..self.gap_off],
            self.gap_off - insert_len,
            self.cursor.logical_pos,
        );

        std::mem::swap(&mut change.removed, &mut change.inserted);
        self.changes[idx] = change;

        self.cursor_move_to_logical(target);
    }

    /// Revert the most recent applied record, if any.
    pub fn undo(&mut self) {
        if self.undo_tail == 0 {
            return;
        }
        self.undo_tail -= 1;
        self.apply_change(self.undo_tail);
    }

    /// Re-apply the next record on the redo branch, if any.
    pub fn redo(&mut self) {
        if self.undo_tail >= self.changes.len() {
            return;
        }
        self.apply_change(self.undo_tail);
        self.undo_tail += 1;
    }

    // ── File I/O ────────────────────────────────────────────────────────

    /// Bulk-ingest a file at the end of the document via gap growth.
    ///
    /// On an open error the buffer is unchanged and the error is returned;
    /// callers that want the original "missing file is an empty document"
    /// behaviour simply ignore it.
    pub fn read_file(&mut self, path: &Path) -> io::Result<()> {
        let mut file = File::open(path)?;
        let file_len = file.metadata().map(|m| m.len() as usize).unwrap_or(0);

        let mut chunk_size = file_len + READ_CHUNK / 2;
        loop {
            self.allocate_gap(self.text_length, chunk_size);
            let gap = &mut self.storage[self.gap_off..self.gap_off + chunk_size];
            let mut filled = 0;
            while filled < chunk_size {
                let n = file.read(&mut gap[filled..])?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            self.commit_gap(filled);
            if filled < chunk_size {
                break;
            }
            chunk_size = READ_CHUNK;
        }

        self.lines = count_newlines(self.read_forward(0)) + 1;
        debug!(bytes = self.text_length, lines = self.lines, "read file");
        Ok(())
    }

    /// Write the document (the two gap halves, in order) to `path` and
    /// clear the dirty flag.
    pub fn write_file(&mut self, path: &Path) -> io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(&self.storage[..self.gap_off])?;
        file.write_all(&self.storage[self.gap_off + self.gap_len..self.text_length + self.gap_len])?;
        self.dirty = false;
        debug!(bytes = self.text_length, "wrote file");
        Ok(())
    }
}
