#![forbid(unsafe_code)]

//! Paint and diff: characters + color planes in, one ANSI string out.
//!
//! Painting fills a row-major array of line strings (space-padded to the
//! screen width) and two `u32` planes for background and foreground. A
//! plane value below 16 is an indexed palette color; anything else is
//! `0xAARRGGBB` truecolor, and non-opaque values blend gamma-correctly
//! (in linear light) over what is already there.
//!
//! The emitter then walks the planes row-major and turns every color
//! transition into an SGR sequence, flushing the pending character run
//! first. Output starts with a cursor-home, separates rows with CRLF, and
//! ends by either placing and showing the cursor or hiding it.

use std::fmt::Write as _;

use quill_core::geometry::{Coord, Point, Rect};
use quill_text::measure::measure_forward;

use crate::context::Ui;
use crate::node::{Content, Frame, NodeId};

/// Paint target shared by the per-node painters.
struct Painter<'a> {
    lines: Vec<String>,
    bg: Vec<u32>,
    fg: Vec<u32>,
    width: usize,
    bounds: Rect,
    palette: &'a [u32; 16],
    focused_id: u64,
    cursor: Option<Point>,
    cursor_overtype: bool,
}

// ── Gamma-correct blending ──────────────────────────────────────────────

fn srgb_to_linear(c: u32) -> f32 {
    let c = c as f32 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(c: f32) -> u32 {
    let v = if c <= 0.003_130_8 {
        c * 12.92 * 255.0
    } else {
        (1.055 * c.powf(1.0 / 2.4) - 0.055) * 255.0
    };
    v.clamp(0.0, 255.0) as u32
}

/// Blend `src` over `dst` in linear light. Both are `0xAARRGGBB`.
pub(crate) fn alpha_blend(dst: u32, src: u32) -> u32 {
    let src_a = (src >> 24) as f32 / 255.0;
    let dst_a = (dst >> 24) as f32 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        return 0;
    }

    let src_r = srgb_to_linear((src >> 16) & 0xff);
    let src_g = srgb_to_linear((src >> 8) & 0xff);
    let src_b = srgb_to_linear(src & 0xff);
    let dst_r = srgb_to_linear((dst >> 16) & 0xff);
    let dst_g = srgb_to_linear((dst >> 8) & 0xff);
    let dst_b = srgb_to_linear(dst & 0xff);

    let out_r = (src_r * src_a + dst_r * dst_a * (1.0 - src_a)) / out_a;
    let out_g = (src_g * src_a + dst_g * dst_a * (1.0 - src_a)) / out_a;
    let out_b = (src_b * src_a + dst_b * dst_a * (1.0 - src_a)) / out_a;

    ((out_a * 255.0) as u32) << 24
        | linear_to_srgb(out_r) << 16
        | linear_to_srgb(out_g) << 8
        | linear_to_srgb(out_b)
}

/// Resolve an indexed plane value to its palette color.
fn resolve(palette: &[u32; 16], value: u32) -> u32 {
    if value < 16 {
        palette[value as usize]
    } else {
        value
    }
}

/// Blend `src` over every plane cell in `rect`. Opaque sources overwrite;
/// fully transparent sources are a no-op.
fn blend_rect(plane: &mut [u32], src: u32, rect: Rect, width: usize, palette: &[u32; 16]) {
    let alpha = src >> 24;
    if alpha == 0 {
        return;
    }
    for y in rect.top..rect.bottom {
        let row = y as usize * width;
        for x in rect.left..rect.right {
            let idx = row + x as usize;
            if alpha == 0xff {
                plane[idx] = src;
            } else {
                plane[idx] = alpha_blend(resolve(palette, plane[idx]), src);
            }
        }
    }
}

// ── Grapheme-aware line splicing ────────────────────────────────────────

/// Replace the columns `[x1, x2)` of `line` with `text`, truncated to fit.
///
/// Works in byte offsets measured against the line's grapheme content and
/// pads with spaces where either endpoint lands inside a wide glyph.
/// Returns the column just past the written text.
pub(crate) fn replace_text(line: &mut String, x1: Coord, x2: Coord, text: &str) -> Coord {
    if x2 <= x1 {
        return x1;
    }

    // How much of `text` fits between x1 and x2.
    let new = measure_forward(text.as_bytes(), 0, Point::new(x1, 0), Some(x2), None);
    let spliced = &text[..new.offset];

    // Byte range of the replaced columns within `line`.
    let old_beg = measure_forward(line.as_bytes(), 0, Point::default(), Some(x1), None);
    let old_end = measure_forward(
        line.as_bytes(),
        old_beg.offset,
        Point::new(old_beg.pos.x, 0),
        Some(new.pos.x),
        None,
    );

    if x1 > old_beg.pos.x || new.pos.x > old_end.pos.x {
        // An endpoint fell inside a wide glyph (or past the line's end);
        // pad the fringe with spaces.
        let mut assembled = String::with_capacity(spliced.len() + 4);
        for _ in old_beg.pos.x..x1 {
            assembled.push(' ');
        }
        assembled.push_str(spliced);
        for _ in old_end.pos.x..new.pos.x {
            assembled.push(' ');
        }
        line.replace_range(old_beg.offset..old_end.offset, &assembled);
    } else {
        line.replace_range(old_beg.offset..old_end.offset, spliced);
    }

    new.pos.x
}

// ── Per-node painting ───────────────────────────────────────────────────

fn paint_node(frame: &Frame, id: NodeId, p: &mut Painter<'_>) {
    let node = frame.node(id);
    let oc = node.outer_clipped;
    if oc.is_empty() {
        return;
    }

    if node.attributes.bordered {
        if oc.width() >= 2 && oc.height() >= 1 {
            let span = (oc.width() - 2) as usize;
            let top: String = format!("┌{}┐", "─".repeat(span));
            replace_text(&mut p.lines[oc.top as usize], oc.left, oc.right, &top);

            let mid: String = format!("│{}│", " ".repeat(span));
            for y in oc.top + 1..oc.bottom - 1 {
                replace_text(&mut p.lines[y as usize], oc.left, oc.right, &mid);
            }

            if oc.height() >= 2 {
                let bottom: String = format!("└{}┘", "─".repeat(span));
                replace_text(&mut p.lines[(oc.bottom - 1) as usize], oc.left, oc.right, &bottom);
            }
        }
    } else if node.attributes.floating {
        // Floats sit on top of other content; blank their footprint.
        let fill = " ".repeat(oc.width() as usize);
        for y in oc.top..oc.bottom {
            replace_text(&mut p.lines[y as usize], oc.left, oc.right, &fill);
        }
    }

    if let Content::ScrollArea(_) = node.content {
        paint_scrollbar(frame, id, p);
    }

    if node.attributes.bg >> 24 != 0 {
        blend_rect(&mut p.bg, node.attributes.bg, oc, p.width, p.palette);
    }
    if node.attributes.fg >> 24 != 0 {
        blend_rect(&mut p.fg, node.attributes.fg, oc, p.width, p.palette);
    }

    let ic = node.inner_clipped;
    if ic.is_empty() {
        return;
    }

    match &node.content {
        Content::Text(chunks) => {
            let row = ic.top as usize;
            let bitmap_row = ic.top as usize * p.width;
            let mut origin_x = node.inner.left;

            for chunk in chunks {
                let mut text = chunk.text.as_str();

                // Skip the part of the chunk left of the clip window.
                if origin_x < ic.left {
                    let m = measure_forward(
                        text.as_bytes(),
                        0,
                        Point::new(origin_x, 0),
                        Some(ic.left),
                        None,
                    );
                    text = &text[m.offset..];
                    origin_x = m.pos.x;
                    if origin_x < ic.left {
                        continue;
                    }
                }

                let end_x = replace_text(&mut p.lines[row], origin_x, ic.right, text);

                if chunk.fg != 0 {
                    for x in origin_x..end_x {
                        p.fg[bitmap_row + x as usize] = chunk.fg;
                    }
                }

                origin_x = end_x;
            }
        }
        Content::TextArea(buffer) => paint_textarea(node, buffer, p),
        Content::Container | Content::ScrollArea(_) => {}
    }

    let mut child = node.first_child;
    while let Some(c) = child {
        paint_node(frame, c, p);
        child = frame.node(c).next_sibling;
    }
}

/// Right-edge scroll track: `░` with a `█` thumb sized by the ratio of
/// viewport to content.
fn paint_scrollbar(frame: &Frame, id: NodeId, p: &mut Painter<'_>) {
    let node = frame.node(id);
    let Some(child) = node.first_child else {
        return;
    };
    let oc = node.outer_clipped;

    let viewport = oc.height();
    let content = frame.node(child).intrinsic_size.height.max(1);
    let scroll_offset = (node.inner.top - frame.node(child).outer.top).min(content);

    let ratio = f64::from(viewport) / f64::from(content);
    let thumb = ((ratio * f64::from(viewport) + 0.5) as Coord).max(1);

    let mut thumb_bottom =
        ((f64::from(scroll_offset + viewport) / f64::from(content)) * f64::from(viewport) + 0.5)
            as Coord;
    thumb_bottom = thumb_bottom.clamp(thumb, viewport);
    let thumb_top = thumb_bottom - thumb;

    for y in 0..viewport {
        let glyph = if y >= thumb_top && y < thumb_bottom {
            "█"
        } else {
            "░"
        };
        replace_text(
            &mut p.lines[(oc.top + y) as usize],
            oc.right - 1,
            oc.right,
            glyph,
        );
    }
}

fn paint_textarea(
    node: &crate::node::Node,
    buffer: &std::cell::RefCell<quill_text::TextBuffer>,
    p: &mut Painter<'_>,
) {
    let mut tb = buffer.borrow_mut();
    let ic = node.inner_clipped;
    let oc = node.outer_clipped;
    let width = ic.width();
    let scroll_x = oc.left - node.outer.left;
    let origin_y = node.outer.top;

    let cursor_backup = tb.cursor();

    for y in ic.top..ic.bottom {
        let row = y - origin_y;
        let beg = tb.cursor_move_to_visual(Point::new(scroll_x, row));
        let end = tb.cursor_move_to_visual(Point::new(scroll_x + width, row));
        let line = tb.extract_string(beg, end);
        replace_text(&mut p.lines[y as usize], ic.left, ic.right, &line);
    }

    // Selection: endpoints are ordered for drawing only; the buffer keeps
    // them as the drag produced them.
    let selection = tb.selection();
    if matches!(
        selection.state,
        quill_text::SelectionState::Active | quill_text::SelectionState::Done
    ) {
        let to_screen = |pos: Point| {
            Point::new(node.outer.left + pos.x, node.outer.top + pos.y)
        };
        let mut beg = to_screen(selection.beg);
        let mut end = to_screen(selection.end);
        if beg.y > end.y || (beg.y == end.y && beg.x > end.x) {
            std::mem::swap(&mut beg, &mut end);
        }

        beg.y = beg.y.max(ic.top);
        end.y = end.y.min(ic.bottom - 1);

        for y in beg.y..=end.y {
            let x1 = if y == beg.y { beg.x } else { ic.left }.clamp(ic.left, ic.right);
            let x2 = if y == end.y { end.x } else { ic.right }.clamp(ic.left, ic.right);
            let row = y as usize * p.width;
            for x in x1..x2 {
                p.bg[row + x as usize] = 15;
                p.fg[row + x as usize] = 0;
            }
        }
    }

    if node.id == p.focused_id {
        let cursor = Point::new(
            node.outer.left + cursor_backup.visual_pos.x,
            node.outer.top + cursor_backup.visual_pos.y,
        );
        if ic.contains(cursor) {
            p.cursor = Some(cursor);
            p.cursor_overtype = tb.overtype();
        }
    }

    // The row probing moved the cursor; put it back.
    tb.cursor_move_to_logical(cursor_backup.logical_pos);
}

// ── SGR emission ────────────────────────────────────────────────────────

fn emit_bg(out: &mut String, bg: u32) {
    if bg < 8 {
        let _ = write!(out, "\x1b[{}m", 40 + bg);
    } else if bg < 16 {
        let _ = write!(out, "\x1b[{}m", 100 + bg - 8);
    } else {
        let _ = write!(
            out,
            "\x1b[48;2;{};{};{}m",
            (bg >> 16) & 0xff,
            (bg >> 8) & 0xff,
            bg & 0xff
        );
    }
}

fn emit_fg(out: &mut String, fg: u32) {
    if fg < 8 {
        let _ = write!(out, "\x1b[{}m", 30 + fg);
    } else if fg < 16 {
        let _ = write!(out, "\x1b[{}m", 90 + fg - 8);
    } else {
        let _ = write!(
            out,
            "\x1b[38;2;{};{};{}m",
            (fg >> 16) & 0xff,
            (fg >> 8) & 0xff,
            fg & 0xff
        );
    }
}

impl Ui {
    /// Finalize the frame if needed, paint it, and diff the planes into a
    /// single ANSI byte sequence.
    ///
    /// Deterministic: identical trees and identical previous-frame state
    /// produce byte-identical output.
    pub fn render(&mut self) -> Vec<u8> {
        self.finalize_frame();

        let width = self.size.width.max(0) as usize;
        let height = self.size.height.max(0) as usize;
        if width == 0 || height == 0 {
            return b"\x1b[H\x1b[?25l".to_vec();
        }

        let mut painter = Painter {
            lines: (0..height).map(|_| " ".repeat(width)).collect(),
            bg: vec![0; width * height],
            fg: vec![15; width * height],
            width,
            bounds: Rect::from_size(self.size),
            palette: &self.palette,
            focused_id: self.focused_id,
            cursor: None,
            cursor_overtype: false,
        };

        let mut root = Some(NodeId(0));
        while let Some(r) = root {
            paint_node(&self.frame, r, &mut painter);
            root = self.frame.node(r).next_sibling;
        }

        let mut out = String::with_capacity(width * height);
        out.push_str("\x1b[H");

        // Invert the first cell's colors so the first cell always emits.
        let mut last_bg = painter.bg[0] ^ 1;
        let mut last_fg = painter.fg[0] ^ 1;

        for y in 0..height {
            if y != 0 {
                out.push_str("\r\n");
            }

            let line = &painter.lines[y];
            let mut flush_offset = 0usize;
            let mut flush_col: Coord = 0;

            for x in 0..width {
                let bg = painter.bg[y * width + x];
                let fg = painter.fg[y * width + x];
                if bg == last_bg && fg == last_fg {
                    continue;
                }

                if x != 0 {
                    let m = measure_forward(
                        line.as_bytes(),
                        flush_offset,
                        Point::new(flush_col, 0),
                        Some(x as Coord),
                        None,
                    );
                    out.push_str(&line[flush_offset..m.offset]);
                    flush_offset = m.offset;
                    flush_col = x as Coord;
                }

                if bg != last_bg {
                    last_bg = bg;
                    emit_bg(&mut out, bg);
                }
                if fg != last_fg {
                    last_fg = fg;
                    emit_fg(&mut out, fg);
                }
            }

            out.push_str(&line[flush_offset..]);
        }

        match painter.cursor {
            Some(cursor) if painter.bounds.contains(cursor) => {
                // CUP, then DECSCUSR (block when overtyping, bar otherwise),
                // then DECTCEM show.
                let style = if painter.cursor_overtype { 1 } else { 5 };
                let _ = write!(
                    out,
                    "\x1b[{};{}H\x1b[{} q\x1b[?25h",
                    cursor.y + 1,
                    cursor.x + 1,
                    style
                );
            }
            _ => out.push_str("\x1b[?25l"),
        }

        out.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_text_plain_ascii() {
        let mut line = "0123456789".to_string();
        let end = replace_text(&mut line, 2, 7, "abc");
        assert_eq!(line, "01abc56789");
        assert_eq!(end, 5);
    }

    #[test]
    fn replace_text_truncates_to_window() {
        let mut line = "0123456789".to_string();
        let end = replace_text(&mut line, 2, 5, "abcdef");
        assert_eq!(line, "01abc56789");
        assert_eq!(end, 5);
    }

    #[test]
    fn replace_text_wide_glyph_endpoint_pads() {
        // Column 1 lands inside 世 (columns 0-1); the fringe becomes spaces.
        let mut line = "世3456".to_string();
        replace_text(&mut line, 1, 3, "ab");
        assert_eq!(line, " ab456");
    }

    #[test]
    fn replace_text_inserting_wide_glyph_pads_tail() {
        // 世 occupies columns 0-1; the overwritten region ends mid-'1'.
        let mut line = "0123".to_string();
        let end = replace_text(&mut line, 0, 2, "世");
        assert_eq!(line, "世23");
        assert_eq!(end, 2);
    }

    #[test]
    fn replace_text_empty_window_is_noop() {
        let mut line = "abc".to_string();
        assert_eq!(replace_text(&mut line, 2, 2, "xyz"), 2);
        assert_eq!(line, "abc");
    }

    #[test]
    fn alpha_blend_opaque_replaces() {
        assert_eq!(alpha_blend(0xff000000, 0xffff8040), 0xffff8040);
    }

    #[test]
    fn alpha_blend_transparent_keeps_destination() {
        let dst = 0xff123456;
        assert_eq!(alpha_blend(dst, 0), 0);
        // A fully transparent src over dst keeps dst's color channels.
        let out = alpha_blend(dst, 0x00ff_ffff);
        assert_eq!(out, dst);
    }

    #[test]
    fn alpha_blend_half_white_over_black_is_perceptual_gray() {
        let out = alpha_blend(0xff000000, 0x80ffffff);
        let r = (out >> 16) & 0xff;
        // Linear-light blending of 50% white over black lands near sRGB 188,
        // much brighter than the naive 128.
        assert!(r > 180 && r < 196, "got {r}");
        assert_eq!(out >> 24, 0xff);
    }

    #[test]
    fn emit_sgr_indexed_and_truecolor() {
        let mut out = String::new();
        emit_bg(&mut out, 3);
        emit_bg(&mut out, 12);
        emit_bg(&mut out, 0xffa0b0c0);
        emit_fg(&mut out, 7);
        emit_fg(&mut out, 9);
        emit_fg(&mut out, 0xff010203);
        assert_eq!(
            out,
            "\x1b[43m\x1b[104m\x1b[48;2;160;176;192m\x1b[37m\x1b[91m\x1b[38;2;1;2;3m"
        );
    }
}
