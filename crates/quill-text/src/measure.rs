#![forbid(unsafe_code)]

//! Grapheme and column measurement over raw bytes.
//!
//! The text store keeps documents as bytes with no validity guarantee, so
//! every measurement here decodes UTF-8 on the fly and substitutes U+FFFD
//! (one column per offending byte) for invalid sequences. Grapheme cluster
//! boundaries come from `unicode-segmentation`, display widths from
//! `unicode-width`.
//!
//! Position convention: `pos.x` is a terminal column, `pos.y` a row;
//! `movements` counts grapheme clusters. Callers that track logical
//! (grapheme) coordinates use `movements`, callers that track visual
//! coordinates use `pos`.
//!
//! A newline stops a forward measurement *without being consumed*: the
//! returned offset points at the newline and [`Measurement::newline`] is
//! set. Crossing it is the caller's job (see [`newlines_forward`]), which
//! keeps "walk to the end of this line" and "walk onto the next line"
//! distinct operations.

use quill_core::geometry::{Coord, Point};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Tab stops every 8 columns.
const TAB_WIDTH: Coord = 8;

/// Longest byte window considered when hunting for a cluster boundary.
/// Larger clusters (pathological ZWJ chains) are split; nothing breaks,
/// they just measure as several clusters.
const MAX_CLUSTER_BYTES: usize = 64;

/// Why a measurement stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The byte slice ran out.
    Exhausted,
    /// The next cluster is a newline (not consumed, forward only).
    Newline,
    /// The next cluster would not fit within the column stop.
    ColumnStop,
    /// The requested number of grapheme movements was made.
    MovementLimit,
}

/// The result of a measurement walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    /// Byte offset where the walk stopped.
    pub offset: usize,
    /// Position at the stop point.
    pub pos: Point,
    /// Grapheme movements made.
    pub movements: Coord,
    /// True when a newline terminated the advance.
    pub newline: bool,
    /// What terminated the advance.
    pub reason: StopReason,
}

impl Measurement {
    fn at(offset: usize, pos: Point) -> Self {
        Self {
            offset,
            pos,
            movements: 0,
            newline: false,
            reason: StopReason::Exhausted,
        }
    }
}

/// One decoded cluster at a byte offset.
struct Cluster {
    len: usize,
    width: Coord,
    newline: bool,
    tab: bool,
    whitespace: bool,
}

/// Decode the cluster starting at `offset`, or `None` at the end.
fn next_cluster(bytes: &[u8], offset: usize) -> Option<Cluster> {
    if offset >= bytes.len() {
        return None;
    }

    match bytes[offset] {
        b'\n' => {
            return Some(Cluster {
                len: 1,
                width: 0,
                newline: true,
                tab: false,
                whitespace: false,
            });
        }
        b'\r' => {
            let crlf = bytes.get(offset + 1) == Some(&b'\n');
            return Some(Cluster {
                len: if crlf { 2 } else { 1 },
                width: 0,
                newline: crlf,
                tab: false,
                whitespace: false,
            });
        }
        b'\t' => {
            return Some(Cluster {
                len: 1,
                width: 0, // resolved against the current column by the caller
                newline: false,
                tab: true,
                whitespace: true,
            });
        }
        _ => {}
    }

    let window_end = bytes.len().min(offset + MAX_CLUSTER_BYTES);
    let window = &bytes[offset..window_end];
    let valid = match std::str::from_utf8(window) {
        Ok(s) => s,
        Err(e) if e.valid_up_to() > 0 => {
            // Safe: valid_up_to is a proven boundary.
            std::str::from_utf8(&window[..e.valid_up_to()]).unwrap_or("")
        }
        Err(_) => {
            // Invalid or truncated lead byte: one replacement per byte.
            return Some(Cluster {
                len: 1,
                width: 1,
                newline: false,
                tab: false,
                whitespace: false,
            });
        }
    };

    let grapheme = valid.graphemes(true).next()?;
    Some(Cluster {
        len: grapheme.len(),
        width: grapheme.width() as Coord,
        newline: false,
        tab: false,
        whitespace: grapheme.chars().all(char::is_whitespace) && !grapheme.is_empty(),
    })
}

/// Decode the cluster ending at `offset`, or `None` at the start.
fn prev_cluster(bytes: &[u8], offset: usize) -> Option<Cluster> {
    if offset == 0 {
        return None;
    }

    match bytes[offset - 1] {
        b'\n' => {
            let crlf = offset >= 2 && bytes[offset - 2] == b'\r';
            return Some(Cluster {
                len: if crlf { 2 } else { 1 },
                width: 0,
                newline: true,
                tab: false,
                whitespace: false,
            });
        }
        b'\t' => {
            return Some(Cluster {
                len: 1,
                // A backward tab width is unknowable without the line
                // prefix; callers renormalise with a forward measurement.
                width: 1,
                newline: false,
                tab: true,
                whitespace: true,
            });
        }
        _ => {}
    }

    // Find a valid suffix window ending at `offset`.
    let mut start = offset.saturating_sub(MAX_CLUSTER_BYTES);
    let valid = loop {
        if start >= offset {
            // No valid suffix at all: one replacement per byte.
            return Some(Cluster {
                len: 1,
                width: 1,
                newline: false,
                tab: false,
                whitespace: false,
            });
        }
        if let Ok(s) = std::str::from_utf8(&bytes[start..offset]) {
            break s;
        }
        start += 1;
    };

    let grapheme = valid.graphemes(true).next_back()?;
    Some(Cluster {
        len: grapheme.len(),
        width: grapheme.width() as Coord,
        newline: false,
        tab: false,
        whitespace: grapheme.chars().all(char::is_whitespace) && !grapheme.is_empty(),
    })
}

fn tab_advance(x: Coord) -> Coord {
    TAB_WIDTH - x.rem_euclid(TAB_WIDTH)
}

/// Walk forward from `offset` in position `pos`.
///
/// Stops at the first of:
/// - a newline cluster (reported via [`Measurement::newline`], not consumed)
/// - the next cluster not fitting within `column_stop`
/// - `movement_limit` grapheme movements
/// - the end of `bytes`
///
/// The column stop is exact: a cluster that would overshoot it is never
/// consumed, even when that means making no progress at all. Loops that
/// scan wrap rows handle the pathological wider-than-the-row cluster
/// themselves.
pub fn measure_forward(
    bytes: &[u8],
    offset: usize,
    pos: Point,
    column_stop: Option<Coord>,
    movement_limit: Option<Coord>,
) -> Measurement {
    measure_forward_impl(bytes, offset, pos, column_stop, movement_limit).0
}

/// Like [`measure_forward`], additionally reporting the latest legal wrap
/// point.
///
/// The second measurement equals the first unless the walk stopped at the
/// column limit with a whitespace cluster behind it, in which case it points
/// just past that whitespace: the word-wrap loop resumes there on the next
/// visual row.
pub fn measure_forward_with_break(
    bytes: &[u8],
    offset: usize,
    pos: Point,
    column_stop: Option<Coord>,
    movement_limit: Option<Coord>,
) -> (Measurement, Measurement) {
    measure_forward_impl(bytes, offset, pos, column_stop, movement_limit)
}

fn measure_forward_impl(
    bytes: &[u8],
    offset: usize,
    pos: Point,
    column_stop: Option<Coord>,
    movement_limit: Option<Coord>,
) -> (Measurement, Measurement) {
    let mut m = Measurement::at(offset, pos);
    let mut wrap: Option<Measurement> = None;

    loop {
        if let Some(limit) = movement_limit {
            if m.movements >= limit {
                m.reason = StopReason::MovementLimit;
                break;
            }
        }

        let Some(cluster) = next_cluster(bytes, m.offset) else {
            m.reason = StopReason::Exhausted;
            break;
        };

        if cluster.newline {
            m.newline = true;
            m.reason = StopReason::Newline;
            break;
        }

        let width = if cluster.tab {
            tab_advance(m.pos.x)
        } else {
            cluster.width
        };

        if let Some(stop) = column_stop {
            if m.pos.x + width > stop {
                m.reason = StopReason::ColumnStop;
                break;
            }
        }

        m.offset += cluster.len;
        m.pos.x += width;
        m.movements += 1;

        if cluster.whitespace {
            wrap = Some(m);
        }
    }

    let line_break = if m.reason == StopReason::ColumnStop {
        wrap.unwrap_or(m)
    } else {
        m
    };
    (m, line_break)
}

/// Walk backward from `offset` in position `pos`.
///
/// Symmetric to [`measure_forward`], except newlines *are* crossed: the
/// column of a position on an unknown previous line cannot be computed
/// locally, so `pos.x` goes negative and the caller renormalises with a
/// forward walk from a known line start. `column_stop` terminates the walk
/// once `pos.x` reaches it.
pub fn measure_backward(
    bytes: &[u8],
    offset: usize,
    pos: Point,
    column_stop: Option<Coord>,
    movement_limit: Option<Coord>,
) -> Measurement {
    let mut m = Measurement::at(offset, pos);

    loop {
        if let Some(limit) = movement_limit {
            if m.movements >= limit {
                m.reason = StopReason::MovementLimit;
                break;
            }
        }
        if let Some(stop) = column_stop {
            if m.pos.x <= stop {
                m.reason = StopReason::ColumnStop;
                break;
            }
        }

        let Some(cluster) = prev_cluster(bytes, m.offset) else {
            m.reason = StopReason::Exhausted;
            break;
        };

        m.offset -= cluster.len;
        m.movements += 1;
        if cluster.newline {
            m.newline = true;
            m.pos.y -= 1;
            // Column unknown from here on; stay negative.
            m.pos.x = -1;
        } else {
            m.pos.x -= cluster.width;
        }
    }

    m
}

/// Seek forward until `line` reaches `line_stop`, counting newlines.
///
/// Returns the offset *past* the newline that completed the count (or the
/// end of `bytes`) together with the new line number. Returns immediately
/// if `line` is already at or past `line_stop`.
pub fn newlines_forward(
    bytes: &[u8],
    offset: usize,
    mut line: Coord,
    line_stop: Coord,
) -> (usize, Coord) {
    if line >= line_stop {
        return (offset, line);
    }
    let mut i = offset;
    while i < bytes.len() {
        let byte = bytes[i];
        i += 1;
        if byte == b'\n' {
            line += 1;
            if line >= line_stop {
                break;
            }
        }
    }
    (i, line)
}

/// Seek backward until `line` reaches `line_stop`.
///
/// Returns the offset just past the newline that precedes line `line_stop`
/// (i.e. the start of that line within `bytes`), or 0 when the slice is
/// exhausted first. The current line's start counts: with `line ==
/// line_stop` this finds the start of the current line.
pub fn newlines_backward(
    bytes: &[u8],
    offset: usize,
    mut line: Coord,
    line_stop: Coord,
) -> (usize, Coord) {
    let mut i = offset.min(bytes.len());
    while i > 0 {
        if bytes[i - 1] == b'\n' {
            if line <= line_stop {
                return (i, line);
            }
            line -= 1;
        }
        i -= 1;
    }
    (0, line)
}
