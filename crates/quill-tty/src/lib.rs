#![forbid(unsafe_code)]

//! Unix terminal session plumbing.
//!
//! Everything the editor core deliberately does not know about lives here:
//! raw mode, the startup/shutdown escape choreography, blocking stdin
//! reads, resize signals, and the palette bootstrap.
//!
//! ## Escape sequence reference
//!
//! | Feature            | Enable        | Disable       |
//! |--------------------|---------------|---------------|
//! | Alternate screen   | `CSI ?1049 h` | `CSI ?1049 l` |
//! | Cell-motion mouse  | `CSI ?1002 h` | `CSI ?1002 l` |
//! | SGR mouse          | `CSI ?1006 h` | `CSI ?1006 l` |
//! | Bracketed paste    | `CSI ?2004 h` | `CSI ?2004 l` |
//! | Palette query      | `OSC 4;i;? ST`| —             |
//! | Size report request| `CSI 18 t`    | —             |
//!
//! The size request makes the terminal answer with `CSI 8;rows;cols t` on
//! stdin, which the input classifier already understands — resizes flow
//! through the ordinary input path instead of a side channel. SIGWINCH
//! simply re-issues the request.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use quill_core::vt::{VtParser, VtToken};
use tracing::{debug, warn};

const STARTUP_MODES: &[u8] = b"\x1b[?1049h\x1b[?1002;1006;2004h";
const SHUTDOWN_MODES: &[u8] = b"\x1b[?2004;1006;1002l\x1b[0 q\x1b[?25h\x1b[?1049l";
const SIZE_REQUEST: &[u8] = b"\x1b[18t";

/// RAII guard that puts the controlling terminal into raw mode and restores
/// the original termios on drop, panic included.
#[cfg(unix)]
pub struct RawModeGuard {
    original: nix::sys::termios::Termios,
    tty: std::fs::File,
}

#[cfg(unix)]
impl RawModeGuard {
    /// Enter raw mode on `/dev/tty`.
    pub fn enter() -> io::Result<Self> {
        use nix::sys::termios;

        let tty = std::fs::File::open("/dev/tty")?;
        let original = termios::tcgetattr(&tty).map_err(io::Error::other)?;

        let mut raw = original.clone();
        termios::cfmakeraw(&mut raw);
        termios::tcsetattr(&tty, termios::SetArg::TCSAFLUSH, &raw).map_err(io::Error::other)?;

        Ok(Self { original, tty })
    }
}

#[cfg(unix)]
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        // Best effort; the terminal is going away anyway on failure.
        let _ = nix::sys::termios::tcsetattr(
            &self.tty,
            nix::sys::termios::SetArg::TCSAFLUSH,
            &self.original,
        );
    }
}

/// An open terminal session: raw mode plus the editor's terminal modes.
///
/// Dropping the session restores everything in reverse order.
#[cfg(unix)]
pub struct Session {
    _raw: RawModeGuard,
    resized: Arc<AtomicBool>,
}

#[cfg(unix)]
impl Session {
    /// Enter raw mode, switch to the alternate screen, enable mouse and
    /// bracketed-paste reporting, and ask the terminal for its palette and
    /// size.
    pub fn open() -> io::Result<Self> {
        let raw = RawModeGuard::enter()?;

        let resized = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(signal_hook::consts::SIGWINCH, Arc::clone(&resized))?;

        let mut out = io::stdout().lock();
        for i in 0..16 {
            write!(out, "\x1b]4;{i};?\x1b\\")?;
        }
        out.write_all(b"\x1b[c")?;
        out.write_all(STARTUP_MODES)?;
        out.write_all(SIZE_REQUEST)?;
        out.flush()?;

        debug!("terminal session opened");
        Ok(Self {
            _raw: raw,
            resized,
        })
    }

    /// Block until stdin yields bytes.
    ///
    /// Returns 0 on end of input. A SIGWINCH interrupt re-requests the
    /// window size (the report arrives as ordinary input) and resumes the
    /// read.
    pub fn read_stdin(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.resized.swap(false, Ordering::Relaxed) {
                self.write_stdout(SIZE_REQUEST)?;
            }
            match io::stdin().lock().read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Blocking, flushing write of a full frame.
    pub fn write_stdout(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(bytes)?;
        out.flush()
    }
}

#[cfg(unix)]
impl Drop for Session {
    fn drop(&mut self) {
        let mut out = io::stdout().lock();
        if out.write_all(SHUTDOWN_MODES).and_then(|_| out.flush()).is_err() {
            warn!("failed to restore terminal modes");
        }
    }
}

/// Drive the VT parser over startup responses until the `CSI c` device
/// attributes report arrives, collecting `OSC 4` palette replies.
///
/// Returns the palette (entries the terminal did not answer keep the
/// fallback) and any unconsumed bytes, which belong to the ordinary input
/// stream.
pub fn bootstrap_palette(
    parser: &mut VtParser,
    fallback: [u32; 16],
    mut read: impl FnMut(&mut [u8]) -> io::Result<usize>,
) -> io::Result<([u32; 16], Vec<u8>)> {
    let mut palette = fallback;
    let mut buf = [0u8; 4096];

    loop {
        let n = read(&mut buf)?;
        if n == 0 {
            // Terminal went away before answering; keep the fallback.
            return Ok((palette, Vec::new()));
        }

        let input = &buf[..n];
        let mut pos = 0;
        while pos < input.len() {
            match parser.next_token(input, &mut pos) {
                VtToken::Osc(payload) => {
                    if let Some((index, color)) = parse_osc_color(payload) {
                        palette[index] = color;
                    }
                }
                VtToken::Csi(csi) if csi.final_byte == b'c' => {
                    return Ok((palette, input[pos..].to_vec()));
                }
                _ => {}
            }
        }
    }
}

/// Parse an `OSC 4;<index>;rgb:RR/GG/BB` color report.
///
/// Components may be 2 or 4 hex digits; 4-digit components are scaled from
/// 16 to 8 bits. Returns the palette index and an opaque `0xAARRGGBB`.
pub fn parse_osc_color(payload: &[u8]) -> Option<(usize, u32)> {
    let text = std::str::from_utf8(payload).ok()?;
    let rest = text.strip_prefix("4;")?;
    let (index, spec) = rest.split_once(';')?;
    let index: usize = index.parse().ok()?;
    if index >= 16 {
        return None;
    }

    let spec = spec.strip_prefix("rgb:")?;
    let mut channels = spec.split('/');
    let mut rgb: u32 = 0;
    for _ in 0..3 {
        let part = channels.next()?;
        let value = u32::from_str_radix(part, 16).ok()?;
        let value = match part.len() {
            2 => value,
            4 => (value * 0xff + 0x8000) / 0xffff,
            _ => return None,
        };
        rgb = (rgb << 8) | value;
    }

    Some((index, 0xff00_0000 | rgb))
}
