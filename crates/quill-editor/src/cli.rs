#![forbid(unsafe_code)]

//! Command-line argument parsing.
//!
//! Parsed manually to keep the binary lean; there is exactly one positional
//! argument and two informational flags.

use std::path::PathBuf;
use std::process;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP_TEXT: &str = "\
quill — a small terminal text editor

USAGE:
    quill <file>

OPTIONS:
    --help, -h       Show this help message
    --version, -V    Show version

ENVIRONMENT:
    QUILL_LOG        Append tracing output to this file (stdout is the
                     render target, so logs never go there)
    RUST_LOG         Filter directives for the tracing output

KEYS:
    Ctrl+S  Save        Ctrl+Z  Undo
    Ctrl+Q  Quit        Ctrl+Y  Redo
    Insert  Toggle overtype
";

/// Parsed command line.
#[derive(Debug)]
pub struct Opts {
    pub path: PathBuf,
}

impl Opts {
    /// Parse `std::env::args`, exiting for `--help`, `--version`, and
    /// usage errors.
    pub fn parse() -> Self {
        let mut path = None;

        for arg in std::env::args().skip(1) {
            match arg.as_str() {
                "--help" | "-h" => {
                    print!("{HELP_TEXT}");
                    process::exit(0);
                }
                "--version" | "-V" => {
                    println!("quill {VERSION}");
                    process::exit(0);
                }
                _ if arg.starts_with('-') => {
                    eprintln!("unknown option: {arg}");
                    eprintln!("usage: quill <file>");
                    process::exit(2);
                }
                _ if path.is_none() => path = Some(PathBuf::from(arg)),
                _ => {
                    eprintln!("usage: quill <file>");
                    process::exit(2);
                }
            }
        }

        let Some(path) = path else {
            eprintln!("usage: quill <file>");
            process::exit(2);
        };

        Self { path }
    }
}
