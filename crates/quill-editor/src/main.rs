#![forbid(unsafe_code)]

//! quill binary entry point: terminal session, palette bootstrap, and the
//! read → classify → rebuild → render loop.

mod app;
mod cli;

use std::io;
use std::sync::Arc;

use quill_core::{InputEvent, InputReader, VtParser};
use quill_tty::{bootstrap_palette, Session};
use quill_ui::Ui;

use crate::app::App;

fn main() {
    let opts = cli::Opts::parse();
    init_tracing();

    let mut app = App::new(opts.path);
    if let Err(err) = run(&mut app) {
        eprintln!("quill: {err}");
        std::process::exit(1);
    }
}

fn run(app: &mut App) -> io::Result<()> {
    let mut session = Session::open()?;
    let mut ui = Ui::new();

    // The session already sent the palette queries; collect the replies.
    let mut parser = VtParser::new();
    let (palette, leftover) =
        bootstrap_palette(&mut parser, ui.palette(), |buf| session.read_stdin(buf))?;
    ui.set_palette(palette);

    let mut reader = InputReader::new();
    let mut events = reader.drain(&leftover);
    let mut buf = [0u8; 4096];

    loop {
        // One frame per event so every event observes the tree it was
        // aimed at, then a settling frame; only the last frame is drawn.
        for event in &events {
            // The terminal occasionally repeats the current size; skip the
            // no-op frames.
            if matches!(event, InputEvent::Resize(size) if *size == ui.size()) {
                continue;
            }
            ui.begin_frame(Some(event));
            app.build_frame(&mut ui);
            if app.should_quit {
                return Ok(());
            }
        }
        ui.begin_frame(None);
        app.build_frame(&mut ui);
        if app.should_quit {
            return Ok(());
        }

        let output = ui.render();
        session.write_stdout(&output)?;

        let n = session.read_stdin(&mut buf)?;
        if n == 0 {
            return Ok(());
        }
        events = reader.drain(&buf[..n]);
    }
}

/// Route tracing to the file named by `QUILL_LOG`; stdout belongs to the
/// renderer. Without the variable, logging stays off.
fn init_tracing() {
    let Ok(path) = std::env::var("QUILL_LOG") else {
        return;
    };
    let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    else {
        return;
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
}
