#![forbid(unsafe_code)]

//! The editor application: one function that rebuilds the whole UI for a
//! frame, plus the bits of state that outlive frames.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use quill_core::event::Shortcut;
use quill_core::geometry::Size;
use quill_text::TextBuffer;
use quill_ui::{FloatSpec, Padding, Ui};
use tracing::{debug, warn};

const SAVE: Shortcut = Shortcut::ctrl('S');
const QUIT: Shortcut = Shortcut::ctrl('Q');
const UNDO: Shortcut = Shortcut::ctrl('Z');
const REDO: Shortcut = Shortcut::ctrl('Y');

/// Editor state that survives across frames.
pub struct App {
    pub buffer: Rc<RefCell<TextBuffer>>,
    pub path: PathBuf,
    wants_save: bool,
    wants_exit: bool,
    status: Option<String>,
    /// Set once the main loop should stop after the current batch.
    pub should_quit: bool,
}

impl App {
    /// Load `path` into a fresh buffer. A file that cannot be opened is an
    /// empty document; it will exist once saved.
    pub fn new(path: PathBuf) -> Self {
        let mut buffer = TextBuffer::new();
        if let Err(err) = buffer.read_file(&path) {
            debug!(?path, %err, "starting with an empty document");
        }

        Self {
            buffer: Rc::new(RefCell::new(buffer)),
            path,
            wants_save: false,
            wants_exit: false,
            status: None,
            should_quit: false,
        }
    }

    /// Build the whole UI for one frame: menubar, document view, status
    /// bar, and the unsaved-changes dialog while quitting.
    pub fn build_frame(&mut self, ui: &mut Ui) {
        self.menubar(ui);

        let height = (ui.size().height - 2).max(0);
        ui.focus_next_by_default();
        ui.textarea(&self.buffer, Size::new(0, height));

        self.statusbar(ui);

        if self.wants_save {
            self.wants_save = false;
            self.save();
        }

        if self.wants_exit {
            if !self.buffer.borrow().is_dirty() {
                self.should_quit = true;
                return;
            }
            self.exit_dialog(ui);
        }

        if ui.consume_shortcut(SAVE) {
            self.wants_save = true;
        }
        if ui.consume_shortcut(QUIT) {
            self.wants_exit = true;
        }
    }

    fn menubar(&mut self, ui: &mut Ui) {
        ui.menubar_begin();
        ui.attr_background_rgba(0x3f7f_7f7f);
        ui.attr_foreground_rgba(0xffff_ffff);

        if ui.menubar_menu_begin("File", 'F') {
            if ui.menubar_menu_item("Save", 'S', Some(SAVE)) {
                self.wants_save = true;
            }
            if ui.menubar_menu_item("Exit", 'X', Some(QUIT)) {
                self.wants_exit = true;
            }
            ui.menubar_menu_end();
        }
        if ui.menubar_menu_begin("Edit", 'E') {
            if ui.menubar_menu_item("Undo", 'U', Some(UNDO)) {
                self.buffer.borrow_mut().undo();
            }
            if ui.menubar_menu_item("Redo", 'R', Some(REDO)) {
                self.buffer.borrow_mut().redo();
            }
            ui.menubar_menu_end();
        }
        if ui.menubar_menu_begin("Help", 'H') {
            if ui.menubar_menu_item("About", 'A', None) {
                self.status = Some(format!("quill {}", env!("CARGO_PKG_VERSION")));
            }
            ui.menubar_menu_end();
        }

        ui.menubar_end();
    }

    fn statusbar(&mut self, ui: &mut Ui) {
        ui.container_begin_named("statusbar");
        ui.attr_background_rgba(0x3f7f_7f7f);
        ui.attr_foreground_rgba(0xffff_ffff);

        let (line, column, overtype) = {
            let tb = self.buffer.borrow();
            let cursor = tb.cursor();
            (
                cursor.logical_pos.y + 1,
                cursor.logical_pos.x + 1,
                tb.overtype(),
            )
        };
        let mut status = format!(
            "Ln {line}, Col {column}  {}",
            if overtype { "OVR" } else { "INS" }
        );
        if let Some(message) = &self.status {
            status.push_str("  ");
            status.push_str(message);
        }
        ui.label(&status);
        ui.attr_padding(Padding::new(1, 0, 1, 0));

        ui.container_end();
    }

    fn exit_dialog(&mut self, ui: &mut Ui) {
        let size = ui.size();

        ui.container_begin_named("exit");
        ui.attr_foreground_indexed(15);
        ui.attr_background_indexed(1);
        ui.attr_border();
        ui.attr_float(FloatSpec {
            gravity_x: 0.5,
            gravity_y: 0.5,
            offset_x: size.width / 2,
            offset_y: size.height / 2,
        });
        {
            ui.label("Discard unsaved changes?");
            ui.attr_padding(Padding::new(2, 0, 2, 1));

            ui.container_begin_named("buttons");
            ui.attr_grid_columns(&[-1, -1]);
            {
                if ui.button("Yes") {
                    self.should_quit = true;
                }
                if ui.button("No") {
                    self.wants_exit = false;
                }
            }
            ui.container_end();
        }
        ui.container_end();
    }

    fn save(&mut self) {
        let result = self.buffer.borrow_mut().write_file(&self.path);
        match result {
            Ok(()) => self.status = None,
            Err(err) => {
                warn!(path = ?self.path, %err, "save failed");
                self.status = Some(format!("save failed: {err}"));
            }
        }
    }
}
