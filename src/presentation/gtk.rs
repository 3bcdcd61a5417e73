//! GTK4 dialog that runs on the **main thread**.
//!
//! # Widget tree
//!
//! ```text
//! window                         (layer-shell overlay when supported)
//! └ .usb-dialog                (vertical box)
//!     ├ .usb-title             (GtkLabel)
//!     └ .usb-actions           (GtkListBox, one row per action)
//!         └ .usb-action        (GtkLabel)
//! ```
//!
//! # CSS selectors
//!
//! | Selector        | Targets                          |
//! |-----------------|----------------------------------|
//! | `.usb-dialog`   | Container around the dialog      |
//! | `.usb-title`    | The title line                   |
//! | `.usb-actions`  | The action list                  |
//! | `.usb-action`   | Every action label               |
//!
//! User input never touches the dispatcher directly: row activation, bound
//! keys and the window's close request are turned into [`Input::Action`]
//! values and sent over the same channel the socket listener uses.  A GLib
//! timeout drains that channel into the [`ActionDispatcher`], so every
//! transition runs on this thread in arrival order.

use crate::config::{CommandConfig, DialogConfig, KeyBindings};
use crate::dispatcher::ActionDispatcher;
use crate::event::{ActionCommand, Input};
use crate::traits::{CommandLauncher, PresentationSurface};
use gtk4::prelude::*;
use gtk4::{gdk, glib};
use gtk4_layer_shell::LayerShell;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Fallback size when the compositor has no layer-shell support.
const WINDOW_WIDTH: i32 = 600;
const WINDOW_HEIGHT: i32 = 800;

//  Default CSS

const DEFAULT_CSS: &str = r#"
.usb-dialog {
    padding: 24px;
}

.usb-title {
    font-size: 1.4em;
    font-weight: bold;
    margin-bottom: 16px;
}

.usb-action {
    padding: 12px;
}
"#;

/// Errors that prevent the dialog from starting.
#[derive(Debug, thiserror::Error)]
pub enum GtkSurfaceError {
    #[error("failed to initialise GTK4: {0}")]
    Init(#[from] glib::BoolError),
}

//  Surface

/// The dialog window as a [`PresentationSurface`].
pub struct GtkSurface {
    window: gtk4::Window,
    list: gtk4::ListBox,
}

impl PresentationSurface for GtkSurface {
    fn show(&mut self) {
        self.window.set_visible(true);
        self.window.present();
        if let Some(first) = self.list.row_at_index(0) {
            self.list.select_row(Some(&first));
            first.grab_focus();
        }
    }

    fn hide(&mut self) {
        self.window.set_visible(false);
    }
}

fn build_window(dialog: &DialogConfig, input_tx: &mpsc::Sender<Input>) -> GtkSurface {
    let window = gtk4::Window::new();
    window.set_title(Some(dialog.title.as_str()));
    if gtk4_layer_shell::is_supported() {
        window.init_layer_shell();
        window.set_layer(gtk4_layer_shell::Layer::Overlay);
        window.set_namespace("usbwatcher");
        window.set_keyboard_mode(gtk4_layer_shell::KeyboardMode::OnDemand);
    } else {
        info!("no layer-shell support, using a regular toplevel");
        window.set_default_size(WINDOW_WIDTH, WINDOW_HEIGHT);
    }

    let container = gtk4::Box::new(gtk4::Orientation::Vertical, 0);
    container.add_css_class("usb-dialog");
    window.set_child(Some(&container));

    let title = gtk4::Label::new(Some(dialog.title.as_str()));
    title.add_css_class("usb-title");
    container.append(&title);

    let list = gtk4::ListBox::new();
    list.add_css_class("usb-actions");
    list.set_selection_mode(gtk4::SelectionMode::Single);
    for binding in &dialog.actions {
        let label = gtk4::Label::new(Some(binding.label.as_str()));
        label.add_css_class("usb-action");
        label.set_halign(gtk4::Align::Start);
        list.append(&label);
    }
    container.append(&list);

    //  Row activation (pointer or Return)
    let commands: Vec<ActionCommand> = dialog.actions.iter().map(|a| a.command).collect();
    let tx = input_tx.clone();
    list.connect_row_activated(move |_, row| {
        if let Some(&action) = usize::try_from(row.index()).ok().and_then(|i| commands.get(i)) {
            debug!("row {} activated: {}", row.index(), action);
            let _ = tx.send(Input::Action(action));
        }
    });

    //  Bound keys
    let keys = gtk4::EventControllerKey::new();
    let bindings: KeyBindings = dialog.keys.clone();
    let tx = input_tx.clone();
    keys.connect_key_pressed(move |_, keyval, _, _| {
        let Some(name) = keyval.name() else {
            return glib::Propagation::Proceed;
        };
        match bindings.resolve(name.as_str()) {
            Some(action) => {
                debug!("key {} -> {}", name, action);
                let _ = tx.send(Input::Action(action));
                glib::Propagation::Stop
            }
            None => glib::Propagation::Proceed,
        }
    });
    window.add_controller(keys);

    //  Window-manager close
    let tx = input_tx.clone();
    window.connect_close_request(move |_| {
        let _ = tx.send(Input::Action(ActionCommand::Dismiss));
        glib::Propagation::Stop
    });

    GtkSurface { window, list }
}

//  Public API

/// Run the GTK4 main loop on the **current** (main) thread.
///
/// Returns when the display connection goes away or every input sender is
/// dropped.
pub fn run_main_loop<L: CommandLauncher + 'static>(
    launcher: L,
    input_tx: mpsc::Sender<Input>,
    input_rx: mpsc::Receiver<Input>,
    dialog: DialogConfig,
    commands: CommandConfig,
    css_path: Option<PathBuf>,
) -> Result<(), GtkSurfaceError> {
    gtk4::init()?;
    info!("GTK4 initialised on main thread");

    load_css(&css_path);

    let main_loop = glib::MainLoop::new(None, false);

    //  Display loss is a transport error: shut down in order
    if let Some(display) = gdk::Display::default() {
        let ml = main_loop.clone();
        display.connect_closed(move |_, is_error| {
            warn!("display connection closed (error: {}), exiting", is_error);
            ml.quit();
        });
    }

    let surface = build_window(&dialog, &input_tx);
    drop(input_tx);

    //  Initial present (maps the surface), then hide
    surface.window.present();
    surface.window.set_visible(false);
    info!(
        "dialog mapped (hidden): {:?} with {} action(s)",
        dialog.title,
        dialog.actions.len()
    );

    let mut dispatcher = ActionDispatcher::new(surface, launcher, commands);
    if dialog.initially_visible {
        dispatcher.show_initially();
    }

    //  Input pump
    let ml = main_loop.clone();
    glib::timeout_add_local(POLL_INTERVAL, move || {
        if dispatcher.drain(&input_rx) {
            glib::ControlFlow::Continue
        } else {
            info!("all input sources closed, exiting");
            ml.quit();
            glib::ControlFlow::Break
        }
    });

    info!("entering GLib main loop");
    main_loop.run();
    info!("GLib main loop exited");
    Ok(())
}

//  CSS loading

fn load_css(css_path: &Option<PathBuf>) {
    let provider = gtk4::CssProvider::new();

    let css_content = match css_path.as_ref().filter(|p| p.exists()) {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(content) => {
                info!("user CSS: {} ({} bytes)", p.display(), content.len());
                content
            }
            Err(e) => {
                warn!("CSS read failed ({}): {}, using built-in", p.display(), e);
                DEFAULT_CSS.to_string()
            }
        },
        None => {
            info!("no user CSS, using built-in default");
            DEFAULT_CSS.to_string()
        }
    };

    #[allow(deprecated)]
    provider.load_from_data(&css_content);

    if let Some(display) = gdk::Display::default() {
        gtk4::style_context_add_provider_for_display(
            &display,
            &provider,
            gtk4::STYLE_PROVIDER_PRIORITY_APPLICATION,
        );
    } else {
        warn!("no GDK display, CSS will not be applied");
    }
}
