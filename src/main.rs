//! Entry point for the **usbwatcher** daemon.
//!
//! Binds the notification socket, runs the listener on a background thread
//! and processes inputs on the main thread.
//!
//! When the `presentation-gtk` feature is enabled the main thread runs the
//! GLib main loop (GTK4 requires it) and polls the input channel from there.
//! Without the feature, or with `--headless`, a blocking loop drives a
//! logging surface instead.
//!
//! # Usage
//!
//! ```text
//! usbwatcher [--config <path>] [--headless]
//! ```

use log::{error, info};
use std::path::PathBuf;
use std::sync::mpsc;
use usbwatcher::config::{config_dir, Config};
use usbwatcher::dispatcher::ActionDispatcher;
use usbwatcher::event::Input;
use usbwatcher::ipc::listener::UnixSocketListener;
use usbwatcher::launcher::DetachedLauncher;
#[cfg(feature = "presentation-gtk")]
use usbwatcher::presentation::gtk::GtkSurfaceError;
use usbwatcher::presentation::LogSurface;
use usbwatcher::traits::EventSource;

/// Value of `--config <path>`, if given.
fn config_arg(args: &[String]) -> Option<PathBuf> {
    args.iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}

/// Load the config from `--config` or `$XDG_CONFIG_HOME/usbwatcher/config.json`.
///
/// A missing default file means defaults; an unreadable or invalid file is
/// fatal.
fn load_config(args: &[String]) -> Config {
    let (path, explicit) = match config_arg(args) {
        Some(p) => (p, true),
        None => (config_dir().join("config.json"), false),
    };
    let result = if explicit {
        Config::load(&path)
    } else {
        Config::load_or_default(&path)
    };
    match result {
        Ok(cfg) => {
            if path.exists() {
                info!("loaded config from {}", path.display());
            } else {
                info!("no config file at {}, using defaults", path.display());
            }
            cfg
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

//  Main

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let headless = args.iter().any(|a| a == "--headless");
    let config = load_config(&args);

    let socket_path = config.endpoint.socket_path();
    let mode = config.endpoint.scope.socket_mode();
    let mut listener = match UnixSocketListener::bind(&socket_path, mode) {
        Ok(l) => l,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    // The listener thread is never joined; the socket file goes with main.
    let cleanup = listener.cleanup();

    let (input_tx, input_rx) = mpsc::channel::<Input>();
    {
        let tx = input_tx.clone();
        std::thread::spawn(move || {
            if let Err(e) = listener.run(tx) {
                error!("socket listener error: {}", e);
            }
        });
    }

    let result = if headless {
        drop(input_tx);
        run_headless(config, input_rx);
        Ok(())
    } else {
        start_event_loop(config, input_tx, input_rx)
    };

    drop(cleanup);
    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

//  Event loops

#[cfg(feature = "presentation-gtk")]
fn start_event_loop(
    config: Config,
    input_tx: mpsc::Sender<Input>,
    input_rx: mpsc::Receiver<Input>,
) -> Result<(), GtkSurfaceError> {
    usbwatcher::presentation::gtk::run_main_loop(
        DetachedLauncher::new(),
        input_tx,
        input_rx,
        config.dialog,
        config.commands,
        Some(config_dir().join("style.css")),
    )
}

#[cfg(not(feature = "presentation-gtk"))]
fn start_event_loop(
    config: Config,
    input_tx: mpsc::Sender<Input>,
    input_rx: mpsc::Receiver<Input>,
) -> Result<(), std::convert::Infallible> {
    drop(input_tx);
    run_headless(config, input_rx);
    Ok(())
}

fn run_headless(config: Config, input_rx: mpsc::Receiver<Input>) {
    let surface = LogSurface::new(config.dialog.actions.clone());
    let mut dispatcher = ActionDispatcher::new(surface, DetachedLauncher::new(), config.commands);
    if config.dialog.initially_visible {
        dispatcher.show_initially();
    }
    info!("usbwatcher running (headless)");
    dispatcher.run(input_rx);
    info!("all input sources closed, exiting");
}
