//! The state machine that ties notifications, the dialog and the helper
//! programs together.
//!
//! [`ActionDispatcher`] owns the dialog's [`DialogVisibility`] and is the
//! only thing that changes it.  It reacts to [`Input`]s by calling the
//! [`PresentationSurface`] and, for the two USB modes, the
//! [`CommandLauncher`].
//!
//! | Current | Input                      | Effect                        | Next   |
//! |---------|----------------------------|-------------------------------|--------|
//! | any     | `Plugged`                  | hide, show                    | Shown  |
//! | any     | `Unplugged`                | hide                          | Hidden |
//! | any     | `Unrecognized`             | nothing                       | same   |
//! | Shown   | `MountMassStorage`         | hide, launch mass-storage     | Hidden |
//! | Shown   | `StartUsbNet`              | hide, launch usbnet           | Hidden |
//! | Shown   | `Dismiss`                  | hide                          | Hidden |
//!
//! User actions that arrive while the dialog is hidden are dropped.

use crate::config::CommandConfig;
use crate::event::{ActionCommand, EventKind, Input};
use crate::traits::{CommandLauncher, PresentationSurface};
use log::{debug, info};
use std::sync::mpsc;

/// Whether the dialog is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogVisibility {
    Hidden,
    Shown,
}

/// Translates events and user actions into presentation calls and helper
/// launches.
///
/// Generic over the surface and the launcher so it can be driven by the GTK
/// window in production and by recording doubles in tests.
pub struct ActionDispatcher<P: PresentationSurface, L: CommandLauncher> {
    surface: P,
    launcher: L,
    commands: CommandConfig,
    visibility: DialogVisibility,
    transitions: Vec<DialogVisibility>,
}

impl<P: PresentationSurface, L: CommandLauncher> ActionDispatcher<P, L> {
    /// Create a dispatcher with the dialog hidden.
    pub fn new(surface: P, launcher: L, commands: CommandConfig) -> Self {
        Self {
            surface,
            launcher,
            commands,
            visibility: DialogVisibility::Hidden,
            transitions: Vec::new(),
        }
    }

    /// Show the dialog right away instead of waiting for the first plug
    /// event.
    pub fn show_initially(&mut self) {
        info!("dialog initially visible");
        self.surface.show();
        self.set_visibility(DialogVisibility::Shown);
    }

    pub fn visibility(&self) -> DialogVisibility {
        self.visibility
    }

    /// Every visibility change since creation, oldest first.
    pub fn transitions(&self) -> &[DialogVisibility] {
        &self.transitions
    }

    /// Process a single [`Input`].
    pub fn handle(&mut self, input: Input) {
        match input {
            Input::Event(kind) => self.on_event(kind),
            Input::Action(action) => self.on_action(action),
        }
    }

    /// Handle every input already queued on `rx` without blocking.
    ///
    /// Returns `false` once every sender is gone.
    pub fn drain(&mut self, rx: &mpsc::Receiver<Input>) -> bool {
        loop {
            match rx.try_recv() {
                Ok(input) => {
                    debug!("input: {:?}", input);
                    self.handle(input);
                }
                Err(mpsc::TryRecvError::Empty) => return true,
                Err(mpsc::TryRecvError::Disconnected) => return false,
            }
        }
    }

    /// Handle inputs in arrival order until every sender is gone.
    pub fn run(&mut self, rx: mpsc::Receiver<Input>) {
        for input in rx {
            debug!("input: {:?}", input);
            self.handle(input);
        }
    }

    /// React to a classified notification.
    pub fn on_event(&mut self, kind: EventKind) {
        match kind {
            EventKind::Plugged => {
                info!("usb plugged");
                // Hide first so an already visible dialog is re-presented.
                self.surface.hide();
                self.surface.show();
                self.set_visibility(DialogVisibility::Shown);
            }
            EventKind::Unplugged => {
                info!("usb unplugged");
                self.surface.hide();
                self.set_visibility(DialogVisibility::Hidden);
            }
            EventKind::Unrecognized => {
                debug!("ignoring unrecognized message");
            }
        }
    }

    /// React to a user selection on the dialog.
    pub fn on_action(&mut self, action: ActionCommand) {
        if self.visibility == DialogVisibility::Hidden {
            debug!("dialog hidden, dropping action {}", action);
            return;
        }
        info!("action {}", action);
        self.surface.hide();
        self.set_visibility(DialogVisibility::Hidden);
        if let Some(command) = self.commands.for_action(action) {
            self.launcher.launch(command);
        }
    }

    fn set_visibility(&mut self, next: DialogVisibility) {
        if self.visibility != next {
            debug!("dialog {:?} -> {:?}", self.visibility, next);
            self.visibility = next;
            self.transitions.push(next);
        }
    }
}
