//! Presentation surfaces for the USB dialog.
//!
//! When the `presentation-gtk` feature is enabled, [`gtk::run_main_loop`]
//! takes over the main thread and drives both input processing and the
//! dialog window through the GLib main loop.  [`LogSurface`] is the
//! headless stand-in used without the feature.

#[cfg(feature = "presentation-gtk")]
pub mod gtk;

use crate::config::ActionBinding;
use crate::traits::PresentationSurface;
use log::info;

/// A surface that only logs what a real dialog would do.
#[derive(Debug, Default)]
pub struct LogSurface {
    actions: Vec<ActionBinding>,
    visible: bool,
}

impl LogSurface {
    pub fn new(actions: Vec<ActionBinding>) -> Self {
        Self {
            actions,
            visible: false,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

impl PresentationSurface for LogSurface {
    fn show(&mut self) {
        self.visible = true;
        let labels: Vec<&str> = self.actions.iter().map(|a| a.label.as_str()).collect();
        info!("dialog shown: [{}]", labels.join(", "));
    }

    fn hide(&mut self) {
        if self.visible {
            info!("dialog hidden");
        }
        self.visible = false;
    }
}
