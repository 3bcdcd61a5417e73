//! Core traits that decouple usbwatcher from any specific toolkit, transport
//! or process launcher.
//!
//! The [`ActionDispatcher`](crate::dispatcher::ActionDispatcher) only depends
//! on these abstractions, so it can be driven from a GTK window, a headless
//! logger or a test harness alike.

use crate::event::Input;
use std::sync::mpsc;

/// The on-screen dialog.
///
/// Implementations own the actual window.  Both calls must be idempotent:
/// hiding a hidden dialog or showing a shown one is harmless.
pub trait PresentationSurface {
    /// Map the dialog and bring it to the front.
    fn show(&mut self);

    /// Unmap the dialog.
    fn hide(&mut self);
}

/// Starts an external helper program without waiting for it.
///
/// The contract is deliberately fire-and-forget: a launcher never reports
/// whether the program could be started or how it exited.  Anything it
/// wants to say about that goes to the log.
pub trait CommandLauncher {
    /// Start `command` (a shell command line) and return immediately.
    fn launch(&mut self, command: &str);
}

/// A source of [`Input`]s.
///
/// Implementations listen on some transport (a Unix socket, an in-memory
/// list, ...) and forward what they receive into the provided
/// [`mpsc::Sender`].
///
/// # Contract
///
/// * [`run`](EventSource::run) **blocks** until the source is exhausted, the
///   sink is closed, or an unrecoverable error occurs.
/// * Each input must be sent through `sink` exactly once.
/// * Implementations must be [`Send`] so they can run on a dedicated thread.
pub trait EventSource: Send {
    /// The error type produced by this source.
    type Error: std::error::Error + Send + 'static;

    /// Start listening and forward every incoming [`Input`] into `sink`.
    fn run(&mut self, sink: mpsc::Sender<Input>) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ActionCommand, EventKind};

    /// A test double that emits a fixed sequence of inputs.
    struct MockSource {
        inputs: Vec<Input>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("mock error")]
    struct MockError;

    impl EventSource for MockSource {
        type Error = MockError;

        fn run(&mut self, sink: mpsc::Sender<Input>) -> Result<(), MockError> {
            for input in self.inputs.drain(..) {
                let _ = sink.send(input);
            }
            Ok(())
        }
    }

    #[test]
    fn mock_source_emits_inputs_in_order() {
        let mut src = MockSource {
            inputs: vec![
                Input::Event(EventKind::Plugged),
                Input::Action(ActionCommand::Dismiss),
            ],
        };
        let (tx, rx) = mpsc::channel();
        src.run(tx).unwrap();
        let inputs: Vec<Input> = rx.try_iter().collect();
        assert_eq!(
            inputs,
            vec![
                Input::Event(EventKind::Plugged),
                Input::Action(ActionCommand::Dismiss),
            ]
        );
    }
}
