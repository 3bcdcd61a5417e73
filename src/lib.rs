//! **usbwatcher** — USB plug/unplug dialog for embedded Linux devices.
//!
//! Hotplug scripts notify the daemon over a local Unix socket by writing a
//! single token (`USB-plugged` / `USB-unplugged`).  A plug event pops up a
//! dialog offering to export the device storage, start USB networking or do
//! nothing; an unplug event hides it again.
//!
//! # Architecture
//!
//! The crate is organised around three traits in [`traits`]:
//!
//! * [`traits::EventSource`] — the transport that delivers notifications
//!   (the Unix-socket listener in [`ipc`]).
//! * [`traits::PresentationSurface`] — the dialog window, so the state
//!   machine is not coupled to any toolkit (GTK4 in [`presentation`]).
//! * [`traits::CommandLauncher`] — fire-and-forget start of the helper
//!   programs ([`launcher`]).
//!
//! [`dispatcher::ActionDispatcher`] sits in the middle and owns the dialog
//! visibility.

pub mod config;
pub mod dispatcher;
pub mod event;
pub mod ipc;
pub mod launcher;
pub mod presentation;
pub mod traits;
