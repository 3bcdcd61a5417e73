//! Events and actions shared by every usbwatcher component.
//!
//! This module defines the vocabulary of the daemon: [`EventKind`] is what a
//! notification client can tell us, [`ActionCommand`] is what the user can
//! ask for from the dialog, and [`Input`] is the union of both as it travels
//! over the main-loop channel.
//!
//! [`classify`] turns the raw bytes of one connection into an
//! [`EventKind`].

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Token sent by a client when a USB cable has been plugged in.
pub const USB_PLUGGED: &[u8] = b"USB-plugged";

/// Token sent by a client when the USB cable has been removed.
pub const USB_UNPLUGGED: &[u8] = b"USB-unplugged";

/// What a completed message means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Plugged,
    Unplugged,
    /// Anything that is not byte-for-byte one of the two tokens.
    Unrecognized,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Plugged => write!(f, "plugged"),
            EventKind::Unplugged => write!(f, "unplugged"),
            EventKind::Unrecognized => write!(f, "unrecognized"),
        }
    }
}

/// Classify an assembled message.
///
/// Exact match only: the length must equal the token length and every byte
/// must match.  Nothing is trimmed, so `"USB-plugged\n"` and
/// `"USB-plugged\0"` are both [`EventKind::Unrecognized`].
pub fn classify(message: &[u8]) -> EventKind {
    if message.len() == USB_PLUGGED.len() && message == USB_PLUGGED {
        EventKind::Plugged
    } else if message.len() == USB_UNPLUGGED.len() && message == USB_UNPLUGGED {
        EventKind::Unplugged
    } else {
        EventKind::Unrecognized
    }
}

/// An action the user can pick from the dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ActionCommand {
    /// Export the device storage over USB.
    MountMassStorage,
    /// Bring up USB networking.
    StartUsbNet,
    /// Close the dialog and do nothing else.
    Dismiss,
}

impl ActionCommand {
    /// Name used for this action in the key-binding table.
    pub fn binding_name(&self) -> &'static str {
        match self {
            ActionCommand::MountMassStorage => "MassStorage",
            ActionCommand::StartUsbNet => "Usbnet",
            ActionCommand::Dismiss => "Close",
        }
    }
}

impl fmt::Display for ActionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionCommand::MountMassStorage => write!(f, "mass-storage"),
            ActionCommand::StartUsbNet => write!(f, "usbnet"),
            ActionCommand::Dismiss => write!(f, "dismiss"),
        }
    }
}

/// Parse an action name (case-insensitive).
///
/// Accepts the enum variant names (`"MountMassStorage"`), the key-binding
/// names (`"MassStorage"`, `"Usbnet"`, `"Close"`) and the display names
/// (`"mass-storage"`).
pub fn parse_action(s: &str) -> Option<ActionCommand> {
    let normalized: String = s
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(|c| c.to_lowercase())
        .collect();
    match normalized.as_str() {
        "mountmassstorage" | "massstorage" => Some(ActionCommand::MountMassStorage),
        "startusbnet" | "usbnet" => Some(ActionCommand::StartUsbNet),
        "dismiss" | "close" | "donothing" => Some(ActionCommand::Dismiss),
        _ => None,
    }
}

impl<'de> Deserialize<'de> for ActionCommand {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_action(&s).ok_or_else(|| DeError::custom(format!("invalid action: {:?}", s)))
    }
}

/// Everything the dispatcher can receive on the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// A classified notification from the socket listener.
    Event(EventKind),
    /// A user selection from the presentation surface.
    Action(ActionCommand),
}
