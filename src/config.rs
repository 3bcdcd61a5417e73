//! Application configuration.
//!
//! The configuration is loaded from a JSON file, by default
//! `$XDG_CONFIG_HOME/usbwatcher/config.json`.  Every section is optional and
//! falls back to the compiled-in defaults, so a minimal `{}` file is valid.
//!
//! # Example
//!
//! ```json
//! {
//!   "endpoint": { "name": "usbwatcher", "scope": "system" },
//!   "dialog": {
//!     "initially_visible": false,
//!     "title": "Usb connection",
//!     "actions": [
//!       { "label": "Usb Mass Storage", "command": "MountMassStorage" },
//!       { "label": "Charging", "command": "Dismiss" }
//!     ],
//!     "keys": { "Close": ["Escape"], "Usbnet": ["XF86Search", "x"] }
//!   },
//!   "commands": { "mass_storage": "usb-mass-storage", "usbnet": "usb-usbnet" }
//! }
//! ```

use crate::event::{parse_action, ActionCommand};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The dialog never offers more entries than this.
pub const MAX_ACTIONS: usize = 3;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where the notification socket lives.
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Dialog contents and key bindings.
    #[serde(default)]
    pub dialog: DialogConfig,

    /// External helper programs.
    #[serde(default)]
    pub commands: CommandConfig,
}

//  Endpoint

/// Who may reach the notification socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointScope {
    /// Socket in the user's runtime directory, mode `0600`.
    #[default]
    User,
    /// Socket in `/tmp`, mode `0666`, reachable by every local user.
    System,
}

impl EndpointScope {
    /// Permission bits for the socket file.
    pub fn socket_mode(&self) -> u32 {
        match self {
            EndpointScope::User => 0o600,
            EndpointScope::System => 0o666,
        }
    }
}

/// Local endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Well-known endpoint name; the socket file is `<name>.sock`.
    pub name: String,
    pub scope: EndpointScope,
    /// Explicit socket path.  Overrides `name` and `scope` when set.
    pub path: Option<PathBuf>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            name: "usbwatcher".into(),
            scope: EndpointScope::User,
            path: None,
        }
    }
}

impl EndpointConfig {
    /// Resolve the socket path from the process environment.
    pub fn socket_path(&self) -> PathBuf {
        if let Some(ref p) = self.path {
            return p.clone();
        }
        let runtime = std::env::var("XDG_RUNTIME_DIR").ok();
        let user = std::env::var("USER").ok();
        socket_path_for(self.scope, &self.name, runtime.as_deref(), user.as_deref())
    }
}

/// Pure path resolution behind [`EndpointConfig::socket_path`].
pub fn socket_path_for(
    scope: EndpointScope,
    name: &str,
    runtime_dir: Option<&str>,
    user: Option<&str>,
) -> PathBuf {
    match scope {
        EndpointScope::System => PathBuf::from(format!("/tmp/{}.sock", name)),
        EndpointScope::User => match runtime_dir.filter(|d| !d.is_empty()) {
            Some(dir) => PathBuf::from(dir).join(format!("{}.sock", name)),
            None => PathBuf::from(format!(
                "/tmp/{}-{}.sock",
                name,
                user.filter(|u| !u.is_empty()).unwrap_or("user")
            )),
        },
    }
}

/// The per-user config directory, `$XDG_CONFIG_HOME/usbwatcher`
/// (`$HOME/.config/usbwatcher` when unset).
pub fn config_dir() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        format!("{}/.config", home)
    });
    PathBuf::from(base).join("usbwatcher")
}

//  Dialog

/// One selectable entry of the dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionBinding {
    pub label: String,
    pub command: ActionCommand,
}

impl ActionBinding {
    pub fn new(label: impl Into<String>, command: ActionCommand) -> Self {
        Self {
            label: label.into(),
            command,
        }
    }
}

/// Key-binding profile: action name (`"Close"`, `"MassStorage"`,
/// `"Usbnet"`) to the key names that trigger it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyBindings(pub BTreeMap<String, Vec<String>>);

impl Default for KeyBindings {
    fn default() -> Self {
        let mut map = BTreeMap::new();
        map.insert("Close".into(), vec!["Escape".into()]);
        map.insert("MassStorage".into(), vec!["m".into()]);
        map.insert("Usbnet".into(), vec!["XF86Search".into(), "x".into()]);
        Self(map)
    }
}

impl KeyBindings {
    /// Look up the action bound to `key`.  Key names compare exactly, the
    /// way the toolkit reports them (`"Escape"`, `"x"`, `"XF86Search"`).
    pub fn resolve(&self, key: &str) -> Option<ActionCommand> {
        self.0
            .iter()
            .find(|(_, keys)| keys.iter().any(|k| k == key))
            .and_then(|(name, _)| parse_action(name))
    }
}

/// Dialog settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogConfig {
    /// Show the dialog at startup instead of waiting for the first plug
    /// event.
    pub initially_visible: bool,
    pub title: String,
    /// Entries in display order.  At most [`MAX_ACTIONS`].
    pub actions: Vec<ActionBinding>,
    pub keys: KeyBindings,
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            initially_visible: false,
            title: "Usb connection".into(),
            actions: vec![
                ActionBinding::new("Usb Mass Storage", ActionCommand::MountMassStorage),
                ActionBinding::new("Usb Network", ActionCommand::StartUsbNet),
                ActionBinding::new("Charging", ActionCommand::Dismiss),
            ],
            keys: KeyBindings::default(),
        }
    }
}

//  Commands

/// Shell command lines for the external helpers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub mass_storage: String,
    pub usbnet: String,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            mass_storage: "usb-mass-storage".into(),
            usbnet: "usb-usbnet".into(),
        }
    }
}

impl CommandConfig {
    /// The command line an action launches, if any.
    pub fn for_action(&self, action: ActionCommand) -> Option<&str> {
        match action {
            ActionCommand::MountMassStorage => Some(self.mass_storage.as_str()),
            ActionCommand::StartUsbNet => Some(self.usbnet.as_str()),
            ActionCommand::Dismiss => None,
        }
    }
}

//  Loading

impl Config {
    /// Load configuration from a JSON file at `path` and validate it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`load`](Config::load), but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Check the constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.name.is_empty() || self.endpoint.name.contains('/') {
            return Err(ConfigError(format!(
                "invalid endpoint name {:?}",
                self.endpoint.name
            )));
        }
        if self.dialog.actions.len() > MAX_ACTIONS {
            return Err(ConfigError(format!(
                "{} dialog actions configured, at most {} allowed",
                self.dialog.actions.len(),
                MAX_ACTIONS
            )));
        }
        if let Some(a) = self.dialog.actions.iter().find(|a| a.label.trim().is_empty()) {
            return Err(ConfigError(format!("action {} has an empty label", a.command)));
        }
        if let Some(name) = self.dialog.keys.0.keys().find(|n| parse_action(n).is_none()) {
            return Err(ConfigError(format!("unknown action {:?} in key bindings", name)));
        }
        Ok(())
    }
}

/// Error from loading, parsing or validating a configuration file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_full_config() {
        let json = r#"{
            "endpoint": { "name": "usbwatcher", "scope": "system" },
            "dialog": {
                "initially_visible": true,
                "title": "USB",
                "actions": [
                    { "label": "Storage", "command": "MountMassStorage" },
                    { "label": "Nothing", "command": "Dismiss" }
                ],
                "keys": { "Close": ["Escape", "q"] }
            },
            "commands": { "mass_storage": "/sbin/ums on", "usbnet": "/sbin/usbnet up" }
        }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.endpoint.scope, EndpointScope::System);
        assert!(cfg.dialog.initially_visible);
        assert_eq!(cfg.dialog.title, "USB");
        assert_eq!(cfg.dialog.actions.len(), 2);
        assert_eq!(cfg.dialog.actions[0].command, ActionCommand::MountMassStorage);
        assert_eq!(cfg.dialog.keys.resolve("q"), Some(ActionCommand::Dismiss));
        // A key table replaces the defaults entirely.
        assert_eq!(cfg.dialog.keys.resolve("x"), None);
        assert_eq!(cfg.commands.mass_storage, "/sbin/ums on");
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let cfg: Config = serde_json::from_str("{}").unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.endpoint.name, "usbwatcher");
        assert_eq!(cfg.endpoint.scope, EndpointScope::User);
        assert!(cfg.endpoint.path.is_none());
        assert!(!cfg.dialog.initially_visible);
        assert_eq!(cfg.dialog.actions.len(), 3);
        assert_eq!(cfg.commands.mass_storage, "usb-mass-storage");
        assert_eq!(cfg.commands.usbnet, "usb-usbnet");
    }

    #[test]
    fn deserialize_partial_dialog() {
        let json = r#"{ "dialog": { "initially_visible": true } }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert!(cfg.dialog.initially_visible);
        assert_eq!(cfg.dialog.title, DialogConfig::default().title);
        assert_eq!(cfg.dialog.actions, DialogConfig::default().actions);
    }

    #[test]
    fn unknown_top_level_keys_ignored() {
        let json = r#"{ "dialog": {}, "theme": { "font": "Sans" } }"#;
        let _cfg: Config = serde_json::from_str(json).unwrap();
    }

    #[test]
    fn too_many_actions_rejected() {
        let mut cfg = Config::default();
        cfg.dialog
            .actions
            .push(ActionBinding::new("Again", ActionCommand::Dismiss));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn empty_label_rejected() {
        let mut cfg = Config::default();
        cfg.dialog.actions[0].label = "  ".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_key_binding_action_rejected() {
        let json = r#"{ "dialog": { "keys": { "Reboot": ["r"] } } }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_action_command_fails_to_parse() {
        let json = r#"{ "dialog": { "actions": [ { "label": "x", "command": "Format" } ] } }"#;
        assert!(serde_json::from_str::<Config>(json).is_err());
    }

    #[test]
    fn default_key_bindings() {
        let keys = KeyBindings::default();
        assert_eq!(keys.resolve("Escape"), Some(ActionCommand::Dismiss));
        assert_eq!(keys.resolve("x"), Some(ActionCommand::StartUsbNet));
        assert_eq!(keys.resolve("XF86Search"), Some(ActionCommand::StartUsbNet));
        assert_eq!(keys.resolve("m"), Some(ActionCommand::MountMassStorage));
        assert_eq!(keys.resolve("Return"), None);
        // Key names are not case-folded.
        assert_eq!(keys.resolve("escape"), None);
    }

    #[test]
    fn command_for_action() {
        let c = CommandConfig::default();
        assert_eq!(c.for_action(ActionCommand::MountMassStorage), Some("usb-mass-storage"));
        assert_eq!(c.for_action(ActionCommand::StartUsbNet), Some("usb-usbnet"));
        assert_eq!(c.for_action(ActionCommand::Dismiss), None);
    }

    #[test]
    fn user_scope_uses_runtime_dir() {
        let p = socket_path_for(EndpointScope::User, "usbwatcher", Some("/run/user/1000"), Some("alice"));
        assert_eq!(p, PathBuf::from("/run/user/1000/usbwatcher.sock"));
    }

    #[test]
    fn user_scope_without_runtime_dir_falls_back_to_tmp() {
        let p = socket_path_for(EndpointScope::User, "usbwatcher", None, Some("alice"));
        assert_eq!(p, PathBuf::from("/tmp/usbwatcher-alice.sock"));
        let p = socket_path_for(EndpointScope::User, "usbwatcher", Some(""), None);
        assert_eq!(p, PathBuf::from("/tmp/usbwatcher-user.sock"));
    }

    #[test]
    fn system_scope_ignores_runtime_dir() {
        let p = socket_path_for(EndpointScope::System, "usbwatcher", Some("/run/user/1000"), Some("alice"));
        assert_eq!(p, PathBuf::from("/tmp/usbwatcher.sock"));
    }

    #[test]
    fn scope_socket_modes() {
        assert_eq!(EndpointScope::User.socket_mode(), 0o600);
        assert_eq!(EndpointScope::System.socket_mode(), 0o666);
    }

    #[test]
    fn explicit_path_overrides_scope() {
        let ep = EndpointConfig {
            path: Some(PathBuf::from("/var/run/usb.sock")),
            ..EndpointConfig::default()
        };
        assert_eq!(ep.socket_path(), PathBuf::from("/var/run/usb.sock"));
    }

    #[test]
    fn load_or_default_missing_file() {
        let path = std::env::temp_dir().join(format!(
            "usbwatcher-test-missing-{}.json",
            std::process::id()
        ));
        let cfg = Config::load_or_default(&path).unwrap();
        assert_eq!(cfg.endpoint.name, "usbwatcher");
    }

    #[test]
    fn load_malformed_file_is_an_error() {
        let path = std::env::temp_dir().join(format!(
            "usbwatcher-test-bad-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Config::load_or_default(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }
}
