//! Send a USB notification to a running usbwatcher.
//!
//! Meant to be called from udev rules or hotplug scripts:
//!
//! ```text
//! usbwatcher-notify [--config <path>] [--system] [--socket <path>] plugged|unplugged
//! ```
//!
//! The endpoint is resolved from the same config file the daemon reads
//! (`--config`, else `$XDG_CONFIG_HOME/usbwatcher/config.json`), then
//! `--system` and `--socket` override it.
//!
//! Writes the bare token (no newline) and closes the connection; the daemon
//! never replies.

use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::process;
use usbwatcher::config::{config_dir, Config, ConfigError, EndpointConfig, EndpointScope};
use usbwatcher::event::{USB_PLUGGED, USB_UNPLUGGED};

/// Parsed command line.
#[derive(Debug, Default, PartialEq)]
struct Args {
    config: Option<PathBuf>,
    system: bool,
    socket: Option<PathBuf>,
    token: Option<&'static [u8]>,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut parsed = Args::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => match iter.next() {
                Some(p) => parsed.config = Some(PathBuf::from(p)),
                None => return Err("--config needs a path".into()),
            },
            "--system" => parsed.system = true,
            "--socket" => match iter.next() {
                Some(p) => parsed.socket = Some(PathBuf::from(p)),
                None => return Err("--socket needs a path".into()),
            },
            "plugged" => parsed.token = Some(USB_PLUGGED),
            "unplugged" => parsed.token = Some(USB_UNPLUGGED),
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(parsed)
}

/// The daemon's endpoint with the command-line overrides applied.
fn resolve_endpoint(args: &Args) -> Result<EndpointConfig, ConfigError> {
    let config = match args.config {
        Some(ref path) => Config::load(path)?,
        None => Config::load_or_default(&config_dir().join("config.json"))?,
    };
    let mut endpoint = config.endpoint;
    if args.system {
        endpoint.scope = EndpointScope::System;
    }
    if let Some(ref socket) = args.socket {
        endpoint.path = Some(socket.clone());
    }
    Ok(endpoint)
}

fn main() {
    let argv: Vec<String> = std::env::args().skip(1).collect();

    let args = match parse_args(&argv) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{e}");
            usage();
            process::exit(1);
        }
    };
    let Some(token) = args.token else {
        usage();
        process::exit(1);
    };

    let endpoint = match resolve_endpoint(&args) {
        Ok(ep) => ep,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    let path = endpoint.socket_path();
    let mut stream = match UnixStream::connect(&path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("usbwatcher not running ({path:?}): {e}");
            process::exit(1);
        }
    };

    if let Err(e) = stream.write_all(token) {
        eprintln!("failed to send notification: {e}");
        process::exit(1);
    }
}

fn usage() {
    eprintln!("usage: usbwatcher-notify [--config <path>] [--system] [--socket <path>] <event>");
    eprintln!();
    eprintln!("events:");
    eprintln!("  plugged    USB cable connected, show the dialog");
    eprintln!("  unplugged  USB cable removed, hide the dialog");
    eprintln!();
    eprintln!("The socket is taken from the daemon's config file; --system and");
    eprintln!("--socket override it.");
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    static TEST_ID: AtomicU32 = AtomicU32::new(0);

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn write_config(body: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "usbwatcher-notify-test-{}-{}.json",
            std::process::id(),
            TEST_ID.fetch_add(1, Ordering::SeqCst)
        ));
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn parses_event_and_flags() {
        let parsed = parse_args(&args(&["--system", "--config", "/etc/u.json", "unplugged"])).unwrap();
        assert!(parsed.system);
        assert_eq!(parsed.config, Some(PathBuf::from("/etc/u.json")));
        assert_eq!(parsed.token, Some(USB_UNPLUGGED));
    }

    #[test]
    fn missing_option_value_is_an_error() {
        assert!(parse_args(&args(&["plugged", "--config"])).is_err());
        assert!(parse_args(&args(&["--socket"])).is_err());
        assert!(parse_args(&args(&["replugged"])).is_err());
    }

    #[test]
    fn endpoint_comes_from_daemon_config() {
        let path = write_config(r#"{ "endpoint": { "path": "/run/usbwatcher/custom.sock" } }"#);
        let parsed = parse_args(&args(&["--config", path.to_str().unwrap(), "plugged"])).unwrap();

        let endpoint = resolve_endpoint(&parsed).unwrap();
        assert_eq!(endpoint.socket_path(), PathBuf::from("/run/usbwatcher/custom.sock"));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn command_line_overrides_config() {
        let path = write_config(r#"{ "endpoint": { "name": "usbwatch2", "scope": "user" } }"#);
        let cfg = path.to_str().unwrap();

        let parsed = parse_args(&args(&["--config", cfg, "--system", "plugged"])).unwrap();
        let endpoint = resolve_endpoint(&parsed).unwrap();
        assert_eq!(endpoint.socket_path(), PathBuf::from("/tmp/usbwatch2.sock"));

        let parsed = parse_args(&args(&["--config", cfg, "--socket", "/tmp/x.sock", "plugged"])).unwrap();
        let endpoint = resolve_endpoint(&parsed).unwrap();
        assert_eq!(endpoint.socket_path(), PathBuf::from("/tmp/x.sock"));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn unreadable_explicit_config_is_an_error() {
        let parsed = Args {
            config: Some(PathBuf::from("/nonexistent/usbwatcher.json")),
            ..Args::default()
        };
        assert!(resolve_endpoint(&parsed).is_err());
    }
}
