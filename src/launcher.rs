//! Detached launcher for the external USB helper programs.
//!
//! Helpers such as `usb-mass-storage` may take a while (or hang), and the
//! dialog must stay responsive meanwhile, so [`DetachedLauncher`] only
//! starts the process.  A short-lived reaper thread waits on the child so
//! it does not linger as a zombie; its exit status goes to the debug log
//! and nowhere else.

use crate::traits::CommandLauncher;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

/// Starts shell command lines via `sh -c` without waiting for them.
#[derive(Debug, Clone)]
pub struct DetachedLauncher {
    shell: PathBuf,
}

/// Errors from starting a helper process.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("cannot start {command:?}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
}

impl Default for DetachedLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl DetachedLauncher {
    /// A launcher using `/bin/sh`.
    pub fn new() -> Self {
        Self::with_shell("/bin/sh")
    }

    /// A launcher using another POSIX shell.
    pub fn with_shell(shell: impl AsRef<Path>) -> Self {
        Self {
            shell: shell.as_ref().to_path_buf(),
        }
    }

    /// Start `command` and return the child's pid.
    ///
    /// Only a failure to fork/exec the shell is reported; what the command
    /// itself does is not observed.
    pub fn spawn(&self, command: &str) -> Result<u32, LaunchError> {
        let child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                command: command.to_string(),
                source,
            })?;
        let pid = child.id();

        let label = command.to_string();
        let reaper = std::thread::Builder::new()
            .name("usbwatcher-reaper".into())
            .spawn(move || reap(child, &label));
        if let Err(e) = reaper {
            warn!("no reaper for pid {}: {}", pid, e);
        }
        Ok(pid)
    }
}

fn reap(mut child: Child, command: &str) {
    match child.wait() {
        Ok(status) => debug!("{:?} (pid {}) exited: {}", command, child.id(), status),
        Err(e) => debug!("wait for {:?} failed: {}", command, e),
    }
}

impl CommandLauncher for DetachedLauncher {
    fn launch(&mut self, command: &str) {
        match self.spawn(command) {
            Ok(pid) => info!("started {:?} (pid {})", command, pid),
            Err(e) => warn!("{}", e),
        }
    }
}
