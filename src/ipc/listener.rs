//! Unix-socket [`EventSource`] implementation.
//!
//! Binds a Unix stream socket and reads every accepted connection on its own
//! thread until the peer closes it.  The bytes are then classified and the
//! resulting [`EventKind`](crate::event::EventKind) is forwarded to the main
//! loop.
//!
//! # Wire format
//!
//! One token per connection, no newline, no reply:
//!
//! ```text
//! USB-plugged
//! USB-unplugged
//! ```
//!
//! Anything else is forwarded as `Unrecognized` and ignored by the
//! dispatcher.

use crate::event::{classify, Input};
use crate::ipc::assembler::MessageAssembler;
use crate::traits::EventSource;
use log::{debug, error, info, warn};
use std::io::{ErrorKind, Read};
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

const READ_CHUNK: usize = 512;

/// How long a connected client may stay silent before its connection is
/// abandoned.  Real clients write one token and close.
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(10);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// An [`EventSource`] that listens on a Unix stream socket for USB
/// notifications.
///
/// The socket is bound by [`bind`](UnixSocketListener::bind) so that a bind
/// failure surfaces at startup, before any thread is spawned.  The socket
/// file is removed again when the listener, or the [`SocketCleanup`] taken
/// from it, is dropped.
pub struct UnixSocketListener {
    path: PathBuf,
    listener: UnixListener,
    read_timeout: Duration,
    sink_closed: Arc<AtomicBool>,
    next_id: AtomicU64,
}

/// Errors produced by the Unix socket listener.
#[derive(Debug, thiserror::Error)]
pub enum UnixSocketError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot bind {}: {source}", path.display())]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{} is in use by a running instance", path.display())]
    InUse { path: PathBuf },
}

impl UnixSocketListener {
    /// Bind a listener at `path` and set the socket file's permission bits
    /// to `mode`.
    ///
    /// A socket file nobody listens on any more is replaced.  A live socket,
    /// or anything at `path` that is not a socket, is left untouched and the
    /// bind fails.
    pub fn bind(path: impl AsRef<Path>, mode: u32) -> Result<Self, UnixSocketError> {
        let path = path.as_ref().to_path_buf();

        remove_stale_socket(&path)?;

        let listener = UnixListener::bind(&path).map_err(|source| UnixSocketError::Bind {
            path: path.clone(),
            source,
        })?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))?;
        info!("listening on {} (mode {:o})", path.display(), mode);

        Ok(Self {
            path,
            listener,
            read_timeout: READ_TIMEOUT,
            sink_closed: Arc::new(AtomicBool::new(false)),
            next_id: AtomicU64::new(0),
        })
    }

    /// Override [`READ_TIMEOUT`] for every connection accepted from now on.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// The filesystem path of the socket.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A guard that removes the socket file when dropped.
    ///
    /// [`run`](EventSource::run) never returns while clients keep quiet, so
    /// the thread that moves the listener away may outlive `main`.  Keep the
    /// guard on the main thread to clean up on exit.
    pub fn cleanup(&self) -> SocketCleanup {
        SocketCleanup {
            path: self.path.clone(),
        }
    }
}

impl Drop for UnixSocketListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Removes the socket file it was taken for when dropped.
#[derive(Debug)]
pub struct SocketCleanup {
    path: PathBuf,
}

impl Drop for SocketCleanup {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("removed {}", self.path.display()),
            Err(ref e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("cannot remove {}: {}", self.path.display(), e),
        }
    }
}

/// Clear `path` for binding if it holds a socket nobody accepts on.
fn remove_stale_socket(path: &Path) -> Result<(), UnixSocketError> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(ref e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(UnixSocketError::Bind {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if !meta.file_type().is_socket() {
        return Err(UnixSocketError::Bind {
            path: path.to_path_buf(),
            source: std::io::Error::new(ErrorKind::AlreadyExists, "path exists and is not a socket"),
        });
    }
    match UnixStream::connect(path) {
        Ok(_) => Err(UnixSocketError::InUse {
            path: path.to_path_buf(),
        }),
        Err(ref e) if e.kind() == ErrorKind::ConnectionRefused => {
            info!("removing stale socket {}", path.display());
            std::fs::remove_file(path).map_err(|source| UnixSocketError::Bind {
                path: path.to_path_buf(),
                source,
            })
        }
        Err(source) => Err(UnixSocketError::Bind {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Read `reader` to EOF, one chunk at a time.
///
/// A read error, including a read timeout, ends the message early; whatever
/// arrived before it is returned.
pub fn read_message<R: Read>(mut reader: R) -> Vec<u8> {
    let mut assembler = MessageAssembler::new();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => assembler.append(&chunk[..n]),
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("read error after {} bytes: {}", assembler.len(), e);
                break;
            }
        }
    }
    assembler.finalize()
}

/// Pause before the next `accept` after `consecutive` failures in a row.
fn accept_backoff(consecutive: u32) -> Duration {
    let factor = 1u32 << consecutive.saturating_sub(1).min(16);
    ACCEPT_BACKOFF_MIN
        .saturating_mul(factor)
        .min(ACCEPT_BACKOFF_MAX)
}

fn handle_connection(
    id: u64,
    stream: UnixStream,
    read_timeout: Duration,
    sink: mpsc::Sender<Input>,
    sink_closed: Arc<AtomicBool>,
) {
    debug!("client {} connected", id);
    if let Err(e) = stream.set_read_timeout(Some(read_timeout)) {
        warn!("client {}: cannot set read timeout: {}", id, e);
    }
    let message = read_message(stream);
    let kind = classify(&message);
    debug!("client {} disconnected after {} bytes: {}", id, message.len(), kind);
    if sink.send(Input::Event(kind)).is_err() {
        sink_closed.store(true, Ordering::SeqCst);
    }
}

impl EventSource for UnixSocketListener {
    type Error = UnixSocketError;

    /// Accept connections until the sink is closed.
    ///
    /// This method **blocks**.  Run it on a dedicated thread.
    fn run(&mut self, sink: mpsc::Sender<Input>) -> Result<(), Self::Error> {
        let mut failures = 0u32;
        for stream in self.listener.incoming() {
            if self.sink_closed.load(Ordering::SeqCst) {
                info!("sink closed, shutting down");
                return Ok(());
            }
            match stream {
                Ok(stream) => {
                    failures = 0;
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let sink = sink.clone();
                    let closed = Arc::clone(&self.sink_closed);
                    let timeout = self.read_timeout;
                    let spawned = std::thread::Builder::new()
                        .name(format!("usbwatcher-client-{}", id))
                        .spawn(move || handle_connection(id, stream, timeout, sink, closed));
                    if let Err(e) = spawned {
                        error!("cannot spawn reader for client {}: {}", id, e);
                    }
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let pause = accept_backoff(failures);
                    error!("accept error ({} in a row, retrying in {:?}): {}", failures, pause, e);
                    std::thread::sleep(pause);
                }
            }
        }
        Ok(())
    }
}

//  Tests
