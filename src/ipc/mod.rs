//! IPC listener that accepts USB notifications over a Unix socket.
//!
//! Hotplug scripts connect to the socket, write a single token
//! (`USB-plugged` or `USB-unplugged`) and close the connection.

pub mod assembler;
pub mod listener;
