//! sshkbm daemon library
//!
//! Drives the keyboard and mouse of a remote X display over SSH. Local key
//! and pointer events are translated into `xdotool` commands and run on the
//! remote host, while a background task tracks the remote lock-key state.
//!
//! ## Architecture
//!
//! - [`keyboard`]: key event to key-combination encoding
//! - [`gesture`]: pointer position to click/scroll/move classification
//! - [`command`]: rendering of remote shell commands
//! - [`remote`]: command execution over `ssh`
//! - [`session`]: the remote session and its shutdown signal
//! - [`dispatcher`]: ordered command queue in front of the executor
//! - [`lock_keys`]: lock-key parsing and the polling monitor
//! - [`ipc`] and [`control`]: the control socket and its request handling

pub mod command;
pub mod control;
pub mod dispatcher;
pub mod gesture;
pub mod ipc;
pub mod keyboard;
pub mod lock_keys;
pub mod remote;
pub mod session;
