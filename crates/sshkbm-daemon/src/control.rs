//! Control request handling
//!
//! Turns control socket requests into input commands and status replies.
//! Key events go through the encoder, pointer events through the gesture
//! classifier, and both end up on the dispatcher queue. Lock-key events from
//! the monitor are folded into a shared [`LockStatus`] that `lock_state` and
//! `status` requests read.

use std::sync::Arc;

use sshkbm_config::Config;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::command::InputCommand;
use crate::dispatcher::Dispatcher;
use crate::gesture::{classify, GestureZones, ZoneError};
use crate::ipc::{IpcRequest, IpcResponse};
use crate::keyboard::{encode, EncoderConfig, Encoded, LiveModifiers, RawKey, StickyModifiers};
use crate::lock_keys::{LockKeyEvent, LockKeyState};
use crate::session::RemoteSession;

/// Last known lock-key state and remote reachability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockStatus {
    /// `None` until the first successful poll
    pub state: Option<LockKeyState>,
    pub reachable: bool,
}

impl Default for LockStatus {
    fn default() -> Self {
        Self {
            state: None,
            reachable: true,
        }
    }
}

pub type SharedLockStatus = Arc<RwLock<LockStatus>>;

/// Fold monitor events into `status` until the monitor stops
pub async fn track_lock_events(mut events: mpsc::Receiver<LockKeyEvent>, status: SharedLockStatus) {
    while let Some(event) = events.recv().await {
        let mut status = status.write().await;
        match event {
            LockKeyEvent::Changed(state) => {
                info!(%state, "Lock keys changed");
                status.state = Some(state);
            }
            LockKeyEvent::Unreachable {
                consecutive_failures,
                error,
            } => {
                warn!(consecutive_failures, error = %error, "Remote host unreachable");
                status.reachable = false;
            }
            LockKeyEvent::Reachable => {
                status.reachable = true;
            }
        }
    }
    debug!("Lock-key event stream ended");
}

/// Handles control socket requests for one remote session
#[derive(Clone)]
pub struct Controller {
    dispatcher: Dispatcher,
    encoder: EncoderConfig,
    sticky: StickyModifiers,
    zones: Arc<GestureZones>,
    lock_status: SharedLockStatus,
    host: String,
    display: String,
}

impl Controller {
    pub fn new(
        dispatcher: Dispatcher,
        session: &RemoteSession,
        config: &Config,
        lock_status: SharedLockStatus,
    ) -> Result<Self, ZoneError> {
        Ok(Self {
            dispatcher,
            encoder: EncoderConfig {
                ignore_modifiers: config.keyboard.ignore_modifiers,
            },
            sticky: StickyModifiers::from(config.keyboard.sticky.as_slice()),
            zones: Arc::new(GestureZones::try_from(&config.mouse)?),
            lock_status,
            host: session.host().to_string(),
            display: session.renderer().display().to_string(),
        })
    }

    pub async fn handle(&self, request: IpcRequest) -> IpcResponse {
        match request {
            IpcRequest::Key {
                key,
                code,
                modifiers,
                sticky,
                ignore_modifiers,
            } => {
                let raw = match IpcRequest::raw_key(code, key.as_deref()) {
                    Ok(raw) => raw,
                    Err(e) => {
                        return IpcResponse::Error {
                            message: e.to_string(),
                        }
                    }
                };
                self.handle_key(&raw, modifiers, sticky, ignore_modifiers)
                    .await
            }
            IpcRequest::Type { text } => {
                if text.is_empty() {
                    return IpcResponse::Skipped;
                }
                self.run(InputCommand::Type(text)).await
            }
            IpcRequest::Pointer {
                x,
                y,
                width,
                height,
            } => {
                let gesture = classify(x, y, width, height, &self.zones);
                debug!(x, y, width, height, %gesture, "Classified pointer event");
                match gesture.command() {
                    Some(command) => self.run(command).await,
                    None => IpcResponse::Skipped,
                }
            }
            IpcRequest::LockState => {
                let status = *self.lock_status.read().await;
                IpcResponse::LockState {
                    state: status.state,
                    reachable: status.reachable,
                }
            }
            IpcRequest::Status => {
                let status = *self.lock_status.read().await;
                let stats = self.dispatcher.stats();
                IpcResponse::Status {
                    host: self.host.clone(),
                    display: self.display.clone(),
                    dispatched: stats.dispatched,
                    failed: stats.failed,
                    lock_state: status.state,
                    reachable: status.reachable,
                }
            }
        }
    }

    async fn handle_key(
        &self,
        raw: &RawKey,
        live: LiveModifiers,
        sticky: StickyModifiers,
        ignore_modifiers: bool,
    ) -> IpcResponse {
        let config = EncoderConfig {
            ignore_modifiers: self.encoder.ignore_modifiers || ignore_modifiers,
        };
        match encode(raw, live, self.sticky.union(sticky), &config) {
            Encoded::Combination(combination) => self.run(InputCommand::Key(combination)).await,
            Encoded::Skip => IpcResponse::Skipped,
        }
    }

    async fn run(&self, command: InputCommand) -> IpcResponse {
        let description = command.to_string();
        match self.dispatcher.dispatch(command).await {
            Ok(()) => IpcResponse::Success {
                message: Some(description),
            },
            Err(e) => IpcResponse::Error {
                message: e.to_string(),
            },
        }
    }
}
