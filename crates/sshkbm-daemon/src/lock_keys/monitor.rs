//! Lock-key polling task
//!
//! Polls the remote lock-key state on a fixed interval and reports changes
//! through an mpsc channel, in poll order.
//!
//! ## Failure handling
//!
//! A failed query keeps the last known state and the loop continues on
//! schedule. After `failure_threshold` consecutive failures a single
//! [`LockKeyEvent::Unreachable`] is sent; the next successful poll sends
//! [`LockKeyEvent::Reachable`] before any state change.
//!
//! ## Cancellation
//!
//! The session's shutdown signal is checked before each poll and raced
//! against both the in-flight query and the interval sleep, so stopping never
//! waits for a slow remote call. The task also stops when the receiver is
//! dropped.

use std::time::Duration;

use sshkbm_config::LockKeysConfig;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::LockKeyState;
use crate::remote::RemoteError;
use crate::session::{RemoteSession, Shutdown};

/// Default capacity for the event channel
pub const DEFAULT_CHANNEL_BUFFER: usize = 16;

/// Events reported by the monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockKeyEvent {
    /// The lock-key state differs from the last reported state
    Changed(LockKeyState),
    /// Queries have failed `consecutive_failures` times in a row
    Unreachable {
        consecutive_failures: u32,
        error: String,
    },
    /// A query succeeded after [`LockKeyEvent::Unreachable`]
    Reachable,
}

/// Background poller for the remote lock-key state
pub struct LockKeyMonitor {
    session: RemoteSession,
    interval: Duration,
    failure_threshold: u32,
    events: mpsc::Sender<LockKeyEvent>,
    last: Option<LockKeyState>,
    consecutive_failures: u32,
    unreachable: bool,
}

impl LockKeyMonitor {
    pub fn new(
        session: RemoteSession,
        interval: Duration,
        failure_threshold: u32,
        events: mpsc::Sender<LockKeyEvent>,
    ) -> Self {
        Self {
            session,
            interval,
            failure_threshold: failure_threshold.max(1),
            events,
            last: None,
            consecutive_failures: 0,
            unreachable: false,
        }
    }

    pub fn from_config(
        session: RemoteSession,
        config: &LockKeysConfig,
        events: mpsc::Sender<LockKeyEvent>,
    ) -> Self {
        Self::new(session, config.interval, config.failure_threshold, events)
    }

    /// Spawn the polling loop on the tokio runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Poll until shutdown or until the receiver is dropped
    pub async fn run(mut self) {
        let mut shutdown = self.session.shutdown();
        let query = self.session.renderer().render_lock_query();

        info!(
            host = %self.session.host(),
            interval_ms = self.interval.as_millis() as u64,
            "Lock-key monitor started"
        );

        loop {
            if shutdown.is_triggered() || self.events.is_closed() {
                break;
            }

            let keep_going = match self.session.run(query.clone()).await {
                None => false,
                Some(Ok(output)) => {
                    self.on_success(LockKeyState::parse(&output.stdout), &mut shutdown)
                        .await
                }
                Some(Err(e)) => self.on_failure(e, &mut shutdown).await,
            };
            if !keep_going {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.wait() => break,
            }
        }

        info!("Lock-key monitor stopped");
    }

    async fn on_success(&mut self, state: LockKeyState, shutdown: &mut Shutdown) -> bool {
        self.consecutive_failures = 0;

        if self.unreachable {
            self.unreachable = false;
            info!(host = %self.session.host(), "Remote host reachable again");
            if !self.emit(LockKeyEvent::Reachable, shutdown).await {
                return false;
            }
        }

        if self.last == Some(state) {
            return true;
        }

        debug!(%state, "Lock-key state changed");
        self.last = Some(state);
        self.emit(LockKeyEvent::Changed(state), shutdown).await
    }

    async fn on_failure(&mut self, error: RemoteError, shutdown: &mut Shutdown) -> bool {
        self.consecutive_failures += 1;
        warn!(
            consecutive_failures = self.consecutive_failures,
            error = %error,
            "Lock-key query failed"
        );

        if self.unreachable || self.consecutive_failures < self.failure_threshold {
            return true;
        }

        self.unreachable = true;
        let event = LockKeyEvent::Unreachable {
            consecutive_failures: self.consecutive_failures,
            error: error.to_string(),
        };
        self.emit(event, shutdown).await
    }

    /// Send an event; false when the receiver is gone or shutdown fired
    async fn emit(&self, event: LockKeyEvent, shutdown: &mut Shutdown) -> bool {
        tokio::select! {
            sent = self.events.send(event) => sent.is_ok(),
            _ = shutdown.wait() => false,
        }
    }
}
