//! Remote session and shutdown signalling
//!
//! A [`RemoteSession`] bundles everything needed to talk to one remote
//! display: the executor, the command renderer and a shutdown listener. It is
//! created once the connection is verified and handed to the dispatcher and
//! the lock-key monitor.

use std::sync::Arc;

use tokio::sync::watch;

use crate::command::CommandRenderer;
use crate::remote::{CommandOutput, RemoteError, RemoteExecutor};

/// Create a linked shutdown trigger and listener
pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

/// Fires the shutdown signal. Dropping the trigger also counts as shutdown.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        // send_replace never fails, even with no listeners left
        self.tx.send_replace(true);
    }
}

/// Listens for the shutdown signal
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Wait until shutdown is triggered
    pub async fn wait(&mut self) {
        // An error means the trigger was dropped
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}

/// Connection to one remote display
#[derive(Clone)]
pub struct RemoteSession {
    host: String,
    executor: Arc<dyn RemoteExecutor>,
    renderer: CommandRenderer,
    shutdown: Shutdown,
}

impl RemoteSession {
    pub fn new(
        host: impl Into<String>,
        executor: Arc<dyn RemoteExecutor>,
        renderer: CommandRenderer,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            host: host.into(),
            executor,
            renderer,
            shutdown,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn renderer(&self) -> &CommandRenderer {
        &self.renderer
    }

    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Run a command, racing it against shutdown.
    ///
    /// Returns `None` if shutdown fired first; the in-flight call is dropped,
    /// which cancels it.
    pub async fn run(&self, command: String) -> Option<Result<CommandOutput, RemoteError>> {
        let mut shutdown = self.shutdown.clone();
        if shutdown.is_triggered() {
            return None;
        }

        tokio::select! {
            result = self.executor.run(&command) => Some(result),
            _ = shutdown.wait() => None,
        }
    }
}

impl std::fmt::Debug for RemoteSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSession")
            .field("host", &self.host)
            .field("renderer", &self.renderer)
            .finish_non_exhaustive()
    }
}
