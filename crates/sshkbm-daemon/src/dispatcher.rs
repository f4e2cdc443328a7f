//! Command dispatch queue
//!
//! Input commands are queued and executed by a single worker task, so they
//! reach the remote display in submission order, one at a time. Callers never
//! block on the remote call: [`Dispatcher::submit`] returns immediately with a
//! completion receiver, and [`Dispatcher::dispatch`] awaits it.
//!
//! Failed commands are reported, never retried.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::command::InputCommand;
use crate::remote::RemoteError;
use crate::session::RemoteSession;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Dispatch queue is full")]
    QueueFull,

    #[error("Dispatcher has stopped")]
    Stopped,
}

/// Completion of one dispatched command
pub type Completion = oneshot::Receiver<Result<(), DispatchError>>;

struct Job {
    command: InputCommand,
    done: oneshot::Sender<Result<(), DispatchError>>,
}

/// Counters for completed commands
#[derive(Debug, Default)]
struct Counters {
    dispatched: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of dispatch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub dispatched: u64,
    pub failed: u64,
}

/// Handle for submitting commands to the worker.
///
/// Cheap to clone; all clones feed the same queue.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<Job>,
    counters: Arc<Counters>,
}

impl Dispatcher {
    /// Spawn the worker task for `session`.
    ///
    /// The worker stops when the session's shutdown signal fires or when
    /// every `Dispatcher` handle has been dropped.
    pub fn spawn(session: RemoteSession, queue_capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let counters = Arc::new(Counters::default());
        let handle = tokio::spawn(run_worker(session, rx, counters.clone()));
        (Self { tx, counters }, handle)
    }

    /// Queue a command without waiting for it to run.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::QueueFull` if the queue is at capacity, or
    /// `DispatchError::Stopped` if the worker has exited.
    pub fn submit(&self, command: InputCommand) -> Result<Completion, DispatchError> {
        let (done, completion) = oneshot::channel();
        self.tx
            .try_send(Job { command, done })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => DispatchError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => DispatchError::Stopped,
            })?;
        Ok(completion)
    }

    /// Queue a command and wait until it has run on the remote host
    pub async fn dispatch(&self, command: InputCommand) -> Result<(), DispatchError> {
        let completion = self.submit(command)?;
        completion.await.map_err(|_| DispatchError::Stopped)?
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

async fn run_worker(session: RemoteSession, mut rx: mpsc::Receiver<Job>, counters: Arc<Counters>) {
    let mut shutdown = session.shutdown();
    info!(host = %session.host(), "Dispatcher started");

    loop {
        let job = tokio::select! {
            job = rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
            _ = shutdown.wait() => break,
        };

        let line = session.renderer().render(&job.command);
        debug!(command = %line, "Dispatching {}", job.command);

        let result = match session.run(line).await {
            None => {
                let _ = job.done.send(Err(DispatchError::Stopped));
                break;
            }
            Some(Ok(_)) => {
                counters.dispatched.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Some(Err(e)) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(command = %job.command, error = %e, "Command failed");
                Err(DispatchError::Remote(e))
            }
        };

        // The caller may have stopped waiting
        let _ = job.done.send(result);
    }

    info!("Dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::command::{Button, CommandRenderer};
    use crate::remote::testing::{Reply, ScriptedExecutor};
    use crate::session::{shutdown_channel, ShutdownTrigger};

    fn start(
        replies: Vec<Reply>,
        capacity: usize,
    ) -> (Arc<ScriptedExecutor>, ShutdownTrigger, Dispatcher, JoinHandle<()>) {
        let executor = ScriptedExecutor::new(replies);
        let (trigger, shutdown) = shutdown_channel();
        let renderer = CommandRenderer::new("DISPLAY", ":0", "xdotool", "xset q");
        let session = RemoteSession::new("test", executor.clone(), renderer, shutdown);
        let (dispatcher, handle) = Dispatcher::spawn(session, capacity);
        (executor, trigger, dispatcher, handle)
    }

    #[tokio::test]
    async fn test_commands_run_in_submission_order() {
        let (executor, trigger, dispatcher, handle) = start(vec![Reply::Ok(String::new())], 16);

        let completions: Vec<_> = (0..5)
            .map(|i| {
                dispatcher
                    .submit(InputCommand::Type(format!("line{}", i)))
                    .unwrap()
            })
            .collect();
        for completion in completions {
            completion.await.unwrap().unwrap();
        }

        let expected: Vec<String> = (0..5)
            .map(|i| format!("DISPLAY=:0 xdotool type line{}", i))
            .collect();
        assert_eq!(executor.commands(), expected);
        assert_eq!(
            dispatcher.stats(),
            DispatchStats {
                dispatched: 5,
                failed: 0
            }
        );

        trigger.trigger();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_dispatch_waits_for_completion() {
        let (executor, trigger, dispatcher, handle) = start(vec![Reply::Ok(String::new())], 4);
        dispatcher
            .dispatch(InputCommand::Click(Button::Middle))
            .await
            .unwrap();
        assert_eq!(executor.commands(), vec!["DISPLAY=:0 xdotool click 2"]);
        trigger.trigger();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_failure_is_reported_not_retried() {
        let (executor, trigger, dispatcher, handle) = start(vec![Reply::Fail], 4);
        let err = dispatcher
            .dispatch(InputCommand::Click(Button::Left))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Remote(RemoteError::Transport { .. })
        ));
        assert_eq!(executor.commands().len(), 1);
        assert_eq!(dispatcher.stats().failed, 1);
        trigger.trigger();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_queue_full() {
        let replies = vec![Reply::Slow(Duration::from_millis(300), String::new())];
        let (_executor, trigger, dispatcher, handle) = start(replies, 1);

        let _first = dispatcher.submit(InputCommand::Click(Button::Left)).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _second = dispatcher.submit(InputCommand::Click(Button::Right)).unwrap();
        let third = dispatcher.submit(InputCommand::Click(Button::Middle));
        assert!(matches!(third, Err(DispatchError::QueueFull)));

        trigger.trigger();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_stopped_after_shutdown() {
        let (_executor, trigger, dispatcher, handle) = start(vec![Reply::Ok(String::new())], 4);
        trigger.trigger();
        handle.await.unwrap();

        let err = dispatcher
            .dispatch(InputCommand::Click(Button::Left))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Stopped));
    }

    #[tokio::test]
    async fn test_shutdown_abandons_in_flight_command() {
        let replies = vec![Reply::Slow(Duration::from_secs(1), String::new())];
        let (_executor, trigger, dispatcher, handle) = start(replies, 4);

        let completion = dispatcher.submit(InputCommand::Click(Button::Left)).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.trigger();

        let result = tokio::time::timeout(Duration::from_millis(500), completion)
            .await
            .expect("completion not delivered")
            .unwrap();
        assert!(matches!(result, Err(DispatchError::Stopped)));
        handle.await.unwrap();
    }
}
