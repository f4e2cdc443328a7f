//! Remote command execution
//!
//! Every remote action is a single shell command string (display environment
//! prefix included) run on the remote host. Dropping an in-flight [`run`]
//! future cancels the call, which for ssh kills the child process.
//!
//! ## Architecture
//!
//! - `RemoteExecutor`: trait implemented by anything that can run a command
//! - `SshExecutor`: runs commands through the system `ssh` binary
//! - `RemoteError`: error types for remote calls
//!
//! [`run`]: RemoteExecutor::run

mod error;
mod ssh;

use async_trait::async_trait;

pub use error::RemoteError;
pub use ssh::{SshExecutor, SshTarget, DEFAULT_CONTROL_PERSIST_SECS};

/// Captured output of a successful remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn new(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

/// Runs shell commands on the remote host
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run `command` and wait for it to finish.
    ///
    /// Implementations must stop the remote call when the future is dropped.
    async fn run(&self, command: &str) -> Result<CommandOutput, RemoteError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted executor for tests

    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;

    /// One scripted reply
    pub enum Reply {
        Ok(String),
        Fail,
        /// Sleep before answering with the given output
        Slow(Duration, String),
    }

    /// Replays scripted replies in order and records every command it sees.
    ///
    /// Once the script runs out, the last reply is repeated.
    pub struct ScriptedExecutor {
        replies: Mutex<VecDeque<Reply>>,
        last: Mutex<Option<String>>,
        pub commands: Mutex<Vec<String>>,
    }

    impl ScriptedExecutor {
        pub fn new(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                last: Mutex::new(None),
                commands: Mutex::new(Vec::new()),
            })
        }

        pub fn commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteExecutor for ScriptedExecutor {
        async fn run(&self, command: &str) -> Result<CommandOutput, RemoteError> {
            self.commands.lock().unwrap().push(command.to_string());
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(Reply::Ok(out)) => {
                    *self.last.lock().unwrap() = Some(out.clone());
                    Ok(CommandOutput::new(out))
                }
                Some(Reply::Slow(delay, out)) => {
                    tokio::time::sleep(delay).await;
                    Ok(CommandOutput::new(out))
                }
                Some(Reply::Fail) => {
                    *self.last.lock().unwrap() = None;
                    Err(RemoteError::Transport {
                        host: "test".to_string(),
                        message: "connection refused".to_string(),
                    })
                }
                None => {
                    let last = self.last.lock().unwrap().clone();
                    match last {
                        Some(out) => Ok(CommandOutput::new(out)),
                        None => Err(RemoteError::Transport {
                            host: "test".to_string(),
                            message: "connection refused".to_string(),
                        }),
                    }
                }
            }
        }
    }
}
