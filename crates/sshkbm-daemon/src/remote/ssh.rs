//! SSH executor implementation
//!
//! Runs each command through the system `ssh` binary in batch mode, so
//! authentication relies entirely on the SSH agent, key files and
//! `~/.ssh/config`. With multiplexing enabled the first call opens a master
//! connection that later calls reuse, which keeps per-keystroke latency low.
//!
//! The ssh child is killed when its call is dropped, and keepalives make a
//! dead connection fail instead of hanging.

use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use sshkbm_config::ConnectionConfig;
use tokio::process::Command;
use tokio::time::sleep;
use tracing::warn;

use super::{CommandOutput, RemoteError, RemoteExecutor};

/// How long an idle master connection stays open
pub const DEFAULT_CONTROL_PERSIST_SECS: u64 = 600;

/// Seconds between keepalive probes on an idle connection
const SERVER_ALIVE_INTERVAL_SECS: u64 = 5;

/// Unanswered keepalives before ssh gives up
const SERVER_ALIVE_COUNT_MAX: u32 = 3;

/// Initial delay between retry attempts (100ms)
const INITIAL_RETRY_DELAY_MS: u64 = 100;

/// Maximum delay between retry attempts (1 second)
const MAX_RETRY_DELAY_MS: u64 = 1000;

/// Exit status ssh uses for its own errors
const SSH_ERROR_STATUS: i32 = 255;

/// Where and how to connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub connect_timeout: Duration,
    /// Control socket path for connection sharing, `None` disables it
    pub control_path: Option<PathBuf>,
    pub control_persist: Duration,
    /// The ssh program to run
    pub program: String,
}

impl SshTarget {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            user: None,
            connect_timeout: Duration::from_secs(5),
            control_path: None,
            control_persist: Duration::from_secs(DEFAULT_CONTROL_PERSIST_SECS),
            program: "ssh".to_string(),
        }
    }

    /// Build a target from the connection config section.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::NoHost` if no host is configured and
    /// `RemoteError::InvalidHost` if the host starts with `-`.
    pub fn from_config(config: &ConnectionConfig) -> Result<Self, RemoteError> {
        let host = config
            .host
            .as_deref()
            .filter(|h| !h.is_empty())
            .ok_or(RemoteError::NoHost)?;
        if host.starts_with('-') {
            return Err(RemoteError::InvalidHost(host.to_string()));
        }

        let mut target = Self::new(host);
        target.port = config.port;
        target.user = config.user.clone();
        target.connect_timeout = Duration::from_secs(config.connect_timeout);
        target.control_path = config.multiplex.then(|| config.control_path.clone());
        Ok(target)
    }

    /// Arguments passed to the ssh program for `command`
    pub fn args(&self, command: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
            "-o".to_string(),
            format!("ServerAliveInterval={}", SERVER_ALIVE_INTERVAL_SECS),
            "-o".to_string(),
            format!("ServerAliveCountMax={}", SERVER_ALIVE_COUNT_MAX),
        ];

        if let Some(path) = &self.control_path {
            args.extend([
                "-o".to_string(),
                "ControlMaster=auto".to_string(),
                "-o".to_string(),
                format!("ControlPath={}", path.display()),
                "-o".to_string(),
                format!("ControlPersist={}", self.control_persist.as_secs()),
            ]);
        }

        if let Some(port) = self.port {
            args.extend(["-p".to_string(), port.to_string()]);
        }

        if let Some(user) = &self.user {
            args.extend(["-l".to_string(), user.clone()]);
        }

        args.extend([self.host.clone(), "--".to_string(), command.to_string()]);
        args
    }
}

/// Executor that runs commands over `ssh`
#[derive(Debug, Clone)]
pub struct SshExecutor {
    target: SshTarget,
}

impl SshExecutor {
    pub fn new(target: SshTarget) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &SshTarget {
        &self.target
    }

    /// Connect and verify the remote host answers, with exponential backoff
    ///
    /// Runs `true` on the remote host up to `max_retries + 1` times.
    ///
    /// # Backoff Strategy
    ///
    /// - Initial delay: 100ms
    /// - Each retry: delay *= 2
    /// - Maximum delay: 1 second (capped)
    ///
    /// # Errors
    ///
    /// Returns the error unchanged if it cannot be fixed by retrying (e.g. the
    /// ssh program is missing). Returns `RemoteError::MaxRetriesExceeded` if
    /// all attempts fail.
    pub async fn connect_with_retry(
        target: SshTarget,
        max_retries: u32,
    ) -> Result<Self, RemoteError> {
        let executor = Self::new(target);
        let mut attempt = 0;
        let mut delay_ms = INITIAL_RETRY_DELAY_MS;
        let last_error;

        loop {
            attempt += 1;

            match executor.run("true").await {
                Ok(_) => {
                    tracing::info!(host = %executor.target.host, attempt, "Remote host reachable");
                    return Ok(executor);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    if attempt > max_retries {
                        last_error = e;
                        break;
                    }

                    warn!(
                        attempt = attempt,
                        max_retries = max_retries,
                        delay_ms = delay_ms,
                        error = %e,
                        "SSH connection failed, retrying..."
                    );

                    sleep(Duration::from_millis(delay_ms)).await;

                    delay_ms = (delay_ms * 2).min(MAX_RETRY_DELAY_MS);
                }
            }
        }

        warn!(
            attempts = attempt,
            last_error = %last_error,
            "Failed to reach remote host after all retry attempts"
        );

        Err(RemoteError::MaxRetriesExceeded {
            host: executor.target.host.clone(),
            attempts: attempt,
            last_error: last_error.to_string(),
        })
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn run(&self, command: &str) -> Result<CommandOutput, RemoteError> {
        let output = Command::new(&self.target.program)
            .args(self.target.args(command))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| RemoteError::Spawn {
                program: self.target.program.clone(),
                source,
            })?;

        interpret_output(&self.target.host, output)
    }
}

/// Map a finished ssh process to a result
fn interpret_output(host: &str, output: Output) -> Result<CommandOutput, RemoteError> {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    match output.status.code() {
        Some(0) => Ok(CommandOutput { stdout, stderr }),
        Some(SSH_ERROR_STATUS) => Err(RemoteError::Transport {
            host: host.to_string(),
            message: stderr,
        }),
        Some(status) => Err(RemoteError::CommandFailed { status, stderr }),
        None => Err(RemoteError::Transport {
            host: host.to_string(),
            message: "ssh terminated by signal".to_string(),
        }),
    }
}
