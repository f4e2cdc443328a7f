//! Error types for remote command execution

use thiserror::Error;

/// Errors that can occur when running a command on the remote host
#[derive(Debug, Error)]
pub enum RemoteError {
    /// No remote host was configured
    #[error("No remote host configured - set connection.host or pass --host")]
    NoHost,

    /// The host would be read as an ssh option
    #[error("Invalid remote host '{0}': must not start with '-'")]
    InvalidHost(String),

    /// The local transport program could not be started
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The connection to the remote host failed
    #[error("Connection to {host} failed: {message}")]
    Transport { host: String, message: String },

    /// The remote command ran but exited unsuccessfully
    #[error("Remote command exited with status {status}: {stderr}")]
    CommandFailed { status: i32, stderr: String },

    /// Maximum retry attempts exceeded
    #[error("Failed to reach {host} after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded {
        host: String,
        attempts: u32,
        last_error: String,
    },
}

impl RemoteError {
    /// Whether retrying the same call could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Transport { .. })
    }
}
