//! Control socket for daemon communication
//!
//! Provides a Unix domain socket through which a local UI or the `sshkbm`
//! CLI submits key, text and pointer events and queries daemon status.
//! Each connection carries one JSON request line and one JSON response line.

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use nix::libc;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

use crate::keyboard::{LiveModifiers, RawKey, StickyModifiers};
use crate::lock_keys::LockKeyState;

/// Socket file name inside `$XDG_RUNTIME_DIR`
const SOCKET_NAME: &str = "sshkbm.sock";

// ============================================================================
// IPC Message Types
// ============================================================================

/// Request messages sent from clients to the daemon
///
/// These messages are serialized as JSON with a `type` field for discrimination:
/// - `{"type": "key", "key": "a", "modifiers": {"ctrl": true}}`
/// - `{"type": "type", "text": "hello"}`
/// - `{"type": "pointer", "x": 10.0, "y": 20.0, "width": 200.0, "height": 200.0}`
/// - `{"type": "lock_state"}`
/// - `{"type": "status"}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcRequest {
    /// Press a key with modifiers
    Key {
        /// Literal key name or character
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        /// Platform key code, takes precedence over `key`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<u32>,
        /// Modifier bits carried by the key event
        #[serde(default)]
        modifiers: LiveModifiers,
        /// Modifier toggles currently held by the UI
        #[serde(default)]
        sticky: StickyModifiers,
        /// Drop `modifiers` for this key only
        #[serde(default)]
        ignore_modifiers: bool,
    },
    /// Type literal text
    Type { text: String },
    /// Pointer position on the gesture surface
    Pointer {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    /// Query the last known lock-key state
    LockState,
    /// Query overall daemon status
    Status,
}

impl IpcRequest {
    /// Raw key carried by a `Key` request
    pub fn raw_key(code: Option<u32>, key: Option<&str>) -> Result<RawKey> {
        match (code, key) {
            (Some(code), _) => Ok(RawKey::Code(code)),
            (None, Some(key)) => Ok(RawKey::Text(key.to_string())),
            (None, None) => bail!("key request needs a key or a code"),
        }
    }
}

/// Response messages sent from the daemon back to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcResponse {
    /// Operation completed successfully
    Success {
        /// Optional message with additional details
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// The event maps to nothing and no command was sent
    Skipped,
    /// Last known lock-key state
    LockState {
        /// `None` until the first successful poll
        state: Option<LockKeyState>,
        /// False while the remote host is reported unreachable
        reachable: bool,
    },
    /// Daemon status information
    Status {
        host: String,
        display: String,
        /// Commands run successfully
        dispatched: u64,
        /// Commands that failed
        failed: u64,
        lock_state: Option<LockKeyState>,
        reachable: bool,
    },
    /// Error occurred while processing request
    Error {
        /// Error description
        message: String,
    },
}

// ============================================================================
// IPC Server
// ============================================================================

/// Control socket server on a Unix domain socket
///
/// The default socket is `$XDG_RUNTIME_DIR/sshkbm.sock`, or
/// `/tmp/sshkbm-$UID.sock` when XDG_RUNTIME_DIR is not set.
///
/// The socket file is automatically removed when the server is dropped.
pub struct IpcServer {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl IpcServer {
    /// Create a server on the default socket path
    pub fn new() -> Result<Self> {
        Self::bind(default_socket_path())
    }

    /// Create a server on `socket_path`
    ///
    /// This will:
    /// 1. Remove any existing socket file (stale from previous run)
    /// 2. Create and bind the UnixListener
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - An existing socket file cannot be removed
    /// - The socket cannot be created or bound
    pub fn bind(socket_path: PathBuf) -> Result<Self> {
        tracing::info!("IPC socket path: {}", socket_path.display());

        if socket_path.exists() {
            tracing::debug!("Removing stale socket file: {}", socket_path.display());
            std::fs::remove_file(&socket_path).with_context(|| {
                format!(
                    "Failed to remove stale socket file: {}",
                    socket_path.display()
                )
            })?;
        }

        let listener = UnixListener::bind(&socket_path).with_context(|| {
            format!("Failed to create IPC socket at {}", socket_path.display())
        })?;

        tracing::info!("IPC server listening on {}", socket_path.display());

        Ok(Self {
            listener,
            socket_path,
        })
    }

    /// Accept an incoming connection
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .context("Failed to accept IPC connection")?;

        tracing::debug!("Accepted IPC connection");

        Ok(stream)
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                tracing::warn!("Failed to remove IPC socket file on shutdown: {}", e);
            } else {
                tracing::debug!("Removed IPC socket file: {}", self.socket_path.display());
            }
        }
    }
}

/// Default socket path for the current environment
pub fn default_socket_path() -> PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").ok();
    if runtime_dir.is_none() {
        tracing::warn!("XDG_RUNTIME_DIR not set, using fallback socket path in /tmp");
    }
    let uid = unsafe { libc::getuid() };
    socket_path_in(runtime_dir.as_deref(), uid)
}

/// Socket path inside `runtime_dir`, or the `/tmp` fallback for `uid`
pub fn socket_path_in(runtime_dir: Option<&str>, uid: u32) -> PathBuf {
    match runtime_dir {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir).join(SOCKET_NAME),
        _ => PathBuf::from(format!("/tmp/sshkbm-{}.sock", uid)),
    }
}

// ============================================================================
// IPC Connection Handler
// ============================================================================

/// Handle an incoming IPC connection.
///
/// This function:
/// 1. Reads a line of JSON from the stream
/// 2. Parses it as an `IpcRequest`
/// 3. Executes the request via the provided handler
/// 4. Sends the `IpcResponse` back as JSON
///
/// Requests that fail to parse are answered with an `Error` response without
/// calling the handler.
///
/// # Errors
///
/// Returns an error if reading from or writing to the stream fails.
pub async fn handle_ipc_connection<F, Fut>(mut stream: UnixStream, handler: F) -> Result<()>
where
    F: FnOnce(IpcRequest) -> Fut,
    Fut: Future<Output = IpcResponse>,
{
    let (reader, mut writer) = stream.split();
    let mut reader = BufReader::new(reader);

    let mut line = String::new();
    let bytes_read = reader
        .read_line(&mut line)
        .await
        .context("Failed to read IPC request")?;

    if bytes_read == 0 {
        tracing::debug!("IPC connection closed without data");
        return Ok(());
    }

    let line = line.trim();

    tracing::debug!("Received IPC request: {}", line);

    let response = match serde_json::from_str::<IpcRequest>(line) {
        Ok(request) => {
            tracing::debug!("Parsed IPC request: {:?}", request);
            handler(request).await
        }
        Err(e) => {
            tracing::warn!("Failed to parse IPC request: {}", e);
            IpcResponse::Error {
                message: format!("Invalid request: {}", e),
            }
        }
    };

    let response_json =
        serde_json::to_string(&response).context("Failed to serialize IPC response")?;

    tracing::debug!("Sending IPC response: {}", response_json);

    writer
        .write_all(response_json.as_bytes())
        .await
        .context("Failed to write IPC response")?;
    writer
        .write_all(b"\n")
        .await
        .context("Failed to write newline")?;
    writer.flush().await.context("Failed to flush IPC response")?;

    Ok(())
}

// ============================================================================
// IPC Client
// ============================================================================

/// Send one request to the daemon and read its response
///
/// # Errors
///
/// Returns an error if the daemon is not listening on `socket_path` or the
/// exchange fails.
pub async fn send_request(socket_path: &Path, request: &IpcRequest) -> Result<IpcResponse> {
    let mut stream = UnixStream::connect(socket_path).await.with_context(|| {
        format!(
            "Failed to connect to daemon at {} - is sshkbmd running?",
            socket_path.display()
        )
    })?;

    let request_json = serde_json::to_string(request).context("Failed to serialize request")?;
    stream
        .write_all(request_json.as_bytes())
        .await
        .context("Failed to send request")?;
    stream.write_all(b"\n").await.context("Failed to send request")?;
    stream.flush().await.context("Failed to send request")?;

    let (reader, _writer) = stream.split();
    let mut reader = BufReader::new(reader);
    let mut response_line = String::new();
    let bytes_read = reader
        .read_line(&mut response_line)
        .await
        .context("Failed to read response")?;
    if bytes_read == 0 {
        bail!("Daemon closed the connection without a response");
    }

    serde_json::from_str(response_line.trim()).context("Failed to parse daemon response")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ========================================================================
    // IPC Message Serialization Tests
    // ========================================================================

    #[test]
    fn test_request_key_serialization() {
        let request = IpcRequest::Key {
            key: Some("a".to_string()),
            code: None,
            modifiers: LiveModifiers {
                ctrl: true,
                ..Default::default()
            },
            sticky: StickyModifiers::default(),
            ignore_modifiers: false,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.starts_with(r#"{"type":"key","key":"a","modifiers":{"ctrl":true"#));

        let parsed: IpcRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_request_key_defaults() {
        let parsed: IpcRequest = serde_json::from_str(r#"{"type":"key","code":65}"#).unwrap();
        assert_eq!(
            parsed,
            IpcRequest::Key {
                key: None,
                code: Some(65),
                modifiers: LiveModifiers::default(),
                sticky: StickyModifiers::default(),
                ignore_modifiers: false,
            }
        );
    }

    #[test]
    fn test_request_partial_modifiers() {
        let parsed: IpcRequest = serde_json::from_str(
            r#"{"type":"key","key":"F5","modifiers":{"alt":true},"sticky":{"super":true}}"#,
        )
        .unwrap();
        match parsed {
            IpcRequest::Key {
                modifiers, sticky, ..
            } => {
                assert!(modifiers.alt);
                assert!(!modifiers.ctrl);
                assert!(sticky.super_key);
            }
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[test]
    fn test_request_other_serialization() {
        assert_eq!(
            serde_json::to_string(&IpcRequest::Type {
                text: "hi".to_string()
            })
            .unwrap(),
            r#"{"type":"type","text":"hi"}"#
        );
        assert_eq!(
            serde_json::to_string(&IpcRequest::LockState).unwrap(),
            r#"{"type":"lock_state"}"#
        );
        assert_eq!(
            serde_json::to_string(&IpcRequest::Status).unwrap(),
            r#"{"type":"status"}"#
        );

        let pointer: IpcRequest = serde_json::from_str(
            r#"{"type":"pointer","x":10.0,"y":20.5,"width":200,"height":200}"#,
        )
        .unwrap();
        assert_eq!(
            pointer,
            IpcRequest::Pointer {
                x: 10.0,
                y: 20.5,
                width: 200.0,
                height: 200.0
            }
        );
    }

    #[test]
    fn test_raw_key_selection() {
        assert_eq!(
            IpcRequest::raw_key(Some(65), Some("b")).unwrap(),
            RawKey::Code(65)
        );
        assert_eq!(
            IpcRequest::raw_key(None, Some("b")).unwrap(),
            RawKey::Text("b".into())
        );
        assert!(IpcRequest::raw_key(None, None).is_err());
    }

    #[test]
    fn test_response_serialization() {
        assert_eq!(
            serde_json::to_string(&IpcResponse::Success { message: None }).unwrap(),
            r#"{"type":"success"}"#
        );
        assert_eq!(
            serde_json::to_string(&IpcResponse::Skipped).unwrap(),
            r#"{"type":"skipped"}"#
        );
        assert_eq!(
            serde_json::to_string(&IpcResponse::LockState {
                state: None,
                reachable: true
            })
            .unwrap(),
            r#"{"type":"lock_state","state":null,"reachable":true}"#
        );
        assert_eq!(
            serde_json::to_string(&IpcResponse::Error {
                message: "boom".into()
            })
            .unwrap(),
            r#"{"type":"error","message":"boom"}"#
        );
    }

    #[test]
    fn test_response_status_round_trip() {
        let response = IpcResponse::Status {
            host: "pi.local".into(),
            display: ":0".into(),
            dispatched: 12,
            failed: 1,
            lock_state: Some(LockKeyState::parse("Caps Lock: on")),
            reachable: true,
        };
        let json = serde_json::to_string(&response).unwrap();
        let parsed: IpcResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, response);
    }

    #[test]
    fn test_socket_path_in() {
        assert_eq!(
            socket_path_in(Some("/run/user/1000"), 1000),
            PathBuf::from("/run/user/1000/sshkbm.sock")
        );
        assert_eq!(socket_path_in(None, 1000), PathBuf::from("/tmp/sshkbm-1000.sock"));
        assert_eq!(socket_path_in(Some(""), 7), PathBuf::from("/tmp/sshkbm-7.sock"));
    }

    // ========================================================================
    // IPC Server Tests
    // ========================================================================

    #[tokio::test]
    async fn test_ipc_server_creation_and_cleanup() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("sshkbm.sock");

        let server = IpcServer::bind(socket_path.clone()).unwrap();
        assert!(socket_path.exists());
        assert_eq!(server.socket_path(), socket_path.as_path());

        drop(server);
        assert!(!socket_path.exists());
    }

    #[tokio::test]
    async fn test_ipc_server_removes_stale_socket() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("sshkbm.sock");
        std::fs::write(&socket_path, b"stale").unwrap();

        let _server = IpcServer::bind(socket_path.clone()).unwrap();
        assert!(socket_path.exists());
    }

    #[tokio::test]
    async fn test_request_response_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("sshkbm.sock");
        let server = IpcServer::bind(socket_path.clone()).unwrap();

        let handler_task = tokio::spawn(async move {
            let stream = server.accept().await.unwrap();
            handle_ipc_connection(stream, |request| async move {
                match request {
                    IpcRequest::Type { text } => IpcResponse::Success {
                        message: Some(format!("typed {}", text)),
                    },
                    _ => IpcResponse::Error {
                        message: "Unexpected request".to_string(),
                    },
                }
            })
            .await
            .unwrap();
        });

        let response = send_request(
            &socket_path,
            &IpcRequest::Type {
                text: "hello".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(
            response,
            IpcResponse::Success {
                message: Some("typed hello".into())
            }
        );

        handler_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_json_request_handling() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("sshkbm.sock");
        let server = IpcServer::bind(socket_path.clone()).unwrap();

        let handler_task = tokio::spawn(async move {
            let stream = server.accept().await.unwrap();
            handle_ipc_connection(stream, |_request| async {
                IpcResponse::Success { message: None }
            })
            .await
            .unwrap();
        });

        let mut client = UnixStream::connect(&socket_path).await.unwrap();
        client.write_all(b"{ invalid json garbage }\n").await.unwrap();
        client.flush().await.unwrap();

        let (reader, _writer) = client.split();
        let mut reader = BufReader::new(reader);
        let mut response_line = String::new();
        reader.read_line(&mut response_line).await.unwrap();

        let response: IpcResponse = serde_json::from_str(response_line.trim()).unwrap();
        match response {
            IpcResponse::Error { message } => assert!(message.contains("Invalid request")),
            other => panic!("Expected Error response, got {:?}", other),
        }

        handler_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_send_request_without_daemon() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("sshkbm.sock");
        let err = send_request(&socket_path, &IpcRequest::Status)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("is sshkbmd running"));
    }
}
