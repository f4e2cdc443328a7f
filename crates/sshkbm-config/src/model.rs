//! Configuration data model

use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub global: GlobalConfig,
    pub connection: ConnectionConfig,
    pub display: DisplayConfig,
    pub keyboard: KeyboardConfig,
    pub mouse: MouseConfig,
    pub lock_keys: LockKeysConfig,
    pub dispatch: DispatchConfig,
}

/// Global settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalConfig {
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// SSH connection target.
///
/// Credentials are never part of the configuration; authentication is left
/// to the SSH agent, key files and `~/.ssh/config`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Remote host name or `ssh_config` alias. Required to start a session.
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    /// Seconds before an unreachable host is reported as a transport error
    pub connect_timeout: u64,
    /// Extra connection attempts made when the session starts
    pub connect_retries: u32,
    /// Reuse one SSH connection for every command (OpenSSH ControlMaster)
    pub multiplex: bool,
    pub control_path: PathBuf,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            user: None,
            connect_timeout: 5,
            connect_retries: 3,
            multiplex: true,
            control_path: PathBuf::from("~/.ssh/sshkbm-%r@%h:%p"),
        }
    }
}

/// The remote X display and the tools run against it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayConfig {
    /// Display value, e.g. `:0`
    pub name: String,
    /// Environment variable carrying the display, e.g. `DISPLAY`
    pub env: String,
    /// Input injection tool
    pub tool: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            name: ":0".to_string(),
            env: "DISPLAY".to_string(),
            tool: "xdotool".to_string(),
        }
    }
}

/// Modifier names accepted by the `sticky` keyboard option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StickyModifier {
    Compose,
    Ctrl,
    Shift,
    Alt,
    Super,
    AltGr,
}

impl std::str::FromStr for StickyModifier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compose" | "multi_key" => Ok(Self::Compose),
            "ctrl" | "control" => Ok(Self::Ctrl),
            "shift" => Ok(Self::Shift),
            "alt" => Ok(Self::Alt),
            "super" | "meta" | "win" => Ok(Self::Super),
            "altgr" | "iso_level3_shift" => Ok(Self::AltGr),
            _ => Err(s.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyboardConfig {
    /// Drop modifier bits reported with key events (sticky modifiers still apply)
    pub ignore_modifiers: bool,
    /// Modifiers applied to every key sent
    pub sticky: Vec<StickyModifier>,
}

/// Geometry of the circular pointer control surface
#[derive(Debug, Clone, PartialEq)]
pub struct MouseConfig {
    pub middle_radius: f64,
    pub click_radius: f64,
    pub move_radius: f64,
    /// Half-angle in degrees around the horizontal axis that counts as a click
    pub click_angle: f64,
    /// Relative move distance at the outer edge of the move band
    pub max_move: u32,
}

impl Default for MouseConfig {
    fn default() -> Self {
        Self {
            middle_radius: 0.21,
            click_radius: 0.51,
            move_radius: 0.98,
            click_angle: 60.0,
            max_move: 400,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockKeysConfig {
    pub enabled: bool,
    pub interval: Duration,
    /// Remote program whose output reports lock key state
    pub query: String,
    /// Consecutive failed polls before the remote end is reported unreachable
    pub failure_threshold: u32,
}

impl Default for LockKeysConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_millis(200),
            query: "xset q".to_string(),
            failure_threshold: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    pub queue_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { queue_capacity: 64 }
    }
}
