//! sshkbm CLI
//!
//! Control client for the sshkbm daemon, plus offline previews of the key
//! encoder and gesture classifier.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use miette::{miette, IntoDiagnostic};
use sshkbm_config::{Config, DEFAULT_CONFIG_PATH};
use sshkbm_daemon::command::{CommandRenderer, InputCommand};
use sshkbm_daemon::gesture::{classify, GestureZones};
use sshkbm_daemon::ipc::{default_socket_path, send_request, IpcRequest, IpcResponse};
use sshkbm_daemon::keyboard::{
    encode, EncoderConfig, Encoded, LiveModifiers, RawKey, StickyModifiers,
};
use sshkbm_daemon::lock_keys::{LockKey, LockKeyState};

#[derive(Parser, Debug)]
#[command(name = "sshkbm")]
#[command(about = "Remote keyboard and mouse over SSH")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Daemon control socket path
    #[arg(long)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the configuration file
    Validate,

    /// Send a key press
    Key(KeyArgs),

    /// Type literal text
    Type {
        /// Text to type
        text: String,
    },

    /// Send a pointer position on the gesture surface
    Pointer(PointerArgs),

    /// Show the remote lock-key state
    Locks,

    /// Show current daemon status
    Status,

    /// Print the key combination for a key without sending it
    Encode(KeyArgs),

    /// Print the command for a pointer position without sending it
    Classify(PointerArgs),
}

#[derive(Args, Debug)]
struct KeyArgs {
    /// Key name or character, e.g. `a`, `F5` or `Page_Up`
    #[arg(required_unless_present = "code")]
    key: Option<String>,

    /// Platform key code (decimal or 0x-prefixed hex), overrides KEY
    #[arg(long, value_parser = parse_code)]
    code: Option<u32>,

    #[arg(long)]
    ctrl: bool,

    #[arg(long)]
    shift: bool,

    #[arg(long)]
    alt: bool,

    #[arg(long = "super")]
    super_key: bool,

    /// The key comes from the numeric keypad
    #[arg(long)]
    keypad: bool,

    /// Prefix the compose key
    #[arg(long)]
    compose: bool,

    #[arg(long)]
    altgr: bool,

    /// Send only sticky modifiers (--compose, --altgr and configured ones)
    #[arg(long)]
    ignore_modifiers: bool,
}

impl KeyArgs {
    fn live(&self) -> LiveModifiers {
        LiveModifiers {
            ctrl: self.ctrl,
            shift: self.shift,
            alt: self.alt,
            meta: self.super_key,
            keypad: self.keypad,
        }
    }

    fn sticky(&self) -> StickyModifiers {
        StickyModifiers {
            compose: self.compose,
            altgr: self.altgr,
            ..Default::default()
        }
    }

    fn raw(&self) -> miette::Result<RawKey> {
        IpcRequest::raw_key(self.code, self.key.as_deref()).map_err(|e| miette!("{}", e))
    }
}

#[derive(Args, Debug)]
struct PointerArgs {
    #[arg(allow_negative_numbers = true)]
    x: f64,
    #[arg(allow_negative_numbers = true)]
    y: f64,

    /// Surface width
    #[arg(long, default_value_t = 200.0)]
    width: f64,

    /// Surface height
    #[arg(long, default_value_t = 200.0)]
    height: f64,
}

fn parse_code(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid key code `{}`: {}", s, e))
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    // Expand tilde in config path
    let config_path: PathBuf = shellexpand::tilde(&cli.config).into_owned().into();
    let socket_path = cli.socket.clone().unwrap_or_else(default_socket_path);

    match cli.command {
        Commands::Validate => cmd_validate(&config_path),
        Commands::Key(args) => {
            let request = IpcRequest::Key {
                key: args.key.clone(),
                code: args.code,
                modifiers: args.live(),
                sticky: args.sticky(),
                ignore_modifiers: args.ignore_modifiers,
            };
            cmd_send(&socket_path, request).await
        }
        Commands::Type { text } => cmd_send(&socket_path, IpcRequest::Type { text }).await,
        Commands::Pointer(args) => {
            let request = IpcRequest::Pointer {
                x: args.x,
                y: args.y,
                width: args.width,
                height: args.height,
            };
            cmd_send(&socket_path, request).await
        }
        Commands::Locks => cmd_send(&socket_path, IpcRequest::LockState).await,
        Commands::Status => cmd_send(&socket_path, IpcRequest::Status).await,
        Commands::Encode(args) => cmd_encode(&config_path, &args),
        Commands::Classify(args) => cmd_classify(&config_path, &args),
    }
}

fn cmd_validate(config_path: &Path) -> miette::Result<()> {
    println!("Validating configuration: {}", config_path.display());

    let config = sshkbm_config::parse_config(config_path)?;

    println!("Configuration is valid!");
    println!(
        "  Host: {}",
        config.connection.host.as_deref().unwrap_or("<not set>")
    );
    println!(
        "  Display: {}={} ({})",
        config.display.env, config.display.name, config.display.tool
    );
    if config.lock_keys.enabled {
        println!(
            "  Lock keys: polled every {} ms",
            config.lock_keys.interval.as_millis()
        );
    } else {
        println!("  Lock keys: disabled");
    }
    Ok(())
}

/// Load the config if it exists, defaults otherwise
fn load_config(config_path: &Path) -> miette::Result<Config> {
    if !config_path.exists() {
        return Ok(Config::default());
    }
    Ok(sshkbm_config::parse_config(config_path)?)
}

fn renderer(config: &Config) -> CommandRenderer {
    CommandRenderer::new(
        config.display.env.clone(),
        config.display.name.clone(),
        config.display.tool.clone(),
        config.lock_keys.query.clone(),
    )
}

fn cmd_encode(config_path: &Path, args: &KeyArgs) -> miette::Result<()> {
    let config = load_config(config_path)?;
    let encoder = EncoderConfig {
        ignore_modifiers: config.keyboard.ignore_modifiers || args.ignore_modifiers,
    };
    let sticky = StickyModifiers::from(config.keyboard.sticky.as_slice()).union(args.sticky());

    match encode(&args.raw()?, args.live(), sticky, &encoder) {
        Encoded::Combination(combination) => {
            println!("{}", combination);
            let command = InputCommand::Key(combination);
            println!("  {}", renderer(&config).render(&command));
        }
        Encoded::Skip => println!("(skipped: key has no text representation)"),
    }
    Ok(())
}

fn cmd_classify(config_path: &Path, args: &PointerArgs) -> miette::Result<()> {
    let config = load_config(config_path)?;
    let zones = GestureZones::try_from(&config.mouse).into_diagnostic()?;

    let gesture = classify(args.x, args.y, args.width, args.height, &zones);
    println!("{}", gesture);
    if let Some(command) = gesture.command() {
        println!("  {}", renderer(&config).render(&command));
    }
    Ok(())
}

async fn cmd_send(socket_path: &Path, request: IpcRequest) -> miette::Result<()> {
    let response = send_request(socket_path, &request)
        .await
        .map_err(|e| miette!("{:#}", e))?;

    match response {
        IpcResponse::Success { message } => {
            println!("{}", message.as_deref().unwrap_or("ok"));
        }
        IpcResponse::Skipped => println!("(skipped: nothing to send)"),
        IpcResponse::LockState { state, reachable } => {
            print_lock_state(state.as_ref());
            if !reachable {
                println!("  (remote host currently unreachable)");
            }
        }
        IpcResponse::Status {
            host,
            display,
            dispatched,
            failed,
            lock_state,
            reachable,
        } => {
            println!("Host: {}{}", host, if reachable { "" } else { " (unreachable)" });
            println!("Display: {}", display);
            println!("Commands: {} sent, {} failed", dispatched, failed);
            print_lock_state(lock_state.as_ref());
        }
        IpcResponse::Error { message } => return Err(miette!("{}", message)),
    }
    Ok(())
}

fn print_lock_state(state: Option<&LockKeyState>) {
    match state {
        Some(state) => {
            for key in LockKey::ALL {
                println!("  {} Lock: {}", key.name(), state.get(key));
            }
        }
        None => println!("  Lock keys: not yet known"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_code() {
        assert_eq!(parse_code("65"), Ok(65));
        assert_eq!(parse_code("0x01000034"), Ok(0x0100_0034));
        assert!(parse_code("F5").is_err());
    }

    #[test]
    fn test_cli_parses_key_flags() {
        let cli = Cli::try_parse_from(["sshkbm", "key", "a", "--ctrl", "--super", "--altgr"]).unwrap();
        match cli.command {
            Commands::Key(args) => {
                assert_eq!(args.key.as_deref(), Some("a"));
                assert!(args.live().ctrl);
                assert!(args.live().meta);
                assert!(args.sticky().altgr);
                assert!(!args.sticky().ctrl);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_key_requires_key_or_code() {
        assert!(Cli::try_parse_from(["sshkbm", "key"]).is_err());
        assert!(Cli::try_parse_from(["sshkbm", "encode", "--code", "0x41"]).is_ok());
    }

    #[test]
    fn test_cli_pointer_defaults() {
        let cli = Cli::try_parse_from(["sshkbm", "classify", "100", "100"]).unwrap();
        match cli.command {
            Commands::Classify(args) => {
                assert_eq!(args.width, 200.0);
                assert_eq!(args.height, 200.0);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
