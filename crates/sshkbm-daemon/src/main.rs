//! sshkbm daemon
//!
//! Connects to a remote host over SSH and serves the control socket that
//! drives its keyboard and mouse.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use sshkbm_config::{Config, DEFAULT_CONFIG_PATH};
use sshkbm_daemon::command::CommandRenderer;
use sshkbm_daemon::control::{track_lock_events, Controller, SharedLockStatus};
use sshkbm_daemon::dispatcher::Dispatcher;
use sshkbm_daemon::ipc::{handle_ipc_connection, IpcServer};
use sshkbm_daemon::lock_keys::{LockKeyMonitor, DEFAULT_CHANNEL_BUFFER};
use sshkbm_daemon::remote::{SshExecutor, SshTarget};
use sshkbm_daemon::session::{shutdown_channel, RemoteSession};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// How long to wait for background tasks after shutdown is signalled
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "sshkbmd")]
#[command(about = "Remote keyboard and mouse over SSH")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Remote host (overrides connection.host)
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// SSH port (overrides connection.port)
    #[arg(short = 'P', long)]
    port: Option<u16>,

    /// Remote user (overrides connection.user)
    #[arg(short, long)]
    user: Option<String>,

    /// Remote X display (overrides display.name)
    #[arg(short, long)]
    display: Option<String>,

    /// Control socket path
    #[arg(long)]
    socket: Option<PathBuf>,
}

impl Args {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.connection.host = Some(host.clone());
        }
        if let Some(port) = self.port {
            config.connection.port = Some(port);
        }
        if let Some(user) = &self.user {
            config.connection.user = Some(user.clone());
        }
        if let Some(display) = &self.display {
            config.display.name = display.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Expand tilde in config path
    let config_path: PathBuf = shellexpand::tilde(&args.config).into_owned().into();
    let mut config = load_config(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.global.log_level.as_filter())),
        )
        .init();

    tracing::info!("Loaded configuration from {}", config_path.display());

    args.apply_overrides(&mut config);

    let target = SshTarget::from_config(&config.connection)?;
    tracing::info!(
        host = %target.host,
        display = %config.display.name,
        "Connecting to remote host"
    );
    let executor =
        SshExecutor::connect_with_retry(target, config.connection.connect_retries).await?;
    let host = executor.target().host.clone();

    let (trigger, shutdown) = shutdown_channel();
    let renderer = CommandRenderer::new(
        config.display.env.clone(),
        config.display.name.clone(),
        config.display.tool.clone(),
        config.lock_keys.query.clone(),
    );
    let session = RemoteSession::new(host, Arc::new(executor), renderer, shutdown);

    let (dispatcher, dispatcher_task) =
        Dispatcher::spawn(session.clone(), config.dispatch.queue_capacity);
    let mut tasks = vec![dispatcher_task];

    let lock_status = SharedLockStatus::default();
    if config.lock_keys.enabled {
        let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_BUFFER);
        tasks.push(LockKeyMonitor::from_config(session.clone(), &config.lock_keys, tx).spawn());
        tasks.push(tokio::spawn(track_lock_events(rx, lock_status.clone())));
    } else {
        tracing::info!("Lock-key monitoring disabled");
    }

    let controller = Controller::new(dispatcher, &session, &config, lock_status)?;

    let server = match args.socket {
        Some(path) => IpcServer::bind(path)?,
        None => IpcServer::new()?,
    };

    let mut terminate = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    tracing::info!("sshkbm daemon ready");

    loop {
        tokio::select! {
            accepted = server.accept() => match accepted {
                Ok(stream) => {
                    let controller = controller.clone();
                    tokio::spawn(async move {
                        let result = handle_ipc_connection(stream, move |request| async move {
                            controller.handle(request).await
                        })
                        .await;
                        if let Err(e) = result {
                            tracing::warn!("IPC connection failed: {:#}", e);
                        }
                    });
                }
                Err(e) => tracing::warn!("{:#}", e),
            },
            _ = &mut ctrl_c => break,
            _ = terminate.recv() => break,
        }
    }

    tracing::info!("Shutting down...");
    trigger.trigger();
    drop(server);

    for task in tasks {
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Background task failed: {}", e),
            Err(_) => tracing::warn!("Background task did not stop in time"),
        }
    }

    Ok(())
}

/// Load the config file, falling back to defaults when it does not exist
fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        eprintln!(
            "Configuration file {} not found, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    sshkbm_config::parse_config(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}
