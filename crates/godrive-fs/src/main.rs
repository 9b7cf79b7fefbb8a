//! Mount Google Drive folders over FUSE.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use gdrive::{DriveClient, ReqwestClient};
use godrive_fs::config::{Config, ConfigError};
use godrive_fs::mount::{mount_all, Mountpoints};

#[derive(Parser)]
#[command(name = "godrive-fuse", version, about = "Mount Google Drive folders over FUSE")]
struct Args {
    /// Path to the config file. Defaults to the per-user config directory.
    #[arg(long, env = "GODRIVE_FUSE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a starter config file to edit before first use.
    Init,
    /// Mount the configured mountpoints and block until unmounted.
    Mount {
        /// Remote Drive path, overriding the configured mountpoints.
        remote: Option<String>,
        /// Local directory to mount at. Required with REMOTE.
        local: Option<String>,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config_path = match args.config.map_or_else(Config::default_path, Ok) {
        Ok(path) => path,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    match args.command {
        Command::Init => match Config::write_template(&config_path) {
            Ok(()) => {
                println!(
                    "Config file {} created, please edit it before first use.",
                    config_path.display()
                );
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("{err}");
                ExitCode::FAILURE
            }
        },
        Command::Mount { remote, local } => run_mount(&config_path, remote, local),
    }
}

fn run_mount(config_path: &Path, remote: Option<String>, local: Option<String>) -> ExitCode {
    let config = match Config::load(config_path) {
        Ok(config) => config,
        Err(ConfigError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            eprintln!(
                "Config file {} does not exist. Run `godrive-fuse init` to create it.",
                config_path.display()
            );
            return ExitCode::FAILURE;
        }
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.log_filter.as_deref().unwrap_or("info"))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // No credentials means no Drive client; nothing can work without one.
    let credentials = match config.auth.credentials() {
        Ok(credentials) => credentials,
        Err(err) => {
            error!(%err, "unable to build a drive client");
            return ExitCode::FAILURE;
        }
    };

    let mountpoints: Mountpoints = match (remote, local) {
        (Some(remote), Some(local)) => std::iter::once((local, remote)).collect(),
        (None, None) => config.mountpoints.clone(),
        _ => {
            eprintln!("mount takes either no arguments or both REMOTE and LOCAL");
            return ExitCode::FAILURE;
        }
    };
    if mountpoints.is_empty() {
        error!("no mountpoints configured");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(%err, "unable to start the runtime");
            return ExitCode::FAILURE;
        }
    };

    let client = DriveClient::new(ReqwestClient::new(config.http.timeout()), credentials);
    mount_all(&runtime, client, &mountpoints);
    info!("all mounts released");
    ExitCode::SUCCESS
}
