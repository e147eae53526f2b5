use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use voxrelay::app::{OutputChoice, RunOptions, run_relay};
use voxrelay::cli::{Cli, Commands, ConfigAction};
use voxrelay::config::Config;
use voxrelay::ipc::client::send_command;
use voxrelay::ipc::protocol::{Command, Response};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    let socket = cli.socket.clone();
    let config_path = cli.config.clone();
    match cli.command {
        Commands::Run {
            speakers,
            output_dir,
            player,
            no_realtime,
            keep_running,
        } => {
            let config = load_config(config_path.as_deref())?;
            let output = match (output_dir, player) {
                (Some(dir), _) => OutputChoice::Directory(dir),
                (None, Some(command)) => OutputChoice::Player(command),
                (None, None) => OutputChoice::Player(
                    voxrelay::defaults::PLAYER_COMMAND.to_string(),
                ),
            };
            let options = RunOptions {
                speakers,
                output,
                socket: config.control.socket_path(socket),
                realtime: !no_realtime,
                keep_running,
            };
            run_relay(config, options).await?;
        }
        Commands::Start => send_to_relay(socket, config_path.as_deref(), Command::Start).await?,
        Commands::Stop => send_to_relay(socket, config_path.as_deref(), Command::Stop).await?,
        Commands::Status => send_to_relay(socket, config_path.as_deref(), Command::Status).await?,
        Commands::Help => send_to_relay(socket, config_path.as_deref(), Command::Help).await?,
        Commands::Shutdown => send_to_relay(socket, config_path.as_deref(), Command::Shutdown).await?,
        Commands::Get { key } => {
            send_to_relay(socket, config_path.as_deref(), Command::Get { key }).await?
        }
        Commands::Set { key, value } => {
            let value = value.join(" ");
            send_to_relay(socket, config_path.as_deref(), Command::Set { key, value }).await?;
        }
        Commands::Config { action } => handle_config_command(action, config_path.as_deref())?,
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "voxrelay",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise `-q` / `-v` / `-vv` pick the crate's level.
fn init_tracing(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,voxrelay={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config), which must exist
/// 2. Default config path (~/.config/voxrelay/config.toml)
/// 3. Built-in defaults
///
/// Environment variable overrides are applied on top.
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    Ok(config.with_env_overrides()?)
}

fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Path => {
            let path: PathBuf = custom_path
                .map(Path::to_path_buf)
                .unwrap_or_else(Config::default_path);
            println!("{}", path.display());
        }
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            let rendered =
                toml::to_string_pretty(&config).context("Failed to render configuration")?;
            print!("{}", rendered);
        }
    }
    Ok(())
}

/// Resolves the socket (`--socket`, then `[control] socket`, then the
/// default) and sends one control command.
async fn send_to_relay(
    socket: Option<PathBuf>,
    config_path: Option<&Path>,
    command: Command,
) -> Result<()> {
    let socket_path = match socket {
        Some(path) => path,
        None => load_config(config_path)?.control.socket_path(None),
    };
    handle_ipc_command(&socket_path, command).await
}

/// Send a control command to a running relay and print the response.
async fn handle_ipc_command(socket_path: &Path, command: Command) -> Result<()> {
    match send_command(socket_path, command).await {
        Ok(response) => match response {
            Response::Ok { message } => {
                println!("{}", message.green());
            }
            Response::Status {
                translation_enabled,
                queue_depth,
                playing,
                played,
                failed,
                active_sessions,
                summary,
            } => {
                println!("Status:");
                println!(
                    "  {} {}",
                    "Translation:".dimmed(),
                    if translation_enabled {
                        "on".green().to_string()
                    } else {
                        "off".yellow().to_string()
                    }
                );
                println!(
                    "  {}    {} queued{}",
                    "Playback:".dimmed(),
                    queue_depth,
                    if playing { ", playing" } else { "" }
                );
                println!("  {}      {} played, {} failed", "Totals:".dimmed(), played, failed);
                if active_sessions.is_empty() {
                    println!("  {}    none", "Speaking:".dimmed());
                } else {
                    println!("  {}    {}", "Speaking:".dimmed(), active_sessions.join(", "));
                }
                println!("{}", summary.dimmed());
            }
            Response::Settings { entries } => {
                let width = entries.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
                for (key, value) in entries {
                    let key = format!("{:width$}", key, width = width);
                    println!("{}  {}", key.cyan(), value);
                }
            }
            Response::Error { message } => {
                eprintln!("{}", format!("Error: {}", message).red());
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("{}", format!("Failed to communicate with relay: {}", e).red());
            eprintln!("Is the relay running? Start it with: voxrelay run --speaker ID=FILE");
            std::process::exit(1);
        }
    }

    Ok(())
}
