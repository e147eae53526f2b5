//! Command-line interface for voxrelay
//!
//! Provides argument parsing using clap derive macros.

use crate::pipeline::types::SpeakerId;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Live voice translation relay
#[derive(Parser, Debug)]
#[command(
    name = "voxrelay",
    version,
    about = "Live voice translation relay",
    disable_help_subcommand = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to control socket (default: $XDG_RUNTIME_DIR/voxrelay.sock)
    #[arg(long, global = true, value_name = "PATH")]
    pub socket: Option<PathBuf>,
}

/// One speaker's audio source: `ID=FILE`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerSource {
    pub speaker: SpeakerId,
    pub path: PathBuf,
}

fn parse_speaker_source(s: &str) -> Result<SpeakerSource, String> {
    let (id, path) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ID=FILE, got '{}'", s))?;
    let speaker = SpeakerId::parse(id)?;
    if path.trim().is_empty() {
        return Err(format!("missing file for speaker '{}'", id));
    }
    Ok(SpeakerSource {
        speaker,
        path: PathBuf::from(path.trim()),
    })
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the relay, replaying each speaker's WAV file as live voice
    Run {
        /// Speaker audio as ID=FILE (repeatable)
        #[arg(long = "speaker", short = 's', value_name = "ID=FILE", required = true, value_parser = parse_speaker_source)]
        speakers: Vec<SpeakerSource>,

        /// Write each played item into this directory instead of a player
        #[arg(long, value_name = "DIR", conflicts_with = "player")]
        output_dir: Option<PathBuf>,

        /// Player command that reads audio on stdin (e.g. "ffplay -nodisp -autoexit -")
        #[arg(long, value_name = "CMD")]
        player: Option<String>,

        /// Feed audio as fast as possible instead of in real time
        #[arg(long)]
        no_realtime: bool,

        /// Keep serving the control socket after all feeds finish
        #[arg(long)]
        keep_running: bool,
    },

    /// Enable translation on a running relay
    Start,

    /// Disable translation on a running relay
    Stop,

    /// Show relay status
    Status,

    /// List control commands supported by a running relay
    Help,

    /// Show one runtime setting, or all of them
    Get {
        /// Setting name (e.g. language_pairs, tts_voice)
        key: Option<String>,
    },

    /// Change a runtime setting on a running relay
    Set {
        /// Setting name
        key: String,
        /// New value (e.g. "ro:en,en:ro"; "clear" resets list settings)
        #[arg(num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },

    /// Ask a running relay to stop after queued playback
    Shutdown,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration (file plus environment) as TOML
    Show,
    /// Print the configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_speakers() {
        let cli = Cli::try_parse_from([
            "voxrelay",
            "run",
            "--speaker",
            "alice=a.wav",
            "-s",
            "bob=/tmp/b.wav",
            "--output-dir",
            "out",
            "--no-realtime",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                speakers,
                output_dir,
                player,
                no_realtime,
                keep_running,
            } => {
                assert_eq!(speakers.len(), 2);
                assert_eq!(speakers[0].speaker.as_str(), "alice");
                assert_eq!(speakers[1].path, PathBuf::from("/tmp/b.wav"));
                assert_eq!(output_dir, Some(PathBuf::from("out")));
                assert!(player.is_none());
                assert!(no_realtime);
                assert!(!keep_running);
            }
            other => panic!("Expected Run command, got {:?}", other),
        }
    }

    #[test]
    fn test_run_requires_speaker() {
        assert!(Cli::try_parse_from(["voxrelay", "run"]).is_err());
    }

    #[test]
    fn test_run_rejects_malformed_speaker() {
        assert!(Cli::try_parse_from(["voxrelay", "run", "--speaker", "a.wav"]).is_err());
        assert!(Cli::try_parse_from(["voxrelay", "run", "--speaker", "bad id=a.wav"]).is_err());
        assert!(Cli::try_parse_from(["voxrelay", "run", "--speaker", "alice="]).is_err());
    }

    #[test]
    fn test_output_dir_conflicts_with_player() {
        let result = Cli::try_parse_from([
            "voxrelay",
            "run",
            "-s",
            "a=a.wav",
            "--output-dir",
            "out",
            "--player",
            "aplay",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_set_joins_value_words() {
        let cli = Cli::try_parse_from(["voxrelay", "set", "tts_voice", "nova"]).unwrap();
        match cli.command {
            Commands::Set { key, value } => {
                assert_eq!(key, "tts_voice");
                assert_eq!(value.join(" "), "nova");
            }
            other => panic!("Expected Set command, got {:?}", other),
        }

        let cli = Cli::try_parse_from(["voxrelay", "set", "default_target_language", "-"]).unwrap();
        match cli.command {
            Commands::Set { value, .. } => assert_eq!(value, vec!["-"]),
            other => panic!("Expected Set command, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_get_optional_key() {
        let cli = Cli::try_parse_from(["voxrelay", "get"]).unwrap();
        assert!(matches!(cli.command, Commands::Get { key: None }));

        let cli = Cli::try_parse_from(["voxrelay", "get", "model"]).unwrap();
        assert!(matches!(cli.command, Commands::Get { key: Some(ref k) } if k == "model"));
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "voxrelay",
            "status",
            "-vv",
            "--config",
            "/etc/voxrelay.toml",
            "--socket",
            "/tmp/r.sock",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/voxrelay.toml")));
        assert_eq!(cli.socket, Some(PathBuf::from("/tmp/r.sock")));
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn test_parse_config_actions() {
        let cli = Cli::try_parse_from(["voxrelay", "config", "path"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Path
            }
        ));
    }

    #[test]
    fn test_help_subcommand_is_the_relay_command() {
        let cli = Cli::try_parse_from(["voxrelay", "help"]).unwrap();
        assert!(matches!(cli.command, Commands::Help));
    }

    #[test]
    fn test_parse_completions() {
        let cli = Cli::try_parse_from(["voxrelay", "completions", "bash"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Completions { shell: Shell::Bash }
        ));
    }
}
