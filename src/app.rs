//! Relay application entry point.
//!
//! Wires configuration, the OpenAI-backed services, playback output, the
//! control socket and the per-speaker file feeds into one running relay.

use crate::audio::feed::WavFeed;
use crate::cli::SpeakerSource;
use crate::config::{Config, api_key_from_env};
use crate::control::ControlHandler;
use crate::error::{RelayError, Result};
use crate::ipc::server::IpcServer;
use crate::pipeline::types::SpeakerId;
use crate::pipeline::{FeedbackSink, FileFeedback, LogFeedback};
use crate::playback::{CommandOutput, DirectoryOutput, PlaybackQueue};
use crate::relay::{Relay, RelayOptions};
use crate::services::Services;
use crate::services::openai::OpenAiClient;
use crate::services::retry::RetryPolicy;
use crate::settings::{RuntimeSettings, SettingsStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle, JoinSet};

/// Where synthesized speech goes.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputChoice {
    Directory(PathBuf),
    Player(String),
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub speakers: Vec<SpeakerSource>,
    pub output: OutputChoice,
    pub socket: PathBuf,
    pub realtime: bool,
    pub keep_running: bool,
}

/// Run the relay until the feeds finish, a `shutdown` command arrives, or
/// the process is interrupted. Queued playback is always finished first.
pub async fn run_relay(config: Config, options: RunOptions) -> Result<()> {
    tracing::info!(version = %crate::version_string(), "voxrelay starting");
    config.validate()?;
    let settings = RuntimeSettings::from_config(&config)?;
    if settings.tts_format != "opus" {
        tracing::warn!(
            format = %settings.tts_format,
            "tts_format is not opus; output will be declared as an arbitrary stream"
        );
    }

    let api_key = api_key_from_env()?;
    let client = OpenAiClient::new(
        &config.openai.api_base,
        &api_key,
        Duration::from_secs(config.openai.request_timeout_secs),
    )?;
    let services = Services::from_client(Arc::new(client))
        .with_retries(RetryPolicy::new(config.openai.max_retries));

    let format = config.capture.pcm_format();
    // Open every file before anything starts so a bad path fails fast.
    let feeds = options
        .speakers
        .iter()
        .map(|source| WavFeed::open(source.speaker.clone(), &source.path, format))
        .collect::<Result<Vec<_>>>()?;

    let queue = match &options.output {
        OutputChoice::Directory(dir) => PlaybackQueue::spawn(DirectoryOutput::new(dir.clone())?),
        OutputChoice::Player(command) => PlaybackQueue::spawn(CommandOutput::parse(command)?),
    };

    let feedback: Arc<dyn FeedbackSink> = match &config.control.feedback_path {
        Some(path) => Arc::new(FileFeedback::new(path.clone())),
        None => Arc::new(LogFeedback),
    };
    let self_speaker = config
        .control
        .self_speaker
        .as_deref()
        .map(SpeakerId::parse)
        .transpose()
        .map_err(|message| RelayError::ConfigInvalidValue {
            key: "control.self_speaker".to_string(),
            message,
        })?;

    let relay = Relay::new(
        services,
        Arc::new(SettingsStore::new(settings)),
        queue.handle(),
        RelayOptions {
            format,
            translation_enabled: !config.control.require_start_command,
            self_speaker,
            feedback: Some(feedback),
            reporter: None,
        },
    );
    if !relay.is_translation_enabled() {
        tracing::info!("translation disabled until a start command arrives");
    }

    let server = IpcServer::new(options.socket.clone());
    let shutdown = server.shutdown_handle();
    let handler = ControlHandler::new(relay.clone(), shutdown.clone());
    let mut server_task: JoinHandle<Result<()>> =
        tokio::spawn(async move { server.start(handler).await });

    let server_stopped = tokio::select! {
        _ = play_feeds(&relay, feeds, options.realtime) => {
            if options.keep_running {
                tracing::info!("feeds finished; serving control socket until shutdown");
                tokio::select! {
                    result = &mut server_task => {
                        server_exit(result)?;
                        true
                    }
                    _ = tokio::signal::ctrl_c() => false,
                }
            } else {
                false
            }
        }
        result = &mut server_task => {
            server_exit(result)?;
            true
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
            false
        }
    };

    if !server_stopped {
        shutdown.notify_one();
        server_exit(server_task.await)?;
    }

    relay.wait_idle().await;
    let stats = queue.shutdown().await;
    tracing::info!(played = stats.played, failed = stats.failed, "relay stopped");
    Ok(())
}

/// Replays every feed concurrently, then waits for the resulting work to play out.
async fn play_feeds(relay: &Relay, feeds: Vec<WavFeed>, realtime: bool) {
    let mut tasks = JoinSet::new();
    for feed in feeds {
        let relay = relay.clone();
        tasks.spawn(async move {
            tracing::info!(
                speaker = %feed.speaker(),
                seconds = feed.duration().as_secs_f32(),
                "feeding speaker audio"
            );
            relay.play_feed(&feed, realtime).await;
        });
    }
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "feed task failed");
        }
    }

    relay.wait_idle().await;
    if let Err(e) = relay.playback().drain().await {
        tracing::warn!(error = %e, "playback drain failed");
    }
}

fn server_exit(result: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    match result {
        Ok(inner) => inner,
        Err(e) => Err(RelayError::Other(format!("control server task failed: {}", e))),
    }
}
