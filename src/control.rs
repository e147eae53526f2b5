//! Command handler for the relay's control socket.

use crate::ipc::protocol::{Command, Response};
use crate::ipc::server::CommandHandler;
use crate::relay::Relay;
use crate::settings::SettingKey;
use std::sync::Arc;
use tokio::sync::Notify;

pub const HELP_TEXT: &str = "Commands: help | start | stop | status | get [key] | set <key> <value> | shutdown";

/// Answers control commands against a running relay.
pub struct ControlHandler {
    relay: Relay,
    shutdown: Arc<Notify>,
}

impl ControlHandler {
    /// `shutdown` is notified when a `shutdown` command arrives.
    pub fn new(relay: Relay, shutdown: Arc<Notify>) -> Self {
        Self { relay, shutdown }
    }

    fn status(&self) -> Response {
        let status = self.relay.status();
        Response::Status {
            translation_enabled: status.translation_enabled,
            queue_depth: status.playback.pending,
            playing: status.playback.playing,
            played: status.playback.played,
            failed: status.playback.failed,
            active_sessions: status
                .sessions
                .iter()
                .map(|(speaker, state)| format!("{}:{}", speaker, state.as_str()))
                .collect(),
            summary: status.render(),
        }
    }

    fn get(&self, key: Option<String>) -> Response {
        let settings = self.relay.settings();
        let Some(key) = key else {
            return Response::Settings {
                entries: settings.entries(),
            };
        };

        match key.parse::<SettingKey>() {
            Ok(parsed) => Response::Settings {
                entries: vec![(parsed.to_string(), settings.snapshot().get(parsed))],
            },
            Err(e) => Response::error(e.to_string()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Response {
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            return Response::error(
                "Usage: set <key> <value>. Example: set language_pairs ro:en,en:ro",
            );
        }

        match self.relay.settings().apply(key, value) {
            Ok(rendered) => Response::ok(format!("Updated {} = {}", key.to_lowercase(), rendered)),
            Err(e) => Response::error(format!("Invalid setting: {}", e)),
        }
    }
}

#[async_trait::async_trait]
impl CommandHandler for ControlHandler {
    async fn handle(&self, command: Command) -> Response {
        match command {
            Command::Start => {
                self.relay.set_translation_enabled(true);
                Response::ok("Voice translation started.")
            }
            Command::Stop => {
                self.relay.set_translation_enabled(false);
                Response::ok("Voice translation stopped.")
            }
            Command::Status => self.status(),
            Command::Get { key } => self.get(key),
            Command::Set { key, value } => self.set(&key, &value),
            Command::Help => Response::ok(HELP_TEXT),
            Command::Shutdown => {
                tracing::info!("shutdown requested over control socket");
                self.shutdown.notify_one();
                Response::ok("Shutting down after queued playback.")
            }
        }
    }
}
