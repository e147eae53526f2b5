//! Audio outputs the playback queue can drive.

use crate::error::{RelayError, Result};
use crate::pipeline::types::{PlaybackItem, StreamEncoding};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// The single audio output. Only the playback queue calls `play`.
#[async_trait]
pub trait AudioOutput: Send + 'static {
    /// Plays one item to completion.
    async fn play(&mut self, item: &PlaybackItem) -> Result<()>;

    /// Name for logging/debugging.
    fn name(&self) -> &'static str {
        "output"
    }
}

/// Pipes each item into a player command's stdin and waits for it to exit.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    program: String,
    args: Vec<String>,
}

impl CommandOutput {
    /// Splits a command line on whitespace; the first word is the program.
    pub fn parse(command_line: &str) -> Result<Self> {
        let mut words = command_line.split_whitespace().map(str::to_string);
        let program = words.next().ok_or_else(|| RelayError::Playback {
            message: "player command is empty".to_string(),
        })?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }
}

#[async_trait]
impl AudioOutput for CommandOutput {
    async fn play(&mut self, item: &PlaybackItem) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RelayError::Playback {
                message: format!("failed to start {}: {e}", self.program),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A player that exits early closes the pipe; its exit status decides.
            if let Err(e) = stdin.write_all(&item.audio).await {
                tracing::debug!(error = %e, "player closed stdin early");
            }
        }

        let status = child.wait().await.map_err(|e| RelayError::Playback {
            message: format!("{} did not finish: {e}", self.program),
        })?;
        if !status.success() {
            return Err(RelayError::Playback {
                message: format!("{} exited with {status}", self.program),
            });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "command"
    }
}

/// Writes each item to `NNNNNN-<speaker>.<ext>` in a directory, in order.
#[derive(Debug, Clone)]
pub struct DirectoryOutput {
    dir: PathBuf,
    next: u64,
}

impl DirectoryOutput {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, next: 1 })
    }

    fn file_name(&self, item: &PlaybackItem) -> String {
        format!(
            "{:06}-{}.{}",
            self.next,
            item.speaker,
            item.encoding.extension()
        )
    }
}

#[async_trait]
impl AudioOutput for DirectoryOutput {
    async fn play(&mut self, item: &PlaybackItem) -> Result<()> {
        let path = self.dir.join(self.file_name(item));
        tokio::fs::write(&path, &item.audio)
            .await
            .map_err(|e| RelayError::Playback {
                message: format!("cannot write {}: {e}", path.display()),
            })?;
        self.next += 1;
        tracing::info!(path = %path.display(), "wrote translated speech");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "directory"
    }
}

/// What a [`RecordingOutput`] observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    Started(String),
    Finished(String),
    Failed(String),
}

#[derive(Debug, Default)]
struct Recording {
    events: Vec<PlaybackEvent>,
    encodings: Vec<StreamEncoding>,
    active: usize,
    max_active: usize,
}

/// Test output that records start/finish order and concurrent activity.
///
/// Clones share the same recording.
#[derive(Debug, Clone, Default)]
pub struct RecordingOutput {
    recording: Arc<Mutex<Recording>>,
    play_time: Duration,
    fail_on: Option<String>,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each item "plays" for this long.
    pub fn with_play_time(mut self, play_time: Duration) -> Self {
        self.play_time = play_time;
        self
    }

    /// Playing an item with this text fails.
    pub fn with_failure_on(mut self, text: &str) -> Self {
        self.fail_on = Some(text.to_string());
        self
    }

    fn with_recording<T>(&self, f: impl FnOnce(&mut Recording) -> T) -> T {
        f(&mut self.recording.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn events(&self) -> Vec<PlaybackEvent> {
        self.with_recording(|r| r.events.clone())
    }

    /// Texts of items that finished successfully, in order.
    pub fn played(&self) -> Vec<String> {
        self.with_recording(|r| {
            r.events
                .iter()
                .filter_map(|e| match e {
                    PlaybackEvent::Finished(text) => Some(text.clone()),
                    _ => None,
                })
                .collect()
        })
    }

    /// Declared encoding of every item handed to the output, in order.
    pub fn encodings(&self) -> Vec<StreamEncoding> {
        self.with_recording(|r| r.encodings.clone())
    }

    /// Highest number of items ever playing at once.
    pub fn max_concurrent(&self) -> usize {
        self.with_recording(|r| r.max_active)
    }
}

#[async_trait]
impl AudioOutput for RecordingOutput {
    async fn play(&mut self, item: &PlaybackItem) -> Result<()> {
        self.with_recording(|r| {
            r.active += 1;
            r.max_active = r.max_active.max(r.active);
            r.events.push(PlaybackEvent::Started(item.text.clone()));
            r.encodings.push(item.encoding.clone());
        });

        if !self.play_time.is_zero() {
            tokio::time::sleep(self.play_time).await;
        }

        let failed = self.fail_on.as_deref() == Some(item.text.as_str());
        self.with_recording(|r| {
            r.active -= 1;
            r.events.push(if failed {
                PlaybackEvent::Failed(item.text.clone())
            } else {
                PlaybackEvent::Finished(item.text.clone())
            });
        });

        if failed {
            return Err(RelayError::Playback {
                message: format!("simulated failure for {:?}", item.text),
            });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
