//! Single-consumer playback queue.
//!
//! Any number of producers enqueue through cloned [`PlaybackHandle`]s; one
//! worker task owns the [`AudioOutput`] and plays items strictly in
//! enqueue order, one at a time.

use crate::error::{RelayError, Result};
use crate::pipeline::types::PlaybackItem;
use crate::playback::output::AudioOutput;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

enum Message {
    Play(PlaybackItem),
    /// Answered once every earlier item has been played.
    Drain(oneshot::Sender<()>),
    Stop,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: AtomicUsize,
    playing: AtomicBool,
    played: AtomicU64,
    failed: AtomicU64,
}

/// Counters reported by the playback worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    pub pending: usize,
    pub playing: bool,
    pub played: u64,
    pub failed: u64,
}

/// Cheap, cloneable producer side of the queue.
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    tx: mpsc::UnboundedSender<Message>,
    state: Arc<QueueState>,
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::Play(item) => f.debug_tuple("Play").field(&item.text).finish(),
            Message::Drain(_) => f.write_str("Drain"),
            Message::Stop => f.write_str("Stop"),
        }
    }
}

impl PlaybackHandle {
    /// Appends an item without waiting. Returns the queue depth after the append.
    pub fn enqueue(&self, item: PlaybackItem) -> Result<usize> {
        let depth = self.state.pending.fetch_add(1, Ordering::SeqCst) + 1;
        if self.tx.send(Message::Play(item)).is_err() {
            self.state.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(RelayError::Playback {
                message: "playback queue is closed".to_string(),
            });
        }
        Ok(depth)
    }

    /// Items waiting to play, not counting the one playing.
    pub fn len(&self) -> usize {
        self.state.pending.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_playing(&self) -> bool {
        self.state.playing.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> PlaybackStats {
        PlaybackStats {
            pending: self.len(),
            playing: self.is_playing(),
            played: self.state.played.load(Ordering::SeqCst),
            failed: self.state.failed.load(Ordering::SeqCst),
        }
    }

    /// Waits until everything enqueued before this call has finished playing.
    pub async fn drain(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Message::Drain(done_tx))
            .map_err(|_| RelayError::Playback {
                message: "playback queue is closed".to_string(),
            })?;
        done_rx.await.map_err(|_| RelayError::Playback {
            message: "playback worker stopped".to_string(),
        })
    }
}

/// The running queue: its worker task plus a producer handle.
pub struct PlaybackQueue {
    handle: PlaybackHandle,
    worker: JoinHandle<()>,
}

impl PlaybackQueue {
    /// Spawns the worker that owns `output`.
    pub fn spawn<O: AudioOutput>(output: O) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(QueueState::default());
        let worker = tokio::spawn(run_worker(output, rx, state.clone()));
        Self {
            handle: PlaybackHandle { tx, state },
            worker,
        }
    }

    pub fn handle(&self) -> PlaybackHandle {
        self.handle.clone()
    }

    /// Plays what is already queued, then stops the worker.
    pub async fn shutdown(self) -> PlaybackStats {
        if self.handle.tx.send(Message::Stop).is_err() {
            tracing::debug!("playback worker already stopped");
        }
        if let Err(e) = self.worker.await {
            tracing::error!(error = %e, "playback worker panicked");
        }
        self.handle.stats()
    }
}

async fn run_worker<O: AudioOutput>(
    mut output: O,
    mut rx: mpsc::UnboundedReceiver<Message>,
    state: Arc<QueueState>,
) {
    tracing::debug!(output = output.name(), "playback worker started");

    while let Some(message) = rx.recv().await {
        match message {
            Message::Play(item) => {
                state.pending.fetch_sub(1, Ordering::SeqCst);
                state.playing.store(true, Ordering::SeqCst);

                match output.play(&item).await {
                    Ok(()) => {
                        state.played.fetch_add(1, Ordering::SeqCst);
                        tracing::debug!(
                            speaker = %item.speaker,
                            target = %item.target_language,
                            bytes = item.audio.len(),
                            "playback finished"
                        );
                    }
                    Err(e) => {
                        // The failing item is dropped; the queue moves on.
                        state.failed.fetch_add(1, Ordering::SeqCst);
                        tracing::warn!(speaker = %item.speaker, error = %e, "playback failed");
                    }
                }

                state.playing.store(false, Ordering::SeqCst);
            }
            Message::Drain(done) => {
                if done.send(()).is_err() {
                    tracing::debug!("drain waiter went away");
                }
            }
            Message::Stop => break,
        }
    }

    // Refuse new items, then account for anything sent after Stop.
    rx.close();
    let mut dropped = 0usize;
    while let Ok(message) = rx.try_recv() {
        match message {
            Message::Play(item) => {
                state.pending.fetch_sub(1, Ordering::SeqCst);
                dropped += 1;
                tracing::debug!(speaker = %item.speaker, "item arrived after stop");
            }
            // Late drain waiters see the worker as stopped.
            Message::Drain(_) | Message::Stop => {}
        }
    }
    if dropped > 0 {
        tracing::warn!(dropped, "playback stopped with unplayed items");
    }

    tracing::debug!(output = output.name(), "playback worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{SpeakerId, StreamEncoding};
    use crate::playback::output::{PlaybackEvent, RecordingOutput};
    use std::time::Duration;

    fn item(text: &str) -> PlaybackItem {
        PlaybackItem {
            audio: text.as_bytes().to_vec(),
            encoding: StreamEncoding::OggOpus,
            speaker: SpeakerId::new("s"),
            detected_language: "en".to_string(),
            target_language: "ro".to_string(),
            text: text.to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_plays_in_enqueue_order_without_overlap() {
        let recorder = RecordingOutput::new().with_play_time(Duration::from_millis(100));
        let queue = PlaybackQueue::spawn(recorder.clone());
        let handle = queue.handle();

        for text in ["a", "b", "c", "d"] {
            handle.enqueue(item(text)).unwrap();
        }
        handle.drain().await.unwrap();

        assert_eq!(recorder.played(), vec!["a", "b", "c", "d"]);
        assert_eq!(recorder.max_concurrent(), 1);
        assert_eq!(handle.stats().played, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_does_not_interrupt_current_item() {
        let recorder = RecordingOutput::new().with_play_time(Duration::from_millis(500));
        let queue = PlaybackQueue::spawn(recorder.clone());
        let handle = queue.handle();

        handle.enqueue(item("first")).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_playing());
        handle.enqueue(item("second")).unwrap();
        assert_eq!(handle.len(), 1);

        handle.drain().await.unwrap();
        assert_eq!(
            recorder.events(),
            vec![
                PlaybackEvent::Started("first".to_string()),
                PlaybackEvent::Finished("first".to_string()),
                PlaybackEvent::Started("second".to_string()),
                PlaybackEvent::Finished("second".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_item_is_dropped_and_queue_advances() {
        let recorder = RecordingOutput::new().with_failure_on("bad");
        let queue = PlaybackQueue::spawn(recorder.clone());
        let handle = queue.handle();

        handle.enqueue(item("one")).unwrap();
        handle.enqueue(item("bad")).unwrap();
        handle.enqueue(item("two")).unwrap();

        let stats = queue.shutdown().await;
        assert_eq!(recorder.played(), vec!["one", "two"]);
        assert_eq!(stats.played, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.pending, 0);
    }

    #[tokio::test]
    async fn test_items_sent_after_stop_are_dropped_and_uncounted() {
        let recorder = RecordingOutput::new();
        let queue = PlaybackQueue::spawn(recorder.clone());
        let handle = queue.handle();

        handle.enqueue(item("kept")).unwrap();
        handle.tx.send(Message::Stop).unwrap();
        handle.enqueue(item("late")).unwrap();

        let stats = queue.shutdown().await;
        assert_eq!(recorder.played(), vec!["kept"]);
        assert_eq!(stats.played, 1);
        assert_eq!(stats.pending, 0);
        assert!(handle.enqueue(item("after")).is_err());
        assert_eq!(handle.len(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_producers_are_serialized() {
        let recorder = RecordingOutput::new();
        let queue = PlaybackQueue::spawn(recorder.clone());

        let mut tasks = Vec::new();
        for producer in 0..8 {
            let handle = queue.handle();
            tasks.push(tokio::spawn(async move {
                for n in 0..5 {
                    handle.enqueue(item(&format!("{producer}-{n}"))).unwrap();
                    tokio::task::yield_now().await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let stats = queue.shutdown().await;
        assert_eq!(stats.played, 40);
        assert_eq!(recorder.max_concurrent(), 1);

        // Each producer's own items stay in order.
        let played = recorder.played();
        for producer in 0..8 {
            let mine: Vec<_> = played
                .iter()
                .filter(|t| t.starts_with(&format!("{producer}-")))
                .cloned()
                .collect();
            let expected: Vec<_> = (0..5).map(|n| format!("{producer}-{n}")).collect();
            assert_eq!(mine, expected);
        }
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_fails() {
        let queue = PlaybackQueue::spawn(RecordingOutput::new());
        let handle = queue.handle();
        queue.shutdown().await;
        assert!(handle.enqueue(item("late")).is_err());
        assert_eq!(handle.len(), 0);
    }
}
