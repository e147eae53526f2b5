//! End-to-end relay behavior through the public API, with mock services.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use voxrelay::audio::feed::WavFeed;
use voxrelay::pipeline::CollectorFeedback;
use voxrelay::playback::{PlaybackEvent, PlaybackQueue, RecordingOutput};
use voxrelay::services::Services;
use voxrelay::services::mock::{MockSynthesizer, MockTranscriber, MockTranslator};
use voxrelay::{PcmFormat, Relay, RelayOptions, SettingsStore, SpeakerId};

/// 20 ms of 48 kHz stereo 16-bit audio.
const CHUNK_BYTES: usize = 3840;

struct Harness {
    relay: Relay,
    queue: PlaybackQueue,
    recorder: RecordingOutput,
    translator: Arc<MockTranslator>,
    synthesizer: Arc<MockSynthesizer>,
    feedback: Arc<CollectorFeedback>,
}

impl Harness {
    fn new(
        settings: &[(&str, &str)],
        transcriber: MockTranscriber,
        translator: MockTranslator,
        synthesizer: MockSynthesizer,
        recorder: RecordingOutput,
    ) -> Self {
        Self::with_format(
            PcmFormat::default(),
            settings,
            transcriber,
            translator,
            synthesizer,
            recorder,
        )
    }

    fn with_format(
        format: PcmFormat,
        settings: &[(&str, &str)],
        transcriber: MockTranscriber,
        translator: MockTranslator,
        synthesizer: MockSynthesizer,
        recorder: RecordingOutput,
    ) -> Self {
        let store = Arc::new(SettingsStore::default());
        for (key, value) in settings {
            store.apply(key, value).unwrap();
        }

        let translator = Arc::new(translator);
        let synthesizer = Arc::new(synthesizer);
        let feedback = Arc::new(CollectorFeedback::new());
        let queue = PlaybackQueue::spawn(recorder.clone());
        let services = Services::new(
            Arc::new(transcriber),
            translator.clone(),
            synthesizer.clone(),
        );
        let relay = Relay::new(
            services,
            store,
            queue.handle(),
            RelayOptions {
                format,
                translation_enabled: true,
                feedback: Some(feedback.clone()),
                ..RelayOptions::default()
            },
        );

        Self {
            relay,
            queue,
            recorder,
            translator,
            synthesizer,
            feedback,
        }
    }

    async fn settle(&self) {
        self.relay.wait_idle().await;
        self.queue.handle().drain().await.unwrap();
    }
}

fn pcm_chunks(count: usize, seed: u8) -> Vec<Vec<u8>> {
    (0..count)
        .map(|i| vec![seed.wrapping_add(i as u8); CHUNK_BYTES])
        .collect()
}

fn wav_to_pcm(wav: &[u8]) -> Vec<u8> {
    let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    reader
        .samples::<i16>()
        .flat_map(|s| s.unwrap().to_le_bytes())
        .collect()
}

#[tokio::test]
async fn scenario_a_english_speech_is_translated_to_romanian_and_played() {
    // Two seconds of audio, well between the default min and max.
    let chunks = pcm_chunks(100, 7);
    let expected: Vec<u8> = chunks.concat();
    assert_eq!(expected.len(), 384_000);

    let transcriber = MockTranscriber::new().with_responder(move |wav| {
        if wav_to_pcm(wav) == expected {
            "exact audio".to_string()
        } else {
            "altered audio".to_string()
        }
    });
    let harness = Harness::new(
        &[("text_feedback", "on")],
        transcriber,
        MockTranslator::new().with_detected_language("en"),
        MockSynthesizer::new(),
        RecordingOutput::new(),
    );
    let x = SpeakerId::new("x");

    let feed = harness.relay.speaking_started(&x).unwrap();
    for chunk in chunks {
        assert!(feed.chunk(chunk));
    }
    feed.end();
    harness.settle().await;

    assert_eq!(harness.recorder.played(), vec!["exact audio"]);
    let requests = harness.translator.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].routing.forced_target_language, "");
    assert_eq!(
        harness.feedback.messages(),
        vec![(x, "[en->ro] exact audio".to_string())]
    );
}

#[tokio::test]
async fn scenario_b_forced_target_equal_to_detected_language_is_not_spoken() {
    let harness = Harness::new(
        &[("user_target_languages", "y:fr")],
        MockTranscriber::new().with_response("bonjour"),
        MockTranslator::new()
            .with_detected_language("fr")
            .with_should_reply(true),
        MockSynthesizer::new(),
        RecordingOutput::new(),
    );
    let y = SpeakerId::new("y");

    let feed = harness.relay.speaking_started(&y).unwrap();
    for chunk in pcm_chunks(50, 1) {
        feed.chunk(chunk);
    }
    feed.end();
    harness.settle().await;

    let requests = harness.translator.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].routing.forced_target_language, "fr");
    assert!(harness.synthesizer.requests().is_empty());
    assert!(harness.recorder.played().is_empty());
    assert_eq!(harness.queue.handle().stats().played, 0);
}

#[tokio::test]
async fn scenario_c_overlong_stream_is_closed_and_never_processed() {
    let harness = Harness::new(
        &[("voice_max_pcm_bytes", "200000")],
        MockTranscriber::new(),
        MockTranslator::new(),
        MockSynthesizer::new(),
        RecordingOutput::new(),
    );
    let z = SpeakerId::new("z");

    let feed = harness.relay.speaking_started(&z).unwrap();
    // 60 chunks = 230400 bytes, over the maximum.
    for chunk in pcm_chunks(60, 3) {
        feed.chunk(chunk);
    }
    while !feed.is_closed() {
        tokio::task::yield_now().await;
    }
    assert!(!feed.chunk(vec![0; CHUNK_BYTES]));
    feed.end();
    harness.settle().await;

    assert!(harness.translator.requests().is_empty());
    assert!(harness.recorder.played().is_empty());

    // The speaker can start a fresh utterance right away.
    let feed = harness.relay.speaking_started(&z).unwrap();
    for chunk in pcm_chunks(30, 3) {
        feed.chunk(chunk);
    }
    feed.end();
    harness.settle().await;
    assert_eq!(harness.recorder.played().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn scenario_d_near_simultaneous_utterances_play_in_completion_order_without_overlap() {
    let transcriber = MockTranscriber::new().with_responder(|wav| {
        match wav_to_pcm(wav).first() {
            Some(1) => "from a".to_string(),
            _ => "from b".to_string(),
        }
    });
    let synthesizer = MockSynthesizer::new()
        .with_delay_for("from a", Duration::from_millis(100))
        .with_delay_for("from b", Duration::from_millis(150));
    let harness = Harness::new(
        &[],
        transcriber,
        MockTranslator::new(),
        synthesizer,
        RecordingOutput::new().with_play_time(Duration::from_millis(400)),
    );
    let a = SpeakerId::new("a");
    let b = SpeakerId::new("b");

    // B starts first so the finish order is decided by synthesis alone.
    let feed_b = harness.relay.speaking_started(&b).unwrap();
    let feed_a = harness.relay.speaking_started(&a).unwrap();
    for chunk in pcm_chunks(30, 2) {
        feed_b.chunk(chunk);
    }
    for _ in 0..30 {
        feed_a.chunk(vec![1; CHUNK_BYTES]);
    }
    feed_b.end();
    feed_a.end();
    harness.settle().await;

    assert_eq!(
        harness.recorder.events(),
        vec![
            PlaybackEvent::Started("from a".to_string()),
            PlaybackEvent::Finished("from a".to_string()),
            PlaybackEvent::Started("from b".to_string()),
            PlaybackEvent::Finished("from b".to_string()),
        ]
    );
    assert_eq!(harness.recorder.max_concurrent(), 1);
}

#[tokio::test]
async fn empty_transcript_for_one_speaker_does_not_affect_another() {
    let transcriber = MockTranscriber::new().with_responder(|wav| {
        match wav_to_pcm(wav).first() {
            Some(9) => String::new(),
            _ => "hello".to_string(),
        }
    });
    let harness = Harness::new(
        &[],
        transcriber,
        MockTranslator::new(),
        MockSynthesizer::new(),
        RecordingOutput::new(),
    );

    let silent = harness.relay.speaking_started(&SpeakerId::new("quiet")).unwrap();
    let talker = harness.relay.speaking_started(&SpeakerId::new("talker")).unwrap();
    for _ in 0..30 {
        silent.chunk(vec![9; CHUNK_BYTES]);
        talker.chunk(vec![4; CHUNK_BYTES]);
    }
    silent.end();
    talker.end();
    harness.settle().await;

    assert_eq!(harness.recorder.played(), vec!["hello"]);
    assert_eq!(harness.translator.requests().len(), 1);
}

#[tokio::test]
async fn short_noise_is_discarded_silently() {
    let harness = Harness::new(
        &[],
        MockTranscriber::new(),
        MockTranslator::new(),
        MockSynthesizer::new(),
        RecordingOutput::new(),
    );
    let n = SpeakerId::new("n");

    let feed = harness.relay.speaking_started(&n).unwrap();
    for chunk in pcm_chunks(5, 0) {
        feed.chunk(chunk);
    }
    feed.end();
    // A second end is harmless.
    feed.end();
    harness.settle().await;

    assert!(harness.translator.requests().is_empty());
    assert!(!harness.relay.is_capturing(&n));
}

#[tokio::test]
async fn settings_changes_apply_to_the_next_utterance() {
    let harness = Harness::new(
        &[],
        MockTranscriber::new().with_response("salut"),
        MockTranslator::new().with_detected_language("ro"),
        MockSynthesizer::new(),
        RecordingOutput::new(),
    );
    let s = SpeakerId::new("s");

    harness.relay.settings().apply("tts_voice", "nova").unwrap();
    harness
        .relay
        .settings()
        .apply("language_pairs", "ro:de")
        .unwrap();

    let feed = harness.relay.speaking_started(&s).unwrap();
    for chunk in pcm_chunks(30, 0) {
        feed.chunk(chunk);
    }
    feed.end();
    harness.settle().await;

    let speech = harness.synthesizer.requests();
    assert_eq!(speech.len(), 1);
    assert_eq!(speech[0].voice, "nova");
    assert_eq!(
        harness.translator.requests()[0]
            .routing
            .language_pairs
            .get("ro")
            .map(String::as_str),
        Some("de")
    );
}

#[tokio::test]
async fn wav_feed_replays_two_episodes() {
    const FORMAT: PcmFormat = PcmFormat {
        sample_rate: 8000,
        channels: 1,
        bits_per_sample: 16,
    };
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("speaker.wav");

    // 1 s voiced, 2 s silent, 1 s voiced at 8 kHz mono.
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for (voiced, seconds) in [(true, 1), (false, 2), (true, 1)] {
        for i in 0..8000 * seconds {
            let sample: i16 = match (voiced, i % 2) {
                (false, _) => 0,
                (true, 0) => 5000,
                (true, _) => -5000,
            };
            writer.write_sample(sample).unwrap();
        }
    }
    writer.finalize().unwrap();

    let harness = Harness::with_format(
        FORMAT,
        &[("voice_min_pcm_bytes", "8000")],
        MockTranscriber::new().with_response("spoken"),
        MockTranslator::new(),
        MockSynthesizer::new(),
        RecordingOutput::new(),
    );
    let speaker = SpeakerId::new("file");
    let feed = WavFeed::open(speaker, &path, FORMAT).unwrap();

    harness.relay.play_feed(&feed, false).await;
    harness.settle().await;

    assert_eq!(harness.recorder.played(), vec!["spoken", "spoken"]);
}
