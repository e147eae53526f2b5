//! Level-based voice gate over fixed-size frames.
//!
//! Mimics a voice transport's silence suppression: silent frames are
//! withheld, the first voiced frame opens a speaking episode, and a run of
//! silence at least `silence` long (measured in audio time) closes it.

use std::time::Duration;

/// Current state of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Speaking { silent_for: Duration },
}

/// What to do with the frame just processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// First voiced frame: signal start, then forward the frame.
    Open,
    /// Voiced frame inside an episode: forward it.
    Pass,
    /// Silent frame inside an episode: withhold it.
    Hold,
    /// Enough silence: withhold the frame and signal end.
    Close,
    /// Silent frame outside an episode.
    Quiet,
}

#[derive(Debug, Clone)]
pub struct VoiceGate {
    threshold: f32,
    silence: Duration,
    state: GateState,
}

impl VoiceGate {
    pub fn new(threshold: f32, silence: Duration) -> Self {
        Self {
            threshold,
            silence,
            state: GateState::Idle,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, GateState::Speaking { .. })
    }

    /// Classifies one frame lasting `frame` of audio time.
    pub fn process(&mut self, samples: &[i16], frame: Duration) -> GateDecision {
        let voiced = calculate_rms(samples) > self.threshold;

        match self.state {
            GateState::Idle if voiced => {
                self.state = GateState::Speaking {
                    silent_for: Duration::ZERO,
                };
                GateDecision::Open
            }
            GateState::Idle => GateDecision::Quiet,
            GateState::Speaking { .. } if voiced => {
                self.state = GateState::Speaking {
                    silent_for: Duration::ZERO,
                };
                GateDecision::Pass
            }
            GateState::Speaking { silent_for } => {
                let silent_for = silent_for + frame;
                if silent_for >= self.silence {
                    self.state = GateState::Idle;
                    GateDecision::Close
                } else {
                    self.state = GateState::Speaking { silent_for };
                    GateDecision::Hold
                }
            }
        }
    }
}

/// Calculates the Root Mean Square (RMS) of audio samples.
///
/// Normalized to 0.0..=1.0, where ~0.707 is a full-scale sine wave.
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    let mean_square = sum_squares / samples.len() as f64;
    mean_square.sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(20);

    fn silence() -> Vec<i16> {
        vec![0; 960]
    }

    fn speech() -> Vec<i16> {
        (0..960)
            .map(|i| if i % 2 == 0 { 8000 } else { -8000 })
            .collect()
    }

    #[test]
    fn test_rms_silence_is_zero() {
        assert_eq!(calculate_rms(&silence()), 0.0);
        assert_eq!(calculate_rms(&[]), 0.0);
    }

    #[test]
    fn test_rms_max_amplitude() {
        let rms = calculate_rms(&[i16::MAX; 100]);
        assert!((rms - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_rms_negative_samples() {
        let rms = calculate_rms(&[-16384; 100]);
        assert!((rms - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_gate_opens_on_first_voiced_frame() {
        let mut gate = VoiceGate::new(0.01, Duration::from_millis(100));
        assert_eq!(gate.process(&silence(), FRAME), GateDecision::Quiet);
        assert_eq!(gate.process(&speech(), FRAME), GateDecision::Open);
        assert_eq!(gate.process(&speech(), FRAME), GateDecision::Pass);
        assert!(gate.is_open());
    }

    #[test]
    fn test_gate_closes_after_silence_window() {
        let mut gate = VoiceGate::new(0.01, Duration::from_millis(60));
        gate.process(&speech(), FRAME);
        assert_eq!(gate.process(&silence(), FRAME), GateDecision::Hold);
        assert_eq!(gate.process(&silence(), FRAME), GateDecision::Hold);
        assert_eq!(gate.process(&silence(), FRAME), GateDecision::Close);
        assert_eq!(gate.state(), GateState::Idle);
        assert_eq!(gate.process(&silence(), FRAME), GateDecision::Quiet);
    }

    #[test]
    fn test_speech_resets_silence_run() {
        let mut gate = VoiceGate::new(0.01, Duration::from_millis(60));
        gate.process(&speech(), FRAME);
        gate.process(&silence(), FRAME);
        gate.process(&silence(), FRAME);
        assert_eq!(gate.process(&speech(), FRAME), GateDecision::Pass);
        assert_eq!(gate.process(&silence(), FRAME), GateDecision::Hold);
        assert_eq!(
            gate.state(),
            GateState::Speaking {
                silent_for: Duration::from_millis(20)
            }
        );
    }
}
