//! Keyed registry of active capture sessions.
//!
//! A speaker has an entry only while a session is open for them; absence
//! means idle. Claims are released on drop, so a session that ends on any
//! path frees its speaker.

use crate::pipeline::types::SpeakerId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Lifecycle state of an active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Capturing,
    Finalizing,
}

impl CaptureState {
    pub fn as_str(self) -> &'static str {
        match self {
            CaptureState::Capturing => "capturing",
            CaptureState::Finalizing => "finalizing",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<SpeakerId, CaptureState>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SpeakerId, CaptureState>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims `speaker` for a new session, or returns `None` when one is
    /// already active for them.
    pub fn try_claim(&self, speaker: &SpeakerId) -> Option<SessionClaim> {
        let mut sessions = self.lock();
        if sessions.contains_key(speaker) {
            return None;
        }
        sessions.insert(speaker.clone(), CaptureState::Capturing);
        Some(SessionClaim {
            registry: self.clone(),
            speaker: speaker.clone(),
        })
    }

    pub fn state(&self, speaker: &SpeakerId) -> Option<CaptureState> {
        self.lock().get(speaker).copied()
    }

    pub fn is_active(&self, speaker: &SpeakerId) -> bool {
        self.state(speaker).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Active speakers, sorted.
    pub fn active(&self) -> Vec<(SpeakerId, CaptureState)> {
        let mut active: Vec<_> = self
            .lock()
            .iter()
            .map(|(speaker, state)| (speaker.clone(), *state))
            .collect();
        active.sort_by(|a, b| a.0.cmp(&b.0));
        active
    }
}

/// Exclusive right to run a session for one speaker.
#[derive(Debug)]
pub struct SessionClaim {
    registry: SessionRegistry,
    speaker: SpeakerId,
}

impl SessionClaim {
    pub fn speaker(&self) -> &SpeakerId {
        &self.speaker
    }

    pub fn set_state(&self, state: CaptureState) {
        if let Some(entry) = self.registry.lock().get_mut(&self.speaker) {
            *entry = state;
        }
    }
}

impl Drop for SessionClaim {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.speaker);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_claim_per_speaker() {
        let registry = SessionRegistry::new();
        let x = SpeakerId::new("x");

        let claim = registry.try_claim(&x).unwrap();
        assert!(registry.try_claim(&x).is_none());
        assert_eq!(registry.state(&x), Some(CaptureState::Capturing));

        drop(claim);
        assert!(!registry.is_active(&x));
        assert!(registry.try_claim(&x).is_some());
    }

    #[test]
    fn test_speakers_are_independent() {
        let registry = SessionRegistry::new();
        let _a = registry.try_claim(&SpeakerId::new("a")).unwrap();
        let _b = registry.try_claim(&SpeakerId::new("b")).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_state_transitions_and_listing() {
        let registry = SessionRegistry::new();
        let b = registry.try_claim(&SpeakerId::new("b")).unwrap();
        let _a = registry.try_claim(&SpeakerId::new("a")).unwrap();
        b.set_state(CaptureState::Finalizing);

        let active = registry.active();
        assert_eq!(active[0].0.as_str(), "a");
        assert_eq!(active[0].1, CaptureState::Capturing);
        assert_eq!(active[1].1, CaptureState::Finalizing);
    }
}
