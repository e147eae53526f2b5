//! Utterance pipeline: the work done for each captured utterance.
//!
//! Every utterance runs in its own task, so a slow or failing service call
//! only ever delays the speaker it belongs to.

pub mod error;
pub mod feedback;
pub mod orchestrator;
pub mod types;

pub use error::{ErrorReporter, LogReporter, Stage, StageError};
pub use feedback::{CollectorFeedback, FeedbackSink, FileFeedback, LogFeedback};
pub use orchestrator::{UtteranceOutcome, UtterancePipeline};
pub use types::{
    CapturedUtterance, PcmFormat, PlaybackItem, SpeakerId, StreamEncoding, UtteranceTiming,
};
