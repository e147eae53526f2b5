//! Per-speaker utterance capture.
//!
//! Each speaking episode runs its own [`run_capture`] task over a private
//! event stream. The [`SessionRegistry`] keeps at most one session per
//! speaker; the [`SizeGuard`] decides at finalization whether the audio is
//! forwarded.

pub mod registry;
pub mod session;
pub mod stream;

pub use registry::{CaptureState, SessionClaim, SessionRegistry};
pub use session::{ChunkOutcome, Discard, Finalized, SizeGuard, SpeakerSession, Verdict};
pub use stream::{CaptureOptions, EndReason, StreamEvent, run_capture};
