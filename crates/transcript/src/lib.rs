pub mod aggregator;
pub mod event;
pub mod roles;
pub mod state;

pub use aggregator::UtteranceAggregator;
pub use event::{RecognitionEvent, RecognitionResult};
pub use roles::{Role, RoleMap, RoleResolution};
pub use state::TranscriptState;

use serde::{Deserialize, Serialize};

/// A closed (turn-final) utterance. Immutable once created; its displayed
/// label is derived from the session's current [`RoleMap`], not stored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    /// Anonymous diarization index. `None` when the recognizer attributed
    /// no words of the turn to any speaker.
    pub speaker: Option<u32>,
    pub text: String,
    /// Position in the session's closed-utterance sequence.
    pub seq: u64,
}
