/// A normalized event from the upstream recognition stream.
///
/// The adapter translates every upstream callback into one of these variants
/// so the per-session loop can consume a single ordered queue instead of
/// sharing mutable state with the connection callbacks.
#[derive(Debug, Clone)]
pub enum RecognitionEvent {
    /// The upstream connection is established and accepting audio.
    Opened,
    /// A transcription fragment, interim or final.
    Result(RecognitionResult),
    /// Standalone turn-end signal (silence-based).
    TurnEnd,
    SpeechStarted,
    /// Upstream runtime error. Non-fatal to the session.
    Error(String),
    /// The upstream connection closed.
    Closed,
    Metadata,
}

/// A transcription fragment with word-level speaker attribution.
#[derive(Debug, Clone)]
pub struct RecognitionResult {
    pub text: String,
    /// One entry per word that carried a speaker index, in word order.
    /// Normalized to `u32` at the adapter boundary; the upstream sometimes
    /// sends these as JSON strings.
    pub word_speakers: Vec<u32>,
    /// Confirmed fragment: safe to commit to the turn buffer.
    pub is_final: bool,
    /// Explicit turn-final flag: the speaker's turn ended with this fragment.
    pub speech_final: bool,
}
