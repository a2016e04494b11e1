use crate::Utterance;

/// Accumulates final recognition fragments into per-turn utterances.
///
/// Consumes events strictly in arrival order (one aggregator per session,
/// driven by the session's sequential event loop), so plain field mutation
/// is enough and no locking is needed.
#[derive(Debug, Default)]
pub struct UtteranceAggregator {
    buffer: String,
    speaker: Option<u32>,
    next_seq: u64,
}

impl UtteranceAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commits a final fragment to the current turn buffer and records the
    /// fragment's dominant speaker. Returns that dominant speaker (`None`
    /// when the fragment carried no speaker attributions).
    ///
    /// Interim fragments must never be passed here; they are display-only.
    pub fn push_final(&mut self, text: &str, word_speakers: &[u32]) -> Option<u32> {
        self.buffer.push_str(text);
        self.buffer.push(' ');

        let dominant = dominant_speaker(word_speakers);
        if dominant.is_some() {
            self.speaker = dominant;
        }
        dominant
    }

    /// Whether the current turn has any committed text.
    pub fn has_pending(&self) -> bool {
        !self.buffer.trim().is_empty()
    }

    /// Closes the current turn: trims the buffer, resets state, and returns
    /// the finished utterance. A turn-end with an empty buffer is a no-op.
    pub fn close_turn(&mut self) -> Option<Utterance> {
        let text = self.buffer.trim().to_string();
        if text.is_empty() {
            return None;
        }

        let utterance = Utterance {
            speaker: self.speaker,
            text,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.buffer.clear();
        self.speaker = None;

        Some(utterance)
    }
}

/// Majority vote over a fragment's word-level speaker attributions.
///
/// Counts words per index; ties are broken by the index that appeared first
/// in the fragment, so the result is deterministic regardless of how the
/// counts are stored.
pub fn dominant_speaker(word_speakers: &[u32]) -> Option<u32> {
    // (index, count) in first-seen order
    let mut counts: Vec<(u32, usize)> = Vec::new();
    for &speaker in word_speakers {
        match counts.iter_mut().find(|(s, _)| *s == speaker) {
            Some((_, count)) => *count += 1,
            None => counts.push((speaker, 1)),
        }
    }

    // only a strictly greater count displaces the current best, so the
    // first-seen index survives ties
    let mut best: Option<(u32, usize)> = None;
    for &(speaker, count) in &counts {
        if best.is_none_or(|(_, top)| count > top) {
            best = Some((speaker, count));
        }
    }
    best.map(|(speaker, _)| speaker)
}
