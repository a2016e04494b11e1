use crate::roles::RoleMap;
use crate::Utterance;

#[derive(Debug, Clone)]
struct Line {
    speaker: Option<u32>,
    text: String,
    label: String,
}

/// The ordered, append-mostly log of labeled utterances, the single source
/// of truth pushed to the client.
///
/// Lines keep their original `(speaker, text)` pair so a later role
/// resolution can rewrite every label without touching order or content.
/// The interim fragment is display-only and never enters the line sequence.
#[derive(Debug, Default)]
pub struct TranscriptState {
    lines: Vec<Line>,
    interim: String,
}

impl TranscriptState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a closed utterance, labeling it from the current role map.
    pub fn append(&mut self, utterance: &Utterance, roles: &RoleMap) {
        self.lines.push(Line {
            speaker: utterance.speaker,
            text: utterance.text.clone(),
            label: roles.label_for(utterance.speaker),
        });
    }

    /// Recomputes every line's label from its original speaker index.
    /// Never reorders, drops, or edits utterance text.
    pub fn relabel_all(&mut self, roles: &RoleMap) {
        for line in &mut self.lines {
            line.label = roles.label_for(line.speaker);
        }
    }

    pub fn set_interim(&mut self, text: &str) {
        self.interim = text.to_string();
    }

    pub fn clear_interim(&mut self) {
        self.interim.clear();
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Full transcript: one `"{label}: {text}\n"` per line, with the live
    /// interim fragment rendered last (and never persisted).
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.label);
            out.push_str(": ");
            out.push_str(&line.text);
            out.push('\n');
        }
        if !self.interim.is_empty() {
            out.push_str(&self.interim);
        }
        out
    }
}
