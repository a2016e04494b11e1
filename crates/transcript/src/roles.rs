use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Utterance;

/// Semantic role of a conversation participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Vendedor,
    Cliente,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::Vendedor => "Vendedor",
            Role::Cliente => "Cliente",
        }
    }
}

/// Mapping from anonymous speaker indices to semantic roles.
///
/// Starts empty (every index renders as `Person N`); once a resolution
/// succeeds it is installed write-once for the session's lifetime.
#[derive(Debug, Clone, Default)]
pub struct RoleMap {
    roles: HashMap<u32, Role>,
}

impl RoleMap {
    pub fn insert(&mut self, speaker: u32, role: Role) {
        self.roles.insert(speaker, role);
    }

    pub fn get(&self, speaker: u32) -> Option<Role> {
        self.roles.get(&speaker).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Display label for a speaker index: the resolved role name, a generic
    /// `Person N` before resolution, or `Person ?` when the recognizer never
    /// attributed the utterance to anyone.
    pub fn label_for(&self, speaker: Option<u32>) -> String {
        match speaker {
            Some(index) => match self.roles.get(&index) {
                Some(role) => role.label().to_string(),
                None => format!("Person {}", index + 1),
            },
            None => "Person ?".to_string(),
        }
    }
}

/// Role-resolution lifecycle for one session: evidence collection, the
/// trigger predicate, the single in-flight guard, and the write-once result.
///
/// The actual classification round-trip lives in the services crate; this
/// struct only decides *when* to fire and what to do with the outcome.
#[derive(Debug)]
pub struct RoleResolution {
    evidence: Vec<Utterance>,
    speakers: HashSet<u32>,
    roles: RoleMap,
    in_flight: bool,
    resolved: bool,
    attempts: u32,
    max_attempts: u32,
}

impl RoleResolution {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            evidence: Vec::new(),
            speakers: HashSet::new(),
            roles: RoleMap::default(),
            in_flight: false,
            resolved: false,
            attempts: 0,
            max_attempts,
        }
    }

    /// Records a closed utterance as classification evidence. Utterances
    /// without speaker attribution carry no diarization signal and are
    /// skipped; nothing is collected after a successful resolution.
    pub fn observe(&mut self, utterance: &Utterance) {
        if self.resolved {
            return;
        }
        let Some(speaker) = utterance.speaker else {
            return;
        };
        self.speakers.insert(speaker);
        self.evidence.push(utterance.clone());
    }

    /// The trigger predicate, evaluated after every new closed utterance:
    /// at least two distinct speakers, at least three closed utterances, no
    /// request outstanding, no prior success, and attempts below the cap.
    pub fn should_fire(&self) -> bool {
        self.speakers.len() >= 2
            && self.evidence.len() >= 3
            && !self.in_flight
            && !self.resolved
            && self.attempts < self.max_attempts
    }

    /// Arms the in-flight guard and returns a snapshot of the evidence for
    /// the classification call. Callers must check [`should_fire`] first.
    ///
    /// [`should_fire`]: Self::should_fire
    pub fn begin(&mut self) -> Vec<Utterance> {
        self.in_flight = true;
        self.attempts += 1;
        self.evidence.clone()
    }

    /// Clears the in-flight guard after a failed attempt. The predicate may
    /// fire again on the next qualifying utterance, up to the attempt cap.
    pub fn fail(&mut self) {
        self.in_flight = false;
        debug!(attempts = self.attempts, "role resolution attempt failed");
    }

    /// Installs the role map write-once. Returns `false` (and changes
    /// nothing) if a resolution already succeeded.
    pub fn succeed(&mut self, roles: RoleMap) -> bool {
        self.in_flight = false;
        if self.resolved {
            return false;
        }
        self.roles = roles;
        self.resolved = true;
        true
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    pub fn role_map(&self) -> &RoleMap {
        &self.roles
    }
}
