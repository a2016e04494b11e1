use casavoz_transcript::{
    RecognitionEvent, RecognitionResult, RoleMap, RoleResolution, TranscriptState,
    UtteranceAggregator,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::handler::{WsSender, send_json};
use crate::state::AppState;

/// Everything the per-session loop reacts to, in one ordered queue.
/// Spawned tasks (classification, property search) re-enter through it
/// instead of mutating session state concurrently.
#[derive(Debug)]
pub enum SessionEvent {
    Recognition(RecognitionEvent),
    Command(ClientCommand),
    RolesResolved(RoleMap),
    RolesFailed,
    Shutdown,
}

/// Text messages accepted from the browser client.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    Ping,
    SearchProperties {
        #[serde(default)]
        transcript: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

/// Per-connection transcript pipeline: fragment aggregation, role
/// resolution, and the outbound transcript/recommendation pushes.
pub struct Session {
    client_id: u64,
    state: AppState,
    sender: WsSender,
    event_tx: mpsc::Sender<SessionEvent>,
    transcript: TranscriptState,
    aggregator: UtteranceAggregator,
    resolution: RoleResolution,
}

impl Session {
    pub fn new(
        client_id: u64,
        state: AppState,
        sender: WsSender,
        event_tx: mpsc::Sender<SessionEvent>,
    ) -> Self {
        let max_attempts = state.settings.roles.max_attempts;
        Self {
            client_id,
            state,
            sender,
            event_tx,
            transcript: TranscriptState::new(),
            aggregator: UtteranceAggregator::new(),
            resolution: RoleResolution::new(max_attempts),
        }
    }

    pub async fn run(mut self, mut events: mpsc::Receiver<SessionEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::Recognition(event) => self.on_recognition(event).await,
                SessionEvent::Command(command) => self.on_command(command).await,
                SessionEvent::RolesResolved(roles) => self.on_roles_resolved(roles).await,
                SessionEvent::RolesFailed => self.resolution.fail(),
                SessionEvent::Shutdown => {
                    // commit whatever the aggregator still holds so the
                    // final transcript state is complete
                    self.close_turn();
                    break;
                }
            }
        }
        debug!(client_id = self.client_id, "session loop finished");
    }

    async fn on_recognition(&mut self, event: RecognitionEvent) {
        match event {
            RecognitionEvent::Opened => {
                info!(client_id = self.client_id, "recognition stream ready");
            }
            RecognitionEvent::Result(result) => self.on_result(result).await,
            RecognitionEvent::TurnEnd => {
                if self.aggregator.has_pending() {
                    self.close_turn();
                    self.push_transcript("", true, None, None).await;
                }
            }
            RecognitionEvent::SpeechStarted => {}
            RecognitionEvent::Error(detail) => {
                warn!(client_id = self.client_id, detail, "recognition error");
                send_json(
                    &self.sender,
                    &json!({ "type": "error", "message": detail }),
                )
                .await;
            }
            RecognitionEvent::Closed => {
                info!(client_id = self.client_id, "recognition stream closed");
            }
            RecognitionEvent::Metadata => {}
        }
    }

    async fn on_result(&mut self, result: RecognitionResult) {
        if result.text.trim().is_empty() {
            return;
        }

        let dominant = if result.is_final {
            let dominant = self
                .aggregator
                .push_final(&result.text, &result.word_speakers);
            self.transcript.clear_interim();
            dominant
        } else {
            self.transcript.set_interim(&result.text);
            None
        };

        // speech_final closes the turn before the push so fullTranscript
        // already contains the finished line
        if result.speech_final && self.aggregator.has_pending() {
            self.close_turn();
        }

        self.push_transcript(
            &result.text,
            result.is_final,
            Some(result.speech_final),
            reported_speaker(result.is_final, dominant),
        )
        .await;
    }

    /// Commits the current turn buffer: appends to the transcript under the
    /// current labels, records classification evidence, and fires a
    /// resolution attempt if the trigger predicate holds.
    fn close_turn(&mut self) {
        let Some(utterance) = self.aggregator.close_turn() else {
            return;
        };
        self.transcript.append(&utterance, self.resolution.role_map());
        self.resolution.observe(&utterance);
        self.maybe_resolve();
    }

    fn maybe_resolve(&mut self) {
        if !self.resolution.should_fire() {
            return;
        }
        let evidence = self.resolution.begin();
        info!(
            client_id = self.client_id,
            utterances = evidence.len(),
            "requesting speaker role classification"
        );

        let classifier = self.state.classifier.clone();
        let event_tx = self.event_tx.clone();
        let client_id = self.client_id;
        tokio::spawn(async move {
            let outcome = match classifier.classify(&evidence).await {
                Ok(roles) => SessionEvent::RolesResolved(roles),
                Err(e) => {
                    warn!(client_id, %e, "role classification failed");
                    SessionEvent::RolesFailed
                }
            };
            let _ = event_tx.send(outcome).await;
        });
    }

    async fn on_roles_resolved(&mut self, roles: RoleMap) {
        if !self.resolution.succeed(roles) {
            return;
        }
        info!(client_id = self.client_id, "speaker roles resolved");
        self.transcript.relabel_all(self.resolution.role_map());

        // empty-text final push: the payload carries only the relabeled
        // fullTranscript, which the client re-renders wholesale
        self.push_transcript("", true, None, None).await;
    }

    async fn on_command(&mut self, command: ClientCommand) {
        match command {
            ClientCommand::Ping => {
                send_json(&self.sender, &json!({ "type": "pong" })).await;
            }
            ClientCommand::SearchProperties { transcript } => {
                let query = transcript.unwrap_or_else(|| self.transcript.render());
                info!(
                    client_id = self.client_id,
                    query_len = query.len(),
                    "property search requested"
                );

                // searching can take seconds against the AI backend; keep
                // the event loop free while it runs
                let listings = self.state.listings.clone();
                let sender = self.sender.clone();
                tokio::spawn(async move {
                    let recommendations = listings.search(&query).await;
                    send_json(
                        &sender,
                        &json!({
                            "type": "recommendations",
                            "properties": recommendations,
                        }),
                    )
                    .await;
                });
            }
            ClientCommand::Unknown => {
                debug!(client_id = self.client_id, "unknown client command ignored");
            }
        }
    }

    async fn push_transcript(
        &self,
        text: &str,
        is_final: bool,
        speech_final: Option<bool>,
        speaker: Option<u32>,
    ) {
        send_json(
            &self.sender,
            &json!({
                "type": "transcript",
                "text": text,
                "is_final": is_final,
                "speech_final": speech_final,
                "speaker": speaker,
                "fullTranscript": self.transcript.render(),
            }),
        )
        .await;
    }
}

/// Speaker index carried on a transcript push. Interim diarization
/// flickers; attribution is only surfaced once the fragment is final.
fn reported_speaker(is_final: bool, dominant: Option<u32>) -> Option<u32> {
    if is_final { dominant } else { None }
}
