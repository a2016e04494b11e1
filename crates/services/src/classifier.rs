use casavoz_transcript::{Role, RoleMap, Utterance};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const SYSTEM_PROMPT: &str = "Analiza esta conversación de venta inmobiliaria y determina quién es el \
VENDEDOR y quién es el CLIENTE.\n\
El vendedor: saluda, ofrece, presenta opciones. El cliente: expresa necesidades, \
pregunta, menciona presupuesto.\n\
Responde SOLO en JSON: {\"speaker_0\": \"vendedor\" o \"cliente\", \
\"speaker_1\": \"vendedor\" o \"cliente\", \"confianza\": \"alta/media/baja\"}";

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("OpenAI API key not configured")]
    Unavailable,
    #[error("classification request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed classification response: {0}")]
    MalformedResponse(String),
}

/// Classifies anonymous speaker indices into vendedor/cliente roles from the
/// ordered list of closed utterances.
#[derive(Debug, Clone)]
pub struct RoleClassifier {
    client: Client,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// The strict response schema: one role per canonical index plus a
/// confidence level. Anything else is treated as failure.
#[derive(Debug, Deserialize)]
struct RoleAssignment {
    speaker_0: Role,
    speaker_1: Role,
    #[serde(default)]
    #[allow(dead_code)]
    confianza: Option<String>,
}

impl RoleClassifier {
    pub fn new(api_key: Option<String>, model: String, max_tokens: u32) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            max_tokens,
        }
    }

    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    /// One classification round-trip. Low temperature, strict schema; the
    /// caller decides whether a failure re-arms the trigger.
    pub async fn classify(&self, utterances: &[Utterance]) -> Result<RoleMap, ClassifierError> {
        let api_key = self.api_key.as_ref().ok_or(ClassifierError::Unavailable)?;

        let conversation: Vec<String> = utterances
            .iter()
            .filter_map(|u| u.speaker.map(|s| format!("Speaker {}: {}", s, u.text)))
            .collect();

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: conversation.join("\n"),
                },
            ],
            temperature: 0.2,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<ChatResponse>()
            .await?;

        let content = response
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| ClassifierError::MalformedResponse("empty choices".to_string()))?;

        debug!(content, "role classification response");
        parse_assignment(content)
    }
}

/// Parses the model's reply into a role map. The reply is expected to be
/// bare JSON but is tolerated inside markdown fences. Both canonical
/// indices must be present and mapped to distinct roles.
fn parse_assignment(content: &str) -> Result<RoleMap, ClassifierError> {
    let cleaned = content
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string();

    let assignment: RoleAssignment = serde_json::from_str(&cleaned)
        .map_err(|e| ClassifierError::MalformedResponse(e.to_string()))?;

    if assignment.speaker_0 == assignment.speaker_1 {
        return Err(ClassifierError::MalformedResponse(
            "both speakers assigned the same role".to_string(),
        ));
    }

    let mut roles = RoleMap::default();
    roles.insert(0, assignment.speaker_0);
    roles.insert(1, assignment.speaker_1);
    Ok(roles)
}
