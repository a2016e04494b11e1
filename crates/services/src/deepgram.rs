use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use casavoz_config::DeepgramSettings;
use casavoz_transcript::{RecognitionEvent, RecognitionResult};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde::de::Deserializer;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

/// Connection lifecycle of the upstream recognition stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Disconnected,
    Connecting,
    Ready,
    Closing,
}

struct StateCell(AtomicU8);

impl StateCell {
    fn new(state: AdapterState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    fn get(&self) -> AdapterState {
        match self.0.load(Ordering::SeqCst) {
            1 => AdapterState::Connecting,
            2 => AdapterState::Ready,
            3 => AdapterState::Closing,
            _ => AdapterState::Disconnected,
        }
    }

    fn set(&self, state: AdapterState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

enum WriterCmd {
    Audio(Vec<u8>),
    Close,
}

/// Owns one outbound streaming connection to the Deepgram live API and
/// normalizes its messages into [`RecognitionEvent`]s.
///
/// Audio goes out through a bounded channel to a writer task that also runs
/// the keep-alive ticker; inbound messages are parsed by a reader task and
/// forwarded to the session's event queue. Frames sent while the adapter is
/// not Ready are dropped, never queued.
pub struct RecognitionAdapter {
    state: Arc<StateCell>,
    writer_tx: mpsc::Sender<WriterCmd>,
}

impl RecognitionAdapter {
    /// Establishes the upstream connection with diarization and interim
    /// results enabled, then spawns the reader and writer tasks.
    pub async fn connect(
        settings: &DeepgramSettings,
        event_tx: mpsc::Sender<RecognitionEvent>,
    ) -> Result<Self> {
        let api_key = settings
            .api_key
            .as_deref()
            .context("Deepgram API key not configured")?;

        let url = format!(
            "{}?model={}&language={}&smart_format=true&punctuate=true&diarize=true\
             &interim_results=true&utterance_end_ms={}&endpointing={}\
             &sample_rate={}&encoding=linear16&channels={}",
            settings.url,
            settings.model,
            settings.language,
            settings.utterance_end_ms,
            settings.endpointing_ms,
            settings.sample_rate,
            settings.channels,
        );

        let state = Arc::new(StateCell::new(AdapterState::Connecting));

        let mut request = url.into_client_request()?;
        request.headers_mut().insert(
            "Authorization",
            format!("Token {}", api_key)
                .parse()
                .context("invalid API key header")?,
        );

        let (stream, _response) = connect_async(request)
            .await
            .context("Deepgram connection failed")?;
        let (sink, source) = stream.split();

        state.set(AdapterState::Ready);
        info!(model = %settings.model, language = %settings.language, "recognition stream ready");
        let _ = event_tx.send(RecognitionEvent::Opened).await;

        let (writer_tx, writer_rx) = mpsc::channel::<WriterCmd>(64);

        tokio::spawn(Self::writer_loop(
            sink,
            writer_rx,
            Arc::clone(&state),
            Duration::from_secs(settings.keepalive_secs),
        ));
        tokio::spawn(Self::reader_loop(source, event_tx, Arc::clone(&state)));

        Ok(Self { state, writer_tx })
    }

    pub fn state(&self) -> AdapterState {
        self.state.get()
    }

    /// Forwards an audio frame upstream. A no-op (logged) unless Ready;
    /// frames the writer cannot keep up with are dropped, not queued.
    pub fn send(&self, frame: &[u8]) {
        if self.state.get() != AdapterState::Ready {
            debug!("adapter not ready, audio frame dropped");
            return;
        }
        if self.writer_tx.try_send(WriterCmd::Audio(frame.to_vec())).is_err() {
            warn!("writer backlogged, audio frame dropped");
        }
    }

    /// Requests a graceful shutdown of the upstream connection. Idempotent.
    pub async fn close(&self) {
        if matches!(
            self.state.get(),
            AdapterState::Closing | AdapterState::Disconnected
        ) {
            return;
        }
        self.state.set(AdapterState::Closing);
        let _ = self.writer_tx.send(WriterCmd::Close).await;
    }

    /// Writer task: forwards audio frames and, while Ready, sends a
    /// keep-alive every tick (the upstream idle timeout is 10s). The ticker
    /// dies with this task on any exit from Ready.
    async fn writer_loop<S>(
        mut sink: S,
        mut writer_rx: mpsc::Receiver<WriterCmd>,
        state: Arc<StateCell>,
        keepalive: Duration,
    ) where
        S: futures::Sink<Message> + Unpin,
    {
        let mut ticker = tokio::time::interval(keepalive);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                cmd = writer_rx.recv() => match cmd {
                    Some(WriterCmd::Audio(frame)) => {
                        if sink.send(Message::binary(frame)).await.is_err() {
                            warn!("upstream write failed, stopping writer");
                            break;
                        }
                    }
                    Some(WriterCmd::Close) | None => {
                        let _ = sink.send(Message::text(r#"{"type":"CloseStream"}"#)).await;
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                },
                _ = ticker.tick() => {
                    if state.get() != AdapterState::Ready {
                        continue;
                    }
                    if sink.send(Message::text(r#"{"type":"KeepAlive"}"#)).await.is_err() {
                        warn!("keep-alive failed, stopping writer");
                        break;
                    }
                }
            }
        }

        state.set(AdapterState::Disconnected);
        debug!("adapter writer stopped");
    }

    /// Reader task: parses upstream messages into normalized events.
    async fn reader_loop<S, E>(
        mut source: S,
        event_tx: mpsc::Sender<RecognitionEvent>,
        state: Arc<StateCell>,
    ) where
        S: futures::Stream<Item = Result<Message, E>> + Unpin,
        E: std::fmt::Display,
    {
        while let Some(msg) = source.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let Some(event) = parse_message(&text) else {
                        debug!("unrecognized upstream message skipped");
                        continue;
                    };
                    if event_tx.send(event).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(%e, "upstream stream error");
                    state.set(AdapterState::Closing);
                    let _ = event_tx.send(RecognitionEvent::Error(e.to_string())).await;
                    break;
                }
            }
        }

        state.set(AdapterState::Disconnected);
        let _ = event_tx.send(RecognitionEvent::Closed).await;
        debug!("adapter reader stopped");
    }
}

// --- Upstream wire format ---

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum UpstreamMessage {
    Results(ResultsPayload),
    UtteranceEnd {},
    SpeechStarted {},
    Metadata {},
}

#[derive(Debug, Deserialize)]
struct ResultsPayload {
    channel: Channel,
    #[serde(default)]
    is_final: bool,
    #[serde(default)]
    speech_final: bool,
}

#[derive(Debug, Deserialize)]
struct Channel {
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    words: Vec<Word>,
}

#[derive(Debug, Deserialize)]
struct Word {
    #[serde(default, deserialize_with = "speaker_index")]
    speaker: Option<u32>,
}

/// The upstream sends speaker indices sometimes as numbers, sometimes as
/// strings. Normalize to `u32` here; nothing past this boundary sees the
/// loose token.
fn speaker_index<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Token {
        Num(u32),
        Str(String),
    }

    Ok(match Option::<Token>::deserialize(deserializer)? {
        Some(Token::Num(n)) => Some(n),
        Some(Token::Str(s)) => s.trim().parse().ok(),
        None => None,
    })
}

fn parse_message(text: &str) -> Option<RecognitionEvent> {
    let message: UpstreamMessage = serde_json::from_str(text).ok()?;
    Some(match message {
        UpstreamMessage::Results(payload) => {
            let alternative = payload.channel.alternatives.into_iter().next()?;
            RecognitionEvent::Result(RecognitionResult {
                text: alternative.transcript,
                word_speakers: alternative
                    .words
                    .iter()
                    .filter_map(|w| w.speaker)
                    .collect(),
                is_final: payload.is_final,
                speech_final: payload.speech_final,
            })
        }
        UpstreamMessage::UtteranceEnd {} => RecognitionEvent::TurnEnd,
        UpstreamMessage::SpeechStarted {} => RecognitionEvent::SpeechStarted,
        UpstreamMessage::Metadata {} => RecognitionEvent::Metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_results_with_numeric_speakers() {
        let text = r#"{
            "type": "Results",
            "is_final": true,
            "speech_final": false,
            "channel": {
                "alternatives": [{
                    "transcript": "hola buenas",
                    "words": [
                        {"word": "hola", "speaker": 0},
                        {"word": "buenas", "speaker": 1}
                    ]
                }]
            }
        }"#;

        let Some(RecognitionEvent::Result(result)) = parse_message(text) else {
            panic!("expected a Result event");
        };
        assert_eq!(result.text, "hola buenas");
        assert_eq!(result.word_speakers, vec![0, 1]);
        assert!(result.is_final);
        assert!(!result.speech_final);
    }

    #[test]
    fn normalizes_string_speaker_tokens() {
        let text = r#"{
            "type": "Results",
            "is_final": true,
            "channel": {
                "alternatives": [{
                    "transcript": "hola",
                    "words": [{"word": "hola", "speaker": "1"}]
                }]
            }
        }"#;

        let Some(RecognitionEvent::Result(result)) = parse_message(text) else {
            panic!("expected a Result event");
        };
        assert_eq!(result.word_speakers, vec![1]);
    }

    #[test]
    fn words_without_speakers_are_skipped() {
        let text = r#"{
            "type": "Results",
            "is_final": false,
            "channel": {
                "alternatives": [{
                    "transcript": "me inte",
                    "words": [{"word": "me"}, {"word": "inte"}]
                }]
            }
        }"#;

        let Some(RecognitionEvent::Result(result)) = parse_message(text) else {
            panic!("expected a Result event");
        };
        assert!(result.word_speakers.is_empty());
        assert!(!result.is_final);
    }

    #[test]
    fn parses_control_messages() {
        assert!(matches!(
            parse_message(r#"{"type":"UtteranceEnd","last_word_end":2.1}"#),
            Some(RecognitionEvent::TurnEnd)
        ));
        assert!(matches!(
            parse_message(r#"{"type":"SpeechStarted","timestamp":0.5}"#),
            Some(RecognitionEvent::SpeechStarted)
        ));
        assert!(matches!(
            parse_message(r#"{"type":"Metadata","request_id":"abc"}"#),
            Some(RecognitionEvent::Metadata)
        ));
    }

    #[test]
    fn unknown_messages_are_skipped() {
        assert!(parse_message(r#"{"type":"Warning","detail":"x"}"#).is_none());
        assert!(parse_message("not json").is_none());
    }
}
