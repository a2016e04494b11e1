use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub deepgram: DeepgramSettings,
    pub openai: OpenAiSettings,
    pub roles: RolesSettings,
    pub properties: PropertiesSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeepgramSettings {
    pub api_key: Option<String>,
    pub url: String,
    pub model: String,
    pub language: String,
    pub sample_rate: u32,
    pub channels: u16,
    /// Explicit turn-end silence window, milliseconds.
    pub utterance_end_ms: u32,
    pub endpointing_ms: u32,
    /// Keep-alive period while Ready. Upstream idle timeout is 10s.
    pub keepalive_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenAiSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub search_max_tokens: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RolesSettings {
    pub max_tokens: u32,
    /// Upper bound on classification attempts per session.
    pub max_attempts: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PropertiesSettings {
    pub catalog_path: String,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("CASAVOZ"),
            )
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 3001)?
            .set_default("app.cors_origins", Vec::<String>::new())?
            .set_default("deepgram.api_key", None::<String>)?
            .set_default("deepgram.url", "wss://api.deepgram.com/v1/listen")?
            .set_default("deepgram.model", "nova-2")?
            .set_default("deepgram.language", "es")?
            .set_default("deepgram.sample_rate", 16000)?
            .set_default("deepgram.channels", 1)?
            .set_default("deepgram.utterance_end_ms", 1000)?
            .set_default("deepgram.endpointing_ms", 300)?
            .set_default("deepgram.keepalive_secs", 3)?
            .set_default("openai.api_key", None::<String>)?
            .set_default("openai.model", "gpt-4o-mini")?
            .set_default("openai.search_max_tokens", 1500)?
            .set_default("roles.max_tokens", 150)?
            .set_default("roles.max_attempts", 5)?
            .set_default("properties.catalog_path", "data/properties.json")?
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::load().expect("Failed to load default settings")
    }
}
