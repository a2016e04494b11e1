use casavoz_api::{build_router, state::AppState};
use casavoz_config::Settings;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// A running test server on an ephemeral port.
pub struct TestApp {
    pub addr: SocketAddr,
    pub base_url: String,
    pub settings: Settings,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Spawn a test server with offline settings: no Deepgram or OpenAI
    /// keys, so sessions run in degraded mode and property search uses the
    /// criteria fallback.
    pub async fn spawn() -> Self {
        Self::spawn_with_settings(|_| {}).await
    }

    /// Spawn a test server with customized settings.
    ///
    /// The `mutator` closure receives a `&mut Settings` after the offline
    /// defaults are applied.
    pub async fn spawn_with_settings(mutator: impl FnOnce(&mut Settings)) -> Self {
        let mut settings = test_settings();
        mutator(&mut settings);

        let app_state = AppState::new(settings.clone()).expect("Failed to create AppState");
        let app = build_router(app_state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let base_url = format!("http://{}", addr);
        let client = reqwest::Client::new();

        Self {
            addr,
            base_url,
            settings,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

fn test_settings() -> Settings {
    let catalog_path = format!(
        "{}/../../data/properties.json",
        env!("CARGO_MANIFEST_DIR")
    );
    Settings {
        app: casavoz_config::AppSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec![],
        },
        deepgram: casavoz_config::DeepgramSettings {
            api_key: None,
            url: "wss://api.deepgram.com/v1/listen".to_string(),
            model: "nova-2".to_string(),
            language: "es".to_string(),
            sample_rate: 16000,
            channels: 1,
            utterance_end_ms: 1000,
            endpointing_ms: 300,
            keepalive_secs: 3,
        },
        openai: casavoz_config::OpenAiSettings {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            search_max_tokens: 1500,
        },
        roles: casavoz_config::RolesSettings {
            max_tokens: 150,
            max_attempts: 5,
        },
        properties: casavoz_config::PropertiesSettings { catalog_path },
    }
}
