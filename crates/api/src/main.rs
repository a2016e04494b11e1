use casavoz_api::{build_router, state::AppState};
use casavoz_config::Settings;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (silently ignore if missing)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "casavoz_api=debug,casavoz_services=debug,casavoz_transcript=debug,tower_http=debug"
                .into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load config
    let settings = Settings::load()?;
    info!("Starting casavoz API on {}:{}", settings.app.host, settings.app.port);
    info!(
        deepgram = settings.deepgram.api_key.is_some(),
        openai = settings.openai.api_key.is_some(),
        "collaborator configuration"
    );

    // Build app state (loads the property catalog)
    let app_state = AppState::new(settings.clone())?;

    // Build router
    let app = build_router(app_state);

    // Start server
    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
