use std::sync::{Arc, Mutex};

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use arogya::config::{AppConfig, ExtractorKind};
use arogya::db;
use arogya::handlers;
use arogya::services::ai::ollama::OllamaProvider;
use arogya::services::ai::symptoms::LlmSymptomExtractor;
use arogya::services::ai::{DemoExtractor, SymptomExtractor};
use arogya::services::auth::AuthService;
use arogya::services::backend::{SimulatedBackend, SimulatedDelays};
use arogya::services::controller::SessionController;
use arogya::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    let db = Arc::new(Mutex::new(conn));

    let extractor: Box<dyn SymptomExtractor> = match config.symptom_extractor {
        ExtractorKind::Ollama => {
            tracing::info!(
                "using Ollama symptom extraction (url: {}, model: {})",
                config.ollama_url,
                config.ollama_model
            );
            Box::new(LlmSymptomExtractor::new(Box::new(OllamaProvider::new(
                config.ollama_url.clone(),
                config.ollama_model.clone(),
            ))))
        }
        ExtractorKind::Demo => {
            tracing::info!("using demo symptom extraction");
            Box::new(DemoExtractor)
        }
    };

    let delays = if config.instant_delays {
        tracing::warn!("simulated backend delays disabled");
        SimulatedDelays::instant()
    } else {
        SimulatedDelays::default()
    };
    let backend = Arc::new(SimulatedBackend::with_extractor(delays, extractor));

    let state = Arc::new(AppState {
        db: Arc::clone(&db),
        config: config.clone(),
        sessions: SessionController::new(backend.clone(), db),
        auth: AuthService::new(backend),
    });

    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
