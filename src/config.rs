use std::env;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExtractorKind {
    /// Fixed demo extraction.
    Demo,
    Ollama,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub symptom_extractor: ExtractorKind,
    pub ollama_url: String,
    pub ollama_model: String,
    /// Skip the simulated backend delays entirely.
    pub instant_delays: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "arogya.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            symptom_extractor: match env::var("SYMPTOM_EXTRACTOR").as_deref() {
                Ok("ollama") => ExtractorKind::Ollama,
                _ => ExtractorKind::Demo,
            },
            ollama_url: env::var("OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            ollama_model: env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string()),
            instant_delays: env::var("SIMULATED_DELAYS")
                .map(|v| v.eq_ignore_ascii_case("instant"))
                .unwrap_or(false),
        }
    }
}
