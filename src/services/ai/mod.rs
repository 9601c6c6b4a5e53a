pub mod ollama;
pub mod symptoms;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::Entity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String>;
}

/// Turns a free-text symptom description into reviewable entities.
#[async_trait]
pub trait SymptomExtractor: Send + Sync {
    async fn extract(&self, transcript: &str) -> anyhow::Result<Vec<Entity>>;
}

/// The fixed intake result the demo shows for every description.
pub struct DemoExtractor;

pub fn demo_entities() -> Vec<Entity> {
    vec![
        Entity::symptom(1, "Fever"),
        Entity::symptom(2, "Stomach Pain"),
        Entity::duration(3, "2 Days"),
    ]
}

#[async_trait]
impl SymptomExtractor for DemoExtractor {
    async fn extract(&self, _transcript: &str) -> anyhow::Result<Vec<Entity>> {
        Ok(demo_entities())
    }
}
