use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{Entity, EntityCategory};
use crate::services::ai::{LlmProvider, Message, SymptomExtractor};

const SYSTEM_PROMPT: &str = r#"You are a symptom intake engine for a doctor-booking assistant. Read the patient's description and list the medical symptoms and how long they have had them.

Return ONLY valid JSON (no markdown, no explanation) with this exact structure:
{
  "entities": [
    { "text": "Fever", "category": "symptom" },
    { "text": "2 Days", "category": "duration" }
  ]
}

Rules:
- "symptom": a complaint in title case, e.g. "Stomach Pain", "Headache"
- "duration": how long the symptoms have lasted, e.g. "3 Days", "1 Week"
- Do not diagnose and do not add symptoms the patient did not mention
- Return an empty list if the text describes no symptoms
"#;

#[derive(Debug, Deserialize)]
struct RawExtraction {
    #[serde(default)]
    entities: Vec<RawEntity>,
}

#[derive(Debug, Deserialize)]
struct RawEntity {
    text: String,
    #[serde(default)]
    category: String,
}

/// Symptom extraction backed by a chat model.
pub struct LlmSymptomExtractor {
    llm: Box<dyn LlmProvider>,
}

impl LlmSymptomExtractor {
    pub fn new(llm: Box<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl SymptomExtractor for LlmSymptomExtractor {
    async fn extract(&self, transcript: &str) -> anyhow::Result<Vec<Entity>> {
        let messages = [Message {
            role: "user".to_string(),
            content: transcript.to_string(),
        }];
        let response = self.llm.chat(SYSTEM_PROMPT, &messages).await?;
        Ok(parse_entities_response(&response))
    }
}

fn parse_entities_response(response: &str) -> Vec<Entity> {
    let Some(raw) = parse_raw(response) else {
        tracing::warn!("failed to parse LLM response as entity JSON, treating as no symptoms");
        return vec![];
    };

    raw.entities
        .into_iter()
        .filter(|e| !e.text.trim().is_empty())
        .enumerate()
        .map(|(i, e)| Entity {
            id: i as u32 + 1,
            text: e.text.trim().to_string(),
            category: match e.category.to_lowercase().as_str() {
                "duration" => EntityCategory::Duration,
                _ => EntityCategory::Symptom,
            },
        })
        .collect()
}

fn parse_raw(response: &str) -> Option<RawExtraction> {
    if let Ok(raw) = serde_json::from_str::<RawExtraction>(response) {
        return Some(raw);
    }

    // Strip markdown code fences
    let trimmed = response.trim();
    let cleaned = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned).trim();

    if let Ok(raw) = serde_json::from_str::<RawExtraction>(cleaned) {
        return Some(raw);
    }

    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str::<RawExtraction>(&cleaned[start..=end]).ok()
}
