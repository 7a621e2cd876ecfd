//! Named entity extraction from patient messages.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client::LanguageModel;
use crate::prompts::make_entity_prompt;

/// Extraction errors.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid response format: {0}")]
    InvalidFormat(String),

    #[error("LLM inference error: {0}")]
    Inference(String),
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Label for medication entities.
pub const DRUG_LABEL: &str = "DRUG";

/// A labelled span of a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entity {
    pub label: String,
    pub text: String,
}

impl Entity {
    pub fn new(label: &str, text: &str) -> Self {
        Self {
            label: label.to_string(),
            text: text.to_string(),
        }
    }
}

/// Label → text. One value per label; later entities win.
pub type EntityMap = BTreeMap<String, String>;

pub fn to_entity_map(entities: &[Entity]) -> EntityMap {
    entities
        .iter()
        .map(|e| (e.label.clone(), e.text.clone()))
        .collect()
}

/// Texts of all drug entities, in message order.
pub fn medication_mentions(entities: &[Entity]) -> Vec<String> {
    entities
        .iter()
        .filter(|e| e.label == DRUG_LABEL)
        .map(|e| e.text.clone())
        .collect()
}

/// Something that can pull entities out of a message.
pub trait EntityExtractor: Send + Sync {
    fn extract(&self, text: &str) -> impl Future<Output = ExtractionResult<Vec<Entity>>> + Send;
}

/// Shape the model is asked to answer in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityOutput {
    pub entities: Vec<Entity>,
}

/// Parse the outermost JSON object in a model reply.
pub fn parse_entity_output(json: &str) -> ExtractionResult<EntityOutput> {
    // Models sometimes wrap the object in prose
    let json_start = json.find('{').ok_or_else(|| {
        ExtractionError::InvalidFormat("No JSON object found in response".into())
    })?;
    let json_end = json.rfind('}').ok_or_else(|| {
        ExtractionError::InvalidFormat("No closing brace found in response".into())
    })?;
    if json_end < json_start {
        return Err(ExtractionError::InvalidFormat(
            "Closing brace precedes opening brace".into(),
        ));
    }

    let json_slice = &json[json_start..=json_end];
    let output: EntityOutput = serde_json::from_str(json_slice)?;

    Ok(output)
}

/// Extraction through the language model.
pub struct LlmEntityExtractor<L> {
    model: Arc<L>,
}

impl<L> LlmEntityExtractor<L> {
    pub fn new(model: Arc<L>) -> Self {
        Self { model }
    }
}

impl<L: LanguageModel> EntityExtractor for LlmEntityExtractor<L> {
    async fn extract(&self, text: &str) -> ExtractionResult<Vec<Entity>> {
        let reply = self
            .model
            .complete(&make_entity_prompt(text))
            .await
            .map_err(|e| ExtractionError::Inference(e.to_string()))?;
        Ok(parse_entity_output(&reply)?.entities)
    }
}

/// Offline lexicon matcher.
///
/// Recognises common drugs (brand names map to the generic), symptoms, day
/// words and clock times.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordEntityExtractor;

impl KeywordEntityExtractor {
    const DRUGS: &'static [(&'static str, Option<&'static str>)] = &[
        ("acetaminophen", None),
        ("paracetamol", Some("acetaminophen")),
        ("tylenol", Some("acetaminophen")),
        ("ibuprofen", None),
        ("advil", Some("ibuprofen")),
        ("motrin", Some("ibuprofen")),
        ("aspirin", None),
        ("metformin", None),
        ("glucophage", Some("metformin")),
        ("insulin", None),
        ("lisinopril", None),
        ("amlodipine", None),
        ("atorvastatin", None),
        ("lipitor", Some("atorvastatin")),
        ("levothyroxine", None),
        ("synthroid", Some("levothyroxine")),
        ("omeprazole", None),
        ("prilosec", Some("omeprazole")),
        ("amoxicillin", None),
        ("prednisone", None),
        ("warfarin", None),
        ("sertraline", None),
        ("zoloft", Some("sertraline")),
        ("albuterol", None),
    ];

    const SYMPTOMS: &'static [&'static str] = &[
        "headache", "nausea", "dizziness", "dizzy", "fever", "cough", "fatigue", "rash",
        "pain", "vomiting", "insomnia", "swelling",
    ];

    const DAYS: &'static [&'static str] = &[
        "today", "tomorrow", "yesterday", "monday", "tuesday", "wednesday", "thursday",
        "friday", "saturday", "sunday",
    ];

    /// Extract entities using simple word matching, in message order.
    pub fn extract_sync(&self, text: &str) -> Vec<Entity> {
        let mut found: Vec<(usize, Entity)> = Vec::new();

        for m in time_regex().find_iter(text) {
            found.push((m.start(), Entity::new("TIME", m.as_str())));
        }

        for m in word_regex().find_iter(text) {
            let word = m.as_str();
            let lower = word.to_lowercase();

            if let Some((name, canonical)) = Self::DRUGS.iter().find(|(name, _)| *name == lower) {
                found.push((m.start(), Entity::new(DRUG_LABEL, canonical.unwrap_or(name))));
            } else if Self::SYMPTOMS.contains(&lower.as_str()) {
                found.push((m.start(), Entity::new("SYMPTOM", &lower)));
            } else if Self::DAYS.contains(&lower.as_str()) {
                found.push((m.start(), Entity::new("DATE", word)));
            }
        }

        found.sort_by_key(|(start, _)| *start);
        found.into_iter().map(|(_, entity)| entity).collect()
    }
}

impl EntityExtractor for KeywordEntityExtractor {
    async fn extract(&self, text: &str) -> ExtractionResult<Vec<Entity>> {
        Ok(self.extract_sync(text))
    }
}

fn word_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z]+").expect("word pattern is valid"))
}

fn time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b\d{1,2}(?::\d{2})?\s?[ap]m\b").expect("time pattern is valid"))
}

/// Which extractor the deployment runs.
pub enum ConfiguredExtractor<L> {
    Keyword(KeywordEntityExtractor),
    Llm(LlmEntityExtractor<L>),
}

impl<L: LanguageModel> EntityExtractor for ConfiguredExtractor<L> {
    async fn extract(&self, text: &str) -> ExtractionResult<Vec<Entity>> {
        match self {
            ConfiguredExtractor::Keyword(extractor) => extractor.extract(text).await,
            ConfiguredExtractor::Llm(extractor) => extractor.extract(text).await,
        }
    }
}
