use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;
use tracing::{info, warn};

use crate::cost::UsageTracker;
use crate::io::{number_lines, SourceDocument};
use crate::llm::{
    build_mapping_prompt, strip_code_fences, validate_mapping, GeminiClient,
    MappingValidationConfig, TokenUsage,
};
use crate::models::{Attachment, MappingResponse};
use crate::retry::retry;

/// The agenda-mapping oracle. Production uses the Gemini client; tests stub
/// this with fixture JSON so no live model is ever invoked.
#[async_trait]
pub trait MapAgendas: Send + Sync {
    /// Send one mapping prompt and return the raw response text plus usage
    async fn map_agendas(&self, prompt: &str) -> Result<(String, TokenUsage)>;
}

#[async_trait]
impl MapAgendas for GeminiClient {
    async fn map_agendas(&self, prompt: &str) -> Result<(String, TokenUsage)> {
        self.generate_json(prompt).await
    }
}

/// Mapping failure taxonomy. Only low-quality output is retryable; provider
/// failures propagate so the batch layer can isolate the meeting.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("mapping request failed: {0}")]
    Provider(anyhow::Error),
    #[error("mapping response is not valid JSON: {0}")]
    MalformedJson(serde_json::Error),
    #[error("mapping response failed validation: {}", errors.join("; "))]
    Inconsistent {
        errors: Vec<String>,
        response: Box<MappingResponse>,
    },
}

impl MapError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, MapError::Provider(_))
    }
}

/// Configuration for Stage 1
#[derive(Debug, Clone)]
pub struct Stage1Config {
    /// Total attempts per meeting (first try included)
    pub max_attempts: u32,
    /// Pause between attempts
    pub retry_backoff: Duration,
    /// Range-consistency checks applied to each parsed response
    pub validation: MappingValidationConfig,
}

impl Default for Stage1Config {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff: Duration::from_millis(500),
            validation: MappingValidationConfig::default(),
        }
    }
}

/// Crawler-embedded document links: `[title](https://...)`
static DOCUMENT_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\((https?://[^)]+)\)").unwrap());

/// Collect attachment hints from the transcript body. Crawled transcripts
/// carry reference documents as markdown links, mostly inside trailing
/// "(참고)" blocks; listing them in the prompt lets the model associate each
/// with the right agenda unit instead of rediscovering them.
pub fn collect_attachment_hints(doc: &SourceDocument) -> Vec<Attachment> {
    let mut hints: Vec<Attachment> = Vec::new();
    for line in &doc.body_lines {
        for caps in DOCUMENT_LINK.captures_iter(line) {
            let url = caps[2].trim();
            if hints.iter().any(|a| a.download_url == url) {
                continue;
            }
            hints.push(Attachment {
                title: caps[1].trim().to_string(),
                download_url: url.to_string(),
            });
        }
    }
    hints
}

/// Result of Stage 1 for one meeting
#[derive(Debug)]
pub struct MappingOutcome {
    pub response: MappingResponse,
    /// True when the accepted response still failed validation after the
    /// attempt budget was spent
    pub degraded: bool,
    pub attempts: u32,
}

/// Execute Stage 1: obtain a validated agenda mapping for one transcript.
///
/// Each attempt sends the numbered transcript to the oracle, strips any code
/// fences, parses and normalizes the JSON, then checks range consistency.
/// Malformed JSON and overlapping ranges are retried up to the budget; after
/// that, the last parseable response is accepted with a warning. A response
/// that never parsed, or a provider failure, fails the meeting.
pub async fn execute_stage1(
    client: &dyn MapAgendas,
    doc: &SourceDocument,
    attachments: &[Attachment],
    config: &Stage1Config,
    usage: &UsageTracker,
) -> Result<MappingOutcome, MapError> {
    let numbered = number_lines(&doc.body_lines);
    let prompt = build_mapping_prompt(&doc.title, &doc.source_url, &numbered, attachments);
    let prompt = prompt.as_str();

    let result = retry(
        config.max_attempts,
        config.retry_backoff,
        MapError::is_retryable,
        |attempt| async move {
            let (raw, tokens) = client
                .map_agendas(prompt)
                .await
                .map_err(MapError::Provider)?;
            usage.add_generation(tokens);

            let cleaned = strip_code_fences(&raw);
            let mut response: MappingResponse =
                serde_json::from_str(cleaned).map_err(MapError::MalformedJson)?;
            response.normalize();

            let validation = validate_mapping(&response.agenda_mapping, &config.validation);
            if !validation.is_valid {
                return Err(MapError::Inconsistent {
                    errors: validation.errors,
                    response: Box::new(response),
                });
            }

            info!(
                "Mapping accepted on attempt {}: {} agenda units",
                attempt,
                response.agenda_mapping.len()
            );
            Ok(MappingOutcome {
                response,
                degraded: false,
                attempts: attempt,
            })
        },
    )
    .await;

    match result {
        Ok(outcome) => Ok(outcome),
        Err(MapError::Inconsistent { errors, response }) => {
            // Retry budget spent on a parseable but inconsistent mapping:
            // accepting degraded output is the policy, not a defect.
            warn!(
                "Accepting mapping with unresolved validation errors: {}",
                errors.join("; ")
            );
            Ok(MappingOutcome {
                response: *response,
                degraded: true,
                attempts: config.max_attempts,
            })
        }
        Err(err) => Err(err),
    }
}
