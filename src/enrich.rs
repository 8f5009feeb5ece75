use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::cost::UsageTracker;
use crate::llm::{build_summary_prompt, strip_code_fences, GeminiClient};
use crate::store::AgendaStore;

/// Outcome of one enrichment run
#[derive(Debug, Default)]
pub struct EnrichReport {
    pub updated: usize,
    pub failed: Vec<(String, String)>,
}

/// Model output for one summary request
#[derive(Debug, Deserialize)]
pub struct SummaryResponse {
    pub summary: String,
    #[serde(default)]
    pub key_issues: Vec<String>,
}

pub fn parse_summary_response(raw: &str) -> Result<SummaryResponse> {
    serde_json::from_str(strip_code_fences(raw)).context("Summary response is not valid JSON")
}

/// Backfill AI summaries for agendas ingested without one. Runs after
/// ingestion so a summary failure never blocks transcript availability;
/// failures are recorded per agenda and the pass continues.
pub async fn enrich_summaries(
    client: &GeminiClient,
    store: &AgendaStore,
    usage: &UsageTracker,
    limit: u32,
) -> Result<EnrichReport> {
    let pending = store.missing_summaries(limit).await?;
    info!("Enriching {} agendas without summaries", pending.len());

    let mut report = EnrichReport::default();
    for record in pending {
        let prompt = build_summary_prompt(&record.agenda_title, &record.combined_text);
        let result = async {
            let (raw, tokens) = client.generate_json(&prompt).await?;
            usage.add_generation(tokens);
            let parsed = parse_summary_response(&raw)?;
            store
                .update_summary(&record.agenda_id, &parsed.summary, &parsed.key_issues)
                .await?;
            Ok::<(), anyhow::Error>(())
        }
        .await;

        match result {
            Ok(()) => report.updated += 1,
            Err(err) => {
                warn!("Summary for {} failed: {:#}", record.agenda_id, err);
                report.failed.push((record.agenda_id, format!("{:#}", err)));
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_summary_response() {
        let raw = r#"{"summary": "조례 개정 심사", "key_issues": ["예산", "시행 시기"]}"#;
        let parsed = parse_summary_response(raw).unwrap();
        assert_eq!(parsed.summary, "조례 개정 심사");
        assert_eq!(parsed.key_issues.len(), 2);
    }

    #[test]
    fn test_parse_summary_response_fenced_and_sparse() {
        let raw = "```json\n{\"summary\": \"요약\"}\n```";
        let parsed = parse_summary_response(raw).unwrap();
        assert_eq!(parsed.summary, "요약");
        assert!(parsed.key_issues.is_empty());
    }

    #[test]
    fn test_parse_summary_response_rejects_garbage() {
        assert!(parse_summary_response("no json here").is_err());
    }
}
