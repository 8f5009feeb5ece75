use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::cost::{UsageSnapshot, UsageTracker};
use crate::io::load_transcript_file;
use crate::models::MeetingInfo;
use crate::stages::{
    collect_attachment_hints, execute_stage1, execute_stage2, execute_stage3, MapAgendas,
    SegmenterConfig, Stage1Config,
};
use crate::store::{AgendaStore, EmbedText, VectorStore};

/// Configuration for batch ingestion
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Meetings processed concurrently
    pub max_concurrent: usize,
    pub stage1: Stage1Config,
    pub segmenter: SegmenterConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            stage1: Stage1Config::default(),
            segmenter: SegmenterConfig::default(),
        }
    }
}

/// Outcome of one ingested meeting
#[derive(Debug, Clone)]
pub struct MeetingReport {
    pub meeting_id: String,
    pub agenda_count: usize,
    pub chunk_count: usize,
    pub mapping_attempts: u32,
    /// The accepted mapping still carried validation errors
    pub degraded_mapping: bool,
}

/// Outcome of a directory run. Failures are per meeting; one bad transcript
/// never aborts the batch.
#[derive(Debug)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub succeeded: Vec<MeetingReport>,
    pub failed: Vec<(String, String)>,
    pub usage: UsageSnapshot,
}

impl BatchReport {
    pub fn elapsed_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }
}

/// The full ingestion pipeline: parse, map, segment, aggregate, embed, and
/// persist to both stores. Cheap to clone; every worker task holds its own
/// handle.
#[derive(Clone)]
pub struct Pipeline {
    mapper: Arc<dyn MapAgendas>,
    embedder: Arc<dyn EmbedText>,
    vectors: Arc<dyn VectorStore>,
    store: AgendaStore,
    usage: Arc<UsageTracker>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        mapper: Arc<dyn MapAgendas>,
        embedder: Arc<dyn EmbedText>,
        vectors: Arc<dyn VectorStore>,
        store: AgendaStore,
        usage: Arc<UsageTracker>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            mapper,
            embedder,
            vectors,
            store,
            usage,
            config,
        }
    }

    /// Ingest every transcript in a directory with bounded concurrency
    pub async fn ingest_directory(&self, dir: &Path) -> Result<BatchReport> {
        let started_at = Utc::now();
        let files = discover_transcripts(dir)?;
        if files.is_empty() {
            bail!("No transcript files (.txt/.md) found in {:?}", dir);
        }
        info!("Ingesting {} transcripts from {:?}", files.len(), dir);

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let mut tasks = JoinSet::new();

        for path in files {
            // Permit held for the whole meeting, including API calls
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .context("Concurrency semaphore closed")?;
            let pipeline = self.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let meeting_id = meeting_id_for(&path);
                let result = pipeline.ingest_file(&path).await;
                (meeting_id, result)
            });
        }

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (meeting_id, result) = joined.context("Ingestion task panicked")?;
            match result {
                Ok(report) => succeeded.push(report),
                Err(err) => {
                    error!("Meeting {} failed: {:#}", meeting_id, err);
                    failed.push((meeting_id, format!("{:#}", err)));
                }
            }
        }
        succeeded.sort_by(|a, b| a.meeting_id.cmp(&b.meeting_id));
        failed.sort();

        Ok(BatchReport {
            started_at,
            finished_at: Utc::now(),
            succeeded,
            failed,
            usage: self.usage.snapshot(),
        })
    }

    /// Ingest one transcript file. Nothing is persisted unless every stage
    /// for this meeting succeeded.
    pub async fn ingest_file(&self, path: &Path) -> Result<MeetingReport> {
        let meeting_id = meeting_id_for(path);
        let doc = load_transcript_file(path)?;
        if doc.body_lines.is_empty() {
            bail!("Transcript body is empty");
        }

        let attachments = collect_attachment_hints(&doc);
        let outcome = execute_stage1(
            self.mapper.as_ref(),
            &doc,
            &attachments,
            &self.config.stage1,
            &self.usage,
        )
        .await
        .with_context(|| format!("Agenda mapping failed for {}", meeting_id))?;
        if outcome.degraded {
            warn!("Meeting {} mapped with degraded quality", meeting_id);
        }

        let chunks = execute_stage2(&doc, &outcome.response.agenda_mapping, &self.config.segmenter);
        let meeting = resolve_meeting_info(&doc.title, &doc.source_url, &outcome.response.meeting_info);
        let output = execute_stage3(
            &meeting_id,
            &meeting,
            &chunks,
            &outcome.response.agenda_mapping,
        );

        let texts: Vec<String> = output.vectors.iter().map(|v| v.text.clone()).collect();
        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedder
                .embed(&texts)
                .await
                .with_context(|| format!("Embedding failed for {}", meeting_id))?
        };

        self.vectors.delete_meeting(&meeting_id).await?;
        self.vectors.add(&output.vectors, &embeddings).await?;
        self.store
            .replace_meeting(&meeting_id, &output.records, &output.vectors)
            .await?;

        info!(
            "Meeting {}: {} agendas, {} chunks",
            meeting_id,
            output.records.len(),
            output.vectors.len()
        );
        Ok(MeetingReport {
            meeting_id,
            agenda_count: output.records.len(),
            chunk_count: output.vectors.len(),
            mapping_attempts: outcome.attempts,
            degraded_mapping: outcome.degraded,
        })
    }
}

/// Meeting key: the file stem, stable across re-ingestion
fn meeting_id_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Model-reported meeting info wins, transcript header fills the blanks
fn resolve_meeting_info(title: &str, url: &str, reported: &MeetingInfo) -> MeetingInfo {
    MeetingInfo {
        title: if reported.title.trim().is_empty() {
            title.to_string()
        } else {
            reported.title.clone()
        },
        meeting_url: if reported.meeting_url.trim().is_empty() {
            url.to_string()
        } else {
            reported.meeting_url.clone()
        },
        date: reported.date.clone(),
    }
}

fn discover_transcripts(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("Failed to read directory {:?}", dir))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("txt") | Some("md")
                )
        })
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_transcripts_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "x").unwrap();
        std::fs::write(dir.path().join("a.md"), "x").unwrap();
        std::fs::write(dir.path().join("notes.json"), "x").unwrap();

        let files = discover_transcripts(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.md", "b.txt"]);
    }

    #[test]
    fn test_meeting_id_is_file_stem() {
        assert_eq!(
            meeting_id_for(Path::new("/data/meeting_331_02.txt")),
            "meeting_331_02"
        );
    }

    #[test]
    fn test_resolve_meeting_info_prefers_reported_values() {
        let reported = MeetingInfo {
            title: String::new(),
            meeting_url: "https://model.example/record".to_string(),
            date: "2024.09.10".to_string(),
        };
        let merged = resolve_meeting_info("헤더 제목", "https://header.example", &reported);

        assert_eq!(merged.title, "헤더 제목");
        assert_eq!(merged.meeting_url, "https://model.example/record");
        assert_eq!(merged.date, "2024.09.10");
    }
}
