use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::models::{AgendaRecord, AgendaType};
use crate::store::{AgendaStore, EmbedText, MetadataFilter, VectorHit, VectorStore};

/// Types that never surface in search results. Procedure and free-form
/// discussion rank well on embedding similarity but answer nothing.
pub const EXCLUDED_AGENDA_TYPES: &[AgendaType] = &[
    AgendaType::Procedural,
    AgendaType::Discussion,
    AgendaType::Other,
];

/// Chunk-level hits fetched per query before agenda-level grouping
const CANDIDATE_POOL_CAP: usize = 20;

const SUMMARY_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub speaker: Option<String>,
    pub meeting_date: Option<String>,
    pub limit: usize,
}

/// One agenda-level search result
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub agenda_id: String,
    pub agenda_title: String,
    pub meeting_title: String,
    pub meeting_date: String,
    pub meeting_url: String,
    pub main_speaker: String,
    pub agenda_type: AgendaType,
    pub status: String,
    /// Best chunk similarity in [0, 1]
    pub similarity: f32,
    /// Text of the best-matching chunk
    pub matched_text: String,
    pub summary: String,
}

/// Semantic search over ingested agendas: embed the query, fetch chunk-level
/// neighbors, collapse to agendas, then join relational metadata.
pub struct SearchService {
    embedder: Arc<dyn EmbedText>,
    vectors: Arc<dyn VectorStore>,
    store: AgendaStore,
}

impl SearchService {
    pub fn new(
        embedder: Arc<dyn EmbedText>,
        vectors: Arc<dyn VectorStore>,
        store: AgendaStore,
    ) -> Self {
        Self {
            embedder,
            vectors,
            store,
        }
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        let embeddings = self.embedder.embed(&[request.query.clone()]).await?;
        let embedding = embeddings
            .first()
            .context("Embedder returned no vector for the query")?;

        // Over-fetch chunks so agenda-level grouping still fills the limit
        let pool = CANDIDATE_POOL_CAP.min(request.limit.saturating_mul(4).max(1));
        let filter = MetadataFilter {
            speaker: request.speaker.clone(),
            meeting_date: request.meeting_date.clone(),
        };
        let hits = self.vectors.search(embedding, pool, &filter).await?;

        let ranked = rank_by_agenda(&hits);
        let candidate_ids: Vec<String> = ranked.iter().map(|r| r.agenda_id.clone()).collect();

        let records = self
            .store
            .find_by_ids(&candidate_ids, EXCLUDED_AGENDA_TYPES)
            .await?;
        let by_id: HashMap<&str, &AgendaRecord> =
            records.iter().map(|r| (r.agenda_id.as_str(), r)).collect();

        let results: Vec<SearchResult> = ranked
            .into_iter()
            .filter_map(|ranked_hit| {
                by_id.get(ranked_hit.agenda_id.as_str()).map(|record| {
                    build_result(record, ranked_hit.similarity, ranked_hit.matched_text)
                })
            })
            .take(request.limit)
            .collect();

        info!(
            "Search '{}' matched {} agendas ({} chunk hits)",
            request.query,
            results.len(),
            hits.len()
        );
        Ok(results)
    }
}

struct RankedAgenda {
    agenda_id: String,
    similarity: f32,
    matched_text: String,
}

/// Collapse chunk hits to agendas, keeping each agenda's best chunk, sorted
/// by similarity descending.
fn rank_by_agenda(hits: &[VectorHit]) -> Vec<RankedAgenda> {
    let mut best: Vec<RankedAgenda> = Vec::new();
    for hit in hits {
        let similarity = similarity_from_distance(hit.distance);
        match best
            .iter_mut()
            .find(|r| r.agenda_id == hit.metadata.agenda_id)
        {
            Some(existing) => {
                if similarity > existing.similarity {
                    existing.similarity = similarity;
                    existing.matched_text = hit.document.clone();
                }
            }
            None => best.push(RankedAgenda {
                agenda_id: hit.metadata.agenda_id.clone(),
                similarity,
                matched_text: hit.document.clone(),
            }),
        }
    }
    best.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    best
}

/// Cosine distance in [0, 2] maps to similarity in [0, 1]
fn similarity_from_distance(distance: f32) -> f32 {
    1.0 - distance / 2.0
}

fn build_result(record: &AgendaRecord, similarity: f32, matched_text: String) -> SearchResult {
    SearchResult {
        agenda_id: record.agenda_id.clone(),
        agenda_title: record.agenda_title.clone(),
        meeting_title: record.meeting_title.clone(),
        meeting_date: record.meeting_date.clone(),
        meeting_url: record.meeting_url.clone(),
        main_speaker: record.main_speaker.clone(),
        agenda_type: record.agenda_type,
        status: record.status.clone(),
        similarity,
        matched_text,
        summary: summary_preview(record),
    }
}

/// The stored summary when present, otherwise a transcript prefix
fn summary_preview(record: &AgendaRecord) -> String {
    if let Some(summary) = &record.ai_summary {
        return summary.clone();
    }
    let preview: String = record
        .combined_text
        .chars()
        .take(SUMMARY_PREVIEW_CHARS)
        .collect();
    if record.combined_text.chars().count() > SUMMARY_PREVIEW_CHARS {
        format!("{}...", preview)
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn hit(agenda_id: &str, distance: f32, document: &str) -> VectorHit {
        VectorHit {
            chunk_id: format!("{}_c", agenda_id),
            distance,
            document: document.to_string(),
            metadata: ChunkMetadata {
                meeting_title: String::new(),
                meeting_date: String::new(),
                meeting_url: String::new(),
                speaker: String::new(),
                agenda: String::new(),
                agenda_id: agenda_id.to_string(),
                chunk_index: 0,
                source_meeting_id: "m1".to_string(),
            },
        }
    }

    #[test]
    fn test_rank_keeps_best_chunk_per_agenda() {
        let hits = vec![
            hit("m1_agenda_001", 0.8, "weaker"),
            hit("m1_agenda_002", 0.4, "other agenda"),
            hit("m1_agenda_001", 0.2, "stronger"),
        ];
        let ranked = rank_by_agenda(&hits);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].agenda_id, "m1_agenda_001");
        assert_eq!(ranked[0].matched_text, "stronger");
        assert!((ranked[0].similarity - 0.9).abs() < 1e-6);
        assert_eq!(ranked[1].agenda_id, "m1_agenda_002");
    }

    #[test]
    fn test_similarity_bounds() {
        assert_eq!(similarity_from_distance(0.0), 1.0);
        assert_eq!(similarity_from_distance(2.0), 0.0);
        assert_eq!(similarity_from_distance(1.0), 0.5);
    }

    #[test]
    fn test_summary_preview_falls_back_to_transcript() {
        let mut record = AgendaRecord {
            agenda_id: "a".to_string(),
            agenda_title: String::new(),
            meeting_title: String::new(),
            meeting_date: String::new(),
            meeting_url: String::new(),
            main_speaker: String::new(),
            all_speakers: vec![],
            chunk_count: 0,
            chunk_ids: vec![],
            combined_text: "가".repeat(250),
            ai_summary: None,
            key_issues: None,
            attachments: vec![],
            agenda_type: AgendaType::Report,
            status: String::new(),
        };

        let preview = summary_preview(&record);
        assert_eq!(preview.chars().count(), 203);
        assert!(preview.ends_with("..."));

        record.ai_summary = Some("요약".to_string());
        assert_eq!(summary_preview(&record), "요약");
    }
}
