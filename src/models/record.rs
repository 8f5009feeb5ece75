use serde::{Deserialize, Serialize};

use crate::models::{AgendaType, Attachment};

/// Shared agenda key: `{meeting_id}_agenda_{seq:03}`. Both stores must agree
/// on this value for the same logical agenda item, so it is computed once by
/// the aggregator and consumed everywhere else.
pub fn agenda_id(meeting_id: &str, sequence: usize) -> String {
    format!("{}_agenda_{:03}", meeting_id, sequence)
}

/// Chunk key: `{meeting_id}_chunk_{idx:04}` over the meeting-wide chunk index
pub fn chunk_id(meeting_id: &str, index: usize) -> String {
    format!("{}_chunk_{:04}", meeting_id, index)
}

/// Aggregated agenda item as persisted to the relational store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgendaRecord {
    pub agenda_id: String,
    pub agenda_title: String,
    pub meeting_title: String,
    pub meeting_date: String,
    pub meeting_url: String,
    /// Most frequent speaker by utterance count, ties broken by first
    /// occurrence; empty when the agenda had no recognized speech
    pub main_speaker: String,
    /// De-duplicated roster in first-occurrence order
    pub all_speakers: Vec<String>,
    pub chunk_count: usize,
    /// Keys of the chunks that back this record, in order
    pub chunk_ids: Vec<String>,
    /// Chunk texts joined with a blank-line separator
    pub combined_text: String,
    /// Filled by the enrichment pass after ingest
    pub ai_summary: Option<String>,
    pub key_issues: Option<Vec<String>>,
    pub attachments: Vec<Attachment>,
    pub agenda_type: AgendaType,
    pub status: String,
}

impl AgendaRecord {
    pub fn speaker_count(&self) -> usize {
        self.all_speakers.len()
    }
}

/// Metadata stored next to each embedded chunk in the vector store.
/// `agenda_id` here must equal the relational `AgendaRecord` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub meeting_title: String,
    pub meeting_date: String,
    pub meeting_url: String,
    pub speaker: String,
    pub agenda: String,
    pub agenda_id: String,
    pub chunk_index: usize,
    pub source_meeting_id: String,
}

/// One embeddable document destined for the vector store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub chunk_id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}
