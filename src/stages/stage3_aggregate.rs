use std::collections::HashMap;

use crate::models::{
    agenda_id, chunk_id, AgendaMapping, AgendaRecord, ChunkMetadata, MeetingInfo, UtteranceChunk,
    VectorRecord,
};

/// Output of Stage 3: one record per agenda unit plus one vector payload per
/// chunk. Both sides carry the same generated identifiers.
#[derive(Debug, Default)]
pub struct AggregateOutput {
    pub records: Vec<AgendaRecord>,
    pub vectors: Vec<VectorRecord>,
}

/// Execute Stage 3: group chunks by agenda title and assemble the per-agenda
/// records and per-chunk vector payloads.
///
/// Groups appear in order of first occurrence in the chunk stream; mappings
/// that produced no chunks still yield a record, appended after the
/// chunk-backed groups in mapping order. Identifiers are assigned here once
/// and flow to both stores unchanged.
pub fn execute_stage3(
    meeting_id: &str,
    meeting: &MeetingInfo,
    chunks: &[UtteranceChunk],
    mappings: &[AgendaMapping],
) -> AggregateOutput {
    let mapping_index: HashMap<&str, &AgendaMapping> = mappings
        .iter()
        .map(|m| (m.agenda_title.as_str(), m))
        .collect();

    // Group chunks by exact agenda title, first-seen order. Each chunk keeps
    // its 1-based position in the stream; chunk ids follow transcript order
    // even when two agendas' chunks interleave.
    let mut group_order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<(usize, &UtteranceChunk)>> = HashMap::new();
    for (position, chunk) in chunks.iter().enumerate() {
        let title = chunk.agenda_title.as_str();
        groups
            .entry(title)
            .or_insert_with(|| {
                group_order.push(title);
                Vec::new()
            })
            .push((position + 1, chunk));
    }

    let mut output = AggregateOutput::default();
    let mut agenda_seq = 0usize;

    for title in &group_order {
        agenda_seq += 1;
        let id = agenda_id(meeting_id, agenda_seq);
        let members = &groups[title];

        let mut chunk_ids = Vec::with_capacity(members.len());
        for (index, chunk) in members {
            let cid = chunk_id(meeting_id, *index);
            chunk_ids.push(cid.clone());
            output.vectors.push(VectorRecord {
                chunk_id: cid,
                text: chunk.text.clone(),
                metadata: ChunkMetadata {
                    meeting_title: meeting.title.clone(),
                    meeting_date: meeting.date.clone(),
                    meeting_url: meeting.meeting_url.clone(),
                    speaker: chunk.speaker.clone(),
                    agenda: (*title).to_string(),
                    agenda_id: id.clone(),
                    chunk_index: *index,
                    source_meeting_id: meeting_id.to_string(),
                },
            });
        }

        let roster = speaker_roster(members);
        let combined_text = members
            .iter()
            .map(|(_, c)| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        output.records.push(build_record(
            id,
            title,
            meeting,
            mapping_index.get(title).copied(),
            main_speaker(members),
            roster,
            chunk_ids,
            combined_text,
        ));
    }

    // Mappings with no extracted speech still get a record so procedural
    // items remain queryable by metadata
    for mapping in mappings {
        if groups.contains_key(mapping.agenda_title.as_str()) {
            continue;
        }
        agenda_seq += 1;
        output.records.push(build_record(
            agenda_id(meeting_id, agenda_seq),
            &mapping.agenda_title,
            meeting,
            Some(mapping),
            String::new(),
            Vec::new(),
            Vec::new(),
            String::new(),
        ));
    }

    output
}

#[allow(clippy::too_many_arguments)]
fn build_record(
    id: String,
    title: &str,
    meeting: &MeetingInfo,
    mapping: Option<&AgendaMapping>,
    main_speaker: String,
    all_speakers: Vec<String>,
    chunk_ids: Vec<String>,
    combined_text: String,
) -> AgendaRecord {
    AgendaRecord {
        agenda_id: id,
        agenda_title: title.to_string(),
        meeting_title: meeting.title.clone(),
        meeting_date: meeting.date.clone(),
        meeting_url: meeting.meeting_url.clone(),
        main_speaker,
        all_speakers,
        chunk_count: chunk_ids.len(),
        chunk_ids,
        combined_text,
        ai_summary: None,
        key_issues: None,
        attachments: mapping.map(|m| m.attachments.clone()).unwrap_or_default(),
        agenda_type: mapping.map(|m| m.agenda_type).unwrap_or_default(),
        status: mapping
            .map(|m| m.status.clone())
            .unwrap_or_else(|| crate::models::STATUS_RECEIVED.to_string()),
    }
}

/// Distinct speakers in first-appearance order
fn speaker_roster(chunks: &[(usize, &UtteranceChunk)]) -> Vec<String> {
    let mut roster = Vec::new();
    for (_, chunk) in chunks {
        if !roster.contains(&chunk.speaker) {
            roster.push(chunk.speaker.clone());
        }
    }
    roster
}

/// Most frequent speaker; earliest first appearance wins a tie
fn main_speaker(chunks: &[(usize, &UtteranceChunk)]) -> String {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for (_, chunk) in chunks {
        match counts.iter_mut().find(|(s, _)| s == &chunk.speaker) {
            Some((_, n)) => *n += 1,
            None => counts.push((chunk.speaker.clone(), 1)),
        }
    }
    counts
        .into_iter()
        .reduce(|best, candidate| {
            // Strictly greater only, so an earlier speaker keeps a tie
            if candidate.1 > best.1 {
                candidate
            } else {
                best
            }
        })
        .map(|(s, _)| s)
        .unwrap_or_default()
}
