use std::sync::LazyLock;

use regex::Regex;

use crate::io::SourceDocument;
use crate::models::{AgendaMapping, UtteranceChunk};

/// Speaker turn with trailing statement on the same line. The marker is
/// followed by a role-and-name run, then at least two spaces before the text.
static SPEAKER_WITH_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^○\s*(.+?)\s{2,}(\S.*)$").unwrap());

/// Speaker turn with no statement on the marker line
static SPEAKER_ONLY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^○\s*(.+)$").unwrap());

/// Markdown links embedded by the crawler, kept as their label text. Applied
/// to the whole line, speaker label and utterance body alike, so raw URLs
/// never end up in chunk text or embeddings.
static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap());

/// Numbered crawler artifacts such as `1. something [](https://...)`
static NUMBERED_LINK_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s+.+\[\]\(https?://").unwrap());

/// Session timestamps such as `(10시 15분)`
static TIMESTAMP_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\([0-9]{1,2}[시신]\s*[0-9]{0,2}\s*분?\)$").unwrap());

const REFERENCE_BLOCK_MARKER: &str = "(참고)";
const APPENDED_AT_END_MARKER: &str = "(회의록 끝에 실음)";

/// Configuration for Stage 2
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// Maximum chunk length in characters, not bytes
    pub max_chunk_chars: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 500,
        }
    }
}

/// Execute Stage 2: walk the agenda ranges in mapping order and extract
/// speaker-attributed chunks from each. Speaker identity carries across
/// range boundaries, so an utterance that straddles two agenda items is
/// still attributed in the later range.
pub fn execute_stage2(
    doc: &SourceDocument,
    mappings: &[AgendaMapping],
    config: &SegmenterConfig,
) -> Vec<UtteranceChunk> {
    let mut chunks = Vec::new();
    let mut previous_speaker: Option<String> = None;

    for mapping in mappings {
        let lines = doc.slice(mapping.line_start, mapping.line_end);
        let extracted = segment_range(
            lines,
            &mapping.agenda_title,
            previous_speaker.as_deref(),
            config,
        );
        if let Some(last) = extracted.last() {
            previous_speaker = Some(last.speaker.clone());
        }
        chunks.extend(extracted);
    }

    chunks
}

/// Extract speaker-attributed chunks from one contiguous line range.
///
/// Lines are attributed to the most recent speaker marker; consecutive lines
/// by the same speaker merge into one utterance before length splitting.
/// Text before the first marker belongs to `previous_speaker`, or is dropped
/// when there is none.
pub fn segment_range(
    lines: &[String],
    agenda_title: &str,
    previous_speaker: Option<&str>,
    config: &SegmenterConfig,
) -> Vec<UtteranceChunk> {
    let mut utterances: Vec<(String, Vec<String>)> = Vec::new();
    let mut current_speaker = previous_speaker.map(str::to_string);

    for raw_line in lines {
        let line = MARKDOWN_LINK.replace_all(raw_line.trim(), "$1").to_string();
        if line.is_empty() || is_noise(&line) {
            continue;
        }

        if let Some((speaker, text)) = parse_speaker_line(&line) {
            current_speaker = Some(speaker.clone());
            utterances.push((speaker, text.into_iter().collect()));
            continue;
        }

        match &current_speaker {
            Some(speaker) => match utterances.last_mut() {
                Some((last_speaker, parts)) if last_speaker == speaker => {
                    parts.push(line);
                }
                _ => utterances.push((speaker.clone(), vec![line])),
            },
            // No attribution possible yet: narration before any marker
            None => continue,
        }
    }

    let mut chunks = Vec::new();
    for (speaker, parts) in utterances {
        if parts.is_empty() {
            continue;
        }
        let text = parts.join(" ");
        for piece in split_long_text(&text, config.max_chunk_chars) {
            chunks.push(UtteranceChunk {
                speaker: speaker.clone(),
                agenda_title: agenda_title.to_string(),
                text: piece,
            });
        }
    }
    chunks
}

/// Parse a `○` speaker marker line into (speaker, optional same-line text)
fn parse_speaker_line(line: &str) -> Option<(String, Option<String>)> {
    if let Some(caps) = SPEAKER_WITH_TEXT.captures(line) {
        let speaker = caps[1].trim().to_string();
        let text = caps[2].trim().to_string();
        return Some((speaker, Some(text).filter(|t| !t.is_empty())));
    }
    if let Some(caps) = SPEAKER_ONLY.captures(line) {
        return Some((caps[1].trim().to_string(), None));
    }
    None
}

fn is_noise(line: &str) -> bool {
    line.starts_with("---")
        || line.contains(REFERENCE_BLOCK_MARKER)
        || line.contains(APPENDED_AT_END_MARKER)
        || NUMBERED_LINK_NOISE.is_match(line)
        || TIMESTAMP_NOISE.is_match(line)
}

/// Split text into pieces of at most `max_chars` characters, preferring
/// sentence boundaries. Sentences pack greedily; a single sentence longer
/// than the limit is kept intact rather than cut mid-sentence.
pub fn split_long_text(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let sentences = split_sentences(text);
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for sentence in sentences {
        let sentence_chars = sentence.chars().count();
        if current_chars > 0 && current_chars + 1 + sentence_chars > max_chars {
            pieces.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        if current_chars > 0 {
            current.push(' ');
            current_chars += 1;
        }
        current.push_str(&sentence);
        current_chars += sentence_chars;
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Split on sentence-final punctuation followed by whitespace, keeping the
/// punctuation with the preceding sentence.
fn split_sentences(text: &str) -> Vec<String> {
    static BOUNDARY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([.?!])\s+").unwrap());

    let mut sentences = Vec::new();
    let mut last = 0;
    for caps in BOUNDARY.captures_iter(text) {
        let punct = caps.get(1).unwrap();
        let whole = caps.get(0).unwrap();
        sentences.push(text[last..punct.end()].trim().to_string());
        last = whole.end();
    }
    if last < text.len() {
        let tail = text[last..].trim();
        if !tail.is_empty() {
            sentences.push(tail.to_string());
        }
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extracts_speaker_turns() {
        let body = lines(&[
            "○의장 최호정  의석을 정돈해 주시기 바랍니다.",
            "성원이 되었으므로 개의를 선포합니다.",
            "○김영옥 의원  존경하는 시민 여러분.",
            "○의장 최호정  수고하셨습니다.",
        ]);
        let chunks = segment_range(&body, "개의", None, &SegmenterConfig::default());

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].speaker, "의장 최호정");
        assert!(chunks[0].text.contains("의석을 정돈해"));
        assert!(chunks[0].text.contains("개의를 선포합니다"));
        assert_eq!(chunks[1].speaker, "김영옥 의원");
        assert_eq!(chunks[2].speaker, "의장 최호정");
    }

    #[test]
    fn test_marker_only_line_attributes_following_text() {
        let body = lines(&["○사무처장", "보고드리겠습니다.", "이상입니다."]);
        let chunks = segment_range(&body, "보고", None, &SegmenterConfig::default());

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].speaker, "사무처장");
        assert_eq!(chunks[0].text, "보고드리겠습니다. 이상입니다.");
    }

    #[test]
    fn test_previous_speaker_continuity() {
        let body = lines(&["계속해서 말씀드리겠습니다."]);
        let chunks = segment_range(&body, "계속", Some("의장 최호정"), &SegmenterConfig::default());

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].speaker, "의장 최호정");
    }

    #[test]
    fn test_unattributed_preamble_is_dropped() {
        let body = lines(&["(서울특별시의회 본회의장)", "○의장 최호정  개의합니다."]);
        let chunks = segment_range(&body, "개의", None, &SegmenterConfig::default());

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "개의합니다.");
    }

    #[test]
    fn test_noise_lines_filtered() {
        let body = lines(&[
            "○의장 최호정  상정합니다.",
            "(10시 15분)",
            "--- 구분선",
            "(참고) 부록 참조",
            "의안은 (회의록 끝에 실음) 처리되었습니다.",
            "1. 조례안 [](https://example.com/1.pdf)",
            "계속 진행하겠습니다.",
        ]);
        let chunks = segment_range(&body, "상정", None, &SegmenterConfig::default());

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "상정합니다. 계속 진행하겠습니다.");
    }

    #[test]
    fn test_markdown_links_reduced_to_label() {
        let body = lines(&["○위원장  [조례안](https://example.com/doc) 을 상정합니다."]);
        let chunks = segment_range(&body, "상정", None, &SegmenterConfig::default());

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "조례안 을 상정합니다.");
    }

    #[test]
    fn test_long_utterance_split_at_sentence_boundary() {
        let first = "가".repeat(300) + ".";
        let second = "나".repeat(300) + ".";
        let body = lines(&[&format!("○의원  {} {}", first, second)]);
        let chunks = segment_range(&body, "발언", None, &SegmenterConfig::default());

        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 500));
        assert!(chunks.iter().all(|c| c.speaker == "의원"));
    }

    #[test]
    fn test_oversized_single_sentence_kept_intact() {
        let sentence = "가".repeat(700);
        let pieces = split_long_text(&sentence, 500);
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].chars().count(), 700);
    }

    #[test]
    fn test_split_is_char_based_not_byte_based() {
        // 450 Hangul syllables are 1350 bytes but still one chunk
        let text = "하".repeat(450);
        let pieces = split_long_text(&text, 500);
        assert_eq!(pieces.len(), 1);
    }

    #[test]
    fn test_execute_stage2_threads_speaker_across_ranges() {
        let doc = SourceDocument {
            title: "t".to_string(),
            source_url: String::new(),
            body_lines: lines(&[
                "○의장 최호정  첫 번째 안건입니다.",
                "의견 있으십니까.",
                "두 번째 안건으로 넘어가겠습니다.",
                "가결되었음을 선포합니다.",
            ]),
        };
        let mappings = vec![
            crate::models::AgendaMapping {
                agenda_title: "안건 1".to_string(),
                line_start: 1,
                line_end: 2,
                ..mapping_defaults()
            },
            crate::models::AgendaMapping {
                agenda_title: "안건 2".to_string(),
                line_start: 3,
                line_end: 4,
                ..mapping_defaults()
            },
        ];

        let chunks = execute_stage2(&doc, &mappings, &SegmenterConfig::default());

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].agenda_title, "안건 1");
        assert_eq!(chunks[1].agenda_title, "안건 2");
        assert_eq!(chunks[1].speaker, "의장 최호정");
    }

    #[test]
    fn test_segmentation_is_deterministic() {
        let body = lines(&[
            "○의장 최호정  상정합니다.",
            "○김영옥 의원  찬성합니다.",
        ]);
        let a = segment_range(&body, "표결", None, &SegmenterConfig::default());
        let b = segment_range(&body, "표결", None, &SegmenterConfig::default());
        assert_eq!(a, b);
    }

    fn mapping_defaults() -> crate::models::AgendaMapping {
        crate::models::AgendaMapping {
            agenda_title: String::new(),
            agenda_type: crate::models::AgendaType::Other,
            status: crate::models::STATUS_RECEIVED.to_string(),
            line_start: 1,
            line_end: 1,
            speakers: vec![],
            attachments: vec![],
        }
    }
}
