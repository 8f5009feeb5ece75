use crate::models::Attachment;

/// Structural rules for the agenda mapping request. The model performs the
/// coarse labeling; everything downstream of it is deterministic code, so the
/// rules here carry the full merge/split policy.
pub const MAPPING_RULES: &str = r#"## Task

1. Extract meeting_info:
   - title: use the provided meeting title verbatim
   - meeting_url: use the provided URL verbatim
   - date: extract from the title in YYYY.MM.DD form

2. Extract agenda_mapping:

## Agenda discovery

Step 1: enumerate the agenda list from the "심사된안건" or "의사일정"
table-of-contents section.
- Find every "1. 2. 3. ..." numbered item
- agenda_title is the bare item name without its number
- Example: "1. 기획조정실 현안 업무보고" -> "기획조정실 현안 업무보고"

Step 2: assign each agenda its discussion range (line_start, line_end),
guided by "---" separators, "○위원장"/"○의장" lines, and mentions of the
agenda title. line_start is the first line of actual speech; line_end is the
last line of speech, just before the next "---" separator or "(참고)" block.

## Batch-introduced agenda items

Plenary sessions ("본회의" in the meeting title): when several items are
introduced together but voted individually ("의사일정 제X항을 표결하겠습니다" /
"의사일정 제X항은 가결되었음"), ALWAYS split into separate agendas.
- line_start: the line where that item's vote is moved
- line_end: the declaration line ("가결되었음을 선포합니다") or the line
  before the next item's motion
- status: that item's individual vote result

Committee meetings: when several items are introduced jointly ("일괄 상정"),
inspect the discussion itself.

MERGE into one agenda only when ALL four stages are done jointly:
- joint proposal explanation (no per-item explanation)
- joint review report (no per-item review)
- joint Q&A (questions address the batch as a whole)
- joint vote (one vote covering every item)
Then agenda_title is the comma-joined list "item1,item2,item3", with one line
range covering the whole joint discussion and the shared status.

SPLIT into separate agendas when ANY stage is done per item:
- per-item proposal explanations
- per-item review reports
- per-item Q&A separated by "---" lines
- per-item votes
Each split agenda gets its own line range and its own status. When the
evidence is mixed, any sign of an individual vote means SPLIT.

## Non-agenda sections

Sections absent from the agenda list but present in the meeting (opening,
closing, general Q&A, five-minute free statements) are still emitted as
agenda units with a descriptive title, typed "procedural" or "discussion".

## Attachments

Reference documents appear as markdown links, usually inside a trailing
"(참고)" block: [document name](https://.../appendixDownload.do?key=...).
A "(참고)" block belongs to the agenda unit immediately before it, never to
an unrelated one. Include only entries whose URL is present; omit an entry
entirely rather than emitting a null URL. Agendas without attachments get an
empty array. Never emit content from "(참고)" or "(회의록 끝에 실음)" blocks
as agenda discussion.

## Speakers

speakers: the speaker labels observed in the range (the name after each "○"),
in speaking order.

## Agenda type

Classify each unit as exactly one of:
- "legislation": ordinances, rules
- "report": departmental or status reports
- "budget": budget and settlement items
- "consent": consent, approval, opinion-hearing items
- "procedural": opening, closing, adjournment
- "personnel": chair elections, member appointments
- "discussion": Q&A sessions, five-minute free statements
- "other": anything else

## Status

Record how each agenda was disposed of, as one of:
- "approved-as-is": passed in original form ("원안가결", "가결되었음")
- "amended-and-approved": passed with amendments ("수정가결")
- "rejected": voted down ("부결되었음")
- "referred-to-plenary": forwarded to the plenary ("본회의에 부의")
- "under-committee-review": still before the committee ("위원회 심사중")
- "received": no disposition stated (default)

## Output

Output pure JSON only, in this shape:
{
  "meeting_info": {"title": "...", "meeting_url": "...", "date": "YYYY.MM.DD"},
  "agenda_mapping": [
    {
      "agenda_title": "...",
      "agenda_type": "legislation",
      "status": "approved-as-is",
      "line_start": 1,
      "line_end": 50,
      "speakers": ["..."],
      "attachments": [{"title": "...", "download_url": "..."}]
    }
  ]
}

Rules:
- agenda_mapping ordered by time of discussion
- line_start and line_end are the actual printed line numbers
- every agenda unit included, none omitted
- agenda_type must be one of the eight values above"#;

/// Build the full mapping prompt for one transcript
pub fn build_mapping_prompt(
    title: &str,
    url: &str,
    numbered_text: &str,
    attachments: &[Attachment],
) -> String {
    let mut prompt = String::new();

    prompt.push_str(
        "The following is a council meeting transcript. Analyze it and extract \
         the per-agenda line number mapping.\n\n",
    );
    prompt.push_str(&format!("Meeting title: {}\n", title));
    prompt.push_str(&format!("Meeting URL: {}\n", url));

    if !attachments.is_empty() {
        prompt.push_str("\nKnown attachment documents:\n");
        for (idx, att) in attachments.iter().enumerate() {
            prompt.push_str(&format!(
                "{}. {} (URL: {})\n",
                idx + 1,
                att.title,
                att.download_url
            ));
        }
    }

    prompt.push_str("\nTranscript (with line numbers):\n");
    prompt.push_str(numbered_text);
    prompt.push('\n');
    prompt.push_str(MAPPING_RULES);

    prompt
}

/// Build the summary prompt used by the enrichment pass
pub fn build_summary_prompt(agenda_title: &str, combined_text: &str) -> String {
    format!(
        r#"Summarize the following council agenda discussion.

Agenda title: {}

Discussion:
{}

Output pure JSON only:
{{
  "summary": "3-4 sentence summary of what was discussed and decided",
  "key_issues": ["up to 5 short key issue phrases"]
}}

Write the summary and key issues in the language of the discussion."#,
        agenda_title, combined_text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_prompt_includes_sections() {
        let attachments = vec![Attachment {
            title: "조례안".to_string(),
            download_url: "https://example.com/doc.pdf".to_string(),
        }];
        let prompt = build_mapping_prompt(
            "제331회 본회의 제2차",
            "https://example.com/record/1",
            "   1 | ○의장 최호정  개의를 선포합니다.\n",
            &attachments,
        );

        assert!(prompt.contains("Meeting title: 제331회 본회의 제2차"));
        assert!(prompt.contains("Known attachment documents:"));
        assert!(prompt.contains("   1 | ○의장"));
        assert!(prompt.contains("agenda_mapping"));
    }

    #[test]
    fn test_mapping_prompt_omits_empty_attachment_block() {
        let prompt = build_mapping_prompt("t", "u", "", &[]);
        assert!(!prompt.contains("Known attachment documents:"));
    }
}
