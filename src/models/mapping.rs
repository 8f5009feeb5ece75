use serde::{Deserialize, Serialize};

use crate::models::MeetingInfo;

/// Status recorded when the transcript does not state an outcome
pub const STATUS_RECEIVED: &str = "received";

/// Controlled vocabulary for agenda outcomes. The model is instructed to pick
/// from this list; unexpected strings are kept verbatim rather than rejected.
pub const STATUS_VOCABULARY: &[&str] = &[
    "approved-as-is",
    "amended-and-approved",
    "rejected",
    "referred-to-plenary",
    "under-committee-review",
    STATUS_RECEIVED,
];

/// Classification of an agenda unit - restricted enum to reduce hallucination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgendaType {
    /// Ordinances, rules, and other legislative items
    Legislation,
    /// Departmental and status reports
    Report,
    /// Budget and settlement items
    Budget,
    /// Consent, approval, and opinion-hearing items
    Consent,
    /// Opening, closing, adjournment, and similar procedure
    Procedural,
    /// Chair elections, member appointments
    Personnel,
    /// Q&A sessions, five-minute free statements
    Discussion,
    #[default]
    Other,
}

impl AgendaType {
    /// Wire/database representation (matches the serde rename)
    pub fn as_str(&self) -> &'static str {
        match self {
            AgendaType::Legislation => "legislation",
            AgendaType::Report => "report",
            AgendaType::Budget => "budget",
            AgendaType::Consent => "consent",
            AgendaType::Procedural => "procedural",
            AgendaType::Personnel => "personnel",
            AgendaType::Discussion => "discussion",
            AgendaType::Other => "other",
        }
    }

    /// Parse a stored type string; unknown values fall back to `Other`
    pub fn parse(value: &str) -> Self {
        match value {
            "legislation" => AgendaType::Legislation,
            "report" => AgendaType::Report,
            "budget" => AgendaType::Budget,
            "consent" => AgendaType::Consent,
            "procedural" => AgendaType::Procedural,
            "personnel" => AgendaType::Personnel,
            "discussion" => AgendaType::Discussion,
            _ => AgendaType::Other,
        }
    }
}

/// A reference document associated with an agenda unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub title: String,
    #[serde(default)]
    pub download_url: String,
}

impl Attachment {
    /// Only attachments with a resolvable URL are kept after normalization
    pub fn has_resolvable_url(&self) -> bool {
        let url = self.download_url.trim();
        url.starts_with("http://") || url.starts_with("https://")
    }
}

fn default_status() -> String {
    STATUS_RECEIVED.to_string()
}

/// One agenda unit as labeled by the model: a line range into the transcript
/// plus structural metadata. For a merged batch item `agenda_title` is the
/// comma-joined list of the individual titles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgendaMapping {
    pub agenda_title: String,
    #[serde(default)]
    pub agenda_type: AgendaType,
    #[serde(default = "default_status")]
    pub status: String,
    /// 1-indexed inclusive range into the transcript body
    pub line_start: usize,
    pub line_end: usize,
    /// Speaker labels the model observed in the range, in speaking order.
    /// A hint for downstream consumers, not authoritative.
    #[serde(default)]
    pub speakers: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Top-level mapping response from the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingResponse {
    pub meeting_info: MeetingInfo,
    #[serde(default)]
    pub agenda_mapping: Vec<AgendaMapping>,
}

impl MappingResponse {
    /// Normalize model output at the parse boundary: drop attachments without
    /// a resolvable URL and blank statuses. Range checks live in
    /// `llm::validation` because they feed the retry policy.
    pub fn normalize(&mut self) {
        for mapping in &mut self.agenda_mapping {
            mapping.attachments.retain(Attachment::has_resolvable_url);
            if mapping.status.trim().is_empty() {
                mapping.status = default_status();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mapping_response() {
        let json = r#"{
            "meeting_info": {
                "title": "제331회 행정자치위원회 제1차",
                "meeting_url": "https://ms.smc.seoul.kr/record/123",
                "date": "2024.09.10"
            },
            "agenda_mapping": [
                {
                    "agenda_title": "기획조정실 현안 업무보고",
                    "agenda_type": "report",
                    "status": "received",
                    "line_start": 12,
                    "line_end": 80,
                    "speakers": ["위원장 김혜영", "기획조정실장"],
                    "attachments": []
                }
            ]
        }"#;

        let response: MappingResponse = serde_json::from_str(json).unwrap();

        assert_eq!(response.agenda_mapping.len(), 1);
        assert_eq!(response.agenda_mapping[0].agenda_type, AgendaType::Report);
        assert_eq!(response.agenda_mapping[0].line_start, 12);
        assert_eq!(response.agenda_mapping[0].speakers.len(), 2);
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let json = r#"{
            "meeting_info": {"title": "t"},
            "agenda_mapping": [
                {"agenda_title": "a", "line_start": 1, "line_end": 5}
            ]
        }"#;

        let response: MappingResponse = serde_json::from_str(json).unwrap();
        let mapping = &response.agenda_mapping[0];

        assert_eq!(mapping.agenda_type, AgendaType::Other);
        assert_eq!(mapping.status, STATUS_RECEIVED);
        assert!(mapping.speakers.is_empty());
        assert!(mapping.attachments.is_empty());
    }

    #[test]
    fn test_normalize_drops_urlless_attachments() {
        let json = r#"{
            "meeting_info": {"title": "t"},
            "agenda_mapping": [
                {
                    "agenda_title": "a",
                    "line_start": 1,
                    "line_end": 5,
                    "status": "",
                    "attachments": [
                        {"title": "kept", "download_url": "https://example.com/doc.pdf"},
                        {"title": "dropped", "download_url": ""},
                        {"title": "dropped too", "download_url": "doc.pdf"}
                    ]
                }
            ]
        }"#;

        let mut response: MappingResponse = serde_json::from_str(json).unwrap();
        response.normalize();

        let mapping = &response.agenda_mapping[0];
        assert_eq!(mapping.attachments.len(), 1);
        assert_eq!(mapping.attachments[0].title, "kept");
        assert_eq!(mapping.status, STATUS_RECEIVED);
    }

    #[test]
    fn test_agenda_type_roundtrip() {
        for value in [
            "legislation",
            "report",
            "budget",
            "consent",
            "procedural",
            "personnel",
            "discussion",
            "other",
        ] {
            assert_eq!(AgendaType::parse(value).as_str(), value);
        }
        assert_eq!(AgendaType::parse("unknown"), AgendaType::Other);
    }
}
