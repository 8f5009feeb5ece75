use serde::{Deserialize, Serialize};

/// Meeting-level metadata extracted alongside the agenda mapping
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeetingInfo {
    /// Meeting title, e.g. "제331회 본회의 제2차 (2024.09.10)"
    pub title: String,
    /// Canonical URL of the source transcript page
    #[serde(default)]
    pub meeting_url: String,
    /// Meeting date in YYYY.MM.DD form
    #[serde(default)]
    pub date: String,
}
