use serde::{Deserialize, Serialize};

/// A bounded span of one speaker's continuous speech within an agenda unit.
/// Produced by the segmenter in transcript order; immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtteranceChunk {
    /// Speaker label, optionally with a role prefix ("위원장 김혜영")
    pub speaker: String,
    /// Title of the agenda unit this chunk belongs to
    pub agenda_title: String,
    /// Contiguous span of the speaker's words, length-bounded by the
    /// segmenter configuration except for a single oversized sentence
    pub text: String,
}
