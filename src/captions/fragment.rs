use serde::{Deserialize, Serialize};

/// A raw caption fragment as pushed by the meeting provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionFragment {
    /// Provider-assigned fragment id
    pub id: String,

    /// Speaker display name
    pub speaker: String,

    /// Provider participant id, when available
    #[serde(default)]
    pub speaker_id: Option<String>,

    /// Fragment text
    pub text: String,

    /// Arrival timestamp in milliseconds
    pub timestamp_ms: u64,

    /// Whether the provider marked this fragment final
    pub is_final: bool,
}

/// A finalized utterance built from one or more fragments of the same speaker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedCaption {
    /// Speaker display name
    pub speaker: String,

    /// Provider participant id, when available
    #[serde(default)]
    pub speaker_id: Option<String>,

    /// Whitespace-joined fragment texts in arrival order
    pub text: String,

    /// Source fragment ids in arrival order; never empty
    pub caption_ids: Vec<String>,

    /// Timestamp of the first fragment
    pub start_ms: u64,

    /// Timestamp of the last fragment
    pub end_ms: u64,
}

/// A fuzzily-suspected mention awaiting confirmation.
///
/// Expires after a bounded window, at which point the utterance is
/// force-processed as a real mention. The policy prefers a false-positive
/// response over silently losing a real mention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingMention {
    /// Speaker whose open utterance triggered the suspicion
    pub speaker: String,

    /// Utterance text at the time the mention was suspected
    pub caption_text: String,

    /// The name variation that fuzzily matched
    pub matched_variation: Option<String>,

    /// When the suspicion was armed, in milliseconds
    pub created_ms: u64,
}
