use super::fragment::{AggregatedCaption, CaptionFragment, PendingMention};
use crate::mention::{MentionDetector, MentionResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Configuration for caption aggregation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Maximum silence between fragments of the same speaker before the
    /// utterance is considered complete
    #[serde(default = "default_speaker_gap_ms")]
    pub speaker_gap_ms: u64,

    /// How long a fuzzily-suspected mention may wait for confirmation
    /// before being force-processed as a real mention
    #[serde(default = "default_pending_mention_timeout_ms")]
    pub pending_mention_timeout_ms: u64,
}

fn default_speaker_gap_ms() -> u64 {
    1800
}

fn default_pending_mention_timeout_ms() -> u64 {
    4000
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            speaker_gap_ms: default_speaker_gap_ms(),
            pending_mention_timeout_ms: default_pending_mention_timeout_ms(),
        }
    }
}

/// Events produced by the aggregator
#[derive(Debug, Clone)]
pub enum AggregatorEvent {
    /// An utterance finalized normally (gap, speaker change, final flag or
    /// flush), with its locally-computed mention result
    Finalized {
        caption: AggregatedCaption,
        mention: MentionResult,
    },

    /// A suspected mention waited past its window; the utterance is
    /// force-finalized and must be treated as a confirmed mention
    ForcedMention {
        caption: AggregatedCaption,
        pending: PendingMention,
    },
}

/// In-progress utterance for one speaker
struct OpenAggregate {
    speaker: String,
    speaker_id: Option<String>,
    texts: Vec<String>,
    caption_ids: Vec<String>,
    start_ms: u64,
    last_ms: u64,
}

impl OpenAggregate {
    fn into_caption(self) -> AggregatedCaption {
        AggregatedCaption {
            speaker: self.speaker,
            speaker_id: self.speaker_id,
            text: self.texts.join(" "),
            caption_ids: self.caption_ids,
            start_ms: self.start_ms,
            end_ms: self.last_ms,
        }
    }
}

/// Merges caption fragments into utterances.
///
/// Purely event-driven, single-threaded reducer over a buffer map keyed by
/// speaker. The owner drives time-based behavior by calling `poll_timers`
/// with the current timestamp; `next_deadline_ms` reports the earliest
/// moment a call is needed.
pub struct CaptionAggregator {
    config: AggregatorConfig,
    detector: Arc<MentionDetector>,
    buffers: HashMap<String, OpenAggregate>,
    pending: HashMap<String, PendingMention>,
    last_speaker: Option<String>,
}

impl CaptionAggregator {
    pub fn new(config: AggregatorConfig, detector: Arc<MentionDetector>) -> Self {
        info!(
            "Caption aggregator initialized: gap={}ms, pending mention timeout={}ms",
            config.speaker_gap_ms, config.pending_mention_timeout_ms
        );

        Self {
            config,
            detector,
            buffers: HashMap::new(),
            pending: HashMap::new(),
            last_speaker: None,
        }
    }

    /// Feed one caption fragment. Returns any utterances finalized as a
    /// consequence (speaker change, gap exceeded, provider final flag).
    pub fn add_fragment(&mut self, fragment: CaptionFragment) -> Vec<AggregatorEvent> {
        let mut events = Vec::new();

        if fragment.text.trim().is_empty() {
            return events;
        }

        let is_final = fragment.is_final;
        let speaker = fragment.speaker.clone();

        // A fragment from a different speaker finalizes the previous
        // speaker's open utterance
        if let Some(last) = self.last_speaker.clone() {
            if last != speaker {
                if let Some(event) = self.finalize_speaker(&last) {
                    events.push(event);
                }
            }
        }

        // Gap exceeded within the same speaker: finalize and start fresh
        let gap_exceeded = self
            .buffers
            .get(&speaker)
            .map(|open| {
                fragment.timestamp_ms.saturating_sub(open.last_ms) > self.config.speaker_gap_ms
            })
            .unwrap_or(false);
        if gap_exceeded {
            if let Some(event) = self.finalize_speaker(&speaker) {
                events.push(event);
            }
        }

        match self.buffers.get_mut(&speaker) {
            Some(open) => {
                open.texts.push(fragment.text);
                open.caption_ids.push(fragment.id);
                open.last_ms = fragment.timestamp_ms;
                if open.speaker_id.is_none() {
                    open.speaker_id = fragment.speaker_id;
                }
            }
            None => {
                self.buffers.insert(
                    speaker.clone(),
                    OpenAggregate {
                        speaker: speaker.clone(),
                        speaker_id: fragment.speaker_id,
                        texts: vec![fragment.text],
                        caption_ids: vec![fragment.id],
                        start_ms: fragment.timestamp_ms,
                        last_ms: fragment.timestamp_ms,
                    },
                );
            }
        }

        self.last_speaker = Some(speaker.clone());

        if is_final {
            if let Some(event) = self.finalize_speaker(&speaker) {
                events.push(event);
            }
        } else {
            self.arm_pending_if_suspected(&speaker);
        }

        events
    }

    /// Fire time-based transitions: silence finalization and the
    /// pending-mention timeout
    pub fn poll_timers(&mut self, now_ms: u64) -> Vec<AggregatorEvent> {
        let mut events = Vec::new();

        // Expired pending mentions are force-processed, never dropped
        let expired: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, p)| {
                now_ms.saturating_sub(p.created_ms) >= self.config.pending_mention_timeout_ms
            })
            .map(|(speaker, _)| speaker.clone())
            .collect();

        for speaker in expired {
            let Some(pending) = self.pending.remove(&speaker) else {
                continue;
            };
            match self.buffers.remove(&speaker) {
                Some(open) => {
                    warn!(
                        "Pending mention timed out for {}; force-processing as confirmed",
                        speaker
                    );
                    events.push(AggregatorEvent::ForcedMention {
                        caption: open.into_caption(),
                        pending,
                    });
                }
                None => {
                    // Utterance already finalized through the normal path
                    debug!("Pending mention for {} resolved before timeout", speaker);
                }
            }
        }

        // Silence-based finalization
        let quiet: Vec<String> = self
            .buffers
            .iter()
            .filter(|(_, open)| now_ms.saturating_sub(open.last_ms) >= self.config.speaker_gap_ms)
            .map(|(speaker, _)| speaker.clone())
            .collect();

        for speaker in quiet {
            if let Some(event) = self.finalize_speaker(&speaker) {
                events.push(event);
            }
        }

        events
    }

    /// Earliest timestamp at which `poll_timers` has work to do
    pub fn next_deadline_ms(&self) -> Option<u64> {
        let gap_deadline = self
            .buffers
            .values()
            .map(|open| open.last_ms + self.config.speaker_gap_ms)
            .min();
        let pending_deadline = self
            .pending
            .values()
            .map(|p| p.created_ms + self.config.pending_mention_timeout_ms)
            .min();

        match (gap_deadline, pending_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }

    /// Finalize every open utterance
    pub fn flush(&mut self) -> Vec<AggregatorEvent> {
        let speakers: Vec<String> = self.buffers.keys().cloned().collect();
        let mut events = Vec::new();
        for speaker in speakers {
            if let Some(event) = self.finalize_speaker(&speaker) {
                events.push(event);
            }
        }
        events
    }

    /// Drop all state without emitting (meeting identity changed)
    pub fn reset(&mut self) {
        let dropped = self.buffers.len() + self.pending.len();
        if dropped > 0 {
            info!("Caption aggregator reset: {} buffered items dropped", dropped);
        }
        self.buffers.clear();
        self.pending.clear();
        self.last_speaker = None;
    }

    fn finalize_speaker(&mut self, speaker: &str) -> Option<AggregatorEvent> {
        let open = self.buffers.remove(speaker)?;
        self.pending.remove(speaker);

        let caption = open.into_caption();
        let mention = self.detector.detect(&caption.text);

        debug!(
            "Finalized utterance from {}: {} fragments, mentioned={}",
            caption.speaker,
            caption.caption_ids.len(),
            mention.is_mentioned
        );

        Some(AggregatorEvent::Finalized { caption, mention })
    }

    /// Arm a pending mention when the open utterance fuzzily matches but
    /// is not yet an exact mention
    fn arm_pending_if_suspected(&mut self, speaker: &str) {
        if self.pending.contains_key(speaker) {
            return;
        }
        let Some(open) = self.buffers.get(speaker) else {
            return;
        };

        let text = open.texts.join(" ");
        let result = self.detector.detect(&text);

        if result.is_mentioned && result.fuzzy_match {
            debug!(
                "Suspected mention from {} ({:?}, confidence {:.2}); arming timeout",
                speaker, result.matched_variation, result.confidence
            );
            self.pending.insert(
                speaker.to_string(),
                PendingMention {
                    speaker: speaker.to_string(),
                    caption_text: text,
                    matched_variation: result.matched_variation,
                    created_ms: open.last_ms,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mention::MentionConfig;

    fn aggregator() -> CaptionAggregator {
        let detector = Arc::new(
            MentionDetector::new(MentionConfig {
                display_name: "Jenny".to_string(),
                ..Default::default()
            })
            .unwrap(),
        );
        CaptionAggregator::new(AggregatorConfig::default(), detector)
    }

    fn frag(id: &str, speaker: &str, text: &str, ts: u64) -> CaptionFragment {
        CaptionFragment {
            id: id.to_string(),
            speaker: speaker.to_string(),
            speaker_id: None,
            text: text.to_string(),
            timestamp_ms: ts,
            is_final: false,
        }
    }

    fn texts(events: &[AggregatorEvent]) -> Vec<String> {
        events
            .iter()
            .map(|e| match e {
                AggregatorEvent::Finalized { caption, .. } => caption.text.clone(),
                AggregatorEvent::ForcedMention { caption, .. } => caption.text.clone(),
            })
            .collect()
    }

    #[test]
    fn test_fragments_join_with_whitespace_in_order() {
        let mut agg = aggregator();
        agg.add_fragment(frag("1", "Alex", "hey there", 0));
        agg.add_fragment(frag("2", "Alex", "how are", 500));
        agg.add_fragment(frag("3", "Alex", "you today", 1000));

        let events = agg.flush();
        assert_eq!(texts(&events), vec!["hey there how are you today"]);

        match &events[0] {
            AggregatorEvent::Finalized { caption, .. } => {
                assert_eq!(caption.caption_ids, vec!["1", "2", "3"]);
                assert_eq!(caption.start_ms, 0);
                assert_eq!(caption.end_ms, 1000);
            }
            _ => panic!("expected Finalized"),
        }
    }

    #[test]
    fn test_gap_exceeded_splits_utterances() {
        let mut agg = aggregator();
        agg.add_fragment(frag("1", "Alex", "first part", 0));
        let events = agg.add_fragment(frag("2", "Alex", "second part", 5000));

        assert_eq!(texts(&events), vec!["first part"]);
        assert_eq!(texts(&agg.flush()), vec!["second part"]);
    }

    #[test]
    fn test_speaker_change_finalizes_previous() {
        let mut agg = aggregator();
        agg.add_fragment(frag("1", "Alex", "my question is", 0));
        let events = agg.add_fragment(frag("2", "Priya", "let me interject", 200));

        assert_eq!(texts(&events), vec!["my question is"]);
    }

    #[test]
    fn test_final_flag_finalizes_immediately() {
        let mut agg = aggregator();
        let mut f = frag("1", "Alex", "that is everything", 0);
        f.is_final = true;

        let events = agg.add_fragment(f);
        assert_eq!(texts(&events), vec!["that is everything"]);
        assert!(agg.flush().is_empty());
    }

    #[test]
    fn test_aggregation_idempotence() {
        let run = || {
            let mut agg = aggregator();
            let mut out = Vec::new();
            out.extend(agg.add_fragment(frag("1", "Alex", "hello", 0)));
            out.extend(agg.add_fragment(frag("2", "Alex", "world", 400)));
            out.extend(agg.add_fragment(frag("3", "Alex", "again", 800)));
            out.extend(agg.flush());
            texts(&out)
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn test_mention_detected_on_finalize() {
        let mut agg = aggregator();
        agg.add_fragment(frag("1", "Alex", "hey jenny what's", 0));
        agg.add_fragment(frag("2", "Alex", "the weather", 300));

        let events = agg.flush();
        match &events[0] {
            AggregatorEvent::Finalized { mention, .. } => {
                assert!(mention.is_mentioned);
                assert!(!mention.fuzzy_match);
            }
            _ => panic!("expected Finalized"),
        }
    }

    #[test]
    fn test_pending_mention_force_processed_on_timeout() {
        let mut agg = aggregator();
        // Fuzzy garble of "jenny" arms a pending mention
        agg.add_fragment(frag("1", "Alex", "hey genny are you there", 0));
        assert!(agg.next_deadline_ms().is_some());

        // Timeout elapses with the utterance still open
        let events = agg.poll_timers(10_000);
        assert_eq!(events.len(), 1);
        match &events[0] {
            AggregatorEvent::ForcedMention { caption, pending } => {
                assert_eq!(caption.speaker, "Alex");
                assert_eq!(pending.speaker, "Alex");
                assert!(pending.matched_variation.is_some());
            }
            _ => panic!("expected ForcedMention"),
        }
    }

    #[test]
    fn test_pending_mention_cleared_by_normal_finalize() {
        let mut agg = aggregator();
        agg.add_fragment(frag("1", "Alex", "hey genny", 0));
        // Normal gap finalization happens before the pending timeout
        let events = agg.poll_timers(2000);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], AggregatorEvent::Finalized { .. }));

        // The resolved pending must not fire later
        assert!(agg.poll_timers(60_000).is_empty());
    }

    #[test]
    fn test_silence_finalizes_via_poll() {
        let mut agg = aggregator();
        agg.add_fragment(frag("1", "Alex", "short remark", 0));

        assert!(agg.poll_timers(1000).is_empty());
        let events = agg.poll_timers(2000);
        assert_eq!(texts(&events), vec!["short remark"]);
    }

    #[test]
    fn test_reset_drops_everything_silently() {
        let mut agg = aggregator();
        agg.add_fragment(frag("1", "Alex", "hey genny", 0));
        agg.reset();

        assert!(agg.flush().is_empty());
        assert!(agg.poll_timers(60_000).is_empty());
        assert!(agg.next_deadline_ms().is_none());
    }

    #[test]
    fn test_next_deadline_tracks_earliest() {
        let mut agg = aggregator();
        agg.add_fragment(frag("1", "Alex", "plain words", 1000));
        // Gap deadline only: 1000 + 1800
        assert_eq!(agg.next_deadline_ms(), Some(2800));
    }
}
