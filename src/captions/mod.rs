//! Caption aggregation
//!
//! Live captions arrive as short per-speaker fragments. This module merges
//! them into complete utterances using a silence/gap window, runs mention
//! detection at finalization, and arms a pending-mention deadline so a
//! fuzzily-suspected mention in a still-open utterance is force-processed
//! rather than silently dropped.

mod aggregator;
mod fragment;

pub use aggregator::{AggregatorConfig, AggregatorEvent, CaptionAggregator};
pub use fragment::{AggregatedCaption, CaptionFragment, PendingMention};
