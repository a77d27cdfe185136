//! Mention detection
//!
//! This module decides whether a piece of speech or chat text addresses the
//! agent by name:
//! - exact case-insensitive containment of the display name or a derived
//!   variation (first name, first + last initial, ...)
//! - fuzzy containment with a confidence score, for caption mis-hearings
//! - optional LLM-assisted hybrid check for ambiguous cases
//! - structured chat "@mention" markup extraction with plain-text fallback

mod detector;

pub use detector::{strip_html, MentionConfig, MentionDetector, MentionResult};
