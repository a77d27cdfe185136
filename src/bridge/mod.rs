//! Bridge orchestration
//!
//! This module provides the `BridgeSession` composition root that manages:
//! - the meeting provider's event stream (captions, chat, hand state)
//! - caption aggregation and mention/intent dispatch
//! - conversational session tracking
//! - the behavior processor and delivery channels
//! - the de-duplicated conversation transcript
//! - reset on meeting identity changes

mod session;
mod transcript;

pub use session::{BridgeSession, BridgeStatus};
pub use transcript::{TranscriptEntry, TranscriptLog};
