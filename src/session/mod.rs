//! Conversational session tracking
//!
//! A session is the bounded window during which the agent is "in
//! conversation" with one specific speaker. At most one session is active
//! at a time; it ends on explicit farewell, idle timeout, or manual
//! termination.

mod tracker;

pub use tracker::{SessionConfig, SessionSnapshot, SessionTracker};
