//! Response behavior policy
//!
//! Given a confirmed trigger (caption mention or chat mention) and a
//! generated reply, this module decides how the reply is delivered:
//! immediately, after human approval, or held behind a raised hand until
//! the meeting acknowledges it. It owns the pending-response queue and its
//! state transitions, the single in-flight processing guard, and the
//! error-signature screen that keeps backend errors from being spoken
//! aloud.

mod pattern;
mod pending;
mod processor;

pub use pattern::{
    BehaviorMode, BehaviorPattern, ControlledOptions, QueuedOptions, ResponseChannel,
    TriggerConfig,
};
pub use pending::{PendingResponse, ResponseStatus, TriggerSource};
pub use processor::{BehaviorProcessor, ProcessOutcome, ProcessorOptions};
