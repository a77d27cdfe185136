//! Intent classification
//!
//! Decides whether the agent should respond to an utterance that did not
//! explicitly mention it (continuation of an active conversation) and
//! whether the utterance signals end-of-conversation. Rules-based
//! heuristics always run; an optional LLM classifier refines the decision
//! and degrades back to the rules on any failure.

mod classifier;

pub use classifier::{IntentClassifier, IntentConfig, IntentContext, IntentDecision};
