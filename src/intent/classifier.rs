use crate::providers::LlmProcessor;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Configuration for intent classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentConfig {
    /// Minimum classifier confidence required to respond without an
    /// explicit mention
    #[serde(default = "default_autonomous_threshold")]
    pub autonomous_response_threshold: f32,

    /// How many recent utterances are passed to the LLM classifier
    #[serde(default = "default_context_size")]
    pub recent_context_size: usize,
}

fn default_autonomous_threshold() -> f32 {
    0.7
}

fn default_context_size() -> usize {
    5
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            autonomous_response_threshold: default_autonomous_threshold(),
            recent_context_size: default_context_size(),
        }
    }
}

/// Conversational state the classifier needs
#[derive(Debug, Clone)]
pub struct IntentContext<'a> {
    pub agent_name: &'a str,
    pub session_active: bool,
    pub session_speaker: Option<&'a str>,
    pub recent_captions: &'a [String],
}

/// Classification outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentDecision {
    pub should_respond: bool,
    pub confidence: f32,
    pub reason: String,
    pub is_end_of_conversation: bool,
}

impl IntentDecision {
    fn silent(reason: &str) -> Self {
        Self {
            should_respond: false,
            confidence: 0.0,
            reason: reason.to_string(),
            is_end_of_conversation: false,
        }
    }
}

const FAREWELL_PHRASES: &[&str] = &[
    "thanks, that's all",
    "that's all i needed",
    "that is all i needed",
    "that's everything",
    "thank you, bye",
    "thanks for the help",
    "goodbye",
    "see you later",
    "that helps, thanks",
    "no more questions",
];

const FAREWELL_WORDS: &[&str] = &["thanks", "thank you", "bye"];

const QUESTION_LEADS: &[&str] = &[
    "what", "why", "how", "when", "where", "who", "which", "can", "could", "would", "will", "is",
    "are", "do", "does", "did", "should",
];

const IMPERATIVE_LEADS: &[&str] = &["please", "tell", "show", "explain", "give", "summarize", "list"];

/// Decides whether the agent should respond without an explicit mention
pub struct IntentClassifier {
    config: IntentConfig,
    llm: Option<Arc<dyn LlmProcessor>>,
}

impl IntentClassifier {
    pub fn new(config: IntentConfig) -> Self {
        Self { config, llm: None }
    }

    /// Attach an LLM processor; rules remain the fallback
    pub fn with_llm(mut self, llm: Arc<dyn LlmProcessor>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn autonomous_threshold(&self) -> f32 {
        self.config.autonomous_response_threshold
    }

    /// Classify an utterance (or chat message, identically) against the
    /// current conversational state.
    pub async fn should_respond_to(
        &self,
        text: &str,
        speaker: &str,
        ctx: IntentContext<'_>,
    ) -> IntentDecision {
        let rules = self.classify_rules(text, speaker, &ctx);

        let Some(llm) = &self.llm else {
            return rules;
        };

        // End-of-conversation from rules is reliable enough to skip a call
        if rules.is_end_of_conversation {
            return rules;
        }

        match self.classify_with_llm(llm.as_ref(), text, speaker, &ctx).await {
            Ok(mut decision) => {
                // Autonomous responses require high confidence to avoid
                // answering unrelated cross-talk
                if decision.should_respond
                    && decision.confidence < self.config.autonomous_response_threshold
                {
                    debug!(
                        "Classifier confidence {:.2} below threshold {:.2}; staying silent",
                        decision.confidence, self.config.autonomous_response_threshold
                    );
                    decision.should_respond = false;
                    decision.reason =
                        format!("below confidence threshold: {}", decision.reason);
                }
                decision
            }
            Err(e) => {
                warn!("Intent classifier failed, using rules fallback: {}", e);
                rules
            }
        }
    }

    fn classify_rules(&self, text: &str, speaker: &str, ctx: &IntentContext<'_>) -> IntentDecision {
        let lower = text.to_lowercase();
        let trimmed = lower.trim();

        let in_session_with_speaker =
            ctx.session_active && ctx.session_speaker == Some(speaker);

        if in_session_with_speaker && is_farewell(trimmed) {
            return IntentDecision {
                should_respond: false,
                confidence: 0.9,
                reason: "farewell detected".to_string(),
                is_end_of_conversation: true,
            };
        }

        if !in_session_with_speaker {
            // Without a session, responding is the mention path's job
            return IntentDecision::silent("no active session with speaker");
        }

        let first_word = trimmed.split_whitespace().next().unwrap_or("");
        let looks_like_question = trimmed.ends_with('?')
            || QUESTION_LEADS.contains(&first_word)
            || IMPERATIVE_LEADS.contains(&first_word);

        if looks_like_question {
            return IntentDecision {
                should_respond: true,
                confidence: 0.75,
                reason: "follow-up question in active session".to_string(),
                is_end_of_conversation: false,
            };
        }

        IntentDecision::silent("no follow-up signal")
    }

    async fn classify_with_llm(
        &self,
        llm: &dyn LlmProcessor,
        text: &str,
        speaker: &str,
        ctx: &IntentContext<'_>,
    ) -> Result<IntentDecision> {
        let system = format!(
            "You observe a meeting where an AI assistant named \"{}\" is {}. \
             Decide whether the latest utterance is directed at the assistant and \
             whether it ends the conversation (thanks/goodbye). Reply with JSON only: \
             {{\"should_respond\": bool, \"confidence\": 0.0-1.0, \
             \"reason\": string, \"is_end_of_conversation\": bool}}",
            ctx.agent_name,
            if ctx.session_active {
                "in an active conversation"
            } else {
                "not currently in a conversation"
            },
        );

        let recent: Vec<&str> = ctx
            .recent_captions
            .iter()
            .rev()
            .take(self.config.recent_context_size)
            .rev()
            .map(|s| s.as_str())
            .collect();

        let user = format!(
            "Recent utterances:\n{}\n\nConversation partner: {:?}\nLatest, from {}: {}",
            if recent.is_empty() {
                "(none)".to_string()
            } else {
                recent.join("\n")
            },
            ctx.session_speaker,
            speaker,
            text
        );

        let reply = llm.complete(&system, &user).await?;
        let parsed: serde_json::Value = serde_json::from_str(extract_json(&reply))
            .context("Classifier reply was not JSON")?;

        Ok(IntentDecision {
            should_respond: parsed["should_respond"].as_bool().unwrap_or(false),
            confidence: parsed["confidence"].as_f64().unwrap_or(0.0) as f32,
            reason: parsed["reason"].as_str().unwrap_or("classifier").to_string(),
            is_end_of_conversation: parsed["is_end_of_conversation"].as_bool().unwrap_or(false),
        })
    }
}

fn is_farewell(text: &str) -> bool {
    if FAREWELL_PHRASES.iter().any(|p| text.contains(p)) {
        return true;
    }

    // A short utterance that is mostly a thanks/bye also counts
    let word_count = text.split_whitespace().count();
    word_count <= 6 && FAREWELL_WORDS.iter().any(|w| text.contains(w))
}

fn extract_json(reply: &str) -> &str {
    let start = reply.find('{');
    let end = reply.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if e > s => &reply[s..=e],
        _ => reply,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_active<'a>(speaker: &'a str, recent: &'a [String]) -> IntentContext<'a> {
        IntentContext {
            agent_name: "Jenny",
            session_active: true,
            session_speaker: Some(speaker),
            recent_captions: recent,
        }
    }

    #[tokio::test]
    async fn test_farewell_ends_conversation() {
        let classifier = IntentClassifier::new(IntentConfig::default());
        let decision = classifier
            .should_respond_to("Thanks, that's all I needed", "Alex", ctx_active("Alex", &[]))
            .await;

        assert!(decision.is_end_of_conversation);
        assert!(!decision.should_respond);
    }

    #[tokio::test]
    async fn test_short_thanks_is_farewell() {
        let classifier = IntentClassifier::new(IntentConfig::default());
        let decision = classifier
            .should_respond_to("ok thanks a lot", "Alex", ctx_active("Alex", &[]))
            .await;

        assert!(decision.is_end_of_conversation);
    }

    #[tokio::test]
    async fn test_follow_up_question_in_session() {
        let classifier = IntentClassifier::new(IntentConfig::default());
        let decision = classifier
            .should_respond_to("what about tomorrow?", "Alex", ctx_active("Alex", &[]))
            .await;

        assert!(decision.should_respond);
        assert!(!decision.is_end_of_conversation);
        assert!(decision.confidence >= 0.7);
    }

    #[tokio::test]
    async fn test_question_from_other_speaker_stays_silent() {
        let classifier = IntentClassifier::new(IntentConfig::default());
        let decision = classifier
            .should_respond_to("what about tomorrow?", "Priya", ctx_active("Alex", &[]))
            .await;

        assert!(!decision.should_respond);
    }

    #[tokio::test]
    async fn test_statement_in_session_stays_silent() {
        let classifier = IntentClassifier::new(IntentConfig::default());
        let decision = classifier
            .should_respond_to("we shipped the release yesterday", "Alex", ctx_active("Alex", &[]))
            .await;

        assert!(!decision.should_respond);
        assert!(!decision.is_end_of_conversation);
    }

    #[tokio::test]
    async fn test_no_session_stays_silent() {
        let classifier = IntentClassifier::new(IntentConfig::default());
        let decision = classifier
            .should_respond_to(
                "how does this work?",
                "Alex",
                IntentContext {
                    agent_name: "Jenny",
                    session_active: false,
                    session_speaker: None,
                    recent_captions: &[],
                },
            )
            .await;

        assert!(!decision.should_respond);
    }
}
