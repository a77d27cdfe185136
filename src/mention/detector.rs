use crate::providers::LlmProcessor;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Configuration for mention detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentionConfig {
    /// Agent display name as configured in the meeting (e.g. "Jenny Smith")
    pub display_name: String,

    /// Additional operator-supplied name variations (nicknames, etc.)
    #[serde(default)]
    pub extra_variations: Vec<String>,

    /// Minimum fuzzy similarity that counts as a suspected mention
    #[serde(default = "default_fuzzy_floor")]
    pub fuzzy_confidence_floor: f32,

    /// Local confidence below which the hybrid path escalates to the LLM
    #[serde(default = "default_escalation_threshold")]
    pub hybrid_escalation_threshold: f32,
}

fn default_fuzzy_floor() -> f32 {
    0.75
}

fn default_escalation_threshold() -> f32 {
    0.85
}

impl Default for MentionConfig {
    fn default() -> Self {
        Self {
            display_name: "Agent".to_string(),
            extra_variations: Vec::new(),
            fuzzy_confidence_floor: default_fuzzy_floor(),
            hybrid_escalation_threshold: default_escalation_threshold(),
        }
    }
}

/// Result of a mention check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentionResult {
    /// Whether the text addresses the agent
    pub is_mentioned: bool,

    /// The name variation that matched, if any
    pub matched_variation: Option<String>,

    /// True when the match was fuzzy rather than exact containment
    pub fuzzy_match: bool,

    /// Confidence in [0, 1]; 1.0 for exact matches
    pub confidence: f32,
}

impl MentionResult {
    pub fn none(confidence: f32) -> Self {
        Self {
            is_mentioned: false,
            matched_variation: None,
            fuzzy_match: false,
            confidence,
        }
    }

    pub fn exact(variation: &str) -> Self {
        Self {
            is_mentioned: true,
            matched_variation: Some(variation.to_string()),
            fuzzy_match: false,
            confidence: 1.0,
        }
    }

    pub fn fuzzy(variation: &str, confidence: f32) -> Self {
        Self {
            is_mentioned: true,
            matched_variation: Some(variation.to_string()),
            fuzzy_match: true,
            confidence,
        }
    }
}

/// Detects references to the agent in captions and chat messages
pub struct MentionDetector {
    config: MentionConfig,
    /// Lowercased name variations, longest first
    variations: Vec<String>,
    llm: Option<Arc<dyn LlmProcessor>>,
    mention_span: Regex,
    html_tag: Regex,
}

impl MentionDetector {
    pub fn new(config: MentionConfig) -> Result<Self> {
        let variations = build_variations(&config.display_name, &config.extra_variations);

        // Teams-style structured mention markup in chat HTML
        let mention_span = Regex::new(
            r#"(?is)<span[^>]*itemtype="https?://schema\.skype\.com/Mention"[^>]*>(.*?)</span>"#,
        )
        .context("Invalid mention-span pattern")?;

        let html_tag = Regex::new(r"<[^>]+>").context("Invalid tag pattern")?;

        debug!(
            "Mention detector for '{}' with {} variations",
            config.display_name,
            variations.len()
        );

        Ok(Self {
            config,
            variations,
            llm: None,
            mention_span,
            html_tag,
        })
    }

    /// Attach an LLM processor enabling `detect_hybrid` escalation
    pub fn with_llm(mut self, llm: Arc<dyn LlmProcessor>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn display_name(&self) -> &str {
        &self.config.display_name
    }

    /// Local mention check: exact containment first, then fuzzy
    pub fn detect(&self, text: &str) -> MentionResult {
        let lower = text.to_lowercase();

        for variation in &self.variations {
            if lower.contains(variation.as_str()) {
                return MentionResult::exact(variation);
            }
        }

        let mut best_score = 0.0f32;
        let mut best_variation: Option<&str> = None;
        let words: Vec<&str> = lower.split_whitespace().collect();

        for variation in &self.variations {
            let span = variation.split_whitespace().count().max(1);
            if words.len() < span {
                continue;
            }
            for window in words.windows(span) {
                let candidate = window.join(" ");
                let score = similarity(&candidate, variation);
                if score > best_score {
                    best_score = score;
                    best_variation = Some(variation);
                }
            }
        }

        if best_score >= self.config.fuzzy_confidence_floor {
            if let Some(variation) = best_variation {
                return MentionResult::fuzzy(variation, best_score);
            }
        }

        MentionResult::none(best_score)
    }

    /// Mention check with LLM escalation for ambiguous local results.
    ///
    /// Exact matches short-circuit. When no LLM is configured, or the local
    /// result is already confident, the local result stands. LLM failures
    /// fall back to the local result.
    pub async fn detect_hybrid(&self, text: &str, recent_context: &[String]) -> MentionResult {
        let local = self.detect(text);

        if local.is_mentioned && !local.fuzzy_match {
            return local;
        }
        if local.is_mentioned && local.confidence >= self.config.hybrid_escalation_threshold {
            return local;
        }

        let Some(llm) = &self.llm else {
            return local;
        };

        match self.classify_with_llm(llm.as_ref(), text, recent_context).await {
            Ok(Some(result)) if result.confidence > local.confidence => result,
            Ok(_) => local,
            Err(e) => {
                warn!("LLM mention check failed, using local result: {}", e);
                local
            }
        }
    }

    /// Chat-message mention check. Extracts the platform's structured
    /// mention markup first, then falls back to plain-text matching on the
    /// tag-stripped content.
    pub fn detect_chat_mention(&self, html: &str) -> MentionResult {
        for capture in self.mention_span.captures_iter(html) {
            let mentioned = strip_inner(&capture[1]).to_lowercase();
            for variation in &self.variations {
                if mentioned == *variation || mentioned.contains(variation.as_str()) {
                    debug!("Structured chat mention matched '{}'", variation);
                    return MentionResult::exact(variation);
                }
            }
        }

        let plain = self.html_tag.replace_all(html, " ");
        self.detect(&plain)
    }

    async fn classify_with_llm(
        &self,
        llm: &dyn LlmProcessor,
        text: &str,
        recent_context: &[String],
    ) -> Result<Option<MentionResult>> {
        let system = format!(
            "You decide whether a meeting utterance is addressed to an AI assistant \
             named \"{}\". Captions may contain transcription errors, so a garbled \
             version of the name still counts. Reply with JSON only: \
             {{\"mentioned\": true|false, \"confidence\": 0.0-1.0}}",
            self.config.display_name
        );

        let context = if recent_context.is_empty() {
            "(none)".to_string()
        } else {
            recent_context.join("\n")
        };
        let user = format!("Recent captions:\n{}\n\nUtterance: {}", context, text);

        let reply = llm.complete(&system, &user).await?;
        let parsed: serde_json::Value =
            serde_json::from_str(extract_json(&reply)).context("LLM reply was not JSON")?;

        let mentioned = parsed["mentioned"].as_bool().unwrap_or(false);
        let confidence = parsed["confidence"].as_f64().unwrap_or(0.0) as f32;

        if mentioned {
            Ok(Some(MentionResult {
                is_mentioned: true,
                matched_variation: Some(self.config.display_name.to_lowercase()),
                fuzzy_match: true,
                confidence,
            }))
        } else {
            Ok(None)
        }
    }
}

/// Derive lowercase name variations from a display name:
/// full name, first name, "first + last initial", "first initial + last".
fn build_variations(display_name: &str, extra: &[String]) -> Vec<String> {
    let mut variations: Vec<String> = Vec::new();
    let full = display_name.trim().to_lowercase();
    if full.is_empty() {
        return variations;
    }

    variations.push(full.clone());

    let parts: Vec<&str> = full.split_whitespace().collect();
    if parts.len() >= 2 {
        let first = parts[0];
        let last = parts[parts.len() - 1];
        variations.push(first.to_string());
        if let Some(last_initial) = last.chars().next() {
            variations.push(format!("{} {}", first, last_initial));
        }
        if let Some(first_initial) = first.chars().next() {
            variations.push(format!("{} {}", first_initial, last));
        }
    }

    for v in extra {
        let v = v.trim().to_lowercase();
        if !v.is_empty() {
            variations.push(v);
        }
    }

    variations.sort();
    variations.dedup();
    // Longest first so the most specific variation is reported
    variations.sort_by_key(|v| std::cmp::Reverse(v.len()));
    variations
}

/// Normalized Levenshtein similarity in [0, 1]
fn similarity(a: &str, b: &str) -> f32 {
    if a == b {
        return 1.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f32 / max_len as f32
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            current[j + 1] = (prev[j + 1] + 1).min(current[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut current);
    }

    prev[b.len()]
}

/// Strip HTML tags, collapsing them to spaces
pub fn strip_html(html: &str) -> String {
    static TAG: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]+>").unwrap());
    let text = tag.replace_all(html, " ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_inner(fragment: &str) -> String {
    strip_html(fragment)
}

/// Pull the first JSON object out of an LLM reply that may wrap it in prose
/// or code fences
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

    fn detector(name: &str) -> MentionDetector {
        MentionDetector::new(MentionConfig {
            display_name: name.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_exact_mention_is_not_fuzzy() {
        let d = detector("Jenny");
        let result = d.detect("Hey Jenny, what's the weather?");

        assert!(result.is_mentioned);
        assert!(!result.fuzzy_match);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.matched_variation.as_deref(), Some("jenny"));
    }

    #[test]
    fn test_exact_mention_case_insensitive() {
        let d = detector("Jenny");
        assert!(d.detect("JENNY are you there").is_mentioned);
        assert!(d.detect("jenny?").is_mentioned);
    }

    #[test]
    fn test_full_name_variations() {
        let d = detector("Jenny Smith");
        assert!(d.detect("let's ask Jenny Smith").is_mentioned);
        assert!(d.detect("Jenny, can you help?").is_mentioned);
        // first + last initial
        assert!(d.detect("jenny s what do you think").is_mentioned);
    }

    #[test]
    fn test_no_mention() {
        let d = detector("Jenny");
        let result = d.detect("let's move on to the roadmap");
        assert!(!result.is_mentioned);
        assert!(result.matched_variation.is_none());
    }

    #[test]
    fn test_fuzzy_mention_from_caption_garble() {
        let d = detector("Jenny");
        // "Jenny" mis-heard as "Genny"
        let result = d.detect("hey genny can you summarize this");
        assert!(result.is_mentioned);
        assert!(result.fuzzy_match);
        assert!(result.confidence < 1.0);
        assert!(result.confidence >= 0.75);
    }

    #[test]
    fn test_fuzzy_rejects_unrelated_words() {
        let d = detector("Jenny");
        let result = d.detect("the quarterly budget looks fine");
        assert!(!result.is_mentioned);
    }

    #[test]
    fn test_chat_mention_structured_markup() {
        let d = detector("Jenny Smith");
        let html = r#"<p>Hi <span itemtype="http://schema.skype.com/Mention" itemid="0">Jenny Smith</span>, can you recap?</p>"#;
        let result = d.detect_chat_mention(html);

        assert!(result.is_mentioned);
        assert!(!result.fuzzy_match);
    }

    #[test]
    fn test_chat_mention_plain_text_fallback() {
        let d = detector("Jenny");
        let html = "<p>does <b>jenny</b> know the answer?</p>";
        assert!(d.detect_chat_mention(html).is_mentioned);
    }

    #[test]
    fn test_chat_no_mention() {
        let d = detector("Jenny");
        let html = r#"<p>Hi <span itemtype="http://schema.skype.com/Mention" itemid="0">Marco</span>!</p>"#;
        assert!(!d.detect_chat_mention(html).is_mentioned);
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(strip_html("<p>one <b>two</b></p>"), "one two");
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("jenny", "jenny"), 0);
        assert_eq!(levenshtein("jenny", "jennie"), 2);
        assert_eq!(levenshtein("", "abc"), 3);
    }

    #[tokio::test]
    async fn test_hybrid_without_llm_returns_local() {
        let d = detector("Jenny");
        let result = d.detect_hybrid("unrelated chatter", &[]).await;
        assert!(!result.is_mentioned);
    }
}
