use crate::behavior::{BehaviorPattern, ProcessorOptions};
use crate::captions::AggregatorConfig;
use crate::intent::IntentConfig;
use crate::mention::MentionConfig;
use crate::providers::{AgentProviderConfig, LlmConfig, MeetingSource};
use crate::session::SessionConfig;
use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,

    /// Agent identity and mention-detection thresholds
    pub mention: MentionConfig,

    /// Where meeting events come from
    pub meeting: MeetingSource,

    /// Agent backend; when absent, triggers are ignored with a log entry
    #[serde(default)]
    pub agent_provider: Option<AgentProviderConfig>,

    /// Optional classification LLM (hybrid mention detection, intent)
    #[serde(default)]
    pub llm: Option<LlmConfig>,

    #[serde(default)]
    pub intent: IntentConfig,

    #[serde(default)]
    pub aggregator: AggregatorConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub behavior: BehaviorConfig,

    #[serde(default)]
    pub bridge: BridgeTunables,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

/// Active behavior pattern plus processor tunables
#[derive(Debug, Default, Deserialize)]
pub struct BehaviorConfig {
    #[serde(default)]
    pub pattern: BehaviorPattern,

    #[serde(default)]
    pub options: ProcessorOptions,
}

/// Orchestration-level tunables
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeTunables {
    /// Transcript de-duplication window
    #[serde(default = "default_dedup_window_ms")]
    pub dedup_window_ms: u64,

    /// Delay before the single agent reconnect attempt
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Event-loop timer resolution
    #[serde(default = "default_timer_tick_ms")]
    pub timer_tick_ms: u64,

    /// How many recent utterances are kept as LLM context
    #[serde(default = "default_recent_context_limit")]
    pub recent_context_limit: usize,
}

fn default_dedup_window_ms() -> u64 {
    2000
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_timer_tick_ms() -> u64 {
    500
}

fn default_recent_context_limit() -> usize {
    8
}

impl Default for BridgeTunables {
    fn default() -> Self {
        Self {
            dedup_window_ms: default_dedup_window_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            timer_tick_ms: default_timer_tick_ms(),
            recent_context_limit: default_recent_context_limit(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
