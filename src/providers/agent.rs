use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// A generated agent reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReply {
    pub text: String,
}

/// Backend that turns a trigger text into a reply
///
/// Implementations hold conversation state (conversation/thread id,
/// watermark), so callers share them behind a lock.
#[async_trait::async_trait]
pub trait AgentProvider: Send + Sync {
    /// Establish the conversation; returns the conversation id.
    /// Configuration problems (missing credentials) surface here, once.
    async fn connect(&mut self) -> Result<String>;

    /// Send a message and await the agent's reply
    async fn send_message(
        &mut self,
        text: &str,
        speaker: Option<&str>,
        context: Option<&str>,
    ) -> Result<AgentReply>;

    fn is_connected(&self) -> bool;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Shared handle to the connected agent backend
pub type SharedAgent = Arc<Mutex<Box<dyn AgentProvider>>>;

/// Agent backend selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AgentProviderConfig {
    /// Copilot Studio agent: exchanges the published token endpoint for a
    /// Direct Line token, then drives the Direct Line conversation
    CopilotStudio { token_endpoint: String },

    /// Direct Line with an anonymous secret
    CopilotStudioAnonymous { direct_line_secret: String },

    /// Azure AI Foundry agent (thread/run surface)
    AzureFoundry {
        endpoint: String,
        api_key: String,
        agent_id: String,
        #[serde(default = "default_foundry_api_version")]
        api_version: String,
    },
}

fn default_foundry_api_version() -> String {
    "2025-05-01".to_string()
}

/// Agent provider factory keyed on the tagged config union
pub struct AgentProviderFactory;

impl AgentProviderFactory {
    pub fn create(config: AgentProviderConfig) -> Box<dyn AgentProvider> {
        match config {
            AgentProviderConfig::CopilotStudio { token_endpoint } => {
                info!("Agent provider: Copilot Studio");
                Box::new(super::direct_line::DirectLineAgent::from_token_endpoint(
                    token_endpoint,
                ))
            }
            AgentProviderConfig::CopilotStudioAnonymous { direct_line_secret } => {
                info!("Agent provider: Copilot Studio (anonymous Direct Line)");
                Box::new(super::direct_line::DirectLineAgent::from_secret(
                    direct_line_secret,
                ))
            }
            AgentProviderConfig::AzureFoundry {
                endpoint,
                api_key,
                agent_id,
                api_version,
            } => {
                info!("Agent provider: Azure AI Foundry");
                Box::new(super::foundry::AzureFoundryAgent::new(
                    endpoint,
                    api_key,
                    agent_id,
                    api_version,
                ))
            }
        }
    }
}

/// Agent that always fails; stands in when no backend is configured so the
/// engine can still run caption/chat plumbing
pub struct DisconnectedAgent;

#[async_trait::async_trait]
impl AgentProvider for DisconnectedAgent {
    async fn connect(&mut self) -> Result<String> {
        bail!("no agent backend configured")
    }

    async fn send_message(
        &mut self,
        _text: &str,
        _speaker: Option<&str>,
        _context: Option<&str>,
    ) -> Result<AgentReply> {
        bail!("no agent backend configured")
    }

    fn is_connected(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "disconnected"
    }
}
