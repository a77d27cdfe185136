use super::agent::{AgentProvider, AgentReply};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const DIRECT_LINE_BASE: &str = "https://directline.botframework.com/v3/directline";

/// How long to poll for the bot's reply before giving up
const REPLY_POLL_ATTEMPTS: u32 = 30;
const REPLY_POLL_INTERVAL_MS: u64 = 500;

/// The user id this bridge posts activities under
const BRIDGE_USER_ID: &str = "meeting-agent-bridge";

enum TokenSource {
    /// Copilot Studio publishes a token endpoint that returns a Direct
    /// Line token for the agent
    TokenEndpoint(String),
    /// Anonymous Direct Line secret used directly
    Secret(String),
}

/// Direct Line conversation client, backing both Copilot Studio variants
pub struct DirectLineAgent {
    source: TokenSource,
    client: reqwest::Client,
    token: Option<String>,
    conversation_id: Option<String>,
    watermark: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConversationResponse {
    conversation_id: String,
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActivitySet {
    #[serde(default)]
    activities: Vec<Activity>,
    #[serde(default)]
    watermark: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Activity {
    #[serde(rename = "type")]
    activity_type: String,
    #[serde(default)]
    from: Option<ActivityFrom>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActivityFrom {
    #[serde(default)]
    id: String,
}

impl DirectLineAgent {
    pub fn from_token_endpoint(token_endpoint: String) -> Self {
        Self {
            source: TokenSource::TokenEndpoint(token_endpoint),
            client: reqwest::Client::new(),
            token: None,
            conversation_id: None,
            watermark: None,
        }
    }

    pub fn from_secret(secret: String) -> Self {
        Self {
            source: TokenSource::Secret(secret),
            client: reqwest::Client::new(),
            token: None,
            conversation_id: None,
            watermark: None,
        }
    }

    async fn resolve_token(&self) -> Result<String> {
        match &self.source {
            TokenSource::TokenEndpoint(url) => {
                if url.trim().is_empty() {
                    bail!("Copilot Studio token endpoint is not configured");
                }
                let response: TokenResponse = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .context("Token endpoint request failed")?
                    .error_for_status()
                    .context("Token endpoint returned error status")?
                    .json()
                    .await
                    .context("Failed to parse token endpoint response")?;
                Ok(response.token)
            }
            TokenSource::Secret(secret) => {
                if secret.trim().is_empty() {
                    bail!("Direct Line secret is not configured");
                }
                Ok(secret.clone())
            }
        }
    }

    fn auth_token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .context("Direct Line conversation not connected")
    }
}

#[async_trait::async_trait]
impl AgentProvider for DirectLineAgent {
    async fn connect(&mut self) -> Result<String> {
        let token = self.resolve_token().await?;

        let conversation: ConversationResponse = self
            .client
            .post(format!("{}/conversations", DIRECT_LINE_BASE))
            .bearer_auth(&token)
            .send()
            .await
            .context("Failed to start Direct Line conversation")?
            .error_for_status()
            .context("Direct Line rejected conversation start")?
            .json()
            .await
            .context("Failed to parse Direct Line conversation response")?;

        info!(
            "Direct Line conversation started: {}",
            conversation.conversation_id
        );

        // Conversation-scoped token supersedes the start token when present
        self.token = Some(conversation.token.unwrap_or(token));
        self.conversation_id = Some(conversation.conversation_id.clone());
        self.watermark = None;

        Ok(conversation.conversation_id)
    }

    async fn send_message(
        &mut self,
        text: &str,
        speaker: Option<&str>,
        context: Option<&str>,
    ) -> Result<AgentReply> {
        let conversation_id = self
            .conversation_id
            .clone()
            .context("Direct Line conversation not connected")?;

        let mut activity = serde_json::json!({
            "type": "message",
            "from": { "id": BRIDGE_USER_ID, "name": speaker.unwrap_or("meeting participant") },
            "text": text,
        });
        if let Some(context) = context {
            activity["channelData"] = serde_json::json!({ "meetingContext": context });
        }

        self.client
            .post(format!(
                "{}/conversations/{}/activities",
                DIRECT_LINE_BASE, conversation_id
            ))
            .bearer_auth(self.auth_token()?)
            .json(&activity)
            .send()
            .await
            .context("Failed to post activity")?
            .error_for_status()
            .context("Direct Line rejected activity")?;

        // The bot replies asynchronously; poll the activity stream
        for _ in 0..REPLY_POLL_ATTEMPTS {
            tokio::time::sleep(Duration::from_millis(REPLY_POLL_INTERVAL_MS)).await;

            let mut url = format!(
                "{}/conversations/{}/activities",
                DIRECT_LINE_BASE, conversation_id
            );
            if let Some(watermark) = &self.watermark {
                url.push_str(&format!("?watermark={}", watermark));
            }

            let set: ActivitySet = self
                .client
                .get(&url)
                .bearer_auth(self.auth_token()?)
                .send()
                .await
                .context("Failed to poll activities")?
                .error_for_status()
                .context("Direct Line rejected activity poll")?
                .json()
                .await
                .context("Failed to parse activity set")?;

            if set.watermark.is_some() {
                self.watermark = set.watermark;
            }

            let reply = set
                .activities
                .into_iter()
                .filter(|a| a.activity_type == "message")
                .filter(|a| {
                    a.from
                        .as_ref()
                        .map(|f| f.id != BRIDGE_USER_ID)
                        .unwrap_or(false)
                })
                .filter_map(|a| a.text)
                .last();

            if let Some(text) = reply {
                debug!("Direct Line reply received ({} chars)", text.len());
                return Ok(AgentReply { text });
            }
        }

        warn!("No Direct Line reply within poll window");
        bail!("Timed out waiting for agent reply")
    }

    fn is_connected(&self) -> bool {
        self.conversation_id.is_some()
    }

    fn name(&self) -> &str {
        match self.source {
            TokenSource::TokenEndpoint(_) => "copilot-studio",
            TokenSource::Secret(_) => "copilot-studio-anonymous",
        }
    }
}
