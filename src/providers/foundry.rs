use super::agent::{AgentProvider, AgentReply};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const RUN_POLL_ATTEMPTS: u32 = 60;
const RUN_POLL_INTERVAL_MS: u64 = 500;

/// Azure AI Foundry agent client (thread/run REST surface)
pub struct AzureFoundryAgent {
    endpoint: String,
    api_key: String,
    agent_id: String,
    api_version: String,
    client: reqwest::Client,
    thread_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunStatus {
    status: String,
    #[serde(default)]
    last_error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    data: Vec<ThreadMessage>,
}

#[derive(Debug, Deserialize)]
struct ThreadMessage {
    role: String,
    #[serde(default)]
    content: Vec<MessageContent>,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<MessageText>,
}

#[derive(Debug, Deserialize)]
struct MessageText {
    value: String,
}

impl AzureFoundryAgent {
    pub fn new(endpoint: String, api_key: String, agent_id: String, api_version: String) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            agent_id,
            api_version,
            client: reqwest::Client::new(),
            thread_id: None,
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}?api-version={}",
            self.endpoint, path, self.api_version
        )
    }

    async fn post_json(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        self.client
            .post(self.url(path))
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Foundry request failed: {}", path))?
            .error_for_status()
            .with_context(|| format!("Foundry returned error status: {}", path))
    }

    async fn get_json(&self, path: &str) -> Result<reqwest::Response> {
        self.client
            .get(self.url(path))
            .header("api-key", &self.api_key)
            .send()
            .await
            .with_context(|| format!("Foundry request failed: {}", path))?
            .error_for_status()
            .with_context(|| format!("Foundry returned error status: {}", path))
    }
}

#[async_trait::async_trait]
impl AgentProvider for AzureFoundryAgent {
    async fn connect(&mut self) -> Result<String> {
        if self.endpoint.is_empty() || self.api_key.trim().is_empty() {
            bail!("Azure Foundry endpoint/api key not configured");
        }
        if self.agent_id.trim().is_empty() {
            bail!("Azure Foundry agent id not configured");
        }

        let thread: CreatedObject = self
            .post_json("threads", serde_json::json!({}))
            .await?
            .json()
            .await
            .context("Failed to parse thread response")?;

        info!("Foundry thread created: {}", thread.id);
        self.thread_id = Some(thread.id.clone());

        Ok(thread.id)
    }

    async fn send_message(
        &mut self,
        text: &str,
        speaker: Option<&str>,
        context: Option<&str>,
    ) -> Result<AgentReply> {
        let thread_id = self
            .thread_id
            .clone()
            .context("Foundry thread not connected")?;

        let mut content = String::new();
        if let Some(speaker) = speaker {
            content.push_str(&format!("{} says: ", speaker));
        }
        content.push_str(text);
        if let Some(context) = context {
            content.push_str(&format!("\n\n(meeting context: {})", context));
        }

        self.post_json(
            &format!("threads/{}/messages", thread_id),
            serde_json::json!({ "role": "user", "content": content }),
        )
        .await?;

        let run: CreatedObject = self
            .post_json(
                &format!("threads/{}/runs", thread_id),
                serde_json::json!({ "assistant_id": self.agent_id }),
            )
            .await?
            .json()
            .await
            .context("Failed to parse run response")?;

        // Poll the run to completion, bounded
        let mut completed = false;
        for _ in 0..RUN_POLL_ATTEMPTS {
            tokio::time::sleep(Duration::from_millis(RUN_POLL_INTERVAL_MS)).await;

            let status: RunStatus = self
                .get_json(&format!("threads/{}/runs/{}", thread_id, run.id))
                .await?
                .json()
                .await
                .context("Failed to parse run status")?;

            match status.status.as_str() {
                "completed" => {
                    completed = true;
                    break;
                }
                "failed" | "cancelled" | "expired" => {
                    bail!("Foundry run {}: {:?}", status.status, status.last_error)
                }
                other => debug!("Foundry run status: {}", other),
            }
        }

        if !completed {
            warn!("Foundry run did not complete within poll window");
            bail!("Timed out waiting for agent reply");
        }

        let messages: MessageList = self
            .get_json(&format!("threads/{}/messages", thread_id))
            .await?
            .json()
            .await
            .context("Failed to parse message list")?;

        let reply = messages
            .data
            .into_iter()
            .find(|m| m.role == "assistant")
            .and_then(|m| {
                m.content
                    .into_iter()
                    .find(|c| c.content_type == "text")
                    .and_then(|c| c.text)
            })
            .map(|t| t.value)
            .context("Foundry run completed without an assistant message")?;

        Ok(AgentReply { text: reply })
    }

    fn is_connected(&self) -> bool {
        self.thread_id.is_some()
    }

    fn name(&self) -> &str {
        "azure-foundry"
    }
}
