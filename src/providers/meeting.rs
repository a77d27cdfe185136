use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::captions::CaptionFragment;

/// A chat message as pushed by the meeting provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Provider-assigned message id
    pub id: String,

    /// Sender display name
    pub sender_display_name: String,

    /// Message body as HTML
    pub content_html: String,

    /// True when the message was sent by the agent itself
    #[serde(default)]
    pub is_own: bool,

    /// When the message was created
    pub created_on: DateTime<Utc>,
}

/// Events pushed by the meeting provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MeetingEvent {
    /// A live caption fragment
    Caption(CaptionFragment),

    /// A chat message
    Chat(ChatMessage),

    /// The agent's raised-hand state changed (host or self lowering)
    HandRaisedChanged { raised: bool },

    /// The active meeting identity changed (new URL / new tab); all
    /// engine state must be reset
    MeetingChanged { meeting_id: String },
}

/// Push-stream side of the meeting transport
///
/// Implementations wrap a concrete call transport. The crate ships a
/// replay implementation that reads a recorded event file, for testing and
/// batch processing.
#[async_trait::async_trait]
pub trait MeetingProvider: Send + Sync {
    /// Start consuming the meeting; returns the event stream
    async fn start(&mut self) -> Result<mpsc::Receiver<MeetingEvent>>;

    /// Stop consuming; the event stream closes
    async fn stop(&mut self) -> Result<()>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Command side of the meeting transport, shareable across components
#[async_trait::async_trait]
pub trait MeetingControl: Send + Sync {
    async fn raise_hand(&self) -> Result<()>;

    async fn lower_hand(&self) -> Result<()>;

    async fn send_chat_message(&self, text: &str) -> Result<()>;

    async fn send_reaction(&self, reaction: &str) -> Result<()>;
}

/// Meeting transport selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "kebab-case")]
pub enum MeetingSource {
    /// Replay a recorded event file (JSON lines of `MeetingEvent`, each
    /// optionally wrapped with a `delay_ms`)
    Replay { path: PathBuf },
}

/// Meeting provider factory
pub struct MeetingProviderFactory;

impl MeetingProviderFactory {
    pub fn create(source: MeetingSource) -> Result<(Box<dyn MeetingProvider>, Arc<dyn MeetingControl>)> {
        match source {
            MeetingSource::Replay { path } => {
                let provider = ReplayMeetingProvider::new(path);
                let control: Arc<dyn MeetingControl> = Arc::new(LoggingMeetingControl);
                Ok((Box::new(provider), control))
            }
        }
    }
}

/// One line of a replay file
#[derive(Debug, Deserialize)]
struct ReplayLine {
    /// Pause before delivering this event
    #[serde(default)]
    delay_ms: u64,

    #[serde(flatten)]
    event: MeetingEvent,
}

/// Replays meeting events from a recorded JSON-lines file
pub struct ReplayMeetingProvider {
    path: PathBuf,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl ReplayMeetingProvider {
    pub fn new(path: PathBuf) -> Self {
        Self { path, task: None }
    }
}

#[async_trait::async_trait]
impl MeetingProvider for ReplayMeetingProvider {
    async fn start(&mut self) -> Result<mpsc::Receiver<MeetingEvent>> {
        let file = tokio::fs::File::open(&self.path)
            .await
            .with_context(|| format!("Failed to open replay file: {}", self.path.display()))?;

        info!("Replaying meeting events from {}", self.path.display());

        let (tx, rx) = mpsc::channel(64);

        let task = tokio::spawn(async move {
            let mut lines = BufReader::new(file).lines();

            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Replay read error: {}", e);
                        break;
                    }
                };

                if line.trim().is_empty() {
                    continue;
                }

                let parsed: ReplayLine = match serde_json::from_str(&line) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        warn!("Skipping malformed replay line: {}", e);
                        continue;
                    }
                };

                if parsed.delay_ms > 0 {
                    tokio::time::sleep(std::time::Duration::from_millis(parsed.delay_ms)).await;
                }

                if tx.send(parsed.event).await.is_err() {
                    break;
                }
            }

            info!("Replay complete");
        });

        self.task = Some(task);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "replay"
    }
}

/// Control handle that only logs; used with the replay provider and in
/// headless runs without a real transport
pub struct LoggingMeetingControl;

#[async_trait::async_trait]
impl MeetingControl for LoggingMeetingControl {
    async fn raise_hand(&self) -> Result<()> {
        info!("raise_hand requested");
        Ok(())
    }

    async fn lower_hand(&self) -> Result<()> {
        info!("lower_hand requested");
        Ok(())
    }

    async fn send_chat_message(&self, text: &str) -> Result<()> {
        info!("chat message out: {}", text);
        Ok(())
    }

    async fn send_reaction(&self, reaction: &str) -> Result<()> {
        info!("reaction out: {}", reaction);
        Ok(())
    }
}
