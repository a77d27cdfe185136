// Shared mock providers for integration tests
#![allow(dead_code)]

use agent_bridge::providers::{
    AgentProvider, AgentReply, MeetingControl, MeetingEvent, MeetingProvider, SharedAgent,
    SpeechProvider,
};
use anyhow::{bail, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Speech provider that records what would have been spoken
#[derive(Default)]
pub struct MockSpeech {
    pub spoken: Mutex<Vec<String>>,
    pub stops: AtomicUsize,
    /// Simulated synthesis duration, for barge-in tests
    pub delay: Duration,
}

impl MockSpeech {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl SpeechProvider for MockSpeech {
    async fn speak(&self, text: &str) -> Result<bool> {
        self.spoken.lock().unwrap().push(text.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(true)
    }

    async fn stop(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Meeting control handle that records every command
#[derive(Default)]
pub struct MockControl {
    pub chat_messages: Mutex<Vec<String>>,
    pub raises: AtomicUsize,
    pub lowers: AtomicUsize,
    pub reactions: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl MeetingControl for MockControl {
    async fn raise_hand(&self) -> Result<()> {
        self.raises.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn lower_hand(&self) -> Result<()> {
        self.lowers.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send_chat_message(&self, text: &str) -> Result<()> {
        self.chat_messages.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn send_reaction(&self, reaction: &str) -> Result<()> {
        self.reactions.lock().unwrap().push(reaction.to_string());
        Ok(())
    }
}

/// Agent backend with a scripted reply and optional artificial latency
pub struct MockAgent {
    reply: String,
    delay: Duration,
    connected: AtomicBool,
    pub calls: Arc<AtomicUsize>,
}

impl MockAgent {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            delay: Duration::ZERO,
            connected: AtomicBool::new(false),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Handle to the call counter that survives moving the agent into the
    /// shared lock
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait::async_trait]
impl AgentProvider for MockAgent {
    async fn connect(&mut self) -> Result<String> {
        self.connected.store(true, Ordering::SeqCst);
        Ok("conv-test".to_string())
    }

    async fn send_message(
        &mut self,
        _text: &str,
        _speaker: Option<&str>,
        _context: Option<&str>,
    ) -> Result<AgentReply> {
        if !self.connected.load(Ordering::SeqCst) {
            bail!("not connected");
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AgentReply {
            text: self.reply.clone(),
        })
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Meeting provider driven by a channel the test holds the sender of
pub struct ChannelMeeting {
    rx: Option<mpsc::Receiver<MeetingEvent>>,
}

impl ChannelMeeting {
    pub fn new() -> (Self, mpsc::Sender<MeetingEvent>) {
        let (tx, rx) = mpsc::channel(64);
        (Self { rx: Some(rx) }, tx)
    }
}

#[async_trait::async_trait]
impl MeetingProvider for ChannelMeeting {
    async fn start(&mut self) -> Result<mpsc::Receiver<MeetingEvent>> {
        self.rx.take().ok_or_else(|| anyhow::anyhow!("already started"))
    }

    async fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "channel"
    }
}

/// Wrap an agent into the shared handle the engine expects
pub fn shared_agent(agent: MockAgent) -> SharedAgent {
    let boxed: Box<dyn AgentProvider> = Box::new(agent);
    Arc::new(tokio::sync::Mutex::new(boxed))
}

/// Connect a shared agent eagerly (tests that bypass BridgeSession::start)
pub async fn connect(agent: &SharedAgent) {
    agent.lock().await.connect().await.unwrap();
}
