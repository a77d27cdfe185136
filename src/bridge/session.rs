use super::transcript::TranscriptLog;
use crate::analytics::{CallAnalytics, CallSummary};
use crate::behavior::{BehaviorProcessor, PendingResponse, ProcessOutcome};
use crate::captions::{AggregatedCaption, AggregatorConfig, AggregatorEvent, CaptionAggregator};
use crate::config::{BridgeTunables, Config};
use crate::intent::{IntentClassifier, IntentContext};
use crate::mention::{strip_html, MentionDetector, MentionResult};
use crate::providers::{
    ChatMessage, LlmProcessor, MeetingControl, MeetingEvent, MeetingProvider, SharedAgent,
    SpeechProvider,
};
use crate::session::SessionTracker;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Snapshot of the bridge for status endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeStatus {
    pub meeting_id: String,
    pub running: bool,
    pub agent_connected: bool,
    pub session: crate::session::SessionSnapshot,
    pub pending_responses: usize,
    pub transcript_entries: usize,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
}

/// The classification-and-response pipeline behind the event loop.
///
/// Each finalized utterance or chat message runs through this in its own
/// task: (hybrid) mention detection, then either the trigger path or the
/// intent path. The event loop never awaits this work, so captions keep
/// flowing (enabling barge-in) while the behavior processor's in-flight
/// guard drops overlapping triggers.
struct Pipeline {
    detector: Arc<MentionDetector>,
    intent: Arc<IntentClassifier>,
    processor: Arc<BehaviorProcessor>,
    tracker: Arc<Mutex<SessionTracker>>,
}

impl Pipeline {
    /// Classify a finalized utterance and respond when warranted
    async fn process_utterance(
        &self,
        caption: AggregatedCaption,
        mention: MentionResult,
        context: Vec<String>,
    ) {
        let mention = if mention.is_mentioned && !mention.fuzzy_match {
            mention
        } else {
            self.detector.detect_hybrid(&caption.text, &context).await
        };

        if mention.is_mentioned {
            debug!(
                "Confirmed mention from {} ({:?}, fuzzy={})",
                caption.speaker, mention.matched_variation, mention.fuzzy_match
            );
            self.process_trigger(
                &caption.speaker,
                &caption.text,
                caption.speaker_id.as_deref(),
                None,
            )
            .await;
        } else {
            self.process_intent(&caption.speaker, &caption.text, &context, None)
                .await;
        }
    }

    /// Classify a chat message and respond when warranted
    async fn process_chat_message(&self, message: ChatMessage, text: String, context: Vec<String>) {
        let mention = self.detector.detect_chat_mention(&message.content_html);

        if mention.is_mentioned {
            debug!(
                "Chat mention from {} ({:?})",
                message.sender_display_name, mention.matched_variation
            );
            let speaker = message.sender_display_name.clone();
            self.process_trigger(&speaker, &text, None, Some(&message))
                .await;
        } else {
            let speaker = message.sender_display_name.clone();
            self.process_intent(&speaker, &text, &context, Some(&message))
                .await;
        }
    }

    /// Process a confirmed trigger: take over the session (explicit
    /// mention overrides passive continuation) and hand off to the
    /// behavior processor
    async fn process_trigger(
        &self,
        speaker: &str,
        text: &str,
        speaker_id: Option<&str>,
        chat: Option<&ChatMessage>,
    ) {
        let now = wall_ms();
        {
            let mut tracker = self.tracker.lock().await;
            if tracker.is_active() && !tracker.is_with(speaker) {
                tracker.end_session();
            }
            tracker.start_session(speaker, now);
            tracker.touch(now);
        }

        let outcome = match chat {
            Some(message) => self.processor.process_chat_mention(message).await,
            None => {
                self.processor
                    .process_caption_mention(speaker, text, speaker_id)
                    .await
            }
        };

        match outcome {
            Ok(ProcessOutcome::Delivered) => {
                self.tracker.lock().await.mark_response(wall_ms());
            }
            Ok(outcome) => debug!("Trigger outcome: {:?}", outcome),
            Err(e) => error!("Trigger processing failed: {:#}", e),
        }
    }

    /// No explicit mention: consult the intent classifier for follow-up
    /// or end-of-conversation handling within the active session
    async fn process_intent(
        &self,
        speaker: &str,
        text: &str,
        context: &[String],
        chat: Option<&ChatMessage>,
    ) {
        let (session_active, session_speaker) = {
            let tracker = self.tracker.lock().await;
            (tracker.is_active(), tracker.speaker().map(String::from))
        };

        if !session_active {
            return;
        }

        let ctx = IntentContext {
            agent_name: self.detector.display_name(),
            session_active,
            session_speaker: session_speaker.as_deref(),
            recent_captions: context,
        };

        let decision = self.intent.should_respond_to(text, speaker, ctx).await;

        if decision.is_end_of_conversation {
            let with_speaker = { self.tracker.lock().await.is_with(speaker) };
            if with_speaker {
                info!("End of conversation: {}", decision.reason);
                self.processor.deliver_closing_reply().await;
                self.tracker.lock().await.end_session();
            }
            return;
        }

        if decision.should_respond && decision.confidence >= self.intent.autonomous_threshold() {
            let with_speaker = { self.tracker.lock().await.is_with(speaker) };
            if !with_speaker {
                return;
            }

            info!("Responding to follow-up: {}", decision.reason);
            self.tracker.lock().await.touch(wall_ms());

            let outcome = match chat {
                Some(message) => self.processor.process_chat_mention(message).await,
                None => {
                    self.processor
                        .process_caption_mention(speaker, text, None)
                        .await
                }
            };

            match outcome {
                Ok(ProcessOutcome::Delivered) => {
                    self.tracker.lock().await.mark_response(wall_ms());
                }
                Ok(outcome) => debug!("Follow-up outcome: {:?}", outcome),
                Err(e) => error!("Follow-up processing failed: {:#}", e),
            }
        }
    }

    /// Reconcile the raised-hand state; held responses deliver on lowering
    async fn on_hand_state(&self, raised: bool) {
        match self.processor.on_hand_raised_state_changed(raised).await {
            Ok(delivered) if delivered > 0 => {
                self.tracker.lock().await.mark_response(wall_ms());
            }
            Ok(_) => {}
            Err(e) => error!("Hand-state reconciliation failed: {:#}", e),
        }
    }
}

/// Owns the per-meeting event loop state (aggregator buffers, recent
/// utterances, meeting identity) and pumps the meeting event stream
struct EventLoop {
    running: Arc<AtomicBool>,
    pipeline: Arc<Pipeline>,
    transcript: Arc<TranscriptLog>,
    analytics: Arc<CallAnalytics>,
    speech: Arc<dyn SpeechProvider>,
    meeting_identity: Arc<Mutex<String>>,
    tunables: BridgeTunables,
    aggregator: CaptionAggregator,
    recent: VecDeque<String>,
}

impl EventLoop {
    async fn run(mut self, mut rx: mpsc::Receiver<MeetingEvent>) {
        info!("Bridge event loop started");

        let tick = Duration::from_millis(self.tunables.timer_tick_ms);

        loop {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            tokio::select! {
                maybe_event = rx.recv() => {
                    match maybe_event {
                        Some(event) => self.handle_event(event).await,
                        None => {
                            info!("Meeting event stream closed");
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep(tick) => {
                    let now = wall_ms();
                    for event in self.aggregator.poll_timers(now) {
                        self.dispatch_aggregator_event(event).await;
                    }
                    if self.pipeline.tracker.lock().await.check_idle(now) {
                        debug!("Session ended by idle timeout");
                    }
                    self.pipeline.processor.dismiss_stale().await;
                }
            }
        }

        // Trailing utterances still land in the transcript
        for event in self.aggregator.flush() {
            self.dispatch_aggregator_event(event).await;
        }

        info!("Bridge event loop stopped");
    }

    async fn handle_event(&mut self, event: MeetingEvent) {
        match event {
            MeetingEvent::Caption(fragment) => {
                // Barge-in: a caption from someone other than the current
                // conversation partner interrupts in-progress speech
                if self.pipeline.processor.is_speaking() {
                    let other_speaker =
                        !self.pipeline.tracker.lock().await.is_with(&fragment.speaker);
                    if other_speaker {
                        info!("Barge-in from {}; stopping speech", fragment.speaker);
                        if let Err(e) = self.speech.stop().await {
                            warn!("Failed to stop speech: {:#}", e);
                        }
                    }
                }

                for event in self.aggregator.add_fragment(fragment) {
                    self.dispatch_aggregator_event(event).await;
                }
            }
            MeetingEvent::Chat(message) => {
                self.handle_chat(message).await;
            }
            MeetingEvent::HandRaisedChanged { raised } => {
                let pipeline = Arc::clone(&self.pipeline);
                tokio::spawn(async move {
                    pipeline.on_hand_state(raised).await;
                });
            }
            MeetingEvent::MeetingChanged { meeting_id } => {
                self.reset_for_meeting(&meeting_id).await;
            }
        }
    }

    /// Reset every component when the active meeting identity changes so
    /// no state leaks across meetings
    async fn reset_for_meeting(&mut self, meeting_id: &str) {
        {
            let mut identity = self.meeting_identity.lock().await;
            if *identity == meeting_id {
                return;
            }
            info!("Meeting changed: {} -> {}", identity, meeting_id);
            *identity = meeting_id.to_string();
        }

        self.aggregator.reset();
        self.recent.clear();
        self.pipeline.tracker.lock().await.end_session();
        self.pipeline.processor.reset().await;
        self.transcript.clear().await;
        self.analytics.reset().await;
    }

    /// Dedup, record and dispatch one finalized utterance. The transcript
    /// write happens here so duplicate suppression is ordered;
    /// classification and response work runs in its own task.
    async fn dispatch_aggregator_event(&mut self, event: AggregatorEvent) {
        match event {
            AggregatorEvent::Finalized { caption, mention } => {
                if !self
                    .transcript
                    .add("user", &caption.speaker, &caption.text)
                    .await
                {
                    // Same logical utterance delivered twice upstream
                    return;
                }
                self.push_recent(&caption.speaker, &caption.text);

                let context: Vec<String> = self.recent.iter().cloned().collect();
                let pipeline = Arc::clone(&self.pipeline);
                tokio::spawn(async move {
                    pipeline.process_utterance(caption, mention, context).await;
                });
            }
            AggregatorEvent::ForcedMention { caption, pending } => {
                info!(
                    "Processing timed-out pending mention from {} ({:?})",
                    caption.speaker, pending.matched_variation
                );
                if !self
                    .transcript
                    .add("user", &caption.speaker, &caption.text)
                    .await
                {
                    return;
                }
                self.push_recent(&caption.speaker, &caption.text);

                let pipeline = Arc::clone(&self.pipeline);
                tokio::spawn(async move {
                    pipeline
                        .process_trigger(
                            &caption.speaker,
                            &caption.text,
                            caption.speaker_id.as_deref(),
                            None,
                        )
                        .await;
                });
            }
        }
    }

    async fn handle_chat(&mut self, message: ChatMessage) {
        if message.is_own {
            return;
        }

        let text = strip_html(&message.content_html);
        if text.is_empty() {
            return;
        }

        if !self
            .transcript
            .add("user", &message.sender_display_name, &text)
            .await
        {
            return;
        }
        self.push_recent(&message.sender_display_name, &text);

        let context: Vec<String> = self.recent.iter().cloned().collect();
        let pipeline = Arc::clone(&self.pipeline);
        tokio::spawn(async move {
            pipeline.process_chat_message(message, text, context).await;
        });
    }

    fn push_recent(&mut self, speaker: &str, text: &str) {
        self.recent.push_back(format!("{}: {}", speaker, text));
        while self.recent.len() > self.tunables.recent_context_limit {
            self.recent.pop_front();
        }
    }
}

/// The composition root for one meeting.
///
/// Wires the meeting event stream into aggregation, mention detection,
/// intent classification, session tracking and the behavior processor.
/// Constructed per meeting; `start` spawns the event-loop task and `stop`
/// joins it.
pub struct BridgeSession {
    started_at: DateTime<Utc>,
    running: Arc<AtomicBool>,

    pipeline: Arc<Pipeline>,
    analytics: Arc<CallAnalytics>,
    transcript: Arc<TranscriptLog>,

    agent: SharedAgent,
    speech: Arc<dyn SpeechProvider>,
    meeting: Mutex<Option<Box<dyn MeetingProvider>>>,
    meeting_identity: Arc<Mutex<String>>,

    aggregator_config: AggregatorConfig,
    tunables: BridgeTunables,

    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl BridgeSession {
    pub fn new(
        config: &Config,
        meeting: Box<dyn MeetingProvider>,
        control: Arc<dyn MeetingControl>,
        speech: Arc<dyn SpeechProvider>,
        agent: SharedAgent,
        llm: Option<Arc<dyn LlmProcessor>>,
    ) -> Result<Arc<Self>> {
        let mut detector = MentionDetector::new(config.mention.clone())?;
        let mut intent = IntentClassifier::new(config.intent.clone());
        if let Some(llm) = llm {
            detector = detector.with_llm(Arc::clone(&llm));
            intent = intent.with_llm(llm);
        }
        let detector = Arc::new(detector);
        let intent = Arc::new(intent);

        let analytics = Arc::new(CallAnalytics::new());
        let transcript = Arc::new(TranscriptLog::new(config.bridge.dedup_window_ms));
        let tracker = Arc::new(Mutex::new(SessionTracker::new(config.session.clone())));

        let processor = Arc::new(BehaviorProcessor::new(
            config.behavior.pattern.clone(),
            config.behavior.options.clone(),
            Arc::clone(&detector),
            Arc::clone(&agent),
            Arc::clone(&speech),
            control,
            Arc::clone(&analytics),
            Arc::clone(&transcript),
        )?);

        let pipeline = Arc::new(Pipeline {
            detector,
            intent,
            processor,
            tracker,
        });

        Ok(Arc::new(Self {
            started_at: Utc::now(),
            running: Arc::new(AtomicBool::new(false)),
            pipeline,
            analytics,
            transcript,
            agent,
            speech,
            meeting: Mutex::new(Some(meeting)),
            meeting_identity: Arc::new(Mutex::new(format!("meeting-{}", Uuid::new_v4()))),
            aggregator_config: config.aggregator.clone(),
            tunables: config.bridge.clone(),
            event_task: Mutex::new(None),
        }))
    }

    /// Connect the agent backend and start consuming meeting events
    pub async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Bridge already started");
            return Ok(());
        }

        info!("Starting bridge session");

        self.connect_agent().await;

        let rx = {
            let mut meeting = self.meeting.lock().await;
            meeting
                .as_mut()
                .context("Meeting provider already torn down")?
                .start()
                .await
                .context("Failed to start meeting provider")?
        };

        let event_loop = EventLoop {
            running: Arc::clone(&self.running),
            pipeline: Arc::clone(&self.pipeline),
            transcript: Arc::clone(&self.transcript),
            analytics: Arc::clone(&self.analytics),
            speech: Arc::clone(&self.speech),
            meeting_identity: Arc::clone(&self.meeting_identity),
            tunables: self.tunables.clone(),
            aggregator: CaptionAggregator::new(
                self.aggregator_config.clone(),
                Arc::clone(&self.pipeline.detector),
            ),
            recent: VecDeque::new(),
        };

        let task = tokio::spawn(async move {
            event_loop.run(rx).await;
        });

        {
            let mut handle = self.event_task.lock().await;
            *handle = Some(task);
        }

        info!("Bridge session started");
        Ok(())
    }

    /// Stop consuming events and return the call summary
    pub async fn stop(&self) -> Result<CallSummary> {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Bridge not running");
            return Ok(self.analytics.summary().await);
        }

        info!("Stopping bridge session");

        {
            let mut meeting = self.meeting.lock().await;
            if let Some(provider) = meeting.as_mut() {
                if let Err(e) = provider.stop().await {
                    error!("Failed to stop meeting provider: {:#}", e);
                }
            }
        }

        {
            let mut handle = self.event_task.lock().await;
            if let Some(task) = handle.take() {
                if let Err(e) = task.await {
                    error!("Bridge event task panicked: {}", e);
                }
            }
        }

        info!("Bridge session stopped");
        Ok(self.analytics.summary().await)
    }

    pub async fn status(&self) -> BridgeStatus {
        let duration = Utc::now().signed_duration_since(self.started_at);

        BridgeStatus {
            meeting_id: self.meeting_identity.lock().await.clone(),
            running: self.running.load(Ordering::SeqCst),
            agent_connected: self.agent.lock().await.is_connected(),
            session: self.pipeline.tracker.lock().await.snapshot(wall_ms()),
            pending_responses: self.pipeline.processor.pending_snapshot().await.len(),
            transcript_entries: self.transcript.len().await,
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
        }
    }

    pub async fn transcript(&self) -> Vec<super::transcript::TranscriptEntry> {
        self.transcript.entries().await
    }

    pub async fn summary(&self) -> CallSummary {
        self.analytics.summary().await
    }

    pub async fn pending_responses(&self) -> Vec<PendingResponse> {
        self.pipeline.processor.pending_snapshot().await
    }

    pub async fn approve_response(&self, id: Uuid) -> Result<()> {
        self.pipeline.processor.approve_response(id).await
    }

    pub async fn reject_response(&self, id: Uuid) -> Result<()> {
        self.pipeline.processor.reject_response(id).await
    }

    /// Connect the agent backend, retrying once after a fixed delay when
    /// the connect silently fails to produce a conversation id
    async fn connect_agent(&self) {
        let delay = Duration::from_millis(self.tunables.reconnect_delay_ms);

        for attempt in 1..=2u32 {
            let result = { self.agent.lock().await.connect().await };
            match result {
                Ok(id) if !id.is_empty() => {
                    info!("Agent connected (conversation {})", id);
                    return;
                }
                Ok(_) => warn!(
                    "Agent connect produced no conversation id (attempt {})",
                    attempt
                ),
                Err(e) => warn!("Agent connect failed (attempt {}): {:#}", attempt, e),
            }

            if attempt == 1 {
                info!("Retrying agent connect in {:?}", delay);
                tokio::time::sleep(delay).await;
            }
        }

        error!("Agent backend not connected; triggers will be ignored");
    }
}

fn wall_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}
