use super::pattern::{BehaviorMode, BehaviorPattern, ResponseChannel, TriggerConfig};
use super::pending::{PendingResponse, ResponseStatus, TriggerSource};
use crate::analytics::CallAnalytics;
use crate::bridge::TranscriptLog;
use crate::mention::{strip_html, MentionDetector};
use crate::providers::{ChatMessage, MeetingControl, SharedAgent, SpeechProvider};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Response texts matching these are backend failures leaking through as
/// content; they must never be read aloud to meeting participants
const ERROR_SIGNATURES: &str =
    r"(?i)(error code:|content filtered|rate limit|access denied|request failed|internal server error|quota exceeded)";

/// Tunables for the processor that are not part of the behavior pattern
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorOptions {
    /// Prefix chat deliveries with a robot emoji
    #[serde(default = "default_true")]
    pub decorate_chat: bool,

    /// Fixed reply delivered when a conversation ends with a farewell
    #[serde(default = "default_closing_reply")]
    pub closing_reply: String,

    /// Waiting records older than this are dismissed
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_closing_reply() -> String {
    "You're welcome! I'll be here if anything else comes up.".to_string()
}

fn default_stale_after_secs() -> u64 {
    600
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            decorate_chat: default_true(),
            closing_reply: default_closing_reply(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

/// What happened to a trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Response delivered immediately
    Delivered,
    /// Response persisted and awaiting human approval
    PendingApproval(Uuid),
    /// Response held behind a raised hand
    HandQueued(Uuid),
    /// Another trigger was already being processed; this one was dropped
    DroppedBusy,
    /// The trigger kind is disabled in the active pattern
    Disabled,
    /// No connected agent backend; trigger ignored
    NotConnected,
    /// Agent call failed; no response delivered
    Failed,
}

/// The policy core: turns confirmed triggers into delivered responses
/// according to the active behavior pattern.
///
/// All methods take `&self`; mutable state lives behind atomics and locks
/// so the processor can be shared between the bridge event loop and the
/// HTTP control surface.
pub struct BehaviorProcessor {
    pattern: BehaviorPattern,
    options: ProcessorOptions,
    detector: Arc<MentionDetector>,
    agent: SharedAgent,
    speech: Arc<dyn SpeechProvider>,
    control: Arc<dyn MeetingControl>,
    analytics: Arc<CallAnalytics>,
    transcript: Arc<TranscriptLog>,

    /// Single in-flight guard: only one trigger is turned into a response
    /// at a time
    processing: AtomicBool,

    /// True while a speech delivery is in progress (for barge-in)
    speaking: AtomicBool,

    /// Last known raised-hand state in the meeting
    hand_raised: AtomicBool,

    pending: Mutex<HashMap<Uuid, PendingResponse>>,
    error_signature: Regex,
}

impl BehaviorProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pattern: BehaviorPattern,
        options: ProcessorOptions,
        detector: Arc<MentionDetector>,
        agent: SharedAgent,
        speech: Arc<dyn SpeechProvider>,
        control: Arc<dyn MeetingControl>,
        analytics: Arc<CallAnalytics>,
        transcript: Arc<TranscriptLog>,
    ) -> Result<Self> {
        let error_signature =
            Regex::new(ERROR_SIGNATURES).context("Invalid error-signature pattern")?;

        info!(
            "Behavior processor using pattern '{}' (captions: {:?}, chat: {:?})",
            pattern.name, pattern.caption_mention.behavior_mode, pattern.chat_mention.behavior_mode
        );

        Ok(Self {
            pattern,
            options,
            detector,
            agent,
            speech,
            control,
            analytics,
            transcript,
            processing: AtomicBool::new(false),
            speaking: AtomicBool::new(false),
            hand_raised: AtomicBool::new(false),
            pending: Mutex::new(HashMap::new()),
            error_signature,
        })
    }

    /// Entry point for a confirmed caption mention
    pub async fn process_caption_mention(
        &self,
        speaker: &str,
        text: &str,
        _speaker_id: Option<&str>,
    ) -> Result<ProcessOutcome> {
        self.process_trigger(TriggerSource::CaptionMention, speaker, text)
            .await
    }

    /// Entry point for a confirmed chat mention
    pub async fn process_chat_mention(&self, message: &ChatMessage) -> Result<ProcessOutcome> {
        let text = strip_html(&message.content_html);
        self.process_trigger(TriggerSource::ChatMention, &message.sender_display_name, &text)
            .await
    }

    async fn process_trigger(
        &self,
        source: TriggerSource,
        author: &str,
        content: &str,
    ) -> Result<ProcessOutcome> {
        let trigger = self.trigger_config(source).clone();

        if !trigger.enabled {
            debug!("{:?} triggers disabled in active pattern; ignoring", source);
            return Ok(ProcessOutcome::Disabled);
        }

        // Only one trigger may be in flight; overlapping triggers are
        // dropped with a log, never queued silently. The guard is taken
        // before touching the agent lock so an overlapping caller cannot
        // block behind the in-flight agent call and sneak through after it.
        if self
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(
                "Dropping {:?} from {}: another response is already in flight",
                source, author
            );
            return Ok(ProcessOutcome::DroppedBusy);
        }

        let result = self
            .process_trigger_locked(&trigger, source, author, content)
            .await;
        self.processing.store(false, Ordering::SeqCst);
        result
    }

    async fn process_trigger_locked(
        &self,
        trigger: &TriggerConfig,
        source: TriggerSource,
        author: &str,
        content: &str,
    ) -> Result<ProcessOutcome> {
        if !self.agent.lock().await.is_connected() {
            warn!(
                "Ignoring {:?} from {}: agent backend not connected",
                source, author
            );
            return Ok(ProcessOutcome::NotConnected);
        }

        self.analytics.track_question(author, content).await;

        let reply = {
            let mut agent = self.agent.lock().await;
            agent.send_message(content, Some(author), None).await
        };

        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                error!("Agent call for {:?} from {} failed: {:#}", source, author, e);
                return Ok(ProcessOutcome::Failed);
            }
        };

        match trigger.behavior_mode {
            BehaviorMode::Immediate => {
                self.deliver(&reply.text, trigger.response_channel).await;
                Ok(ProcessOutcome::Delivered)
            }
            BehaviorMode::Controlled => {
                let record = PendingResponse::new(
                    source,
                    author,
                    content,
                    &reply.text,
                    trigger.response_channel,
                    BehaviorMode::Controlled,
                    ResponseStatus::Pending,
                );
                let id = record.id;
                self.pending.lock().await.insert(id, record);

                if trigger.controlled.notify_on_pending {
                    info!("Response {} pending approval (from {})", id, author);
                }
                Ok(ProcessOutcome::PendingApproval(id))
            }
            BehaviorMode::Queued => {
                let record = PendingResponse::new(
                    source,
                    author,
                    content,
                    &reply.text,
                    trigger.response_channel,
                    BehaviorMode::Queued,
                    ResponseStatus::HandRaised,
                );
                let id = record.id;
                self.pending.lock().await.insert(id, record);

                if trigger.queued.auto_raise_hand && !self.hand_raised.swap(true, Ordering::SeqCst)
                {
                    if let Err(e) = self.control.raise_hand().await {
                        error!("Failed to raise hand: {:#}", e);
                    }
                }
                info!("Response {} held behind raised hand (from {})", id, author);
                Ok(ProcessOutcome::HandQueued(id))
            }
        }
    }

    /// Approve a pending response; delivers it and records the outcome
    pub async fn approve_response(&self, id: Uuid) -> Result<()> {
        let (text, channel) = {
            let mut pending = self.pending.lock().await;
            let record = pending
                .get_mut(&id)
                .with_context(|| format!("Unknown pending response: {}", id))?;
            if record.status != ResponseStatus::Pending {
                bail!("Response {} is {:?}, not pending", id, record.status);
            }
            record.set_status(ResponseStatus::Approved);
            record.set_status(ResponseStatus::Sending);
            (record.response_text.clone(), record.response_channel)
        };

        let delivered = self.deliver(&text, channel).await;
        self.finish_record(id, delivered).await;
        Ok(())
    }

    /// Reject a pending response; it is never delivered
    pub async fn reject_response(&self, id: Uuid) -> Result<()> {
        let mut pending = self.pending.lock().await;
        let record = pending
            .get_mut(&id)
            .with_context(|| format!("Unknown pending response: {}", id))?;
        if record.status != ResponseStatus::Pending {
            bail!("Response {} is {:?}, not pending", id, record.status);
        }
        record.set_status(ResponseStatus::Rejected);
        info!("Response {} rejected", id);
        Ok(())
    }

    /// Reconcile with the meeting's raised-hand state. On lowering (host
    /// or self), every held response is delivered exactly once.
    pub async fn on_hand_raised_state_changed(&self, raised: bool) -> Result<usize> {
        self.hand_raised.store(raised, Ordering::SeqCst);

        if raised {
            return Ok(0);
        }

        let held: Vec<(Uuid, String, ResponseChannel)> = {
            let mut pending = self.pending.lock().await;
            pending
                .values_mut()
                .filter(|r| r.status == ResponseStatus::HandRaised)
                .map(|r| {
                    r.set_status(ResponseStatus::Sending);
                    (r.id, r.response_text.clone(), r.response_channel)
                })
                .collect()
        };

        if held.is_empty() {
            return Ok(0);
        }

        info!("Hand lowered; delivering {} held response(s)", held.len());

        let mut delivered = 0;
        for (id, text, channel) in held {
            let ok = self.deliver(&text, channel).await;
            self.finish_record(id, ok).await;
            if ok {
                delivered += 1;
            }
        }

        Ok(delivered)
    }

    /// Dismiss records waiting past the staleness bound and drop old
    /// terminal records so the queue cannot grow without bound
    pub async fn dismiss_stale(&self) {
        let stale_after = chrono::Duration::seconds(self.options.stale_after_secs as i64);
        let now = Utc::now();
        let mut pending = self.pending.lock().await;

        for record in pending.values_mut() {
            if record.status.is_waiting()
                && now.signed_duration_since(record.status_changed_at) >= stale_after
            {
                warn!("Dismissing stale response {}", record.id);
                record.set_status(ResponseStatus::Dismissed);
            }
        }

        pending.retain(|_, r| {
            !(r.status.is_terminal()
                && now.signed_duration_since(r.status_changed_at) >= stale_after)
        });
    }

    /// Deliver the fixed closing reply over the caption channel, with a
    /// friendly reaction in the meeting
    pub async fn deliver_closing_reply(&self) {
        if let Err(e) = self.control.send_reaction("like").await {
            debug!("Failed to send closing reaction: {:#}", e);
        }
        let channel = self.pattern.caption_mention.response_channel;
        let text = self.options.closing_reply.clone();
        self.deliver(&text, channel).await;
    }

    /// Convenience delegation to the mention detector
    pub fn is_mention_of_agent(&self, text: &str) -> bool {
        self.detector.detect(text).is_mentioned
    }

    /// True while a speech delivery is in progress
    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    /// Snapshot of the pending queue, oldest first
    pub async fn pending_snapshot(&self) -> Vec<PendingResponse> {
        let pending = self.pending.lock().await;
        let mut records: Vec<PendingResponse> = pending.values().cloned().collect();
        records.sort_by_key(|r| r.created_at);
        records
    }

    /// Drop all queued state (meeting identity changed)
    pub async fn reset(&self) {
        let mut pending = self.pending.lock().await;
        if !pending.is_empty() {
            info!("Dropping {} pending response(s) on reset", pending.len());
        }
        pending.clear();
        self.processing.store(false, Ordering::SeqCst);
        self.speaking.store(false, Ordering::SeqCst);
        self.hand_raised.store(false, Ordering::SeqCst);
    }

    fn trigger_config(&self, source: TriggerSource) -> &TriggerConfig {
        match source {
            TriggerSource::CaptionMention => &self.pattern.caption_mention,
            TriggerSource::ChatMention => &self.pattern.chat_mention,
        }
    }

    async fn finish_record(&self, id: Uuid, delivered: bool) {
        let mut pending = self.pending.lock().await;
        if let Some(record) = pending.get_mut(&id) {
            if delivered {
                record.set_status(ResponseStatus::Sent);
            } else {
                record.set_status(ResponseStatus::Failed);
                record.error_message = Some("delivery failed".to_string());
            }
        }
    }

    /// Deliver a response over the configured channel. The text is always
    /// recorded in the transcript and analytics; error-signature text is
    /// displayed only, never spoken or sent outward.
    async fn deliver(&self, text: &str, channel: ResponseChannel) -> bool {
        self.transcript
            .add("agent", self.detector.display_name(), text)
            .await;
        self.analytics.track_response(text).await;

        if self.error_signature.is_match(text) {
            warn!("Response matches an error signature; displaying only");
            return false;
        }

        let mut ok = true;

        if channel.includes_speech() {
            self.speaking.store(true, Ordering::SeqCst);
            match self.speech.speak(text).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!("Speech synthesis reported failure");
                    ok = false;
                }
                Err(e) => {
                    error!("Speech synthesis failed: {:#}", e);
                    ok = false;
                }
            }
            self.speaking.store(false, Ordering::SeqCst);
        }

        if channel.includes_chat() {
            let outgoing = if self.options.decorate_chat {
                format!("\u{1F916} {}", text)
            } else {
                text.to_string()
            };
            if let Err(e) = self.control.send_chat_message(&outgoing).await {
                error!("Failed to send chat message: {:#}", e);
                ok = false;
            }
        }

        ok
    }
}
