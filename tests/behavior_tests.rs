// Integration tests for the behavior processor: delivery modes, the
// single in-flight guard, approval flow, raised-hand queueing and the
// error-signature screen.

mod common;

use agent_bridge::{
    BehaviorMode, BehaviorPattern, BehaviorProcessor, CallAnalytics, MentionConfig,
    MentionDetector, ProcessOutcome, ResponseChannel, ResponseStatus, TranscriptLog,
};
use agent_bridge::behavior::ProcessorOptions;
use anyhow::Result;
use common::{MockAgent, MockControl, MockSpeech};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    processor: Arc<BehaviorProcessor>,
    speech: Arc<MockSpeech>,
    control: Arc<MockControl>,
    analytics: Arc<CallAnalytics>,
    transcript: Arc<TranscriptLog>,
    agent_calls: Arc<AtomicUsize>,
}

async fn harness(pattern: BehaviorPattern, agent: MockAgent) -> Harness {
    harness_with_options(pattern, agent, ProcessorOptions::default(), true).await
}

async fn harness_with_options(
    pattern: BehaviorPattern,
    agent: MockAgent,
    options: ProcessorOptions,
    connect: bool,
) -> Harness {
    let agent_calls = agent.call_counter();
    let agent = common::shared_agent(agent);
    if connect {
        common::connect(&agent).await;
    }

    let detector = Arc::new(
        MentionDetector::new(MentionConfig {
            display_name: "Jenny".to_string(),
            ..Default::default()
        })
        .unwrap(),
    );

    let speech = Arc::new(MockSpeech::default());
    let control = Arc::new(MockControl::default());
    let analytics = Arc::new(CallAnalytics::new());
    let transcript = Arc::new(TranscriptLog::new(2000));

    let speech_dyn: Arc<dyn agent_bridge::providers::SpeechProvider> = speech.clone();
    let control_dyn: Arc<dyn agent_bridge::providers::MeetingControl> = control.clone();

    let processor = Arc::new(
        BehaviorProcessor::new(
            pattern,
            options,
            detector,
            agent,
            speech_dyn,
            control_dyn,
            Arc::clone(&analytics),
            Arc::clone(&transcript),
        )
        .unwrap(),
    );

    Harness {
        processor,
        speech,
        control,
        analytics,
        transcript,
        agent_calls,
    }
}

fn pattern(mode: BehaviorMode, channel: ResponseChannel) -> BehaviorPattern {
    let mut pattern = BehaviorPattern::default();
    pattern.caption_mention.behavior_mode = mode;
    pattern.caption_mention.response_channel = channel;
    pattern
}

#[tokio::test]
async fn test_immediate_mode_delivers_on_both_channels() -> Result<()> {
    let h = harness(
        pattern(BehaviorMode::Immediate, ResponseChannel::Both),
        MockAgent::new("It is sunny today."),
    )
    .await;

    let outcome = h
        .processor
        .process_caption_mention("Alex", "Hey Jenny, what's the weather?", None)
        .await?;

    assert_eq!(outcome, ProcessOutcome::Delivered);

    let spoken = h.speech.spoken.lock().unwrap().clone();
    assert_eq!(spoken, vec!["It is sunny today."]);

    let chat = h.control.chat_messages.lock().unwrap().clone();
    assert_eq!(chat.len(), 1);
    assert!(chat[0].contains("It is sunny today."));

    let summary = h.analytics.summary().await;
    assert_eq!(summary.questions_count, 1);
    assert_eq!(summary.responses_count, 1);

    // The reply also lands in the conversation log
    let entries = h.transcript.entries().await;
    assert!(entries.iter().any(|e| e.role == "agent" && e.text == "It is sunny today."));

    Ok(())
}

#[tokio::test]
async fn test_single_in_flight_response() -> Result<()> {
    let h = harness(
        pattern(BehaviorMode::Immediate, ResponseChannel::Speech),
        MockAgent::new("One answer.").with_delay(Duration::from_millis(150)),
    )
    .await;

    let p1 = Arc::clone(&h.processor);
    let p2 = Arc::clone(&h.processor);

    let first = tokio::spawn(async move {
        p1.process_caption_mention("Alex", "Jenny, first question", None)
            .await
    });
    // Let the first call take the guard before issuing the second
    tokio::time::sleep(Duration::from_millis(30)).await;
    let second = tokio::spawn(async move {
        p2.process_caption_mention("Priya", "Jenny, second question", None)
            .await
    });

    let first = first.await??;
    let second = second.await??;

    assert_eq!(first, ProcessOutcome::Delivered);
    assert_eq!(second, ProcessOutcome::DroppedBusy);

    // Exactly one agent call, exactly one delivery
    assert_eq!(h.agent_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.speech.spoken.lock().unwrap().len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_error_content_is_never_spoken() -> Result<()> {
    let h = harness(
        pattern(BehaviorMode::Immediate, ResponseChannel::Speech),
        MockAgent::new("The backend returned: rate limit exceeded, try later"),
    )
    .await;

    let outcome = h
        .processor
        .process_caption_mention("Alex", "Jenny, are you there?", None)
        .await?;
    assert_eq!(outcome, ProcessOutcome::Delivered);

    // Never spoken...
    assert!(h.speech.spoken.lock().unwrap().is_empty());

    // ...but still recorded in the conversation log
    let entries = h.transcript.entries().await;
    assert!(entries
        .iter()
        .any(|e| e.role == "agent" && e.text.contains("rate limit")));

    Ok(())
}

#[tokio::test]
async fn test_controlled_mode_waits_for_approval() -> Result<()> {
    let h = harness(
        pattern(BehaviorMode::Controlled, ResponseChannel::Chat),
        MockAgent::new("Reviewed answer."),
    )
    .await;

    let outcome = h
        .processor
        .process_caption_mention("Alex", "Jenny, can you check?", None)
        .await?;

    let id = match outcome {
        ProcessOutcome::PendingApproval(id) => id,
        other => panic!("expected PendingApproval, got {:?}", other),
    };

    // Nothing delivered yet
    assert!(h.control.chat_messages.lock().unwrap().is_empty());

    h.processor.approve_response(id).await?;

    let chat = h.control.chat_messages.lock().unwrap().clone();
    assert_eq!(chat.len(), 1);

    let records = h.processor.pending_snapshot().await;
    assert_eq!(records[0].status, ResponseStatus::Sent);

    // Approving twice is an error
    assert!(h.processor.approve_response(id).await.is_err());

    Ok(())
}

#[tokio::test]
async fn test_controlled_mode_reject_discards() -> Result<()> {
    let h = harness(
        pattern(BehaviorMode::Controlled, ResponseChannel::Both),
        MockAgent::new("Unwanted answer."),
    )
    .await;

    let outcome = h
        .processor
        .process_caption_mention("Alex", "Jenny?", None)
        .await?;
    let id = match outcome {
        ProcessOutcome::PendingApproval(id) => id,
        other => panic!("expected PendingApproval, got {:?}", other),
    };

    h.processor.reject_response(id).await?;

    assert!(h.speech.spoken.lock().unwrap().is_empty());
    assert!(h.control.chat_messages.lock().unwrap().is_empty());

    let records = h.processor.pending_snapshot().await;
    assert_eq!(records[0].status, ResponseStatus::Rejected);

    Ok(())
}

#[tokio::test]
async fn test_queued_mode_raises_hand_and_waits() -> Result<()> {
    let h = harness(
        pattern(BehaviorMode::Queued, ResponseChannel::Both),
        MockAgent::new("Queued answer."),
    )
    .await;

    let outcome = h
        .processor
        .process_caption_mention("Alex", "Jenny, when you get a chance?", None)
        .await?;
    assert!(matches!(outcome, ProcessOutcome::HandQueued(_)));

    // Hand raised exactly once, nothing delivered yet
    assert_eq!(h.control.raises.load(Ordering::SeqCst), 1);
    assert!(h.speech.spoken.lock().unwrap().is_empty());
    assert!(h.control.chat_messages.lock().unwrap().is_empty());

    // Hand lowered (host or self): delivery happens exactly once
    let delivered = h.processor.on_hand_raised_state_changed(false).await?;
    assert_eq!(delivered, 1);
    assert_eq!(h.speech.spoken.lock().unwrap().len(), 1);
    assert_eq!(h.control.chat_messages.lock().unwrap().len(), 1);

    let records = h.processor.pending_snapshot().await;
    assert_eq!(records[0].status, ResponseStatus::Sent);

    // A second lowering delivers nothing more
    let delivered = h.processor.on_hand_raised_state_changed(false).await?;
    assert_eq!(delivered, 0);
    assert_eq!(h.speech.spoken.lock().unwrap().len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_disabled_trigger_is_a_noop() -> Result<()> {
    let mut p = pattern(BehaviorMode::Immediate, ResponseChannel::Both);
    p.caption_mention.enabled = false;

    let h = harness(p, MockAgent::new("Should never be generated.")).await;

    let outcome = h
        .processor
        .process_caption_mention("Alex", "Jenny, hello?", None)
        .await?;

    assert_eq!(outcome, ProcessOutcome::Disabled);
    assert_eq!(h.agent_calls.load(Ordering::SeqCst), 0);

    Ok(())
}

#[tokio::test]
async fn test_unconnected_agent_ignores_triggers() -> Result<()> {
    let h = harness_with_options(
        pattern(BehaviorMode::Immediate, ResponseChannel::Both),
        MockAgent::new("unreachable"),
        ProcessorOptions::default(),
        false,
    )
    .await;

    let outcome = h
        .processor
        .process_caption_mention("Alex", "Jenny?", None)
        .await?;

    assert_eq!(outcome, ProcessOutcome::NotConnected);
    assert_eq!(h.agent_calls.load(Ordering::SeqCst), 0);

    Ok(())
}

#[tokio::test]
async fn test_stale_records_are_dismissed_and_pruned() -> Result<()> {
    let options = ProcessorOptions {
        stale_after_secs: 0,
        ..Default::default()
    };
    let h = harness_with_options(
        pattern(BehaviorMode::Controlled, ResponseChannel::Chat),
        MockAgent::new("Stale answer."),
        options,
        true,
    )
    .await;

    let outcome = h
        .processor
        .process_caption_mention("Alex", "Jenny?", None)
        .await?;
    let id = match outcome {
        ProcessOutcome::PendingApproval(id) => id,
        other => panic!("expected PendingApproval, got {:?}", other),
    };

    h.processor.dismiss_stale().await;

    // Dismissed and then pruned from the queue
    assert!(h.processor.pending_snapshot().await.is_empty());
    assert!(h.processor.approve_response(id).await.is_err());

    Ok(())
}

#[tokio::test]
async fn test_is_mention_of_agent_delegates_to_detector() -> Result<()> {
    let h = harness(
        pattern(BehaviorMode::Immediate, ResponseChannel::Both),
        MockAgent::new("hi"),
    )
    .await;

    assert!(h.processor.is_mention_of_agent("jenny, you there?"));
    assert!(!h.processor.is_mention_of_agent("moving on to planning"));

    Ok(())
}
