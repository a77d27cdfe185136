pub mod analytics;
pub mod behavior;
pub mod bridge;
pub mod captions;
pub mod config;
pub mod http;
pub mod intent;
pub mod mention;
pub mod providers;
pub mod session;

pub use analytics::{CallAnalytics, CallSummary};
pub use behavior::{
    BehaviorMode, BehaviorPattern, BehaviorProcessor, PendingResponse, ProcessOutcome,
    ResponseChannel, ResponseStatus, TriggerConfig, TriggerSource,
};
pub use bridge::{BridgeSession, BridgeStatus, TranscriptEntry, TranscriptLog};
pub use captions::{
    AggregatedCaption, AggregatorConfig, AggregatorEvent, CaptionAggregator, CaptionFragment,
    PendingMention,
};
pub use config::Config;
pub use http::{create_router, AppState};
pub use intent::{IntentClassifier, IntentConfig, IntentContext, IntentDecision};
pub use mention::{MentionConfig, MentionDetector, MentionResult};
pub use providers::{
    AgentProvider, AgentProviderConfig, AgentProviderFactory, AgentReply, ChatMessage,
    LlmProcessor, MeetingControl, MeetingEvent, MeetingProvider, MeetingProviderFactory,
    MeetingSource, NullSpeech, OpenAiCompatProcessor, SharedAgent, SpeechProvider,
};
pub use session::{SessionSnapshot, SessionTracker};
