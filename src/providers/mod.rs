//! Provider seams for the meeting transport, speech synthesis, agent
//! backends and the classification LLM
//!
//! Each external collaborator is a trait; concrete backends are selected
//! through factories keyed on tagged config unions.

mod agent;
mod direct_line;
mod foundry;
mod llm;
mod meeting;
mod speech;

pub use agent::{
    AgentProvider, AgentProviderConfig, AgentProviderFactory, AgentReply, DisconnectedAgent,
    SharedAgent,
};
pub use direct_line::DirectLineAgent;
pub use foundry::AzureFoundryAgent;
pub use llm::{LlmConfig, LlmProcessor, OpenAiCompatProcessor};
pub use meeting::{
    ChatMessage, LoggingMeetingControl, MeetingControl, MeetingEvent, MeetingProvider,
    MeetingProviderFactory, MeetingSource, ReplayMeetingProvider,
};
pub use speech::{NullSpeech, SpeechProvider};
