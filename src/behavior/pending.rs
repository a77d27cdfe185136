use super::pattern::{BehaviorMode, ResponseChannel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of trigger produced a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerSource {
    CaptionMention,
    ChatMention,
}

/// Lifecycle of a pending response
///
/// `pending --approve--> sending --> sent | failed`
/// `pending --reject--> rejected`
/// `hand-raised --hand lowered--> sending --> sent | failed`
/// Stale records in a waiting state become `dismissed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseStatus {
    Pending,
    Approved,
    Rejected,
    HandRaised,
    Sending,
    Sent,
    Failed,
    Dismissed,
}

impl ResponseStatus {
    /// Whether the record is still waiting for an external decision
    pub fn is_waiting(&self) -> bool {
        matches!(self, ResponseStatus::Pending | ResponseStatus::HandRaised)
    }

    /// Whether the record reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResponseStatus::Sent
                | ResponseStatus::Rejected
                | ResponseStatus::Failed
                | ResponseStatus::Dismissed
        )
    }
}

/// A generated response awaiting approval or a meeting acknowledgment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingResponse {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub trigger_source: TriggerSource,
    pub trigger_content: String,
    pub trigger_author: String,
    pub response_text: String,
    pub response_channel: ResponseChannel,
    pub status: ResponseStatus,
    pub behavior_mode: BehaviorMode,
    pub status_changed_at: DateTime<Utc>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl PendingResponse {
    pub fn new(
        trigger_source: TriggerSource,
        trigger_author: &str,
        trigger_content: &str,
        response_text: &str,
        response_channel: ResponseChannel,
        behavior_mode: BehaviorMode,
        status: ResponseStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            trigger_source,
            trigger_content: trigger_content.to_string(),
            trigger_author: trigger_author.to_string(),
            response_text: response_text.to_string(),
            response_channel,
            status,
            behavior_mode,
            status_changed_at: now,
            error_message: None,
        }
    }

    pub fn set_status(&mut self, status: ResponseStatus) {
        self.status = status;
        self.status_changed_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(ResponseStatus::Pending.is_waiting());
        assert!(ResponseStatus::HandRaised.is_waiting());
        assert!(!ResponseStatus::Sending.is_waiting());

        assert!(ResponseStatus::Sent.is_terminal());
        assert!(ResponseStatus::Dismissed.is_terminal());
        assert!(!ResponseStatus::Pending.is_terminal());
    }

    #[test]
    fn test_status_change_updates_timestamp() {
        let mut record = PendingResponse::new(
            TriggerSource::CaptionMention,
            "Alex",
            "hey agent",
            "hello!",
            ResponseChannel::Both,
            BehaviorMode::Controlled,
            ResponseStatus::Pending,
        );

        let before = record.status_changed_at;
        record.set_status(ResponseStatus::Approved);
        assert_eq!(record.status, ResponseStatus::Approved);
        assert!(record.status_changed_at >= before);
    }
}
