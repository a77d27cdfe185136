use serde::{Deserialize, Serialize};

/// Delivery policy for a generated response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BehaviorMode {
    /// Deliver as soon as the response is generated
    Immediate,
    /// Hold for human approval
    Controlled,
    /// Raise a hand and hold until the meeting acknowledges
    Queued,
}

/// Which channel carries the response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseChannel {
    Chat,
    Speech,
    Both,
}

impl ResponseChannel {
    pub fn includes_speech(&self) -> bool {
        matches!(self, ResponseChannel::Speech | ResponseChannel::Both)
    }

    pub fn includes_chat(&self) -> bool {
        matches!(self, ResponseChannel::Chat | ResponseChannel::Both)
    }
}

/// Options for the queued (raise-hand) mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QueuedOptions {
    /// Raise the hand automatically when a response is queued
    #[serde(default = "default_true")]
    pub auto_raise_hand: bool,
}

impl Default for QueuedOptions {
    fn default() -> Self {
        Self {
            auto_raise_hand: true,
        }
    }
}

/// Options for the controlled (supervised) mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ControlledOptions {
    /// Announce newly pending responses in the log
    #[serde(default = "default_true")]
    pub notify_on_pending: bool,
}

impl Default for ControlledOptions {
    fn default() -> Self {
        Self {
            notify_on_pending: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Per-trigger-kind policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_channel")]
    pub response_channel: ResponseChannel,

    #[serde(default = "default_mode")]
    pub behavior_mode: BehaviorMode,

    #[serde(default)]
    pub queued: QueuedOptions,

    #[serde(default)]
    pub controlled: ControlledOptions,
}

fn default_channel() -> ResponseChannel {
    ResponseChannel::Both
}

fn default_mode() -> BehaviorMode {
    BehaviorMode::Immediate
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            response_channel: default_channel(),
            behavior_mode: default_mode(),
            queued: QueuedOptions::default(),
            controlled: ControlledOptions::default(),
        }
    }
}

/// Operator-selected behavior pattern; read-only to the engine while a
/// bridge session is running
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorPattern {
    pub id: String,
    pub name: String,

    /// Policy for confirmed caption mentions
    #[serde(default)]
    pub caption_mention: TriggerConfig,

    /// Policy for chat mentions
    #[serde(default)]
    pub chat_mention: TriggerConfig,
}

impl Default for BehaviorPattern {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            name: "Respond immediately".to_string(),
            caption_mention: TriggerConfig::default(),
            chat_mention: TriggerConfig {
                // Chat questions default to chat-only replies
                response_channel: ResponseChannel::Chat,
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_membership() {
        assert!(ResponseChannel::Both.includes_speech());
        assert!(ResponseChannel::Both.includes_chat());
        assert!(!ResponseChannel::Chat.includes_speech());
        assert!(!ResponseChannel::Speech.includes_chat());
    }

    #[test]
    fn test_pattern_round_trips_kebab_case() {
        let pattern = BehaviorPattern::default();
        let json = serde_json::to_string(&pattern).unwrap();
        assert!(json.contains("\"immediate\""));
        assert!(json.contains("\"chat\""));

        let back: BehaviorPattern = serde_json::from_str(&json).unwrap();
        assert_eq!(back.caption_mention.behavior_mode, BehaviorMode::Immediate);
    }
}
