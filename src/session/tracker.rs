use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Configuration for session tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Inactivity window after which an active session auto-ends
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    /// Follow-up window after a delivered response during which
    /// non-mention follow-ups are accepted more readily
    #[serde(default = "default_follow_up_window_ms")]
    pub follow_up_window_ms: u64,
}

fn default_idle_timeout_ms() -> u64 {
    120_000
}

fn default_follow_up_window_ms() -> u64 {
    30_000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: default_idle_timeout_ms(),
            follow_up_window_ms: default_follow_up_window_ms(),
        }
    }
}

#[derive(Debug, Clone)]
enum State {
    Idle,
    Active {
        speaker: String,
        started_ms: u64,
        last_activity_ms: u64,
    },
}

/// Serializable view of the session for status endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub is_active: bool,
    pub speaker: Option<String>,
    pub started_ms: Option<u64>,
    pub in_follow_up_window: bool,
}

/// Tracks whether the agent is in a conversation, and with whom.
///
/// `Idle -> Active(speaker) -> Idle`. The owner drives the idle timer by
/// calling `check_idle` with the current timestamp.
pub struct SessionTracker {
    config: SessionConfig,
    state: State,
    /// Timestamp of the last delivered response, for the follow-up window
    last_response_ms: Option<u64>,
}

impl SessionTracker {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: State::Idle,
            last_response_ms: None,
        }
    }

    /// Start a session with `speaker`. Only valid from Idle; while a
    /// session is active this is a no-op returning false (an active
    /// conversation is never pre-empted passively).
    pub fn start_session(&mut self, speaker: &str, now_ms: u64) -> bool {
        match &self.state {
            State::Idle => {
                info!("Session started with {}", speaker);
                self.state = State::Active {
                    speaker: speaker.to_string(),
                    started_ms: now_ms,
                    last_activity_ms: now_ms,
                };
                true
            }
            State::Active { speaker: current, .. } => {
                debug!(
                    "Ignoring session start for {}; already in conversation with {}",
                    speaker, current
                );
                false
            }
        }
    }

    /// End the session from any state; always results in Idle.
    /// Returns true when a session was actually active.
    pub fn end_session(&mut self) -> bool {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Active { speaker, .. } => {
                info!("Session with {} ended", speaker);
                self.last_response_ms = None;
                true
            }
            State::Idle => false,
        }
    }

    /// Record activity, resetting the idle clock
    pub fn touch(&mut self, now_ms: u64) {
        if let State::Active {
            last_activity_ms, ..
        } = &mut self.state
        {
            *last_activity_ms = now_ms;
        }
    }

    /// Record a delivered response, opening the follow-up window
    pub fn mark_response(&mut self, now_ms: u64) {
        self.touch(now_ms);
        if self.is_active() {
            self.last_response_ms = Some(now_ms);
        }
    }

    /// Auto-end the session when idle past the timeout.
    /// Returns true when the session was ended by this call.
    pub fn check_idle(&mut self, now_ms: u64) -> bool {
        let expired = match &self.state {
            State::Active {
                last_activity_ms, ..
            } => now_ms.saturating_sub(*last_activity_ms) >= self.config.idle_timeout_ms,
            State::Idle => false,
        };

        if expired {
            info!("Session idle timeout reached");
            self.end_session();
        }
        expired
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, State::Active { .. })
    }

    /// Speaker currently in conversation, when active
    pub fn speaker(&self) -> Option<&str> {
        match &self.state {
            State::Active { speaker, .. } => Some(speaker.as_str()),
            State::Idle => None,
        }
    }

    /// Whether `speaker` is the active conversation partner
    pub fn is_with(&self, speaker: &str) -> bool {
        self.speaker() == Some(speaker)
    }

    /// Earliest timestamp at which `check_idle` could end the session
    pub fn idle_deadline_ms(&self) -> Option<u64> {
        match &self.state {
            State::Active {
                last_activity_ms, ..
            } => Some(last_activity_ms + self.config.idle_timeout_ms),
            State::Idle => None,
        }
    }

    pub fn snapshot(&self, now_ms: u64) -> SessionSnapshot {
        let in_follow_up_window = self
            .last_response_ms
            .map(|t| now_ms.saturating_sub(t) < self.config.follow_up_window_ms)
            .unwrap_or(false);

        match &self.state {
            State::Active {
                speaker,
                started_ms,
                ..
            } => SessionSnapshot {
                is_active: true,
                speaker: Some(speaker.clone()),
                started_ms: Some(*started_ms),
                in_follow_up_window,
            },
            State::Idle => SessionSnapshot {
                is_active: false,
                speaker: None,
                started_ms: None,
                in_follow_up_window: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> SessionTracker {
        SessionTracker::new(SessionConfig::default())
    }

    #[test]
    fn test_session_exclusivity() {
        let mut t = tracker();

        assert!(t.start_session("Alex", 0));
        // Second start while active is a no-op
        assert!(!t.start_session("Priya", 100));
        assert_eq!(t.speaker(), Some("Alex"));
    }

    #[test]
    fn test_end_session_from_any_state() {
        let mut t = tracker();
        assert!(!t.end_session());

        t.start_session("Alex", 0);
        assert!(t.end_session());
        assert!(!t.is_active());

        // New session allowed after end
        assert!(t.start_session("Priya", 200));
    }

    #[test]
    fn test_idle_timeout_ends_session() {
        let mut t = tracker();
        t.start_session("Alex", 0);

        assert!(!t.check_idle(60_000));
        assert!(t.is_active());

        assert!(t.check_idle(120_000));
        assert!(!t.is_active());
    }

    #[test]
    fn test_touch_resets_idle_clock() {
        let mut t = tracker();
        t.start_session("Alex", 0);
        t.touch(100_000);

        assert!(!t.check_idle(150_000));
        assert!(t.check_idle(220_000));
    }

    #[test]
    fn test_follow_up_window_after_response() {
        let mut t = tracker();
        t.start_session("Alex", 0);
        t.mark_response(1000);

        assert!(t.snapshot(10_000).in_follow_up_window);
        assert!(!t.snapshot(40_000).in_follow_up_window);
    }

    #[test]
    fn test_idle_deadline() {
        let mut t = tracker();
        assert!(t.idle_deadline_ms().is_none());
        t.start_session("Alex", 500);
        assert_eq!(t.idle_deadline_ms(), Some(120_500));
    }
}
