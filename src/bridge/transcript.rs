use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// One line of the conversation log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// "user" | "agent" | "system"
    pub role: String,
    pub author: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Accumulated conversation log with a short de-duplication window.
///
/// Flaky upstream callbacks can deliver the same logical event twice; an
/// entry with the same role and text landing inside the window is dropped.
pub struct TranscriptLog {
    dedup_window_ms: i64,
    entries: Mutex<Vec<TranscriptEntry>>,
    recent: Mutex<HashMap<String, i64>>,
}

impl TranscriptLog {
    pub fn new(dedup_window_ms: u64) -> Self {
        Self {
            dedup_window_ms: dedup_window_ms as i64,
            entries: Mutex::new(Vec::new()),
            recent: Mutex::new(HashMap::new()),
        }
    }

    /// Append an entry unless it duplicates one inside the dedup window.
    /// Returns whether the entry was added.
    pub async fn add(&self, role: &str, author: &str, text: &str) -> bool {
        let now = Utc::now();
        let now_ms = now.timestamp_millis();
        let key = format!("{}|{}", role, text);

        {
            let mut recent = self.recent.lock().await;

            if let Some(last_ms) = recent.get(&key) {
                if now_ms - last_ms < self.dedup_window_ms {
                    debug!("Dropping duplicate {} entry inside dedup window", role);
                    return false;
                }
            }

            recent.insert(key, now_ms);
            let window = self.dedup_window_ms;
            recent.retain(|_, last_ms| now_ms - *last_ms < 2 * window);
        }

        self.entries.lock().await.push(TranscriptEntry {
            role: role.to_string(),
            author: author.to_string(),
            text: text.to_string(),
            timestamp: now,
        });

        true
    }

    pub async fn entries(&self) -> Vec<TranscriptEntry> {
        self.entries.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Drop everything (meeting identity changed)
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
        self.recent.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_duplicate_inside_window_is_dropped() {
        let log = TranscriptLog::new(2000);

        assert!(log.add("user", "Alex", "hello there").await);
        assert!(!log.add("user", "Alex", "hello there").await);
        assert_eq!(log.len().await, 1);
    }

    #[tokio::test]
    async fn test_different_text_is_kept() {
        let log = TranscriptLog::new(2000);

        assert!(log.add("user", "Alex", "hello").await);
        assert!(log.add("user", "Alex", "world").await);
        assert_eq!(log.len().await, 2);
    }

    #[tokio::test]
    async fn test_same_text_different_role_is_kept() {
        let log = TranscriptLog::new(2000);

        assert!(log.add("user", "Alex", "ping").await);
        assert!(log.add("agent", "Jenny", "ping").await);
        assert_eq!(log.len().await, 2);
    }

    #[tokio::test]
    async fn test_duplicate_after_window_is_kept() {
        let log = TranscriptLog::new(30);

        assert!(log.add("user", "Alex", "hello").await);
        tokio::time::sleep(std::time::Duration::from_millis(60)).await;
        assert!(log.add("user", "Alex", "hello").await);
        assert_eq!(log.len().await, 2);
    }

    #[tokio::test]
    async fn test_clear_resets_dedup_state() {
        let log = TranscriptLog::new(60_000);

        assert!(log.add("user", "Alex", "hello").await);
        log.clear().await;
        assert!(log.add("user", "Alex", "hello").await);
        assert_eq!(log.len().await, 1);
    }
}
