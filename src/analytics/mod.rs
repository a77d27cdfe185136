//! Call analytics
//!
//! In-memory recording of accepted questions and delivered responses for
//! the post-call summary. Fire-and-forget: tracking never fails the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

/// A question accepted for processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub speaker: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// A response delivered (any mode, any channel)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Summary of the call so far
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSummary {
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub questions_count: usize,
    pub responses_count: usize,
    pub questions: Vec<QuestionRecord>,
    pub responses: Vec<ResponseRecord>,
}

/// Records question/response events for the post-call summary
pub struct CallAnalytics {
    started_at: DateTime<Utc>,
    questions: Mutex<Vec<QuestionRecord>>,
    responses: Mutex<Vec<ResponseRecord>>,
}

impl CallAnalytics {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            questions: Mutex::new(Vec::new()),
            responses: Mutex::new(Vec::new()),
        }
    }

    pub async fn track_question(&self, speaker: &str, text: &str) {
        debug!("Tracking question from {}", speaker);
        self.questions.lock().await.push(QuestionRecord {
            speaker: speaker.to_string(),
            text: text.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub async fn track_response(&self, text: &str) {
        debug!("Tracking response ({} chars)", text.len());
        self.responses.lock().await.push(ResponseRecord {
            text: text.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub async fn summary(&self) -> CallSummary {
        let questions = self.questions.lock().await.clone();
        let responses = self.responses.lock().await.clone();
        let duration = Utc::now().signed_duration_since(self.started_at);

        CallSummary {
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            questions_count: questions.len(),
            responses_count: responses.len(),
            questions,
            responses,
        }
    }

    /// Drop all recorded events (meeting identity changed)
    pub async fn reset(&self) {
        self.questions.lock().await.clear();
        self.responses.lock().await.clear();
    }
}

impl Default for CallAnalytics {
    fn default() -> Self {
        Self::new()
    }
}
