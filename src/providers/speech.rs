use anyhow::Result;
use tracing::info;

/// Text-to-speech seam
///
/// `speak` resolves when synthesis finishes (or fails), returning whether
/// the utterance was actually spoken. `stop` interrupts an in-progress
/// utterance (barge-in).
#[async_trait::async_trait]
pub trait SpeechProvider: Send + Sync {
    async fn speak(&self, text: &str) -> Result<bool>;

    async fn stop(&self) -> Result<()>;

    fn name(&self) -> &str;
}

/// Speech provider that logs instead of synthesizing; for headless runs
/// and chat-only behavior patterns
pub struct NullSpeech;

#[async_trait::async_trait]
impl SpeechProvider for NullSpeech {
    async fn speak(&self, text: &str) -> Result<bool> {
        info!("speak (muted): {}", text);
        Ok(true)
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}
