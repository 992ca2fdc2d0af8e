use super::{GenerationRequest, TextStream, TripGenerator};
use crate::error::{Result, TripError};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;

const SAMPLE_TRIP: &str = include_str!("../../assets/sample_trip.json");

/// Replays fixed text as if it were being generated.
///
/// Used for offline runs and tests. The text is cut into chunks of
/// `chunk_size` characters, each delivered after `delay`.
#[derive(Debug, Clone)]
pub struct ReplayGenerator {
    text: String,
    chunk_size: usize,
    delay: Option<Duration>,
    fail_after: Option<(usize, String)>,
}

impl ReplayGenerator {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            chunk_size: 64,
            delay: None,
            fail_after: None,
        }
    }

    /// The bundled one-week Kyoto plan
    pub fn sample() -> Self {
        Self::new(SAMPLE_TRIP)
    }

    pub fn sample_text() -> &'static str {
        SAMPLE_TRIP
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Break the stream with a [`TripError::Stream`] after `chunks` chunks.
    pub fn failing_after(mut self, chunks: usize, message: impl Into<String>) -> Self {
        self.fail_after = Some((chunks, message.into()));
        self
    }

    fn chunks(&self) -> Vec<String> {
        let chars: Vec<char> = self.text.chars().collect();
        chars
            .chunks(self.chunk_size)
            .map(|chunk| chunk.iter().collect())
            .collect()
    }
}

#[async_trait]
impl TripGenerator for ReplayGenerator {
    fn name(&self) -> &str {
        "replay"
    }

    async fn stream(&self, _request: &GenerationRequest) -> Result<TextStream> {
        let mut items: Vec<Result<String>> = self.chunks().into_iter().map(Ok).collect();
        if let Some((after, message)) = &self.fail_after {
            items.truncate(*after);
            items.push(Err(TripError::Stream(message.clone())));
        }

        let delay = self.delay;
        let stream = futures::stream::iter(items).then(move |item| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            item
        });
        Ok(Box::pin(stream))
    }
}
