#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use mood_trip::{
    BookingId, BookingSummary, CheckedPlan, GenerationRequest, MemoryStore, Result, StoredTrip,
    TextStream, TripError, TripGenerator, TripId, TripStore, TripSummary, UserId,
};
use serde_json::Value;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

/// Generator that plays back a fixed list of fragments, optionally failing midway.
#[derive(Debug, Clone)]
pub struct ScriptedGenerator {
    fragments: Vec<std::result::Result<String, String>>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(|f| Ok(f.into())).collect(),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn then_fail(mut self, message: impl Into<String>) -> Self {
        self.fragments.push(Err(message.into()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TripGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, _request: &GenerationRequest) -> Result<TextStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay;
        let stream = futures::stream::iter(self.fragments.clone()).then(move |fragment| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            fragment.map_err(TripError::Stream)
        });
        Ok(Box::pin(stream))
    }
}

/// Split `text` into fragments of at most `size` characters.
pub fn fragments(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

pub fn sample_value() -> Value {
    serde_json::from_str(mood_trip::ReplayGenerator::sample_text()).unwrap()
}

/// Store wrapper that counts calls reaching the backing store.
#[derive(Debug, Default)]
pub struct CountingStore {
    inner: MemoryStore,
    pub saves: AtomicUsize,
    pub bookings: AtomicUsize,
}

impl CountingStore {
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn bookings(&self) -> usize {
        self.bookings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TripStore for CountingStore {
    async fn save_trip(&self, user: &UserId, plan: &CheckedPlan) -> Result<TripId> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save_trip(user, plan).await
    }

    async fn create_booking(&self, user: &UserId, plan: &CheckedPlan) -> Result<BookingId> {
        self.bookings.fetch_add(1, Ordering::SeqCst);
        self.inner.create_booking(user, plan).await
    }

    async fn book_saved_trip(&self, user: &UserId, trip: &TripId) -> Result<BookingId> {
        self.bookings.fetch_add(1, Ordering::SeqCst);
        self.inner.book_saved_trip(user, trip).await
    }

    async fn list_trips(&self, user: &UserId) -> Result<Vec<TripSummary>> {
        self.inner.list_trips(user).await
    }

    async fn list_bookings(&self, user: &UserId) -> Result<Vec<BookingSummary>> {
        self.inner.list_bookings(user).await
    }

    async fn get_trip(&self, user: &UserId, trip: &TripId) -> Result<StoredTrip> {
        self.inner.get_trip(user, trip).await
    }

    async fn delete_trip(&self, user: &UserId, trip: &TripId) -> Result<()> {
        self.inner.delete_trip(user, trip).await
    }
}

/// True when everything `prev` holds is still present in `next`.
pub fn grows_from(prev: &Value, next: &Value) -> bool {
    match (prev, next) {
        (Value::Object(a), Value::Object(b)) => a
            .iter()
            .all(|(key, value)| b.get(key).is_some_and(|other| grows_from(value, other))),
        (Value::Array(a), Value::Array(b)) => {
            a.len() <= b.len() && a.iter().zip(b).all(|(x, y)| grows_from(x, y))
        }
        (Value::String(a), Value::String(b)) => b.starts_with(a.as_str()),
        (a, b) => a == b,
    }
}
