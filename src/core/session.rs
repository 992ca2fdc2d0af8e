use super::planner::TripPlanner;
use crate::types::{context::TripContext, result::GenerationEvent};
use futures::Stream;
use std::{
    pin::Pin,
    sync::{Arc, Mutex, PoisonError},
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Subscriber end of one generation.
///
/// Once cancelled (explicitly, by a superseding generation, or by dropping
/// it) the stream yields nothing more, even events already queued.
#[derive(Debug)]
pub struct GenerationStream {
    plan_id: String,
    receiver: mpsc::Receiver<GenerationEvent>,
    token: CancellationToken,
}

impl GenerationStream {
    pub(crate) fn new(
        plan_id: String,
        receiver: mpsc::Receiver<GenerationEvent>,
        token: CancellationToken,
    ) -> Self {
        Self {
            plan_id,
            receiver,
            token,
        }
    }

    /// Id stamped into every snapshot of this generation
    pub fn plan_id(&self) -> &str {
        &self.plan_id
    }

    pub async fn recv(&mut self) -> Option<GenerationEvent> {
        if self.token.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            event = self.receiver.recv() => event,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Stream for GenerationStream {
    type Item = GenerationEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.token.is_cancelled() {
            return Poll::Ready(None);
        }
        self.receiver.poll_recv(cx)
    }
}

impl Drop for GenerationStream {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// One user's view onto the planner: at most one generation in flight.
#[derive(Debug)]
pub struct PlannerSession {
    planner: Arc<TripPlanner>,
    current: Mutex<Option<CancellationToken>>,
}

impl PlannerSession {
    pub fn new(planner: Arc<TripPlanner>) -> Self {
        Self {
            planner,
            current: Mutex::new(None),
        }
    }

    pub fn planner(&self) -> &TripPlanner {
        &self.planner
    }

    /// Start a generation, cancelling the one already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn generate(&self, context: &TripContext) -> GenerationStream {
        let stream = self.planner.generate(context);
        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(stream.token());

        if let Some(previous) = previous {
            if !previous.is_cancelled() {
                info!(
                    target: "moodtrip::session",
                    plan_id = %stream.plan_id(),
                    "superseding in-flight generation"
                );
                previous.cancel();
            }
        }
        stream
    }

    /// Cancel the in-flight generation, if any.
    pub fn cancel(&self) {
        if let Some(token) = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            token.cancel();
        }
    }
}
