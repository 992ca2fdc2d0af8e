use super::{
    compiler::{CompiledRequest, ContextCompiler},
    guard::ConsistencyGuard,
    session::GenerationStream,
};
use crate::{
    error::{Result, TripError},
    generators::{GenerationRequest, OpenRouterGenerator, TextStream, TripGenerator},
    schemas::{extract_object, merge_monotonic, parse_partial, CompletionSchema},
    types::{
        context::TripContext,
        partial::PartialTripPlan,
        result::{CheckKind, CheckedPlan, GenerationEvent, Violation},
        trip_types::TripPlan,
    },
};
use futures::StreamExt;
use serde_json::{Map, Value};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const CHANNEL_CAPACITY: usize = 64;

/// Drives one structured generation per call and streams its snapshots.
#[derive(Debug, Clone)]
pub struct TripPlanner {
    generator: Arc<dyn TripGenerator>,
    compiler: ContextCompiler,
    guard: Arc<ConsistencyGuard>,
    timeout: Duration,
}

impl TripPlanner {
    pub fn new(generator: impl TripGenerator + 'static) -> Result<Self> {
        Self::with_shared_generator(Arc::new(generator))
    }

    pub fn with_shared_generator(generator: Arc<dyn TripGenerator>) -> Result<Self> {
        Ok(Self {
            generator,
            compiler: ContextCompiler::new(),
            guard: Arc::new(ConsistencyGuard::new()?),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_compiler(mut self, compiler: ContextCompiler) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn with_guard(mut self, guard: ConsistencyGuard) -> Self {
        self.guard = Arc::new(guard);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn compiler(&self) -> &ContextCompiler {
        &self.compiler
    }

    pub fn guard(&self) -> &ConsistencyGuard {
        &self.guard
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    /// OpenRouter generator from the environment, plus `MOOD_TRIP_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        let planner = Self::new(OpenRouterGenerator::from_env()?)?;
        match std::env::var("MOOD_TRIP_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs = raw.trim().parse::<u64>().ok().filter(|secs| *secs > 0).ok_or_else(
                    || {
                        TripError::Config(format!(
                            "MOOD_TRIP_TIMEOUT_SECS must be a positive integer, got `{raw}`"
                        ))
                    },
                )?;
                Ok(planner.with_timeout(Duration::from_secs(secs)))
            }
            Err(_) => Ok(planner),
        }
    }

    pub fn compile(&self, context: &TripContext) -> Result<CompiledRequest> {
        self.compiler.compile(context)
    }

    /// Start generating a plan for `context`.
    ///
    /// The returned stream yields partial snapshots and ends with exactly one
    /// `Complete` or `Failed`. A context that does not compile fails at once
    /// without reaching the generator. Must be called from within a Tokio
    /// runtime.
    pub fn generate(&self, context: &TripContext) -> GenerationStream {
        let plan_id = Uuid::new_v4().to_string();
        let token = CancellationToken::new();
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let stream = GenerationStream::new(plan_id.clone(), receiver, token.clone());

        let compiled = match self.compile(context) {
            Ok(compiled) => compiled,
            Err(err) => {
                warn!(target: "moodtrip::planner", plan_id = %plan_id, error = %err, "context rejected");
                let _ = sender.try_send(GenerationEvent::Failed(err));
                return stream;
            }
        };

        info!(
            target: "moodtrip::planner",
            plan_id = %plan_id,
            generator = self.generator.name(),
            mood = %compiled.params.mood,
            timeout_secs = self.timeout.as_secs(),
            "starting trip generation"
        );

        let job = Job {
            generator: Arc::clone(&self.generator),
            request: GenerationRequest::new(&compiled, TripPlan::schema()),
            guard: Arc::clone(&self.guard),
            plan_id: plan_id.clone(),
            mood_slug: compiled.params.mood_slug.clone(),
            timeout: self.timeout,
            token: token.clone(),
            sender: sender.clone(),
        };
        let handle = tokio::spawn(job.run());
        tokio::spawn(supervise(handle, plan_id, token, sender));
        stream
    }
}

/// Turn a job that died without a terminal event into a `Failed` event.
async fn supervise(
    handle: tokio::task::JoinHandle<()>,
    plan_id: String,
    token: CancellationToken,
    sender: mpsc::Sender<GenerationEvent>,
) {
    let Err(err) = handle.await else {
        return;
    };
    if token.is_cancelled() || !err.is_panic() {
        return;
    }
    error!(target: "moodtrip::planner", plan_id = %plan_id, "trip generation task panicked");
    let _ = sender
        .send(GenerationEvent::Failed(TripError::Stream(
            "trip generation stopped unexpectedly".to_string(),
        )))
        .await;
}

struct Job {
    generator: Arc<dyn TripGenerator>,
    request: GenerationRequest,
    guard: Arc<ConsistencyGuard>,
    plan_id: String,
    mood_slug: Option<String>,
    timeout: Duration,
    token: CancellationToken,
    sender: mpsc::Sender<GenerationEvent>,
}

enum Step<T> {
    Cancelled,
    TimedOut,
    Ready(T),
}

impl Job {
    async fn run(self) {
        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let opened = tokio::select! {
            biased;
            _ = self.token.cancelled() => Step::Cancelled,
            _ = &mut deadline => Step::TimedOut,
            opened = self.generator.stream(&self.request) => Step::Ready(opened),
        };
        let fragments = match opened {
            Step::Cancelled => return self.log_cancelled(),
            Step::TimedOut => return self.fail(TripError::Timeout(self.timeout.as_secs())).await,
            Step::Ready(Err(err)) => return self.fail(err).await,
            Step::Ready(Ok(fragments)) => fragments,
        };

        let text = match self.accumulate(fragments, deadline.as_mut()).await {
            Step::Cancelled => return self.log_cancelled(),
            Step::TimedOut => return self.fail(TripError::Timeout(self.timeout.as_secs())).await,
            Step::Ready(Err(err)) => return self.fail(err).await,
            Step::Ready(Ok(text)) => text,
        };

        match finalize(&text, &self.plan_id, &self.guard) {
            Ok(checked) => {
                let checked = checked.with_mood_slug(self.mood_slug.clone());
                info!(
                    target: "moodtrip::planner",
                    plan_id = %self.plan_id,
                    status = %checked.status(),
                    warnings = checked.warnings().len(),
                    "trip generation finished"
                );
                self.emit(GenerationEvent::Complete(checked)).await;
            }
            Err(err) => self.fail(err).await,
        }
    }

    /// Read fragments until the generator finishes, emitting changed snapshots.
    ///
    /// The fragment stream is dropped on return, which releases the generator.
    async fn accumulate(
        &self,
        mut fragments: TextStream,
        mut deadline: std::pin::Pin<&mut tokio::time::Sleep>,
    ) -> Step<Result<String>> {
        let mut text = String::new();
        let mut snapshot = Value::Object(Map::new());
        let mut last = PartialTripPlan {
            id: Some(self.plan_id.clone()),
            ..Default::default()
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = self.token.cancelled() => return Step::Cancelled,
                _ = &mut deadline => return Step::TimedOut,
                next = fragments.next() => next,
            };

            match next {
                Some(Ok(fragment)) => {
                    text.push_str(&fragment);
                    let Some(parsed) = parse_partial(&text) else {
                        continue;
                    };
                    merge_monotonic(&mut snapshot, parsed);
                    stamp_id(&mut snapshot, &self.plan_id);

                    let partial = PartialTripPlan::from_value(&snapshot);
                    if partial != last {
                        last = partial.clone();
                        if !self.emit(GenerationEvent::Partial(partial)).await {
                            return Step::Cancelled;
                        }
                    }
                }
                Some(Err(err)) => return Step::Ready(Err(err)),
                None => {
                    debug!(
                        target: "moodtrip::planner",
                        plan_id = %self.plan_id,
                        bytes = text.len(),
                        "generator stream ended"
                    );
                    return Step::Ready(Ok(text));
                }
            }
        }
    }

    /// Deliver an event unless the subscriber is gone; false means stop.
    async fn emit(&self, event: GenerationEvent) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            sent = self.sender.send(event) => sent.is_ok(),
        }
    }

    async fn fail(&self, err: TripError) {
        warn!(
            target: "moodtrip::planner",
            plan_id = %self.plan_id,
            code = err.error_code(),
            error = %err,
            "trip generation failed"
        );
        self.emit(GenerationEvent::Failed(err)).await;
    }

    fn log_cancelled(&self) {
        debug!(target: "moodtrip::planner", plan_id = %self.plan_id, "generation cancelled");
    }
}

fn stamp_id(snapshot: &mut Value, plan_id: &str) {
    if let Value::Object(map) = snapshot {
        map.insert("id".to_string(), Value::String(plan_id.to_string()));
    }
}

/// Strictly parse the full generator output and run it through the guard.
fn finalize(text: &str, plan_id: &str, guard: &ConsistencyGuard) -> Result<CheckedPlan> {
    let rejected = |message: String| TripError::SchemaViolation {
        violations: vec![Violation::new(CheckKind::Schema, "<root>", message.clone())],
        message,
    };

    let object = extract_object(text)
        .ok_or_else(|| rejected("generator output does not contain a JSON object".to_string()))?;
    let mut value: Value = serde_json::from_str(object)
        .map_err(|err| rejected(format!("generator output is not valid JSON: {err}")))?;
    stamp_id(&mut value, plan_id);
    guard.check(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{generators::ReplayGenerator, types::result::PlanStatus};

    async fn drain(mut stream: GenerationStream) -> Vec<GenerationEvent> {
        let mut events = Vec::new();
        while let Some(event) = stream.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_sample_generates_complete_plan_with_fresh_id() {
        let planner = TripPlanner::new(ReplayGenerator::sample().with_chunk_size(97)).unwrap();
        let stream = planner.generate(&TripContext::default());
        let plan_id = stream.plan_id().to_string();
        let events = drain(stream).await;

        assert!(events.len() > 2);
        let Some(GenerationEvent::Complete(checked)) = events.last() else {
            panic!("expected completion, got {:?}", events.last());
        };
        assert_eq!(checked.status(), PlanStatus::Complete, "{}", checked.summary());
        assert_eq!(checked.plan().id, plan_id);
        assert_ne!(checked.plan().id, "kyoto-cultural-immersion");

        for event in &events[..events.len() - 1] {
            let GenerationEvent::Partial(partial) = event else {
                panic!("only the last event may be terminal");
            };
            assert_eq!(partial.id.as_deref(), Some(plan_id.as_str()));
        }
    }

    #[tokio::test]
    async fn test_invalid_context_fails_without_generating() {
        let planner = TripPlanner::new(ReplayGenerator::sample()).unwrap();
        let events = drain(planner.generate(&TripContext::new().with_budget(-1.0))).await;
        assert_eq!(events.len(), 1);
        let GenerationEvent::Failed(err) = &events[0] else {
            panic!("expected failure");
        };
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[tokio::test]
    async fn test_prose_output_is_schema_violation() {
        let planner = TripPlanner::new(ReplayGenerator::new("I cannot help with that.")).unwrap();
        let events = drain(planner.generate(&TripContext::default())).await;
        assert_eq!(events.len(), 1);
        let GenerationEvent::Failed(err) = &events[0] else {
            panic!("expected failure");
        };
        assert_eq!(err.error_code(), "SCHEMA_VIOLATION");
    }

    #[tokio::test]
    async fn test_generator_error_is_terminal() {
        let generator = ReplayGenerator::sample()
            .with_chunk_size(50)
            .failing_after(3, "connection reset");
        let planner = TripPlanner::new(generator).unwrap();
        let events = drain(planner.generate(&TripContext::default())).await;
        let Some(GenerationEvent::Failed(err)) = events.last() else {
            panic!("expected failure");
        };
        assert_eq!(err.error_code(), "STREAM_ERROR");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_finalize_strips_code_fence() {
        let guard = ConsistencyGuard::new().unwrap();
        let text = format!("```json\n{}\n```", ReplayGenerator::sample_text());
        let checked = finalize(&text, "fresh-id", &guard).unwrap();
        assert_eq!(checked.plan().id, "fresh-id");
    }
}
