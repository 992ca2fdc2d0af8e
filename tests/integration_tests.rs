mod common;

use common::{fragments, grows_from, sample_value, CountingStore, ScriptedGenerator};
use mood_trip::{
    core::{BudgetTier, Currency, DaySpan, Tick},
    GenerationEvent, GenerationStream, MemoryStore, PlanStatus, PlannerSession, ReplayGenerator,
    SqliteStore, TripContext, TripError, TripPlanner, TripRenderer, TripStore, UserId,
};
use serde_json::Value;
use std::{sync::Arc, time::Duration};

async fn drain(mut stream: GenerationStream) -> Vec<GenerationEvent> {
    let mut events = Vec::new();
    while let Some(event) = stream.recv().await {
        events.push(event);
    }
    events
}

fn planner_for(text: &str, size: usize) -> TripPlanner {
    TripPlanner::new(ScriptedGenerator::new(fragments(text, size))).unwrap()
}

#[tokio::test]
async fn test_empty_context_uses_defaults_and_yields_consistent_plan() {
    let planner = TripPlanner::new(ReplayGenerator::sample().with_chunk_size(50)).unwrap();
    let context: TripContext = serde_json::from_str("{}").unwrap();

    let compiled = planner.compile(&context).unwrap();
    assert_eq!(compiled.params.mood, "Flexible");
    assert_eq!(compiled.params.currency, Currency::FALLBACK);
    assert_eq!(compiled.params.budget, BudgetTier::Moderate);
    assert_eq!(compiled.params.timeframe.bounds(), DaySpan::DEFAULT);

    let events = drain(planner.generate(&context)).await;
    let Some(GenerationEvent::Complete(checked)) = events.last() else {
        panic!("expected a completed plan, got {:?}", events.last());
    };
    assert_eq!(checked.status(), PlanStatus::Complete);

    let plan = checked.plan();
    let sum: f64 = plan.budget.breakdown.sum();
    assert_eq!(plan.budget.total, sum);
    assert!(plan.timeframe.end_date > plan.timeframe.start_date);
    assert_eq!(plan.itinerary.len() as u32, plan.timeframe.duration_days);
    for (idx, day) in plan.itinerary.iter().enumerate() {
        assert_eq!(day.day, idx as u32 + 1);
    }
    for segment in &plan.transport {
        assert!(segment.arrival > segment.departure);
    }
}

#[tokio::test]
async fn test_compilation_is_idempotent() {
    let planner = planner_for("{}", 2);
    let context = TripContext::new()
        .with_mood("romantic-getaway")
        .with_budget(1800.0)
        .with_timeframe_text("long weekend")
        .with_currency("GBP")
        .with_location("Leeds");
    assert_eq!(
        planner.compile(&context).unwrap(),
        planner.compile(&context).unwrap()
    );
}

#[tokio::test]
async fn test_partials_only_grow() {
    let planner = planner_for(ReplayGenerator::sample_text(), 7);
    let events = drain(planner.generate(&TripContext::default())).await;

    let snapshots: Vec<Value> = events
        .iter()
        .filter_map(|event| match event {
            GenerationEvent::Partial(partial) => Some(serde_json::to_value(partial).unwrap()),
            _ => None,
        })
        .collect();
    assert!(snapshots.len() > 10);
    for pair in snapshots.windows(2) {
        assert!(grows_from(&pair[0], &pair[1]), "snapshot shrank");
        assert_ne!(pair[0], pair[1]);
    }

    let terminal: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
    assert_eq!(terminal.len(), 1);
    assert!(events.last().unwrap().is_terminal());
}

#[tokio::test]
async fn test_budget_mismatch_degrades_but_can_still_be_saved() {
    let mut value = sample_value();
    value["budget"]["total"] = Value::from(4100);
    let text = serde_json::to_string_pretty(&value).unwrap();

    let planner = Arc::new(planner_for(&text, 64));
    let mut renderer = TripRenderer::new(planner, TripContext::new().with_mood("culture-explorer"));
    renderer.start();
    assert_eq!(renderer.run_to_end().await, Tick::Complete);

    let checked = renderer.plan().unwrap();
    assert!(checked.is_degraded());
    assert!(renderer.view().warnings.iter().any(|w| w.contains("budget_sum")));

    let store = SqliteStore::open_in_memory().unwrap();
    let user = UserId::new("user_1");
    let id = renderer.save(&store, Some(&user)).await.unwrap();

    let stored = store.get_trip(&user, &id).await.unwrap();
    assert_eq!(stored.summary.status, PlanStatus::Degraded);
    assert_eq!(stored.plan.budget.total, 4100.0);
}

#[tokio::test]
async fn test_huge_budget_amounts_still_end_with_one_terminal_event() {
    let mut value = sample_value();
    value["budget"]["breakdown"]["flights"] = Value::from(1e17);
    value["budget"]["breakdown"]["housing"] = Value::from(1e17);
    let planner = planner_for(&value.to_string(), 96);

    let events = drain(planner.generate(&TripContext::default())).await;
    let terminal: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
    assert_eq!(terminal.len(), 1);
    let Some(GenerationEvent::Complete(checked)) = events.last() else {
        panic!("expected a completed plan, got {:?}", events.last());
    };
    assert!(checked.is_degraded());
    assert!(checked.warnings().iter().any(|w| w.path == "/budget"));
}

#[tokio::test]
async fn test_saved_trip_can_be_booked_later_from_the_store() {
    let planner = Arc::new(planner_for(ReplayGenerator::sample_text(), 128));
    let mut renderer = TripRenderer::new(planner, TripContext::new().with_mood("romantic-getaway"));
    renderer.start();
    renderer.run_to_end().await;

    let store = SqliteStore::open_in_memory().unwrap();
    let user = UserId::new("user_1");
    let trip = renderer.save(&store, Some(&user)).await.unwrap();
    assert_eq!(
        store.list_trips(&user).await.unwrap()[0].mood_slug.as_deref(),
        Some("romantic-getaway")
    );

    store.book_saved_trip(&user, &trip).await.unwrap();
    let err = store.book_saved_trip(&user, &trip).await.unwrap_err();
    assert!(matches!(err, TripError::Precondition(_)));

    let bookings = store.list_bookings(&user).await.unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0].trip_id.as_ref(), Some(&trip));
    assert_eq!(bookings[0].plan_status, PlanStatus::Complete);
}

#[tokio::test]
async fn test_timeout_fails_without_completion_and_offers_retry() {
    let generator = ReplayGenerator::sample()
        .with_chunk_size(16)
        .with_delay(Duration::from_millis(25));
    let planner = TripPlanner::new(generator)
        .unwrap()
        .with_timeout(Duration::from_millis(150));

    let events = drain(planner.generate(&TripContext::default())).await;
    assert!(!events
        .iter()
        .any(|event| matches!(event, GenerationEvent::Complete(_))));
    match events.last() {
        Some(GenerationEvent::Failed(err @ TripError::Timeout(_))) => {
            assert!(err.is_retryable());
            assert_eq!(err.error_code(), "GENERATION_TIMEOUT");
        }
        other => panic!("expected a timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_renderer_shows_failure_banner_after_timeout() {
    let generator = ReplayGenerator::sample()
        .with_chunk_size(16)
        .with_delay(Duration::from_millis(25));
    let planner = TripPlanner::new(generator)
        .unwrap()
        .with_timeout(Duration::from_millis(100));
    let mut renderer = TripRenderer::new(Arc::new(planner), TripContext::default());
    renderer.start();

    assert_eq!(renderer.run_to_end().await, Tick::Failed);
    assert!(!renderer.is_loading());
    assert!(renderer.plan().is_none());
    assert_eq!(
        renderer.view().banner.as_deref(),
        Some("Failed to generate trip. Try again?")
    );
}

#[tokio::test]
async fn test_superseded_generation_delivers_only_the_second_result() {
    let slow = ReplayGenerator::sample()
        .with_chunk_size(40)
        .with_delay(Duration::from_millis(5));
    let session = PlannerSession::new(Arc::new(TripPlanner::new(slow).unwrap()));

    let mut first = session.generate(&TripContext::new().with_mood("beach"));
    let first_event = first.recv().await;
    assert!(matches!(first_event, Some(GenerationEvent::Partial(_))));

    let second = session.generate(&TripContext::new().with_mood("mountains"));
    let second_id = second.plan_id().to_string();
    assert!(first.recv().await.is_none());

    let events = drain(second).await;
    let terminal: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
    assert_eq!(terminal.len(), 1);
    let GenerationEvent::Complete(checked) = terminal[0] else {
        panic!("expected completion");
    };
    assert_eq!(checked.plan().id, second_id);
}

#[tokio::test]
async fn test_mid_stream_failure_is_terminal() {
    let text = ReplayGenerator::sample_text();
    let generator = ScriptedGenerator::new(fragments(&text[..400], 100)).then_fail("connection reset");
    let planner = TripPlanner::new(generator).unwrap();

    let events = drain(planner.generate(&TripContext::default())).await;
    assert!(events.len() >= 2);
    match events.last() {
        Some(GenerationEvent::Failed(TripError::Stream(message))) => {
            assert!(message.contains("connection reset"));
        }
        other => panic!("expected a stream failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_wrong_types_fail_with_schema_violation() {
    let mut value = sample_value();
    value["timeframe"]["durationDays"] = Value::from("seven");
    let planner = planner_for(&value.to_string(), 200);

    let events = drain(planner.generate(&TripContext::default())).await;
    match events.last() {
        Some(GenerationEvent::Failed(err @ TripError::SchemaViolation { .. })) => {
            assert!(err
                .violations()
                .iter()
                .any(|v| v.path.contains("durationDays")));
        }
        other => panic!("expected a schema violation, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_context_never_reaches_the_generator() {
    let generator = ScriptedGenerator::new(["{}"]);
    let planner = TripPlanner::new(generator.clone()).unwrap();

    let events = drain(planner.generate(&TripContext::new().with_budget(-50.0))).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], GenerationEvent::Failed(TripError::Config(_))));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_duplicate_booking_reaches_store_once() {
    let planner = Arc::new(planner_for(ReplayGenerator::sample_text(), 128));
    let mut renderer = TripRenderer::new(planner, TripContext::new().with_mood("culture-explorer"));
    renderer.start();
    renderer.run_to_end().await;

    let store = CountingStore::default();
    let user = UserId::new("user_1");
    renderer.book(&store, Some(&user)).await.unwrap();
    let err = renderer.book(&store, Some(&user)).await.unwrap_err();

    assert!(matches!(err, TripError::Precondition(_)));
    assert_eq!(store.bookings(), 1);
    assert_eq!(store.list_bookings(&user).await.unwrap().len(), 1);
    assert_eq!(
        renderer.notices().last().unwrap().message,
        "You recently booked this trip."
    );
}

#[tokio::test]
async fn test_anonymous_save_is_rejected_before_the_store() {
    let planner = Arc::new(planner_for(ReplayGenerator::sample_text(), 128));
    let mut renderer = TripRenderer::new(planner, TripContext::default());
    renderer.start();
    renderer.run_to_end().await;

    let store = CountingStore::default();
    assert!(renderer.save(&store, None).await.is_err());
    assert!(renderer.book(&store, None).await.is_err());
    assert_eq!(store.saves(), 0);
    assert_eq!(store.bookings(), 0);
    assert_eq!(
        renderer.notices()[0].message,
        "You must be logged in to save your trip."
    );
    assert_eq!(
        renderer.notices()[1].message,
        "You must be logged in to book your trip."
    );
}

#[tokio::test]
async fn test_saved_trips_listed_newest_first_across_stores() {
    let planner = Arc::new(planner_for(ReplayGenerator::sample_text(), 256));
    let user = UserId::new("user_1");
    let memory = MemoryStore::new();
    let sqlite = SqliteStore::open_in_memory().unwrap();
    let stores: [&dyn TripStore; 2] = [&memory, &sqlite];

    for store in stores {
        let mut ids = Vec::new();
        for _ in 0..2 {
            let mut renderer = TripRenderer::new(planner.clone(), TripContext::default());
            renderer.start();
            renderer.run_to_end().await;
            ids.push(renderer.save(store, Some(&user)).await.unwrap());
        }
        let listed: Vec<_> = store
            .list_trips(&user)
            .await
            .unwrap()
            .into_iter()
            .map(|trip| trip.id)
            .collect();
        ids.reverse();
        assert_eq!(listed, ids);
    }
}
