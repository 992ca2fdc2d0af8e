//! mood-trip: mood-driven trip planning on top of a streaming LLM
//!
//! A [`TripContext`] (mood plus optional budget, timeframe, currency, origin and
//! departure date) is compiled into a brief, streamed from a generator as
//! schema-constrained JSON, surfaced as monotonic partial plans and finally
//! checked for internal consistency before it can be saved or booked.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mood_trip::{GenerationEvent, OpenRouterGenerator, TripContext, TripPlanner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let generator = OpenRouterGenerator::from_env()?;
//!     let planner = TripPlanner::new(generator)?;
//!
//!     let context = TripContext::new()
//!         .with_mood("culture-explorer")
//!         .with_budget(2500.0)
//!         .with_currency("EUR");
//!
//!     let mut stream = planner.generate(&context);
//!     while let Some(event) = stream.recv().await {
//!         match event {
//!             GenerationEvent::Partial(partial) => println!("{} days so far", partial.day_count()),
//!             GenerationEvent::Complete(checked) => println!("{}", checked.summary()),
//!             GenerationEvent::Failed(err) => eprintln!("{}", err.user_message()),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod error;
pub mod generators;
pub mod schemas;
pub(crate) mod services;
pub mod storage;
pub mod types;

pub use crate::core::{
    CompiledRequest, ConsistencyGuard, ContextCompiler, GenerationStream, Notice, NoticeLevel,
    PlannerSession, Tick, TripPlanner, TripRenderer, TripView,
};
pub use error::{Result, TripError};
pub use generators::{
    GenerationRequest, OpenRouterGenerator, ReplayGenerator, TextStream, TripGenerator,
};
pub use schemas::{CompletionSchema, SchemaHandle};
pub use services::planning::format_amount;
pub use storage::{
    BookingId, BookingStatus, BookingSummary, MemoryStore, SqliteStore, StoredTrip, TripId,
    TripStore, TripSummary, UserId,
};
pub use types::{
    CheckKind, CheckedPlan, GenerationEvent, PartialTripPlan, PlanStatus, TripContext, TripPlan,
    Violation,
};

#[cfg(feature = "cli")]
pub mod cli;
