pub mod compiler;
pub mod guard;
pub mod planner;
pub mod renderer;
pub mod session;

pub use compiler::{
    BudgetTier, CompiledRequest, ContextCompiler, Currency, DaySpan, Origin, TripParameters,
};
pub use guard::ConsistencyGuard;
pub use planner::TripPlanner;
pub use renderer::{DayView, Notice, NoticeLevel, Tick, TripRenderer, TripView};
pub use session::{GenerationStream, PlannerSession};
