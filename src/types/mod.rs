pub mod context;
pub mod partial;
pub mod result;
pub mod trip_types;

pub use context::{TimeframeInput, TripContext};
pub use partial::PartialTripPlan;
pub use result::{CheckKind, CheckedPlan, GenerationEvent, PlanStatus, Violation};
pub use trip_types::{
    Accommodation, Activity, ActivityCategory, Budget, BudgetBreakdown, Coordinates, Destination,
    Extras, ItineraryDay, Timeframe, TransportSegment, TripPlan,
};
