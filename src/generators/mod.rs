//! Sources of streamed trip text

pub mod generator;
pub mod openrouter;
pub mod replay;

pub use generator::{GenerationRequest, TextStream, TripGenerator};
pub use openrouter::OpenRouterGenerator;
pub use replay::ReplayGenerator;
