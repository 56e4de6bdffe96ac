pub mod actions;
pub mod engine;

pub use actions::{BookingAction, TransitionOutcome};
pub use engine::{BookingLifecycle, BookingPolicy};
