pub mod config;
pub mod domain;
pub mod errors;
pub mod lifecycle;
pub mod notify;
pub mod slots;
pub mod workplan;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::actor::{Actor, ActorRole};
pub use domain::booking::{Booking, BookingId, BookingStatus, CustomerId, MeasurementProfileId};
pub use domain::order::{Order, OrderAction, OrderId, OrderStatus, StageStatus, WorkStage};
pub use domain::quote::{EstimatedDays, Quote, QuoteDraft, QuoteItem};
pub use domain::schedule::{DayAvailability, Schedule, TailorId, TimeWindow};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use lifecycle::{BookingAction, BookingLifecycle, BookingPolicy, TransitionOutcome};
pub use notify::{NotificationEvent, NotificationSink};
pub use slots::{generate_slots, BusyInterval, Slot};
pub use workplan::WorkPlanTracker;
