use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use tailor_core::domain::booking::{Booking, BookingId, BookingStatus, CustomerId};
use tailor_core::domain::order::{Order, OrderId, OrderStatus};
use tailor_core::domain::schedule::{Schedule, TailorId};
use tailor_core::slots::BusyInterval;

pub mod booking;
pub mod memory;
pub mod order;
pub mod schedule;

pub use booking::SqlBookingRepository;
pub use memory::{InMemoryBookingRepository, InMemoryOrderRepository, InMemoryScheduleRepository};
pub use order::SqlOrderRepository;
pub use schedule::SqlScheduleRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("slot {start}-{end} on {date} for tailor `{tailor_id}` is already booked")]
    SlotConflict { tailor_id: String, date: NaiveDate, start: u16, end: u16 },
    #[error("stale write for {entity} `{id}`: expected status `{expected}`")]
    ConcurrentUpdate { entity: &'static str, id: String, expected: String },
}

#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn find_by_tailor(&self, id: &TailorId) -> Result<Option<Schedule>, RepositoryError>;
    async fn upsert(&self, schedule: &Schedule) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn find_by_id(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError>;

    async fn list_for_tailor_date(
        &self,
        tailor_id: &TailorId,
        date: NaiveDate,
    ) -> Result<Vec<Booking>, RepositoryError>;

    async fn list_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<Booking>, RepositoryError>;

    /// Minute-of-day ranges of slot-occupying bookings on the given date.
    async fn busy_intervals(
        &self,
        tailor_id: &TailorId,
        date: NaiveDate,
    ) -> Result<Vec<BusyInterval>, RepositoryError>;

    /// Insert the booking only if no slot-occupying booking overlaps it.
    /// Fails with [`RepositoryError::SlotConflict`] when the slot was taken,
    /// including by a concurrent writer.
    async fn create_if_slot_free(&self, booking: &Booking) -> Result<(), RepositoryError>;

    /// Persist a lifecycle transition, guarded by the status the caller
    /// transitioned away from. A stale guard means another writer won.
    async fn save_transition(
        &self,
        booking: &Booking,
        expected: BookingStatus,
    ) -> Result<(), RepositoryError>;

    /// Atomically persist the payment/conversion pair and create the order.
    /// Guarded on the row still being `quote_accepted`; payment and
    /// conversion are applied together so a paid-but-unconverted row never
    /// exists.
    async fn convert_paid(&self, booking: &Booking, order: &Order)
        -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;

    async fn list_for_tailor(&self, tailor_id: &TailorId) -> Result<Vec<Order>, RepositoryError>;

    /// Persist a tracker mutation, guarded by the status the caller read.
    async fn save(&self, order: &Order, expected: OrderStatus) -> Result<(), RepositoryError>;
}
