use std::collections::HashMap;

use chrono::NaiveDate;
use tokio::sync::RwLock;

use tailor_core::domain::booking::{Booking, BookingId, BookingStatus, CustomerId};
use tailor_core::domain::order::{Order, OrderId, OrderStatus};
use tailor_core::domain::schedule::{Schedule, TailorId};
use tailor_core::slots::BusyInterval;

use super::{BookingRepository, OrderRepository, RepositoryError, ScheduleRepository};

#[derive(Default)]
pub struct InMemoryScheduleRepository {
    schedules: RwLock<HashMap<String, Schedule>>,
}

#[async_trait::async_trait]
impl ScheduleRepository for InMemoryScheduleRepository {
    async fn find_by_tailor(&self, id: &TailorId) -> Result<Option<Schedule>, RepositoryError> {
        let schedules = self.schedules.read().await;
        Ok(schedules.get(&id.0).cloned())
    }

    async fn upsert(&self, schedule: &Schedule) -> Result<(), RepositoryError> {
        let mut schedules = self.schedules.write().await;
        schedules.insert(schedule.tailor_id.0.clone(), schedule.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryBookingRepository {
    bookings: RwLock<HashMap<String, Booking>>,
    converted_orders: RwLock<Vec<Order>>,
}

impl InMemoryBookingRepository {
    /// Orders spawned through [`BookingRepository::convert_paid`].
    pub async fn converted_orders(&self) -> Vec<Order> {
        self.converted_orders.read().await.clone()
    }
}

#[async_trait::async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn find_by_id(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError> {
        let bookings = self.bookings.read().await;
        Ok(bookings.get(&id.0).cloned())
    }

    async fn list_for_tailor_date(
        &self,
        tailor_id: &TailorId,
        date: NaiveDate,
    ) -> Result<Vec<Booking>, RepositoryError> {
        let bookings = self.bookings.read().await;
        let mut matches: Vec<Booking> = bookings
            .values()
            .filter(|booking| booking.tailor_id == *tailor_id && booking.date == date)
            .cloned()
            .collect();
        matches.sort_by_key(|booking| booking.start_time);
        Ok(matches)
    }

    async fn list_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<Booking>, RepositoryError> {
        let bookings = self.bookings.read().await;
        let mut matches: Vec<Booking> = bookings
            .values()
            .filter(|booking| booking.customer_id == *customer_id)
            .cloned()
            .collect();
        matches.sort_by_key(|booking| (std::cmp::Reverse(booking.date), booking.start_time));
        Ok(matches)
    }

    async fn busy_intervals(
        &self,
        tailor_id: &TailorId,
        date: NaiveDate,
    ) -> Result<Vec<BusyInterval>, RepositoryError> {
        let bookings = self.bookings.read().await;
        let mut busy: Vec<BusyInterval> = bookings
            .values()
            .filter(|booking| {
                booking.tailor_id == *tailor_id
                    && booking.date == date
                    && booking.status.occupies_slot()
            })
            .map(|booking| BusyInterval { start: booking.start_time, end: booking.end_time })
            .collect();
        busy.sort_by_key(|interval| interval.start);
        Ok(busy)
    }

    async fn create_if_slot_free(&self, booking: &Booking) -> Result<(), RepositoryError> {
        // The write lock spans check and insert, mirroring the atomic
        // conditional insert of the SQL implementation.
        let mut bookings = self.bookings.write().await;
        let taken = bookings.values().any(|existing| {
            existing.tailor_id == booking.tailor_id
                && existing.date == booking.date
                && existing.status.occupies_slot()
                && existing.overlaps(booking.start_time, booking.end_time)
        });
        if taken {
            return Err(RepositoryError::SlotConflict {
                tailor_id: booking.tailor_id.0.clone(),
                date: booking.date,
                start: booking.start_time,
                end: booking.end_time,
            });
        }

        bookings.insert(booking.id.0.clone(), booking.clone());
        Ok(())
    }

    async fn save_transition(
        &self,
        booking: &Booking,
        expected: BookingStatus,
    ) -> Result<(), RepositoryError> {
        let mut bookings = self.bookings.write().await;
        match bookings.get(&booking.id.0) {
            Some(existing) if existing.status == expected => {
                bookings.insert(booking.id.0.clone(), booking.clone());
                Ok(())
            }
            _ => Err(RepositoryError::ConcurrentUpdate {
                entity: "booking",
                id: booking.id.0.clone(),
                expected: expected.as_str().to_string(),
            }),
        }
    }

    async fn convert_paid(
        &self,
        booking: &Booking,
        order: &Order,
    ) -> Result<(), RepositoryError> {
        self.save_transition(booking, BookingStatus::QuoteAccepted).await?;
        self.converted_orders.write().await.push(order.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<String, Order>>,
}

impl InMemoryOrderRepository {
    pub async fn insert(&self, order: Order) {
        let mut orders = self.orders.write().await;
        orders.insert(order.id.0.clone(), order);
    }
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id.0).cloned())
    }

    async fn list_for_tailor(&self, tailor_id: &TailorId) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut matches: Vec<Order> =
            orders.values().filter(|order| order.tailor_id == *tailor_id).cloned().collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matches)
    }

    async fn save(&self, order: &Order, expected: OrderStatus) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        match orders.get(&order.id.0) {
            Some(existing) if existing.status == expected => {
                orders.insert(order.id.0.clone(), order.clone());
                Ok(())
            }
            _ => Err(RepositoryError::ConcurrentUpdate {
                entity: "order",
                id: order.id.0.clone(),
                expected: expected.as_str().to_string(),
            }),
        }
    }
}
