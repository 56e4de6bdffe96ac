//! REST surface for the booking marketplace.
//!
//! Availability:
//! - `PUT  /tailors/me/availability`                — publish the weekly schedule
//! - `GET  /tailors/me/availability`                — read the published schedule
//! - `GET  /tailors/{tailor_id}/slots/{date}`       — browse open slots for a date
//!
//! Bookings:
//! - `POST /bookings`                               — request a slot
//! - `GET  /bookings`                               — customer's own bookings
//! - `GET  /tailors/me/bookings/{date}`             — tailor's bookings for a date
//! - `GET  /bookings/{id}`                          — read one booking
//! - `PUT  /bookings/{id}/accept`                   — tailor accepts the request
//! - `PUT  /bookings/{id}/decline`                  — tailor declines the request
//! - `PUT  /bookings/{id}/cancel`                   — customer cancels
//! - `PUT  /bookings/{id}/complete-consultation`    — tailor records the consultation
//! - `PUT  /bookings/{id}/quote`                    — tailor submits a quote
//! - `PUT  /bookings/{id}/accept-quote`             — customer accepts the quote
//! - `PUT  /bookings/{id}/reject-quote`             — customer rejects the quote
//! - `PUT  /bookings/{id}/confirm-payment`          — payment webhook converts to an order
//!
//! Orders:
//! - `GET  /orders/{id}`                            — read one order
//! - `GET  /tailors/me/orders`                      — tailor's orders
//! - `PUT  /orders/{id}/work-plan`                  — tailor submits the work plan
//! - `PUT  /orders/{id}/work-plan/approve`          — customer approves the plan
//! - `PUT  /orders/{id}/work-plan/reject`           — customer sends the plan back
//! - `PUT  /orders/{id}/stages/{index}/complete`    — tailor completes a stage
//! - `PUT  /orders/{id}/delay`                      — tailor asks for more time
//! - `PUT  /orders/{id}/delay/{index}/respond`      — customer answers a delay request
//! - `PUT  /orders/{id}/complete`                   — customer confirms receipt
//! - `PUT  /orders/{id}/review`                     — customer leaves a review

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::json;
use uuid::Uuid;

use tailor_core::config::BookingConfig;
use tailor_core::errors::{ApplicationError, DomainError, InterfaceError};
use tailor_core::lifecycle::{BookingLifecycle, BookingPolicy};
use tailor_core::notify::{NotificationEvent, NotificationSink};
use tailor_core::workplan::WorkPlanTracker;
use tailor_db::repositories::{
    BookingRepository, OrderRepository, RepositoryError, ScheduleRepository,
    SqlBookingRepository, SqlOrderRepository, SqlScheduleRepository,
};
use tailor_db::DbPool;

use crate::{availability, bookings, orders};

#[derive(Clone)]
pub struct ApiState {
    pub schedules: Arc<dyn ScheduleRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub lifecycle: BookingLifecycle,
    pub tracker: WorkPlanTracker,
    pub notifications: Arc<dyn NotificationSink>,
    pub max_advance_booking_days: u16,
}

impl ApiState {
    pub fn from_pool(pool: DbPool, booking: &BookingConfig) -> Self {
        Self {
            schedules: Arc::new(SqlScheduleRepository::new(pool.clone())),
            bookings: Arc::new(SqlBookingRepository::new(pool.clone())),
            orders: Arc::new(SqlOrderRepository::new(pool)),
            lifecycle: BookingLifecycle::new(BookingPolicy {
                require_consultation_before_quote: booking.require_consultation_before_quote,
            }),
            tracker: WorkPlanTracker,
            notifications: Arc::new(TracingNotificationSink),
            max_advance_booking_days: booking.max_advance_booking_days,
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/tailors/me/availability",
            put(availability::put_availability).get(availability::get_availability),
        )
        .route("/tailors/{tailor_id}/slots/{date}", get(availability::list_slots))
        .route("/bookings", post(bookings::create_booking).get(bookings::list_my_bookings))
        .route("/tailors/me/bookings/{date}", get(bookings::list_tailor_day))
        .route("/bookings/{id}", get(bookings::get_booking))
        .route("/bookings/{id}/accept", put(bookings::accept))
        .route("/bookings/{id}/decline", put(bookings::decline))
        .route("/bookings/{id}/cancel", put(bookings::cancel))
        .route("/bookings/{id}/complete-consultation", put(bookings::complete_consultation))
        .route("/bookings/{id}/quote", put(bookings::submit_quote))
        .route("/bookings/{id}/accept-quote", put(bookings::accept_quote))
        .route("/bookings/{id}/reject-quote", put(bookings::reject_quote))
        .route("/bookings/{id}/confirm-payment", put(bookings::confirm_payment))
        .route("/orders/{id}", get(orders::get_order))
        .route("/tailors/me/orders", get(orders::list_my_orders))
        .route("/orders/{id}/work-plan", put(orders::submit_work_plan))
        .route("/orders/{id}/work-plan/approve", put(orders::approve_work_plan))
        .route("/orders/{id}/work-plan/reject", put(orders::reject_work_plan))
        .route("/orders/{id}/stages/{index}/complete", put(orders::complete_stage))
        .route("/orders/{id}/delay", put(orders::request_delay))
        .route("/orders/{id}/delay/{index}/respond", put(orders::respond_to_delay))
        .route("/orders/{id}/complete", put(orders::confirm_receipt))
        .route("/orders/{id}/review", put(orders::submit_review))
        .with_state(state)
}

/// Delivers lifecycle events to the structured log. Stands in for the push
/// notification integration; swapping the sink changes delivery without
/// touching the handlers.
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn notify(&self, event: NotificationEvent) {
        tracing::info!(
            event_name = %event.event_type,
            correlation_id = %event.correlation_id,
            booking_id = event.booking_id.as_ref().map(|id| id.0.as_str()).unwrap_or("unknown"),
            order_id = event.order_id.as_ref().map(|id| id.0.as_str()).unwrap_or("unknown"),
            actor = %event.actor,
            "lifecycle event"
        );
    }
}

/// HTTP rendering of an [`InterfaceError`]. The raw error text goes into
/// `error`, the customer-safe text into `message`.
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl ApiError {
    pub fn bad_request(message: impl Into<String>, correlation_id: &str) -> Self {
        Self(InterfaceError::BadRequest {
            message: message.into(),
            correlation_id: correlation_id.to_string(),
        })
    }

    pub fn forbidden(message: impl Into<String>, correlation_id: &str) -> Self {
        Self(InterfaceError::Forbidden {
            message: message.into(),
            correlation_id: correlation_id.to_string(),
        })
    }

    pub fn not_found(what: &str, correlation_id: &str) -> Self {
        Self(InterfaceError::NotFound {
            message: format!("{what} does not exist"),
            correlation_id: correlation_id.to_string(),
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, correlation_id) = match &self.0 {
            InterfaceError::BadRequest { correlation_id, .. } => {
                (StatusCode::BAD_REQUEST, correlation_id.clone())
            }
            InterfaceError::NotFound { correlation_id, .. } => {
                (StatusCode::NOT_FOUND, correlation_id.clone())
            }
            InterfaceError::Forbidden { correlation_id, .. } => {
                (StatusCode::FORBIDDEN, correlation_id.clone())
            }
            InterfaceError::Conflict { correlation_id, .. } => {
                (StatusCode::CONFLICT, correlation_id.clone())
            }
            InterfaceError::ServiceUnavailable { correlation_id, .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, correlation_id.clone())
            }
            InterfaceError::Internal { correlation_id, .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, correlation_id.clone())
            }
        };

        let body = json!({
            "error": self.0.to_string(),
            "message": self.0.user_message(),
            "correlation_id": correlation_id,
        });

        (status, Json(body)).into_response()
    }
}

pub fn correlation_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn domain_error(error: DomainError, correlation_id: &str) -> ApiError {
    ApiError(ApplicationError::from(error).into_interface(correlation_id))
}

pub fn repo_error(error: RepositoryError, correlation_id: &str) -> ApiError {
    match &error {
        RepositoryError::SlotConflict { .. } | RepositoryError::ConcurrentUpdate { .. } => {
            ApiError(InterfaceError::Conflict {
                message: error.to_string(),
                correlation_id: correlation_id.to_string(),
            })
        }
        _ => ApiError(ApplicationError::Persistence(error.to_string()).into_interface(correlation_id)),
    }
}

pub fn minutes_to_hhmm(minutes: u16) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

pub fn hhmm_to_minutes(value: &str) -> Result<u16, DomainError> {
    let invalid = || DomainError::Validation(format!("invalid time `{value}`, expected HH:MM"));
    let (hours, minutes) = value.split_once(':').ok_or_else(invalid)?;
    let hours: u16 = hours.parse().map_err(|_| invalid())?;
    let minutes: u16 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    Ok(hours * 60 + minutes)
}


#[cfg(test)]
mod tests {
    use super::{hhmm_to_minutes, minutes_to_hhmm};

    #[test]
    fn minute_of_day_renders_as_hhmm() {
        assert_eq!(minutes_to_hhmm(0), "00:00");
        assert_eq!(minutes_to_hhmm(540), "09:00");
        assert_eq!(minutes_to_hhmm(1439), "23:59");
    }

    #[test]
    fn hhmm_parses_back_to_minutes() {
        assert_eq!(hhmm_to_minutes("09:00").expect("parse"), 540);
        assert_eq!(hhmm_to_minutes("23:59").expect("parse"), 1439);
    }

    #[test]
    fn malformed_times_are_rejected() {
        for value in ["", "900", "9:0x", "24:00", "12:60", "aa:bb"] {
            assert!(hhmm_to_minutes(value).is_err(), "`{value}` should not parse");
        }
    }
}
