//! Booking request and lifecycle endpoints.
//!
//! Every mutation goes through [`BookingLifecycle`]; handlers only load the
//! booking, apply the action and persist the transition guarded on the
//! status they read. A stale guard surfaces as 409.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tailor_core::domain::actor::{Actor, ActorRole};
use tailor_core::domain::booking::{Booking, BookingId, CustomerId, MeasurementProfileId};
use tailor_core::domain::order::Order;
use tailor_core::domain::quote::{Quote, QuoteDraft};
use tailor_core::domain::schedule::TailorId;
use tailor_core::errors::DomainError;
use tailor_core::lifecycle::{BookingAction, BookingLifecycle};
use tailor_core::notify::NotificationEvent;
use tailor_core::slots::generate_slots;

use crate::api::{
    correlation_id, domain_error, hhmm_to_minutes, minutes_to_hhmm, repo_error, ApiError, ApiState,
};
use crate::identity::Identity;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub tailor_id: String,
    pub date: NaiveDate,
    /// Start time in HH:MM; must match a currently open slot.
    pub start: String,
    pub service: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub measurement_profile_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectQuoteRequest {
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct BookingView {
    pub id: String,
    pub tailor_id: String,
    pub customer_id: String,
    pub date: NaiveDate,
    pub start: String,
    pub end: String,
    pub service: String,
    pub notes: Option<String>,
    pub measurement_profile_id: Option<String>,
    pub status: &'static str,
    pub quote: Option<Quote>,
    pub order_id: Option<String>,
    pub cancellation_reason: Option<String>,
    pub allowed_actions: Vec<&'static str>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ConversionView {
    pub booking: BookingView,
    pub order: Order,
}

pub async fn create_booking(
    State(state): State<ApiState>,
    Identity(actor): Identity,
    Json(payload): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingView>), ApiError> {
    let cid = correlation_id();
    if actor.role != ActorRole::Customer {
        return Err(ApiError::forbidden("only customers may request bookings", &cid));
    }

    let tailor_id = TailorId(payload.tailor_id.clone());
    let schedule = state
        .schedules
        .find_by_tailor(&tailor_id)
        .await
        .map_err(|error| repo_error(error, &cid))?
        .ok_or_else(|| ApiError::not_found("tailor schedule", &cid))?;

    let start = hhmm_to_minutes(&payload.start).map_err(|error| domain_error(error, &cid))?;
    let busy = state
        .bookings
        .busy_intervals(&tailor_id, payload.date)
        .await
        .map_err(|error| repo_error(error, &cid))?;

    // The read-time check gives an early, friendly rejection; the insert
    // below re-checks under the write path and is the actual guarantee.
    let today = Utc::now().date_naive();
    let slot = generate_slots(&schedule, today, payload.date, &busy)
        .into_iter()
        .find(|slot| slot.start == start)
        .ok_or_else(|| {
            domain_error(
                DomainError::SlotUnavailable {
                    date: payload.date,
                    start,
                    end: start.saturating_add(schedule.slot_duration_minutes),
                },
                &cid,
            )
        })?;

    let booking = Booking::new(
        BookingId(Uuid::new_v4().to_string()),
        tailor_id,
        CustomerId(actor.id.clone()),
        payload.date,
        slot.start,
        slot.end,
        payload.service,
        payload.notes,
        payload.measurement_profile_id.map(MeasurementProfileId),
        Utc::now(),
    )
    .map_err(|error| domain_error(error, &cid))?;

    state.bookings.create_if_slot_free(&booking).await.map_err(|error| repo_error(error, &cid))?;

    state.notifications.notify(
        NotificationEvent::new(
            Some(booking.id.clone()),
            None,
            cid.as_str(),
            "booking.requested",
            actor.id.clone(),
        )
        .with_metadata("tailor_id", booking.tailor_id.0.clone()),
    );

    Ok((StatusCode::CREATED, Json(view(&state.lifecycle, &booking))))
}

pub async fn list_my_bookings(
    State(state): State<ApiState>,
    Identity(actor): Identity,
) -> Result<Json<Vec<BookingView>>, ApiError> {
    let cid = correlation_id();
    if actor.role != ActorRole::Customer {
        return Err(ApiError::forbidden("only customers may list their bookings", &cid));
    }

    let bookings = state
        .bookings
        .list_for_customer(&CustomerId(actor.id.clone()))
        .await
        .map_err(|error| repo_error(error, &cid))?;

    Ok(Json(bookings.iter().map(|booking| view(&state.lifecycle, booking)).collect()))
}

pub async fn list_tailor_day(
    State(state): State<ApiState>,
    Identity(actor): Identity,
    Path(date): Path<NaiveDate>,
) -> Result<Json<Vec<BookingView>>, ApiError> {
    let cid = correlation_id();
    if actor.role != ActorRole::Tailor {
        return Err(ApiError::forbidden("only tailors may list their bookings", &cid));
    }

    let bookings = state
        .bookings
        .list_for_tailor_date(&TailorId(actor.id.clone()), date)
        .await
        .map_err(|error| repo_error(error, &cid))?;

    Ok(Json(bookings.iter().map(|booking| view(&state.lifecycle, booking)).collect()))
}

pub async fn get_booking(
    State(state): State<ApiState>,
    Identity(actor): Identity,
    Path(id): Path<String>,
) -> Result<Json<BookingView>, ApiError> {
    let cid = correlation_id();
    let booking = load_booking(&state, &id, &cid).await?;
    require_participant(&booking, &actor, &cid)?;
    Ok(Json(view(&state.lifecycle, &booking)))
}

pub async fn accept(
    state: State<ApiState>,
    identity: Identity,
    path: Path<String>,
) -> Result<Json<BookingView>, ApiError> {
    transition(state, identity, path, BookingAction::Accept).await
}

pub async fn decline(
    state: State<ApiState>,
    identity: Identity,
    path: Path<String>,
) -> Result<Json<BookingView>, ApiError> {
    transition(state, identity, path, BookingAction::Decline).await
}

pub async fn complete_consultation(
    state: State<ApiState>,
    identity: Identity,
    path: Path<String>,
) -> Result<Json<BookingView>, ApiError> {
    transition(state, identity, path, BookingAction::CompleteConsultation).await
}

pub async fn accept_quote(
    state: State<ApiState>,
    identity: Identity,
    path: Path<String>,
) -> Result<Json<BookingView>, ApiError> {
    transition(state, identity, path, BookingAction::AcceptQuote).await
}

pub async fn cancel(
    State(state): State<ApiState>,
    Identity(actor): Identity,
    Path(id): Path<String>,
    Json(payload): Json<CancelRequest>,
) -> Result<Json<BookingView>, ApiError> {
    let cid = correlation_id();
    let mut booking = load_booking(&state, &id, &cid).await?;

    let outcome = state
        .lifecycle
        .apply_with_notify(
            &mut booking,
            BookingAction::Cancel,
            &actor,
            Utc::now(),
            state.notifications.as_ref(),
            &cid,
        )
        .map_err(|error| domain_error(error, &cid))?;

    if let Some(reason) = payload.reason.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        booking.cancellation_reason = Some(reason.to_string());
    }

    state
        .bookings
        .save_transition(&booking, outcome.from)
        .await
        .map_err(|error| repo_error(error, &cid))?;

    Ok(Json(view(&state.lifecycle, &booking)))
}

pub async fn submit_quote(
    State(state): State<ApiState>,
    Identity(actor): Identity,
    Path(id): Path<String>,
    Json(draft): Json<QuoteDraft>,
) -> Result<Json<BookingView>, ApiError> {
    let cid = correlation_id();
    let mut booking = load_booking(&state, &id, &cid).await?;
    let from = booking.status;

    state
        .lifecycle
        .submit_quote(&mut booking, &actor, draft, Utc::now())
        .map_err(|error| domain_error(error, &cid))?;

    state.bookings.save_transition(&booking, from).await.map_err(|error| repo_error(error, &cid))?;

    state.notifications.notify(
        NotificationEvent::new(
            Some(booking.id.clone()),
            None,
            cid.as_str(),
            "booking.submit_quote",
            actor.id.clone(),
        )
        .with_metadata("to", booking.status.as_str()),
    );

    Ok(Json(view(&state.lifecycle, &booking)))
}

pub async fn reject_quote(
    State(state): State<ApiState>,
    Identity(actor): Identity,
    Path(id): Path<String>,
    Json(payload): Json<RejectQuoteRequest>,
) -> Result<Json<BookingView>, ApiError> {
    let cid = correlation_id();
    let mut booking = load_booking(&state, &id, &cid).await?;
    let from = booking.status;

    state
        .lifecycle
        .reject_quote(&mut booking, &actor, &payload.reason, Utc::now())
        .map_err(|error| domain_error(error, &cid))?;

    state.bookings.save_transition(&booking, from).await.map_err(|error| repo_error(error, &cid))?;

    state.notifications.notify(
        NotificationEvent::new(
            Some(booking.id.clone()),
            None,
            cid.as_str(),
            "booking.reject_quote",
            actor.id.clone(),
        )
        .with_metadata("reason", payload.reason.trim().to_string()),
    );

    Ok(Json(view(&state.lifecycle, &booking)))
}

/// Payment confirmation immediately converts the booking; the paired
/// transitions and the new order are persisted in one transaction.
pub async fn confirm_payment(
    State(state): State<ApiState>,
    Identity(actor): Identity,
    Path(id): Path<String>,
) -> Result<Json<ConversionView>, ApiError> {
    let cid = correlation_id();
    let mut booking = load_booking(&state, &id, &cid).await?;

    let (outcomes, order) = state
        .lifecycle
        .confirm_payment_and_convert(&mut booking, &actor, Utc::now())
        .map_err(|error| domain_error(error, &cid))?;

    state
        .bookings
        .convert_paid(&booking, &order)
        .await
        .map_err(|error| repo_error(error, &cid))?;

    for outcome in &outcomes {
        state.notifications.notify(
            NotificationEvent::new(
                Some(booking.id.clone()),
                Some(order.id.clone()),
                cid.as_str(),
                format!("booking.{}", outcome.action.as_str()),
                actor.id.clone(),
            )
            .with_metadata("from", outcome.from.as_str())
            .with_metadata("to", outcome.to.as_str()),
        );
    }

    Ok(Json(ConversionView { booking: view(&state.lifecycle, &booking), order }))
}

async fn transition(
    State(state): State<ApiState>,
    Identity(actor): Identity,
    Path(id): Path<String>,
    action: BookingAction,
) -> Result<Json<BookingView>, ApiError> {
    let cid = correlation_id();
    let mut booking = load_booking(&state, &id, &cid).await?;

    let outcome = state
        .lifecycle
        .apply_with_notify(
            &mut booking,
            action,
            &actor,
            Utc::now(),
            state.notifications.as_ref(),
            &cid,
        )
        .map_err(|error| domain_error(error, &cid))?;

    state
        .bookings
        .save_transition(&booking, outcome.from)
        .await
        .map_err(|error| repo_error(error, &cid))?;

    Ok(Json(view(&state.lifecycle, &booking)))
}

async fn load_booking(state: &ApiState, id: &str, cid: &str) -> Result<Booking, ApiError> {
    state
        .bookings
        .find_by_id(&BookingId(id.to_string()))
        .await
        .map_err(|error| repo_error(error, cid))?
        .ok_or_else(|| ApiError::not_found("booking", cid))
}

fn require_participant(booking: &Booking, actor: &Actor, cid: &str) -> Result<(), ApiError> {
    let allowed = match actor.role {
        ActorRole::Customer => actor.id == booking.customer_id.0,
        ActorRole::Tailor => actor.id == booking.tailor_id.0,
        ActorRole::Admin | ActorRole::System => true,
    };
    if allowed {
        Ok(())
    } else {
        Err(ApiError::forbidden("only booking participants may view this booking", cid))
    }
}

fn view(lifecycle: &BookingLifecycle, booking: &Booking) -> BookingView {
    BookingView {
        id: booking.id.0.clone(),
        tailor_id: booking.tailor_id.0.clone(),
        customer_id: booking.customer_id.0.clone(),
        date: booking.date,
        start: minutes_to_hhmm(booking.start_time),
        end: minutes_to_hhmm(booking.end_time),
        service: booking.service.clone(),
        notes: booking.notes.clone(),
        measurement_profile_id: booking.measurement_profile_id.as_ref().map(|id| id.0.clone()),
        status: booking.status.as_str(),
        quote: booking.quote.clone(),
        order_id: booking.order_id.as_ref().map(|id| id.0.clone()),
        cancellation_reason: booking.cancellation_reason.clone(),
        allowed_actions: lifecycle
            .allowed_actions(booking.status)
            .iter()
            .map(|action| action.as_str())
            .collect(),
        created_at: booking.created_at,
        updated_at: booking.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use chrono::{Duration, NaiveDate, Utc};
    use serde_json::json;

    use crate::api::testing::{harness, send, Harness};

    fn open_week() -> serde_json::Value {
        let day = json!({
            "is_open": true,
            "windows": [{"start": "09:00", "end": "12:00"}]
        });
        json!({
            "days": vec![day; 7],
            "slot_duration_minutes": 60,
            "buffer_minutes": 0,
            "advance_booking_days": 30,
        })
    }

    fn quote_body() -> serde_json::Value {
        json!({
            "items": [],
            "labor_cost": "120",
            "material_cost": "80",
            "estimated_days": {"design": 2, "sew": 6, "deliver": 2},
        })
    }

    async fn publish_schedule(h: &Harness) {
        let (status, _) = send(
            h.app(),
            "PUT",
            "/tailors/me/availability",
            Some(("tailor-1", "tailor")),
            Some(open_week()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    fn booking_date() -> NaiveDate {
        Utc::now().date_naive() + Duration::days(7)
    }

    async fn create_booking(h: &Harness) -> String {
        let (status, body) = send(
            h.app(),
            "POST",
            "/bookings",
            Some(("cust-1", "customer")),
            Some(json!({
                "tailor_id": "tailor-1",
                "date": booking_date(),
                "start": "09:00",
                "service": "bespoke suit",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "body: {body}");
        body["id"].as_str().expect("booking id").to_string()
    }

    #[tokio::test]
    async fn requested_booking_starts_pending() {
        let h = harness();
        publish_schedule(&h).await;

        let id = create_booking(&h).await;

        let (status, body) =
            send(h.app(), "GET", &format!("/bookings/{id}"), Some(("cust-1", "customer")), None)
                .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "pending");
        assert_eq!(body["start"], "09:00");
        assert_eq!(body["end"], "10:00");
        assert_eq!(body["allowed_actions"], json!(["accept", "decline", "cancel"]));
    }

    #[tokio::test]
    async fn customers_list_only_their_own_bookings() {
        let h = harness();
        publish_schedule(&h).await;
        let id = create_booking(&h).await;

        let (status, body) =
            send(h.app(), "GET", "/bookings", Some(("cust-1", "customer")), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(1));
        assert_eq!(body[0]["id"], json!(id));

        let (status, body) =
            send(h.app(), "GET", "/bookings", Some(("cust-2", "customer")), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(0));

        let (status, _) =
            send(h.app(), "GET", "/bookings", Some(("tailor-1", "tailor")), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn tailors_list_their_day_of_bookings() {
        let h = harness();
        publish_schedule(&h).await;
        let id = create_booking(&h).await;

        let uri = format!("/tailors/me/bookings/{}", booking_date());
        let (status, body) = send(h.app(), "GET", &uri, Some(("tailor-1", "tailor")), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(1));
        assert_eq!(body[0]["id"], json!(id));

        let empty = format!("/tailors/me/bookings/{}", booking_date() + Duration::days(1));
        let (status, body) = send(h.app(), "GET", &empty, Some(("tailor-1", "tailor")), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn booking_a_taken_slot_conflicts() {
        let h = harness();
        publish_schedule(&h).await;
        create_booking(&h).await;

        let (status, _) = send(
            h.app(),
            "POST",
            "/bookings",
            Some(("cust-2", "customer")),
            Some(json!({
                "tailor_id": "tailor-1",
                "date": booking_date(),
                "start": "09:00",
                "service": "shirt alteration",
            })),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn off_grid_start_time_conflicts() {
        let h = harness();
        publish_schedule(&h).await;

        let (status, _) = send(
            h.app(),
            "POST",
            "/bookings",
            Some(("cust-1", "customer")),
            Some(json!({
                "tailor_id": "tailor-1",
                "date": booking_date(),
                "start": "09:30",
                "service": "bespoke suit",
            })),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn tailors_may_not_request_bookings() {
        let h = harness();
        publish_schedule(&h).await;

        let (status, _) = send(
            h.app(),
            "POST",
            "/bookings",
            Some(("tailor-1", "tailor")),
            Some(json!({
                "tailor_id": "tailor-1",
                "date": booking_date(),
                "start": "09:00",
                "service": "bespoke suit",
            })),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unknown_booking_is_not_found() {
        let h = harness();

        let (status, _) = send(
            h.app(),
            "PUT",
            "/bookings/bk-404/accept",
            Some(("tailor-1", "tailor")),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn strangers_may_not_view_a_booking() {
        let h = harness();
        publish_schedule(&h).await;
        let id = create_booking(&h).await;

        let (status, _) =
            send(h.app(), "GET", &format!("/bookings/{id}"), Some(("cust-9", "customer")), None)
                .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn foreign_tailor_may_not_accept() {
        let h = harness();
        publish_schedule(&h).await;
        let id = create_booking(&h).await;

        let (status, _) = send(
            h.app(),
            "PUT",
            &format!("/bookings/{id}/accept"),
            Some(("tailor-9", "tailor")),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn cancel_records_the_reason() {
        let h = harness();
        publish_schedule(&h).await;
        let id = create_booking(&h).await;

        let (status, body) = send(
            h.app(),
            "PUT",
            &format!("/bookings/{id}/cancel"),
            Some(("cust-1", "customer")),
            Some(json!({"reason": "found another tailor"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "cancelled");
        assert_eq!(body["cancellation_reason"], "found another tailor");
    }

    #[tokio::test]
    async fn invalid_transition_names_the_allowed_actions() {
        let h = harness();
        publish_schedule(&h).await;
        let id = create_booking(&h).await;

        let (status, body) = send(
            h.app(),
            "PUT",
            &format!("/bookings/{id}/accept-quote"),
            Some(("cust-1", "customer")),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().expect("error text").contains("Accept"));
    }

    #[tokio::test]
    async fn full_lifecycle_reaches_converted_with_an_order() {
        let h = harness();
        publish_schedule(&h).await;
        let id = create_booking(&h).await;

        let (status, body) = send(
            h.app(),
            "PUT",
            &format!("/bookings/{id}/accept"),
            Some(("tailor-1", "tailor")),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "body: {body}");
        assert_eq!(body["status"], "confirmed");

        let (status, body) = send(
            h.app(),
            "PUT",
            &format!("/bookings/{id}/quote"),
            Some(("tailor-1", "tailor")),
            Some(quote_body()),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "body: {body}");
        assert_eq!(body["status"], "quote_submitted");
        assert_eq!(body["quote"]["total_amount"], "200");

        let (status, body) = send(
            h.app(),
            "PUT",
            &format!("/bookings/{id}/accept-quote"),
            Some(("cust-1", "customer")),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "body: {body}");
        assert_eq!(body["status"], "quote_accepted");

        let (status, body) = send(
            h.app(),
            "PUT",
            &format!("/bookings/{id}/confirm-payment"),
            Some(("payments", "system")),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "body: {body}");
        assert_eq!(body["booking"]["status"], "converted");
        assert_eq!(body["order"]["status"], "awaiting_plan");
        assert_eq!(body["order"]["stages"].as_array().expect("stages").len(), 3);

        let converted = h.bookings.converted_orders().await;
        assert_eq!(converted.len(), 1);

        let events = h.sink.events();
        assert!(events.iter().any(|event| event.event_type == "booking.accept"));
        assert!(events.iter().any(|event| event.event_type == "booking.convert"));
    }

    #[tokio::test]
    async fn customers_may_not_confirm_payment() {
        let h = harness();
        publish_schedule(&h).await;
        let id = create_booking(&h).await;

        send(h.app(), "PUT", &format!("/bookings/{id}/accept"), Some(("tailor-1", "tailor")), None)
            .await;
        send(
            h.app(),
            "PUT",
            &format!("/bookings/{id}/quote"),
            Some(("tailor-1", "tailor")),
            Some(quote_body()),
        )
        .await;
        send(
            h.app(),
            "PUT",
            &format!("/bookings/{id}/accept-quote"),
            Some(("cust-1", "customer")),
            None,
        )
        .await;

        let (status, _) = send(
            h.app(),
            "PUT",
            &format!("/bookings/{id}/confirm-payment"),
            Some(("cust-1", "customer")),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn rejected_quote_cancels_with_the_reason() {
        let h = harness();
        publish_schedule(&h).await;
        let id = create_booking(&h).await;

        send(h.app(), "PUT", &format!("/bookings/{id}/accept"), Some(("tailor-1", "tailor")), None)
            .await;
        send(
            h.app(),
            "PUT",
            &format!("/bookings/{id}/quote"),
            Some(("tailor-1", "tailor")),
            Some(quote_body()),
        )
        .await;

        let (status, body) = send(
            h.app(),
            "PUT",
            &format!("/bookings/{id}/reject-quote"),
            Some(("cust-1", "customer")),
            Some(json!({"reason": "price too high"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK, "body: {body}");
        assert_eq!(body["status"], "cancelled");
        assert_eq!(body["cancellation_reason"], "price too high");
    }
}
