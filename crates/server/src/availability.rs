//! Weekly-schedule publication and slot browsing.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tailor_core::domain::actor::ActorRole;
use tailor_core::domain::schedule::{
    DayAvailability, Schedule, TailorId, TimeWindow, DAYS_PER_WEEK,
};
use tailor_core::slots::generate_slots;

use crate::api::{
    correlation_id, domain_error, hhmm_to_minutes, minutes_to_hhmm, repo_error, ApiError, ApiState,
};
use crate::identity::Identity;

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    /// Exactly seven entries, Monday first.
    pub days: Vec<DayPayload>,
    pub slot_duration_minutes: u16,
    #[serde(default)]
    pub buffer_minutes: u16,
    pub advance_booking_days: u16,
}

#[derive(Debug, Deserialize)]
pub struct DayPayload {
    pub is_open: bool,
    #[serde(default)]
    pub windows: Vec<WindowPayload>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WindowPayload {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub tailor_id: String,
    pub days: Vec<DayView>,
    pub slot_duration_minutes: u16,
    pub buffer_minutes: u16,
    pub advance_booking_days: u16,
}

#[derive(Debug, Serialize)]
pub struct DayView {
    pub is_open: bool,
    pub windows: Vec<WindowPayload>,
}

#[derive(Debug, Serialize)]
pub struct SlotsResponse {
    pub date: NaiveDate,
    pub slots: Vec<WindowPayload>,
}

pub async fn put_availability(
    State(state): State<ApiState>,
    Identity(actor): Identity,
    Json(payload): Json<AvailabilityRequest>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let cid = correlation_id();
    if actor.role != ActorRole::Tailor {
        return Err(ApiError::forbidden("only tailors may publish availability", &cid));
    }

    let schedule = schedule_from_payload(TailorId(actor.id.clone()), payload, &cid)?;
    if schedule.advance_booking_days > state.max_advance_booking_days {
        return Err(ApiError::bad_request(
            format!(
                "advance_booking_days {} exceeds the service limit of {}",
                schedule.advance_booking_days, state.max_advance_booking_days
            ),
            &cid,
        ));
    }
    schedule.validate().map_err(|error| domain_error(error, &cid))?;

    state.schedules.upsert(&schedule).await.map_err(|error| repo_error(error, &cid))?;
    tracing::info!(
        event_name = "availability.published",
        correlation_id = %cid,
        tailor_id = %schedule.tailor_id.0,
        "weekly schedule published"
    );

    Ok(Json(availability_view(&schedule)))
}

/// Returns the published schedule, or the all-closed default for a tailor
/// that has never published hours.
pub async fn get_availability(
    State(state): State<ApiState>,
    Identity(actor): Identity,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let cid = correlation_id();
    if actor.role != ActorRole::Tailor {
        return Err(ApiError::forbidden("only tailors may read their availability", &cid));
    }

    let tailor_id = TailorId(actor.id.clone());
    let schedule = state
        .schedules
        .find_by_tailor(&tailor_id)
        .await
        .map_err(|error| repo_error(error, &cid))?
        .unwrap_or_else(|| Schedule::closed(tailor_id));

    Ok(Json(availability_view(&schedule)))
}

pub async fn list_slots(
    State(state): State<ApiState>,
    Path((tailor_id, date)): Path<(String, NaiveDate)>,
) -> Result<Json<SlotsResponse>, ApiError> {
    let cid = correlation_id();
    let tailor_id = TailorId(tailor_id);

    let schedule = state
        .schedules
        .find_by_tailor(&tailor_id)
        .await
        .map_err(|error| repo_error(error, &cid))?
        .ok_or_else(|| ApiError::not_found("tailor schedule", &cid))?;

    let busy =
        state.bookings.busy_intervals(&tailor_id, date).await.map_err(|error| repo_error(error, &cid))?;

    let today = Utc::now().date_naive();
    let slots = generate_slots(&schedule, today, date, &busy);

    Ok(Json(SlotsResponse {
        date,
        slots: slots
            .iter()
            .map(|slot| WindowPayload {
                start: minutes_to_hhmm(slot.start),
                end: minutes_to_hhmm(slot.end),
            })
            .collect(),
    }))
}

fn schedule_from_payload(
    tailor_id: TailorId,
    payload: AvailabilityRequest,
    cid: &str,
) -> Result<Schedule, ApiError> {
    if payload.days.len() != DAYS_PER_WEEK {
        return Err(ApiError::bad_request(
            format!("expected {DAYS_PER_WEEK} day entries, got {}", payload.days.len()),
            cid,
        ));
    }

    let mut per_day: [DayAvailability; DAYS_PER_WEEK] = Default::default();
    for (slot, day) in per_day.iter_mut().zip(payload.days) {
        let mut windows = Vec::with_capacity(day.windows.len());
        for window in day.windows {
            windows.push(TimeWindow {
                start: hhmm_to_minutes(&window.start).map_err(|error| domain_error(error, cid))?,
                end: hhmm_to_minutes(&window.end).map_err(|error| domain_error(error, cid))?,
            });
        }
        *slot = DayAvailability { is_open: day.is_open, windows };
    }

    Ok(Schedule {
        tailor_id,
        per_day,
        slot_duration_minutes: payload.slot_duration_minutes,
        buffer_minutes: payload.buffer_minutes,
        advance_booking_days: payload.advance_booking_days,
    })
}

fn availability_view(schedule: &Schedule) -> AvailabilityResponse {
    AvailabilityResponse {
        tailor_id: schedule.tailor_id.0.clone(),
        days: schedule
            .per_day
            .iter()
            .map(|day| DayView {
                is_open: day.is_open,
                windows: day
                    .windows
                    .iter()
                    .map(|window| WindowPayload {
                        start: minutes_to_hhmm(window.start),
                        end: minutes_to_hhmm(window.end),
                    })
                    .collect(),
            })
            .collect(),
        slot_duration_minutes: schedule.slot_duration_minutes,
        buffer_minutes: schedule.buffer_minutes,
        advance_booking_days: schedule.advance_booking_days,
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use chrono::{Duration, Utc};
    use serde_json::json;

    use tailor_core::domain::booking::{Booking, BookingId, CustomerId};
    use tailor_core::domain::schedule::TailorId;
    use tailor_db::repositories::BookingRepository;

    use crate::api::testing::{harness, send};

    fn open_week(slot_minutes: u16, advance_days: u16) -> serde_json::Value {
        let day = json!({
            "is_open": true,
            "windows": [{"start": "09:00", "end": "12:00"}]
        });
        json!({
            "days": vec![day; 7],
            "slot_duration_minutes": slot_minutes,
            "buffer_minutes": 0,
            "advance_booking_days": advance_days,
        })
    }

    #[tokio::test]
    async fn publish_and_read_back_round_trip() {
        let h = harness();

        let (status, body) = send(
            h.app(),
            "PUT",
            "/tailors/me/availability",
            Some(("tailor-1", "tailor")),
            Some(open_week(60, 30)),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "body: {body}");
        assert_eq!(body["tailor_id"], "tailor-1");
        assert_eq!(body["days"][0]["windows"][0]["start"], "09:00");

        let (status, body) =
            send(h.app(), "GET", "/tailors/me/availability", Some(("tailor-1", "tailor")), None)
                .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["slot_duration_minutes"], 60);
        assert_eq!(body["advance_booking_days"], 30);
    }

    #[tokio::test]
    async fn unpublished_schedule_reads_as_all_closed() {
        let h = harness();

        let (status, body) =
            send(h.app(), "GET", "/tailors/me/availability", Some(("tailor-9", "tailor")), None)
                .await;

        assert_eq!(status, StatusCode::OK);
        for day in body["days"].as_array().expect("seven days") {
            assert_eq!(day["is_open"], false);
        }
    }

    #[tokio::test]
    async fn inverted_window_is_rejected() {
        let h = harness();
        let mut payload = open_week(60, 30);
        payload["days"][0]["windows"][0] = json!({"start": "12:00", "end": "09:00"});

        let (status, body) = send(
            h.app(),
            "PUT",
            "/tailors/me/availability",
            Some(("tailor-1", "tailor")),
            Some(payload),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().expect("error text").contains("must be before end"));
    }

    #[tokio::test]
    async fn horizon_above_the_service_limit_is_rejected() {
        let h = harness();

        let (status, _) = send(
            h.app(),
            "PUT",
            "/tailors/me/availability",
            Some(("tailor-1", "tailor")),
            Some(open_week(60, 365)),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn customers_may_not_publish_availability() {
        let h = harness();

        let (status, _) = send(
            h.app(),
            "PUT",
            "/tailors/me/availability",
            Some(("cust-1", "customer")),
            Some(open_week(60, 30)),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn slots_for_an_unknown_tailor_are_not_found() {
        let h = harness();

        let (status, _) =
            send(h.app(), "GET", "/tailors/tailor-404/slots/2026-09-07", None, None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn booked_slot_disappears_from_the_listing() {
        let h = harness();
        send(
            h.app(),
            "PUT",
            "/tailors/me/availability",
            Some(("tailor-1", "tailor")),
            Some(open_week(60, 30)),
        )
        .await;

        let date = Utc::now().date_naive() + Duration::days(7);
        let booking = Booking::new(
            BookingId("bk-1".to_string()),
            TailorId("tailor-1".to_string()),
            CustomerId("cust-1".to_string()),
            date,
            540,
            600,
            "suit fitting",
            None,
            None,
            Utc::now(),
        )
        .expect("valid booking");
        h.bookings.create_if_slot_free(&booking).await.expect("insert booking");

        let (status, body) =
            send(h.app(), "GET", &format!("/tailors/tailor-1/slots/{date}"), None, None).await;

        assert_eq!(status, StatusCode::OK);
        let starts: Vec<&str> = body["slots"]
            .as_array()
            .expect("slots")
            .iter()
            .map(|slot| slot["start"].as_str().expect("start"))
            .collect();
        assert_eq!(starts, vec!["10:00", "11:00"]);
    }

    #[tokio::test]
    async fn dates_beyond_the_horizon_list_no_slots() {
        let h = harness();
        send(
            h.app(),
            "PUT",
            "/tailors/me/availability",
            Some(("tailor-1", "tailor")),
            Some(open_week(60, 30)),
        )
        .await;

        let date = Utc::now().date_naive() + Duration::days(31);
        let (status, body) =
            send(h.app(), "GET", &format!("/tailors/tailor-1/slots/{date}"), None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["slots"].as_array().expect("slots").is_empty());
    }
}
