//! Pure slot computation over a tailor's weekly schedule.
//!
//! The generator is deterministic and side-effect free: callers pass `today`
//! and the already-booked intervals explicitly, so the same inputs always
//! produce the same slots. Staleness between this read path and a concurrent
//! booking write is tolerated; the conditional insert at write time is the
//! sole overlap guarantee.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::schedule::Schedule;

/// A bookable window of fixed duration, minutes-of-day, half-open.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub start: u16,
    pub end: u16,
}

/// A minute-of-day range occupied by a non-terminal booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusyInterval {
    pub start: u16,
    pub end: u16,
}

pub fn generate_slots(
    schedule: &Schedule,
    today: NaiveDate,
    date: NaiveDate,
    busy: &[BusyInterval],
) -> Vec<Slot> {
    if date < today || date > today + Duration::days(i64::from(schedule.advance_booking_days)) {
        return Vec::new();
    }

    let day = schedule.day_for(date);
    if !day.is_open {
        return Vec::new();
    }

    // Widened arithmetic so an oversized duration cannot wrap u16.
    let duration = u32::from(schedule.slot_duration_minutes);
    let step = duration + u32::from(schedule.buffer_minutes);

    let mut slots = Vec::new();
    let mut windows = day.windows.clone();
    windows.sort_by_key(|window| window.start);

    for window in windows {
        let mut start = u32::from(window.start);
        while start + duration <= u32::from(window.end) {
            let candidate = Slot { start: start as u16, end: (start + duration) as u16 };
            let taken = busy
                .iter()
                .any(|booked| candidate.start < booked.end && booked.start < candidate.end);
            if !taken {
                slots.push(candidate);
            }
            start += step;
        }
    }

    slots
}
