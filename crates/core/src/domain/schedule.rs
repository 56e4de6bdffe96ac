use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Last representable minute of a day. Window times are tailor-local
/// minutes-of-day; calendar/timezone mapping is the gateway's concern.
pub const MAX_MINUTE_OF_DAY: u16 = 1439;

pub const DAYS_PER_WEEK: usize = 7;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TailorId(pub String);

/// Half-open interval `[start, end)` in minutes-of-day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: u16,
    pub end: u16,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayAvailability {
    pub is_open: bool,
    pub windows: Vec<TimeWindow>,
}

/// Weekly availability template for one tailor. Days are indexed
/// Monday = 0 through Sunday = 6.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub tailor_id: TailorId,
    pub per_day: [DayAvailability; DAYS_PER_WEEK],
    pub slot_duration_minutes: u16,
    pub buffer_minutes: u16,
    pub advance_booking_days: u16,
}

impl Schedule {
    /// The default schedule for a tailor that has never published hours:
    /// every day closed.
    pub fn closed(tailor_id: TailorId) -> Self {
        Self {
            tailor_id,
            per_day: Default::default(),
            slot_duration_minutes: 60,
            buffer_minutes: 0,
            advance_booking_days: 30,
        }
    }

    pub fn day_for(&self, date: NaiveDate) -> &DayAvailability {
        &self.per_day[date.weekday().num_days_from_monday() as usize]
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.slot_duration_minutes == 0 {
            return Err(DomainError::Validation(
                "slot_duration_minutes must be greater than zero".to_string(),
            ));
        }
        if u32::from(self.slot_duration_minutes) + u32::from(self.buffer_minutes)
            > u32::from(MAX_MINUTE_OF_DAY)
        {
            return Err(DomainError::Validation(
                "slot_duration_minutes plus buffer_minutes must fit within a day".to_string(),
            ));
        }
        if self.advance_booking_days == 0 {
            return Err(DomainError::Validation(
                "advance_booking_days must be greater than zero".to_string(),
            ));
        }

        for (day_index, day) in self.per_day.iter().enumerate() {
            validate_day(day_index, day)?;
        }

        Ok(())
    }
}

fn validate_day(day_index: usize, day: &DayAvailability) -> Result<(), DomainError> {
    for window in &day.windows {
        if window.start >= window.end {
            return Err(DomainError::Validation(format!(
                "day {day_index}: window start {} must be before end {}",
                window.start, window.end
            )));
        }
        if window.end > MAX_MINUTE_OF_DAY {
            return Err(DomainError::Validation(format!(
                "day {day_index}: window end {} exceeds last minute of day {MAX_MINUTE_OF_DAY}",
                window.end
            )));
        }
    }

    let mut sorted = day.windows.clone();
    sorted.sort_by_key(|window| window.start);
    for pair in sorted.windows(2) {
        if pair[1].start < pair[0].end {
            return Err(DomainError::Validation(format!(
                "day {day_index}: windows {}-{} and {}-{} overlap",
                pair[0].start, pair[0].end, pair[1].start, pair[1].end
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{DayAvailability, Schedule, TailorId, TimeWindow};

    fn schedule_with_monday(windows: Vec<TimeWindow>) -> Schedule {
        let mut schedule = Schedule::closed(TailorId("tailor-1".to_string()));
        schedule.per_day[0] = DayAvailability { is_open: true, windows };
        schedule
    }

    #[test]
    fn default_schedule_is_all_closed_and_valid() {
        let schedule = Schedule::closed(TailorId("tailor-1".to_string()));
        assert!(schedule.per_day.iter().all(|day| !day.is_open && day.windows.is_empty()));
        schedule.validate().expect("closed schedule is valid");
    }

    #[test]
    fn rejects_window_with_start_after_end() {
        let schedule = schedule_with_monday(vec![TimeWindow { start: 600, end: 540 }]);
        let error = schedule.validate().expect_err("inverted window must fail");
        assert!(error.to_string().contains("must be before end"));
    }

    #[test]
    fn rejects_overlapping_windows_within_a_day() {
        let schedule = schedule_with_monday(vec![
            TimeWindow { start: 540, end: 720 },
            TimeWindow { start: 700, end: 780 },
        ]);
        let error = schedule.validate().expect_err("overlapping windows must fail");
        assert!(error.to_string().contains("overlap"));
    }

    #[test]
    fn touching_windows_are_allowed() {
        let schedule = schedule_with_monday(vec![
            TimeWindow { start: 540, end: 720 },
            TimeWindow { start: 720, end: 780 },
        ]);
        schedule.validate().expect("back-to-back windows are legal");
    }

    #[test]
    fn rejects_slot_and_buffer_exceeding_a_day() {
        let mut schedule = schedule_with_monday(vec![TimeWindow { start: 540, end: 720 }]);
        schedule.slot_duration_minutes = 1200;
        schedule.buffer_minutes = 600;
        assert!(schedule.validate().is_err());
    }

    #[test]
    fn rejects_zero_slot_duration() {
        let mut schedule = schedule_with_monday(vec![TimeWindow { start: 540, end: 720 }]);
        schedule.slot_duration_minutes = 0;
        assert!(schedule.validate().is_err());
    }
}
