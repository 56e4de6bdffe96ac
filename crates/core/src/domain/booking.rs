use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::order::OrderId;
use crate::domain::quote::Quote;
use crate::domain::schedule::TailorId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookingId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeasurementProfileId(pub String);

/// Lifecycle state of a booking. `Cancelled` and `Declined` are terminal;
/// `Converted` is terminal for the booking itself while the spawned order
/// continues to evolve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    ConsultationDone,
    QuoteSubmitted,
    QuoteAccepted,
    Paid,
    Converted,
    Cancelled,
    Declined,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::ConsultationDone => "consultation_done",
            Self::QuoteSubmitted => "quote_submitted",
            Self::QuoteAccepted => "quote_accepted",
            Self::Paid => "paid",
            Self::Converted => "converted",
            Self::Cancelled => "cancelled",
            Self::Declined => "declined",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Converted | Self::Cancelled | Self::Declined)
    }

    /// Statuses that still occupy their slot; `generate_slots` and the
    /// write-time conflict check only count these.
    pub fn occupies_slot(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::Declined)
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "consultation_done" => Ok(Self::ConsultationDone),
            "quote_submitted" => Ok(Self::QuoteSubmitted),
            "quote_accepted" => Ok(Self::QuoteAccepted),
            "paid" => Ok(Self::Paid),
            "converted" => Ok(Self::Converted),
            "cancelled" => Ok(Self::Cancelled),
            "declined" => Ok(Self::Declined),
            other => Err(DomainError::Validation(format!("unknown booking status `{other}`"))),
        }
    }
}

/// A customer's request to meet a tailor at a specific slot.
///
/// `start_time`/`end_time` are tailor-local minutes-of-day copied from the
/// chosen slot; `date` is the tailor-local calendar date.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub tailor_id: TailorId,
    pub customer_id: CustomerId,
    pub date: NaiveDate,
    pub start_time: u16,
    pub end_time: u16,
    pub service: String,
    pub notes: Option<String>,
    pub measurement_profile_id: Option<MeasurementProfileId>,
    pub status: BookingStatus,
    pub quote: Option<Quote>,
    pub order_id: Option<OrderId>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: BookingId,
        tailor_id: TailorId,
        customer_id: CustomerId,
        date: NaiveDate,
        start_time: u16,
        end_time: u16,
        service: impl Into<String>,
        notes: Option<String>,
        measurement_profile_id: Option<MeasurementProfileId>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if start_time >= end_time {
            return Err(DomainError::Validation(format!(
                "booking start {start_time} must be before end {end_time}"
            )));
        }

        Ok(Self {
            id,
            tailor_id,
            customer_id,
            date,
            start_time,
            end_time,
            service: service.into(),
            notes,
            measurement_profile_id,
            status: BookingStatus::Pending,
            quote: None,
            order_id: None,
            cancellation_reason: None,
            created_at,
            updated_at: created_at,
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Half-open overlap test against another minute-of-day range.
    pub fn overlaps(&self, start: u16, end: u16) -> bool {
        self.start_time < end && start < self.end_time
    }
}
