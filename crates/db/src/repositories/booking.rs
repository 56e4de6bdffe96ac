use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;

use tailor_core::domain::booking::{Booking, BookingId, BookingStatus, CustomerId};
use tailor_core::domain::booking::MeasurementProfileId;
use tailor_core::domain::order::{Order, OrderId};
use tailor_core::domain::schedule::TailorId;
use tailor_core::slots::BusyInterval;

use super::order::bind_order_insert;
use super::{BookingRepository, RepositoryError};
use crate::DbPool;

const BOOKING_COLUMNS: &str = "id, tailor_id, customer_id, date, start_time, end_time, service,
       notes, measurement_profile_id, status, quote_json, order_id, cancellation_reason,
       created_at, updated_at";

pub struct SqlBookingRepository {
    pool: DbPool,
}

impl SqlBookingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_minute(column: &str, value: i64) -> Result<u16, RepositoryError> {
    u16::try_from(value)
        .map_err(|_| RepositoryError::Decode(format!("{column} out of range: {value}")))
}

fn parse_date(value: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| RepositoryError::Decode(format!("date `{value}`: {e}")))
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_booking(row: &sqlx::sqlite::SqliteRow) -> Result<Booking, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let tailor_id: String =
        row.try_get("tailor_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let customer_id: String =
        row.try_get("customer_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let date_str: String =
        row.try_get("date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let start_time: i64 =
        row.try_get("start_time").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let end_time: i64 =
        row.try_get("end_time").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let service: String =
        row.try_get("service").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let notes: Option<String> =
        row.try_get("notes").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let measurement_profile_id: Option<String> = row
        .try_get("measurement_profile_id")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quote_json: Option<String> =
        row.try_get("quote_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let order_id: Option<String> =
        row.try_get("order_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let cancellation_reason: Option<String> =
        row.try_get("cancellation_reason").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let quote = quote_json
        .map(|json| {
            serde_json::from_str(&json)
                .map_err(|e| RepositoryError::Decode(format!("quote_json: {e}")))
        })
        .transpose()?;

    Ok(Booking {
        id: BookingId(id),
        tailor_id: TailorId(tailor_id),
        customer_id: CustomerId(customer_id),
        date: parse_date(&date_str)?,
        start_time: decode_minute("start_time", start_time)?,
        end_time: decode_minute("end_time", end_time)?,
        service,
        notes,
        measurement_profile_id: measurement_profile_id.map(MeasurementProfileId),
        status: status_str
            .parse::<BookingStatus>()
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        quote,
        order_id: order_id.map(OrderId),
        cancellation_reason,
        created_at: parse_timestamp(&created_at_str),
        updated_at: parse_timestamp(&updated_at_str),
    })
}

fn encode_quote(booking: &Booking) -> Result<Option<String>, RepositoryError> {
    booking
        .quote
        .as_ref()
        .map(|quote| {
            serde_json::to_string(quote)
                .map_err(|e| RepositoryError::Decode(format!("quote_json: {e}")))
        })
        .transpose()
}

#[async_trait::async_trait]
impl BookingRepository for SqlBookingRepository {
    async fn find_by_id(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {BOOKING_COLUMNS} FROM booking WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_booking(r)?)),
            None => Ok(None),
        }
    }

    async fn list_for_tailor_date(
        &self,
        tailor_id: &TailorId,
        date: NaiveDate,
    ) -> Result<Vec<Booking>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM booking
             WHERE tailor_id = ? AND date = ?
             ORDER BY start_time ASC"
        ))
        .bind(&tailor_id.0)
        .bind(date.format("%Y-%m-%d").to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_booking).collect()
    }

    async fn list_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<Booking>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM booking
             WHERE customer_id = ?
             ORDER BY date DESC, start_time DESC"
        ))
        .bind(&customer_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_booking).collect()
    }

    async fn busy_intervals(
        &self,
        tailor_id: &TailorId,
        date: NaiveDate,
    ) -> Result<Vec<BusyInterval>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT start_time, end_time FROM booking
             WHERE tailor_id = ? AND date = ?
               AND status NOT IN ('cancelled', 'declined')
             ORDER BY start_time ASC",
        )
        .bind(&tailor_id.0)
        .bind(date.format("%Y-%m-%d").to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let start: i64 =
                    row.try_get("start_time").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let end: i64 =
                    row.try_get("end_time").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                Ok(BusyInterval {
                    start: decode_minute("start_time", start)?,
                    end: decode_minute("end_time", end)?,
                })
            })
            .collect()
    }

    async fn create_if_slot_free(&self, booking: &Booking) -> Result<(), RepositoryError> {
        let quote_json = encode_quote(booking)?;

        // Single-statement conditional insert: the overlap check and the
        // write happen atomically, so two racing customers cannot both land
        // on the same slot.
        let result = sqlx::query(
            "INSERT INTO booking (id, tailor_id, customer_id, date, start_time, end_time,
                                  service, notes, measurement_profile_id, status, quote_json,
                                  order_id, cancellation_reason, created_at, updated_at)
             SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15
             WHERE NOT EXISTS (
                 SELECT 1 FROM booking
                 WHERE tailor_id = ?2 AND date = ?4
                   AND status NOT IN ('cancelled', 'declined')
                   AND start_time < ?6 AND ?5 < end_time
             )",
        )
        .bind(&booking.id.0)
        .bind(&booking.tailor_id.0)
        .bind(&booking.customer_id.0)
        .bind(booking.date.format("%Y-%m-%d").to_string())
        .bind(i64::from(booking.start_time))
        .bind(i64::from(booking.end_time))
        .bind(&booking.service)
        .bind(&booking.notes)
        .bind(booking.measurement_profile_id.as_ref().map(|id| id.0.clone()))
        .bind(booking.status.as_str())
        .bind(&quote_json)
        .bind(booking.order_id.as_ref().map(|id| id.0.clone()))
        .bind(&booking.cancellation_reason)
        .bind(booking.created_at.to_rfc3339())
        .bind(booking.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::SlotConflict {
                tailor_id: booking.tailor_id.0.clone(),
                date: booking.date,
                start: booking.start_time,
                end: booking.end_time,
            });
        }

        Ok(())
    }

    async fn save_transition(
        &self,
        booking: &Booking,
        expected: BookingStatus,
    ) -> Result<(), RepositoryError> {
        let quote_json = encode_quote(booking)?;

        let result = sqlx::query(
            "UPDATE booking SET
                 status = ?,
                 quote_json = ?,
                 order_id = ?,
                 cancellation_reason = ?,
                 updated_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(booking.status.as_str())
        .bind(&quote_json)
        .bind(booking.order_id.as_ref().map(|id| id.0.clone()))
        .bind(&booking.cancellation_reason)
        .bind(booking.updated_at.to_rfc3339())
        .bind(&booking.id.0)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::ConcurrentUpdate {
                entity: "booking",
                id: booking.id.0.clone(),
                expected: expected.as_str().to_string(),
            });
        }

        Ok(())
    }

    async fn convert_paid(
        &self,
        booking: &Booking,
        order: &Order,
    ) -> Result<(), RepositoryError> {
        let quote_json = encode_quote(booking)?;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE booking SET
                 status = ?,
                 quote_json = ?,
                 order_id = ?,
                 updated_at = ?
             WHERE id = ? AND status = 'quote_accepted'",
        )
        .bind(booking.status.as_str())
        .bind(&quote_json)
        .bind(booking.order_id.as_ref().map(|id| id.0.clone()))
        .bind(booking.updated_at.to_rfc3339())
        .bind(&booking.id.0)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::ConcurrentUpdate {
                entity: "booking",
                id: booking.id.0.clone(),
                expected: "quote_accepted".to_string(),
            });
        }

        bind_order_insert(order)?.execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(())
    }
}
