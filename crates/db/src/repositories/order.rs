use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteArguments;
use sqlx::Row;

use tailor_core::domain::booking::{BookingId, CustomerId};
use tailor_core::domain::order::{Order, OrderId, OrderStatus};
use tailor_core::domain::schedule::TailorId;

use super::{OrderRepository, RepositoryError};
use crate::DbPool;

const ORDER_COLUMNS: &str = "id, booking_id, tailor_id, customer_id, service_type, status,
       stages_json, estimated_completion_date, delay_requests_json, feedback_json,
       created_at, updated_at";

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_order(row: &sqlx::sqlite::SqliteRow) -> Result<Order, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let booking_id: String =
        row.try_get("booking_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let tailor_id: String =
        row.try_get("tailor_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let customer_id: String =
        row.try_get("customer_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let service_type: String =
        row.try_get("service_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let stages_json: String =
        row.try_get("stages_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let completion_date: Option<String> = row
        .try_get("estimated_completion_date")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let delays_json: String =
        row.try_get("delay_requests_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let feedback_json: Option<String> =
        row.try_get("feedback_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let stages = serde_json::from_str(&stages_json)
        .map_err(|e| RepositoryError::Decode(format!("stages_json: {e}")))?;
    let delay_requests = serde_json::from_str(&delays_json)
        .map_err(|e| RepositoryError::Decode(format!("delay_requests_json: {e}")))?;
    let completion_feedback = feedback_json
        .map(|json| {
            serde_json::from_str(&json)
                .map_err(|e| RepositoryError::Decode(format!("feedback_json: {e}")))
        })
        .transpose()?;
    let estimated_completion_date = completion_date
        .map(|value| {
            NaiveDate::parse_from_str(&value, "%Y-%m-%d")
                .map_err(|e| RepositoryError::Decode(format!("estimated_completion_date: {e}")))
        })
        .transpose()?;

    Ok(Order {
        id: OrderId(id),
        booking_id: BookingId(booking_id),
        tailor_id: TailorId(tailor_id),
        customer_id: CustomerId(customer_id),
        service_type,
        status: status_str
            .parse::<OrderStatus>()
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        stages,
        estimated_completion_date,
        delay_requests,
        completion_feedback,
        created_at: parse_timestamp(&created_at_str),
        updated_at: parse_timestamp(&updated_at_str),
    })
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Fully bound insert statement for an order, shared with the booking
/// conversion transaction.
pub(crate) fn bind_order_insert(
    order: &Order,
) -> Result<sqlx::query::Query<'static, sqlx::Sqlite, SqliteArguments<'static>>, RepositoryError> {
    let stages_json = serde_json::to_string(&order.stages)
        .map_err(|e| RepositoryError::Decode(format!("stages_json: {e}")))?;
    let delays_json = serde_json::to_string(&order.delay_requests)
        .map_err(|e| RepositoryError::Decode(format!("delay_requests_json: {e}")))?;
    let feedback_json = order
        .completion_feedback
        .as_ref()
        .map(|feedback| {
            serde_json::to_string(feedback)
                .map_err(|e| RepositoryError::Decode(format!("feedback_json: {e}")))
        })
        .transpose()?;

    Ok(sqlx::query(
        "INSERT INTO work_order (id, booking_id, tailor_id, customer_id, service_type, status,
                                 stages_json, estimated_completion_date, delay_requests_json,
                                 feedback_json, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(order.id.0.clone())
    .bind(order.booking_id.0.clone())
    .bind(order.tailor_id.0.clone())
    .bind(order.customer_id.0.clone())
    .bind(order.service_type.clone())
    .bind(order.status.as_str())
    .bind(stages_json)
    .bind(order.estimated_completion_date.map(|date| date.format("%Y-%m-%d").to_string()))
    .bind(delays_json)
    .bind(feedback_json)
    .bind(order.created_at.to_rfc3339())
    .bind(order.updated_at.to_rfc3339()))
}

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM work_order WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_order(r)?)),
            None => Ok(None),
        }
    }

    async fn list_for_tailor(&self, tailor_id: &TailorId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM work_order
             WHERE tailor_id = ?
             ORDER BY created_at DESC"
        ))
        .bind(&tailor_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_order).collect()
    }

    async fn save(&self, order: &Order, expected: OrderStatus) -> Result<(), RepositoryError> {
        let stages_json = serde_json::to_string(&order.stages)
            .map_err(|e| RepositoryError::Decode(format!("stages_json: {e}")))?;
        let delays_json = serde_json::to_string(&order.delay_requests)
            .map_err(|e| RepositoryError::Decode(format!("delay_requests_json: {e}")))?;
        let feedback_json = order
            .completion_feedback
            .as_ref()
            .map(|feedback| {
                serde_json::to_string(feedback)
                    .map_err(|e| RepositoryError::Decode(format!("feedback_json: {e}")))
            })
            .transpose()?;

        let result = sqlx::query(
            "UPDATE work_order SET
                 status = ?,
                 stages_json = ?,
                 estimated_completion_date = ?,
                 delay_requests_json = ?,
                 feedback_json = ?,
                 updated_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(order.status.as_str())
        .bind(&stages_json)
        .bind(order.estimated_completion_date.map(|date| date.format("%Y-%m-%d").to_string()))
        .bind(&delays_json)
        .bind(&feedback_json)
        .bind(order.updated_at.to_rfc3339())
        .bind(&order.id.0)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::ConcurrentUpdate {
                entity: "order",
                id: order.id.0.clone(),
                expected: expected.as_str().to_string(),
            });
        }

        Ok(())
    }
}
