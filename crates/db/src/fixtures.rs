use sqlx::Executor;
use sqlx::Row;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

const SEED_SCHEDULE_IDS: &[&str] = &["tailor-atelier-001", "tailor-atelier-002"];

const SEED_BOOKINGS: &[(&str, &str)] = &[
    ("booking-seed-001", "pending"),
    ("booking-seed-002", "quote_submitted"),
    ("booking-seed-003", "converted"),
];

const SEED_ORDER_IDS: &[&str] = &["order-seed-001"];

/// Deterministic development fixtures: two tailor schedules, bookings in the
/// pending, quote-submitted and converted states, and one in-progress order.
pub struct SeedDataset;

#[derive(Debug)]
pub struct SeedResult {
    pub schedules: usize,
    pub bookings: usize,
    pub orders: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub checks: Vec<SeedCheck>,
}

#[derive(Debug)]
pub struct SeedCheck {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl VerificationResult {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|check| check.passed)
    }
}

impl SeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/seed_data.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            schedules: SEED_SCHEDULE_IDS.len(),
            bookings: SEED_BOOKINGS.len(),
            orders: SEED_ORDER_IDS.len(),
        })
    }

    /// Check that the seeded rows exist with the statuses the fixtures
    /// promise. Used by the doctor command against live databases.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for tailor_id in SEED_SCHEDULE_IDS {
            let count: i64 = sqlx::query(
                "SELECT COUNT(*) AS count FROM tailor_schedule WHERE tailor_id = ?",
            )
            .bind(tailor_id)
            .fetch_one(pool)
            .await?
            .get("count");

            checks.push(SeedCheck {
                name: format!("schedule {tailor_id}"),
                passed: count == 1,
                detail: format!("found {count} rows"),
            });
        }

        for (booking_id, expected_status) in SEED_BOOKINGS {
            let status: Option<String> =
                sqlx::query("SELECT status FROM booking WHERE id = ?")
                    .bind(booking_id)
                    .fetch_optional(pool)
                    .await?
                    .map(|row| row.get("status"));

            let passed = status.as_deref() == Some(*expected_status);
            checks.push(SeedCheck {
                name: format!("booking {booking_id}"),
                passed,
                detail: match status {
                    Some(actual) => format!("status `{actual}`, expected `{expected_status}`"),
                    None => "row missing".to_string(),
                },
            });
        }

        for order_id in SEED_ORDER_IDS {
            let count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM work_order WHERE id = ?")
                .bind(order_id)
                .fetch_one(pool)
                .await?
                .get("count");

            checks.push(SeedCheck {
                name: format!("order {order_id}"),
                passed: count == 1,
                detail: format!("found {count} rows"),
            });
        }

        Ok(VerificationResult { checks })
    }
}
