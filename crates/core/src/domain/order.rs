use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::booking::{BookingId, CustomerId};
use crate::domain::schedule::TailorId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    AwaitingPlan,
    PlanReview,
    InProgress,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingPlan => "awaiting_plan",
            Self::PlanReview => "plan_review",
            Self::InProgress => "in_progress",
            Self::Ready => "ready",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "awaiting_plan" => Ok(Self::AwaitingPlan),
            "plan_review" => Ok(Self::PlanReview),
            "in_progress" => Ok(Self::InProgress),
            "ready" => Ok(Self::Ready),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(DomainError::Validation(format!("unknown order status `{other}`"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    InProgress,
    Completed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

/// One named phase of order fulfilment (design, sew, deliver, ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkStage {
    pub name: String,
    pub description: String,
    pub estimated_days: u16,
    pub status: StageStatus,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkStage {
    pub fn pending(
        name: impl Into<String>,
        description: impl Into<String>,
        estimated_days: u16,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            estimated_days,
            status: StageStatus::Pending,
            completed_at: None,
        }
    }
}

/// Stage input from the tailor's work-plan submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkStageDraft {
    pub name: String,
    pub description: String,
    pub estimated_days: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayStatus {
    Pending,
    Approved,
    Rejected,
}

impl DelayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRequest {
    pub reason: String,
    pub additional_days: u16,
    pub status: DelayStatus,
    pub requested_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionFeedback {
    pub rating: u8,
    pub comment: Option<String>,
}

/// Work-plan operation names used in transition errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    SubmitWorkPlan,
    ApproveWorkPlan,
    RejectWorkPlan,
    CompleteStage,
    RequestDelay,
    RespondToDelay,
    ConfirmReceipt,
    SubmitReview,
}

impl OrderAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubmitWorkPlan => "submit_work_plan",
            Self::ApproveWorkPlan => "approve_work_plan",
            Self::RejectWorkPlan => "reject_work_plan",
            Self::CompleteStage => "complete_stage",
            Self::RequestDelay => "request_delay",
            Self::RespondToDelay => "respond_to_delay",
            Self::ConfirmReceipt => "confirm_receipt",
            Self::SubmitReview => "submit_review",
        }
    }
}

/// The unit of work spawned when a paid booking converts. Jointly owned:
/// the tailor drives progress, the customer holds the approval gates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub booking_id: BookingId,
    pub tailor_id: TailorId,
    pub customer_id: CustomerId,
    pub service_type: String,
    pub status: OrderStatus,
    pub stages: Vec<WorkStage>,
    pub estimated_completion_date: Option<NaiveDate>,
    pub delay_requests: Vec<DelayRequest>,
    pub completion_feedback: Option<CompletionFeedback>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Index of the stage currently in progress, if any.
    pub fn current_stage(&self) -> Option<usize> {
        self.stages.iter().position(|stage| stage.status == StageStatus::InProgress)
    }
}

#[cfg(test)]
mod tests {
    use super::{OrderStatus, StageStatus, WorkStage};

    #[test]
    fn order_status_round_trips_through_string_form() {
        for status in [
            OrderStatus::AwaitingPlan,
            OrderStatus::PlanReview,
            OrderStatus::InProgress,
            OrderStatus::Ready,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().expect("parse"), status);
        }
    }

    #[test]
    fn completed_and_cancelled_are_terminal() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Ready.is_terminal());
    }

    #[test]
    fn pending_stage_carries_no_completion_timestamp() {
        let stage = WorkStage::pending("design", "sketch and pattern", 2);
        assert_eq!(stage.status, StageStatus::Pending);
        assert!(stage.completed_at.is_none());
    }
}
