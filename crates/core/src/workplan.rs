//! Work-plan tracking for converted orders.
//!
//! The tailor drives stage progress, the customer holds the approval gates
//! (plan review, delay responses, receipt confirmation). Stages complete
//! strictly in array order.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::domain::actor::{Actor, ActorRole};
use crate::domain::order::{
    CompletionFeedback, DelayRequest, DelayStatus, Order, OrderAction, OrderStatus, StageStatus,
    WorkStage, WorkStageDraft,
};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, Default)]
pub struct WorkPlanTracker;

impl WorkPlanTracker {
    /// Replace the proposed plan with the tailor's submission and hand it to
    /// the customer for review. The completion date is derived from `today`
    /// plus the summed stage estimates.
    pub fn submit_work_plan(
        &self,
        order: &mut Order,
        actor: &Actor,
        stages: Vec<WorkStageDraft>,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        require_status(order, OrderStatus::AwaitingPlan, OrderAction::SubmitWorkPlan)?;
        require_tailor(order, actor, OrderAction::SubmitWorkPlan)?;
        if stages.is_empty() {
            return Err(DomainError::Validation(
                "a work plan needs at least one stage".to_string(),
            ));
        }

        let total_days: i64 =
            stages.iter().map(|stage| i64::from(stage.estimated_days)).sum();
        order.stages = stages
            .into_iter()
            .map(|draft| WorkStage::pending(draft.name, draft.description, draft.estimated_days))
            .collect();
        order.estimated_completion_date = Some(today + Duration::days(total_days));
        order.status = OrderStatus::PlanReview;
        order.updated_at = now;
        Ok(())
    }

    /// Customer approves the plan; work starts on the first stage.
    pub fn approve_work_plan(
        &self,
        order: &mut Order,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        require_status(order, OrderStatus::PlanReview, OrderAction::ApproveWorkPlan)?;
        require_customer(order, actor, OrderAction::ApproveWorkPlan)?;
        if order.stages.is_empty() {
            return Err(DomainError::Precondition(
                "order has no stages to start".to_string(),
            ));
        }

        order.stages[0].status = StageStatus::InProgress;
        order.status = OrderStatus::InProgress;
        order.updated_at = now;
        Ok(())
    }

    /// Customer sends the plan back; the previous proposal is discarded.
    pub fn reject_work_plan(
        &self,
        order: &mut Order,
        actor: &Actor,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        require_status(order, OrderStatus::PlanReview, OrderAction::RejectWorkPlan)?;
        require_customer(order, actor, OrderAction::RejectWorkPlan)?;
        if reason.trim().is_empty() {
            return Err(DomainError::Validation(
                "work plan rejection requires a reason".to_string(),
            ));
        }

        order.stages = Vec::new();
        order.estimated_completion_date = None;
        order.status = OrderStatus::AwaitingPlan;
        order.updated_at = now;
        Ok(())
    }

    /// Complete the stage at `stage_index`. Stages finish strictly in order:
    /// the index must be the stage currently in progress. Completing the
    /// last stage moves the order to `Ready`.
    pub fn complete_stage(
        &self,
        order: &mut Order,
        actor: &Actor,
        stage_index: usize,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        require_status(order, OrderStatus::InProgress, OrderAction::CompleteStage)?;
        require_tailor(order, actor, OrderAction::CompleteStage)?;

        if stage_index >= order.stages.len() {
            return Err(DomainError::Precondition(format!(
                "stage index {stage_index} is out of range ({} stages)",
                order.stages.len()
            )));
        }
        match order.stages[stage_index].status {
            StageStatus::InProgress => {}
            StageStatus::Completed => {
                return Err(DomainError::Precondition(format!(
                    "stage {stage_index} is already completed"
                )));
            }
            StageStatus::Pending => {
                return Err(DomainError::Precondition(format!(
                    "stage {stage_index} cannot complete before earlier stages finish"
                )));
            }
        }

        order.stages[stage_index].status = StageStatus::Completed;
        order.stages[stage_index].completed_at = Some(now);

        if let Some(next) = order.stages.get_mut(stage_index + 1) {
            next.status = StageStatus::InProgress;
        } else {
            order.status = OrderStatus::Ready;
        }
        order.updated_at = now;
        Ok(())
    }

    /// Tailor asks for more time. The completion date is untouched until the
    /// customer approves.
    pub fn request_delay(
        &self,
        order: &mut Order,
        actor: &Actor,
        reason: impl Into<String>,
        additional_days: u16,
        now: DateTime<Utc>,
    ) -> Result<usize, DomainError> {
        require_status(order, OrderStatus::InProgress, OrderAction::RequestDelay)?;
        require_tailor(order, actor, OrderAction::RequestDelay)?;
        if additional_days == 0 {
            return Err(DomainError::Validation(
                "a delay request needs at least one additional day".to_string(),
            ));
        }

        order.delay_requests.push(DelayRequest {
            reason: reason.into(),
            additional_days,
            status: DelayStatus::Pending,
            requested_at: now,
            responded_at: None,
        });
        order.updated_at = now;
        Ok(order.delay_requests.len() - 1)
    }

    /// Customer answers a delay request. Approval extends the completion
    /// date by the requested days exactly once; repeating the same answer is
    /// a no-op so retries stay safe, while a conflicting re-answer fails.
    pub fn respond_to_delay(
        &self,
        order: &mut Order,
        actor: &Actor,
        request_index: usize,
        approved: bool,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        require_customer(order, actor, OrderAction::RespondToDelay)?;
        if order.status.is_terminal() {
            return Err(DomainError::InvalidOrderTransition {
                from: order.status,
                action: OrderAction::RespondToDelay,
            });
        }

        let additional_days = {
            let request = order.delay_requests.get(request_index).ok_or_else(|| {
                DomainError::Precondition(format!("no delay request at index {request_index}"))
            })?;

            let decision = if approved { DelayStatus::Approved } else { DelayStatus::Rejected };
            match request.status {
                DelayStatus::Pending => {}
                already if already == decision => return Ok(()),
                already => {
                    return Err(DomainError::Precondition(format!(
                        "delay request {request_index} was already {}",
                        already.as_str()
                    )));
                }
            }
            request.additional_days
        };

        let request = &mut order.delay_requests[request_index];
        request.responded_at = Some(now);
        if approved {
            request.status = DelayStatus::Approved;
            order.estimated_completion_date = order
                .estimated_completion_date
                .map(|date| date + Duration::days(i64::from(additional_days)));
        } else {
            request.status = DelayStatus::Rejected;
        }
        order.updated_at = now;
        Ok(())
    }

    /// Customer confirms receipt of the finished work; the order completes
    /// and the feedback (if any) is stored.
    pub fn confirm_receipt(
        &self,
        order: &mut Order,
        actor: &Actor,
        feedback: Option<CompletionFeedback>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        require_status(order, OrderStatus::Ready, OrderAction::ConfirmReceipt)?;
        require_customer(order, actor, OrderAction::ConfirmReceipt)?;
        if let Some(feedback) = &feedback {
            validate_feedback(feedback)?;
        }

        order.completion_feedback = feedback;
        order.status = OrderStatus::Completed;
        order.updated_at = now;
        Ok(())
    }

    /// Customer leaves a review. From `Ready` this also completes the order;
    /// from `Completed` it fills in feedback that was not left at receipt.
    pub fn submit_review(
        &self,
        order: &mut Order,
        actor: &Actor,
        feedback: CompletionFeedback,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        require_customer(order, actor, OrderAction::SubmitReview)?;
        validate_feedback(&feedback)?;

        match order.status {
            OrderStatus::Ready => {
                order.completion_feedback = Some(feedback);
                order.status = OrderStatus::Completed;
            }
            OrderStatus::Completed => {
                if order.completion_feedback.is_some() {
                    return Err(DomainError::Precondition(
                        "order already has completion feedback".to_string(),
                    ));
                }
                order.completion_feedback = Some(feedback);
            }
            from => {
                return Err(DomainError::InvalidOrderTransition {
                    from,
                    action: OrderAction::SubmitReview,
                });
            }
        }
        order.updated_at = now;
        Ok(())
    }
}

fn validate_feedback(feedback: &CompletionFeedback) -> Result<(), DomainError> {
    if !(1..=5).contains(&feedback.rating) {
        return Err(DomainError::Validation("rating must be between 1 and 5".to_string()));
    }
    Ok(())
}

fn require_status(
    order: &Order,
    expected: OrderStatus,
    action: OrderAction,
) -> Result<(), DomainError> {
    if order.status == expected {
        Ok(())
    } else {
        Err(DomainError::InvalidOrderTransition { from: order.status, action })
    }
}

fn require_tailor(order: &Order, actor: &Actor, action: OrderAction) -> Result<(), DomainError> {
    if actor.role == ActorRole::Tailor && actor.id == order.tailor_id.0 {
        Ok(())
    } else {
        Err(unauthorized(actor, action))
    }
}

fn require_customer(order: &Order, actor: &Actor, action: OrderAction) -> Result<(), DomainError> {
    if actor.role == ActorRole::Customer && actor.id == order.customer_id.0 {
        Ok(())
    } else {
        Err(unauthorized(actor, action))
    }
}

fn unauthorized(actor: &Actor, action: OrderAction) -> DomainError {
    DomainError::UnauthorizedActor {
        actor_id: actor.id.clone(),
        role: actor.role,
        action: action.as_str().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, Utc};

    use crate::domain::actor::Actor;
    use crate::domain::booking::{BookingId, CustomerId};
    use crate::domain::order::{
        CompletionFeedback, DelayStatus, Order, OrderId, OrderStatus, StageStatus, WorkStageDraft,
    };
    use crate::domain::schedule::TailorId;
    use crate::errors::DomainError;
    use crate::workplan::WorkPlanTracker;

    fn order() -> Order {
        let now = Utc::now();
        Order {
            id: OrderId("ord-1".to_string()),
            booking_id: BookingId("bk-1".to_string()),
            tailor_id: TailorId("tailor-1".to_string()),
            customer_id: CustomerId("cust-1".to_string()),
            service_type: "bespoke suit".to_string(),
            status: OrderStatus::AwaitingPlan,
            stages: Vec::new(),
            estimated_completion_date: None,
            delay_requests: Vec::new(),
            completion_feedback: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn stages() -> Vec<WorkStageDraft> {
        vec![
            WorkStageDraft {
                name: "design".to_string(),
                description: "pattern making".to_string(),
                estimated_days: 2,
            },
            WorkStageDraft {
                name: "sew".to_string(),
                description: "cut and sew".to_string(),
                estimated_days: 6,
            },
            WorkStageDraft {
                name: "deliver".to_string(),
                description: "finishing and delivery".to_string(),
                estimated_days: 2,
            },
        ]
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 9, 7).expect("valid date")
    }

    fn tailor() -> Actor {
        Actor::tailor("tailor-1")
    }

    fn customer() -> Actor {
        Actor::customer("cust-1")
    }

    fn in_progress_order() -> Order {
        let tracker = WorkPlanTracker;
        let mut order = order();
        let now = Utc::now();
        tracker.submit_work_plan(&mut order, &tailor(), stages(), today(), now).expect("plan");
        tracker.approve_work_plan(&mut order, &customer(), now).expect("approve");
        order
    }

    #[test]
    fn submitted_plan_goes_to_review_with_derived_completion_date() {
        let tracker = WorkPlanTracker;
        let mut order = order();

        tracker
            .submit_work_plan(&mut order, &tailor(), stages(), today(), Utc::now())
            .expect("plan");

        assert_eq!(order.status, OrderStatus::PlanReview);
        assert_eq!(order.stages.len(), 3);
        assert_eq!(order.estimated_completion_date, Some(today() + Duration::days(10)));
    }

    #[test]
    fn empty_plan_is_rejected() {
        let tracker = WorkPlanTracker;
        let mut order = order();
        let error = tracker
            .submit_work_plan(&mut order, &tailor(), Vec::new(), today(), Utc::now())
            .expect_err("empty plan");
        assert!(matches!(error, DomainError::Validation(_)));
    }

    #[test]
    fn approval_starts_the_first_stage() {
        let order = in_progress_order();
        assert_eq!(order.status, OrderStatus::InProgress);
        assert_eq!(order.stages[0].status, StageStatus::InProgress);
        assert_eq!(order.stages[1].status, StageStatus::Pending);
    }

    #[test]
    fn rejection_discards_the_plan_for_revision() {
        let tracker = WorkPlanTracker;
        let mut order = order();
        let now = Utc::now();
        tracker.submit_work_plan(&mut order, &tailor(), stages(), today(), now).expect("plan");

        tracker
            .reject_work_plan(&mut order, &customer(), "too slow", now)
            .expect("reject plan");

        assert_eq!(order.status, OrderStatus::AwaitingPlan);
        assert!(order.stages.is_empty());
        assert!(order.estimated_completion_date.is_none());
    }

    #[test]
    fn stages_complete_in_order_and_finish_at_ready() {
        let tracker = WorkPlanTracker;
        let mut order = in_progress_order();
        let now = Utc::now();

        tracker.complete_stage(&mut order, &tailor(), 0, now).expect("stage 0");
        assert_eq!(order.stages[1].status, StageStatus::InProgress);

        tracker.complete_stage(&mut order, &tailor(), 1, now).expect("stage 1");
        tracker.complete_stage(&mut order, &tailor(), 2, now).expect("stage 2");

        assert_eq!(order.status, OrderStatus::Ready);
        assert!(order.stages.iter().all(|stage| stage.status == StageStatus::Completed));
        assert!(order.stages.iter().all(|stage| stage.completed_at.is_some()));
    }

    #[test]
    fn skipping_ahead_is_rejected() {
        let tracker = WorkPlanTracker;
        let mut order = in_progress_order();

        let error = tracker
            .complete_stage(&mut order, &tailor(), 2, Utc::now())
            .expect_err("delivery before sewing");
        assert!(matches!(error, DomainError::Precondition(_)));
        assert_eq!(order.stages[2].status, StageStatus::Pending);
    }

    #[test]
    fn completing_a_stage_twice_is_rejected() {
        let tracker = WorkPlanTracker;
        let mut order = in_progress_order();
        let now = Utc::now();
        tracker.complete_stage(&mut order, &tailor(), 0, now).expect("stage 0");

        let error =
            tracker.complete_stage(&mut order, &tailor(), 0, now).expect_err("already done");
        assert!(matches!(error, DomainError::Precondition(_)));
    }

    #[test]
    fn approved_delay_extends_the_completion_date_exactly_once() {
        let tracker = WorkPlanTracker;
        let mut order = in_progress_order();
        let now = Utc::now();
        let baseline = order.estimated_completion_date.expect("date set");

        let index =
            tracker.request_delay(&mut order, &tailor(), "fabric backorder", 3, now).expect("delay");
        assert_eq!(order.estimated_completion_date, Some(baseline), "no change until approval");

        tracker.respond_to_delay(&mut order, &customer(), index, true, now).expect("approve");
        assert_eq!(order.estimated_completion_date, Some(baseline + Duration::days(3)));
        assert_eq!(order.delay_requests[index].status, DelayStatus::Approved);

        // Retrying the same approval must not extend the date again.
        tracker.respond_to_delay(&mut order, &customer(), index, true, now).expect("retry is a no-op");
        assert_eq!(order.estimated_completion_date, Some(baseline + Duration::days(3)));
    }

    #[test]
    fn conflicting_delay_re_answer_is_rejected() {
        let tracker = WorkPlanTracker;
        let mut order = in_progress_order();
        let now = Utc::now();
        let index =
            tracker.request_delay(&mut order, &tailor(), "fabric backorder", 3, now).expect("delay");
        tracker.respond_to_delay(&mut order, &customer(), index, false, now).expect("reject");

        let error = tracker
            .respond_to_delay(&mut order, &customer(), index, true, now)
            .expect_err("cannot flip a decided request");
        assert!(matches!(error, DomainError::Precondition(_)));
        assert_eq!(order.delay_requests[index].status, DelayStatus::Rejected);
    }

    #[test]
    fn rejected_delay_leaves_the_date_unchanged() {
        let tracker = WorkPlanTracker;
        let mut order = in_progress_order();
        let now = Utc::now();
        let baseline = order.estimated_completion_date.expect("date set");
        let index =
            tracker.request_delay(&mut order, &tailor(), "fabric backorder", 5, now).expect("delay");

        tracker.respond_to_delay(&mut order, &customer(), index, false, now).expect("reject");
        assert_eq!(order.estimated_completion_date, Some(baseline));
    }

    #[test]
    fn receipt_confirmation_completes_a_ready_order() {
        let tracker = WorkPlanTracker;
        let mut order = in_progress_order();
        let now = Utc::now();
        for index in 0..3 {
            tracker.complete_stage(&mut order, &tailor(), index, now).expect("stage");
        }

        tracker
            .confirm_receipt(
                &mut order,
                &customer(),
                Some(CompletionFeedback { rating: 5, comment: Some("perfect fit".to_string()) }),
                now,
            )
            .expect("confirm receipt");

        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.completion_feedback.as_ref().map(|f| f.rating), Some(5));
    }

    #[test]
    fn receipt_confirmation_requires_ready() {
        let tracker = WorkPlanTracker;
        let mut order = in_progress_order();
        let error = tracker
            .confirm_receipt(&mut order, &customer(), None, Utc::now())
            .expect_err("not ready yet");
        assert!(matches!(error, DomainError::InvalidOrderTransition { .. }));
    }

    #[test]
    fn review_after_completion_fills_missing_feedback_once() {
        let tracker = WorkPlanTracker;
        let mut order = in_progress_order();
        let now = Utc::now();
        for index in 0..3 {
            tracker.complete_stage(&mut order, &tailor(), index, now).expect("stage");
        }
        tracker.confirm_receipt(&mut order, &customer(), None, now).expect("receipt");

        tracker
            .submit_review(
                &mut order,
                &customer(),
                CompletionFeedback { rating: 4, comment: None },
                now,
            )
            .expect("late review");

        let error = tracker
            .submit_review(
                &mut order,
                &customer(),
                CompletionFeedback { rating: 2, comment: None },
                now,
            )
            .expect_err("feedback is immutable");
        assert!(matches!(error, DomainError::Precondition(_)));
    }

    #[test]
    fn invalid_rating_is_rejected() {
        let tracker = WorkPlanTracker;
        let mut order = in_progress_order();
        let now = Utc::now();
        for index in 0..3 {
            tracker.complete_stage(&mut order, &tailor(), index, now).expect("stage");
        }

        let error = tracker
            .confirm_receipt(
                &mut order,
                &customer(),
                Some(CompletionFeedback { rating: 6, comment: None }),
                now,
            )
            .expect_err("rating out of range");
        assert!(matches!(error, DomainError::Validation(_)));
    }

    #[test]
    fn only_participants_may_act() {
        let tracker = WorkPlanTracker;
        let mut order = order();

        let error = tracker
            .submit_work_plan(&mut order, &Actor::tailor("tailor-2"), stages(), today(), Utc::now())
            .expect_err("foreign tailor");
        assert!(matches!(error, DomainError::UnauthorizedActor { .. }));

        tracker
            .submit_work_plan(&mut order, &tailor(), stages(), today(), Utc::now())
            .expect("plan");
        let error = tracker
            .approve_work_plan(&mut order, &Actor::customer("cust-2"), Utc::now())
            .expect_err("foreign customer");
        assert!(matches!(error, DomainError::UnauthorizedActor { .. }));
    }
}
