use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::actor::{Actor, ActorRole};
use crate::domain::booking::{Booking, BookingStatus};
use crate::domain::order::{Order, OrderId, OrderStatus, WorkStage};
use crate::domain::quote::QuoteDraft;
use crate::errors::DomainError;
use crate::lifecycle::actions::{BookingAction, TransitionOutcome};
use crate::notify::{NotificationEvent, NotificationSink};

/// Product policy knobs that bend the transition table without changing it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BookingPolicy {
    /// When true, a quote may only follow a completed consultation; when
    /// false (default) tailors may quote straight from `Confirmed`.
    pub require_consultation_before_quote: bool,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self { require_consultation_before_quote: false }
    }
}

/// The booking state machine. All mutation goes through [`apply`]; every
/// rejected attempt names the current state and the legal next actions.
///
/// [`apply`]: BookingLifecycle::apply
#[derive(Clone, Copy, Debug, Default)]
pub struct BookingLifecycle {
    policy: BookingPolicy,
}

impl BookingLifecycle {
    pub fn new(policy: BookingPolicy) -> Self {
        Self { policy }
    }

    /// Legal next actions from `status` under the configured policy.
    pub fn allowed_actions(&self, status: BookingStatus) -> Vec<BookingAction> {
        use BookingAction::*;
        use BookingStatus::*;

        match status {
            Pending => vec![Accept, Decline, Cancel],
            Confirmed => {
                if self.policy.require_consultation_before_quote {
                    vec![Cancel, CompleteConsultation]
                } else {
                    vec![Cancel, CompleteConsultation, SubmitQuote]
                }
            }
            ConsultationDone => vec![SubmitQuote],
            QuoteSubmitted => vec![AcceptQuote, RejectQuote],
            QuoteAccepted => vec![ConfirmPayment],
            Paid => vec![Convert],
            Converted | Cancelled | Declined => Vec::new(),
        }
    }

    fn target(&self, status: BookingStatus, action: BookingAction) -> Option<BookingStatus> {
        use BookingAction::*;
        use BookingStatus::*;

        match (status, action) {
            (Pending, Accept) => Some(Confirmed),
            (Pending, Decline) => Some(Declined),
            (Pending, Cancel) | (Confirmed, Cancel) => Some(Cancelled),
            (Confirmed, CompleteConsultation) => Some(ConsultationDone),
            (Confirmed, SubmitQuote) if !self.policy.require_consultation_before_quote => {
                Some(QuoteSubmitted)
            }
            (ConsultationDone, SubmitQuote) => Some(QuoteSubmitted),
            (QuoteSubmitted, AcceptQuote) => Some(QuoteAccepted),
            (QuoteSubmitted, RejectQuote) => Some(Cancelled),
            (QuoteAccepted, ConfirmPayment) => Some(Paid),
            (Paid, Convert) => Some(Converted),
            _ => None,
        }
    }

    fn authorize(
        &self,
        booking: &Booking,
        action: BookingAction,
        actor: &Actor,
    ) -> Result<(), DomainError> {
        use BookingAction::*;

        let permitted = match action {
            Accept | Decline | CompleteConsultation | SubmitQuote => {
                actor.role == ActorRole::Tailor && actor.id == booking.tailor_id.0
            }
            Cancel | AcceptQuote | RejectQuote => {
                actor.role == ActorRole::Customer && actor.id == booking.customer_id.0
            }
            ConfirmPayment | Convert => actor.role == ActorRole::System,
        };

        if permitted {
            Ok(())
        } else {
            Err(DomainError::UnauthorizedActor {
                actor_id: actor.id.clone(),
                role: actor.role,
                action: action.as_str().to_string(),
            })
        }
    }

    fn check_preconditions(booking: &Booking, action: BookingAction) -> Result<(), DomainError> {
        if action == BookingAction::AcceptQuote && booking.quote.is_none() {
            return Err(DomainError::Precondition(
                "booking has no quote attached to accept".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply one action to the booking. The transition table is checked
    /// first so an illegal action reports the allowed alternatives, then
    /// the actor check, then preconditions.
    pub fn apply(
        &self,
        booking: &mut Booking,
        action: BookingAction,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, DomainError> {
        let from = booking.status;
        let to = self.target(from, action).ok_or_else(|| {
            DomainError::InvalidBookingTransition {
                from,
                action,
                allowed: self.allowed_actions(from),
            }
        })?;

        self.authorize(booking, action, actor)?;
        Self::check_preconditions(booking, action)?;

        booking.status = to;
        booking.updated_at = now;

        Ok(TransitionOutcome { from, to, action })
    }

    /// Apply an action and inform the notification collaborator about the
    /// outcome. Delivery is fire-and-forget; the result of the transition
    /// is unchanged by the sink.
    pub fn apply_with_notify<S>(
        &self,
        booking: &mut Booking,
        action: BookingAction,
        actor: &Actor,
        now: DateTime<Utc>,
        sink: &S,
        correlation_id: &str,
    ) -> Result<TransitionOutcome, DomainError>
    where
        S: NotificationSink + ?Sized,
    {
        let booking_id = booking.id.clone();
        let result = self.apply(booking, action, actor, now);
        match &result {
            Ok(outcome) => sink.notify(
                NotificationEvent::new(
                    Some(booking_id),
                    None,
                    correlation_id,
                    format!("booking.{}", action.as_str()),
                    actor.id.clone(),
                )
                .with_metadata("from", outcome.from.as_str())
                .with_metadata("to", outcome.to.as_str()),
            ),
            Err(error) => sink.notify(
                NotificationEvent::new(
                    Some(booking_id),
                    None,
                    correlation_id,
                    "booking.transition_rejected",
                    actor.id.clone(),
                )
                .with_metadata("action", action.as_str())
                .with_metadata("error", error.to_string()),
            ),
        }
        result
    }

    /// Validate and attach the tailor's quote, then move the booking to
    /// `QuoteSubmitted`. The draft is only attached if the transition is
    /// legal for this actor.
    pub fn submit_quote(
        &self,
        booking: &mut Booking,
        actor: &Actor,
        draft: QuoteDraft,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, DomainError> {
        let from = booking.status;
        if self.target(from, BookingAction::SubmitQuote).is_none() {
            return Err(DomainError::InvalidBookingTransition {
                from,
                action: BookingAction::SubmitQuote,
                allowed: self.allowed_actions(from),
            });
        }
        self.authorize(booking, BookingAction::SubmitQuote, actor)?;

        let quote = draft.into_quote(now)?;
        booking.quote = Some(quote);
        self.apply(booking, BookingAction::SubmitQuote, actor, now)
    }

    /// Reject the submitted quote, cancelling the booking. The reason is
    /// recorded for audit/notification and not re-validated beyond being
    /// non-empty.
    pub fn reject_quote(
        &self,
        booking: &mut Booking,
        actor: &Actor,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, DomainError> {
        if reason.trim().is_empty() {
            return Err(DomainError::Validation(
                "quote rejection requires a reason".to_string(),
            ));
        }

        let outcome = self.apply(booking, BookingAction::RejectQuote, actor, now)?;
        booking.cancellation_reason = Some(reason.trim().to_string());
        Ok(outcome)
    }

    /// Payment confirmation followed immediately by the system-triggered
    /// conversion. Returns the new order; the caller persists booking and
    /// order in one transaction so a paid-but-unconverted booking is never
    /// left behind.
    pub fn confirm_payment_and_convert(
        &self,
        booking: &mut Booking,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<(Vec<TransitionOutcome>, Order), DomainError> {
        let paid = self.apply(booking, BookingAction::ConfirmPayment, actor, now)?;
        let converted = self.apply(booking, BookingAction::Convert, actor, now)?;
        let order = build_order(booking, now)?;
        booking.order_id = Some(order.id.clone());
        Ok((vec![paid, converted], order))
    }
}

/// Build the order spawned by conversion: `awaiting_plan`, with a proposed
/// three-stage plan seeded from the quote's per-phase estimates. The plan
/// only becomes binding once the tailor submits it for customer review.
fn build_order(booking: &Booking, now: DateTime<Utc>) -> Result<Order, DomainError> {
    if booking.status != BookingStatus::Converted {
        return Err(DomainError::Precondition(
            "orders can only be built from a converted booking".to_string(),
        ));
    }
    let quote = booking.quote.as_ref().ok_or_else(|| {
        DomainError::Precondition("converted booking is missing its quote".to_string())
    })?;

    let estimates = quote.estimated_days;
    Ok(Order {
        id: OrderId(Uuid::new_v4().to_string()),
        booking_id: booking.id.clone(),
        tailor_id: booking.tailor_id.clone(),
        customer_id: booking.customer_id.clone(),
        service_type: booking.service.clone(),
        status: OrderStatus::AwaitingPlan,
        stages: vec![
            WorkStage::pending("design", "design and pattern making", estimates.design),
            WorkStage::pending("sew", "cutting and sewing", estimates.sew),
            WorkStage::pending("deliver", "finishing and delivery", estimates.deliver),
        ],
        estimated_completion_date: None,
        delay_requests: Vec::new(),
        completion_feedback: None,
        created_at: now,
        updated_at: now,
    })
}
