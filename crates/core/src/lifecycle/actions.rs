use serde::{Deserialize, Serialize};

use crate::domain::booking::BookingStatus;

/// Everything a caller can attempt against a booking. `Convert` is
/// system-only and fires as part of payment confirmation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingAction {
    Accept,
    Decline,
    Cancel,
    CompleteConsultation,
    SubmitQuote,
    AcceptQuote,
    RejectQuote,
    ConfirmPayment,
    Convert,
}

impl BookingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Decline => "decline",
            Self::Cancel => "cancel",
            Self::CompleteConsultation => "complete_consultation",
            Self::SubmitQuote => "submit_quote",
            Self::AcceptQuote => "accept_quote",
            Self::RejectQuote => "reject_quote",
            Self::ConfirmPayment => "confirm_payment",
            Self::Convert => "convert",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub action: BookingAction,
}
