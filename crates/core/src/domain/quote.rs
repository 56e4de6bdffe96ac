use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteItem {
    pub description: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

/// Per-phase effort estimate attached to a quote; seeds the initial
/// work-plan stages when the booking converts into an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimatedDays {
    pub design: u16,
    pub sew: u16,
    pub deliver: u16,
}

impl EstimatedDays {
    pub fn total(&self) -> u32 {
        u32::from(self.design) + u32::from(self.sew) + u32::from(self.deliver)
    }
}

/// Cost/time estimate the tailor attaches to a booking. Immutable once the
/// customer has responded to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub items: Vec<QuoteItem>,
    pub labor_cost: Decimal,
    pub material_cost: Decimal,
    pub total_amount: Decimal,
    pub estimated_days: EstimatedDays,
    pub notes: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// Unvalidated quote input as submitted by the tailor. `total_amount` may be
/// omitted, in which case it is computed from the components.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteDraft {
    pub items: Vec<QuoteItem>,
    pub labor_cost: Decimal,
    pub material_cost: Decimal,
    pub total_amount: Option<Decimal>,
    pub estimated_days: EstimatedDays,
    pub notes: Option<String>,
}

impl QuoteDraft {
    pub fn into_quote(self, submitted_at: DateTime<Utc>) -> Result<Quote, DomainError> {
        if self.labor_cost < Decimal::ZERO {
            return Err(DomainError::Validation("labor_cost must not be negative".to_string()));
        }
        if self.material_cost < Decimal::ZERO {
            return Err(DomainError::Validation("material_cost must not be negative".to_string()));
        }
        for (index, item) in self.items.iter().enumerate() {
            if item.unit_price < Decimal::ZERO {
                return Err(DomainError::Validation(format!(
                    "item {index}: unit_price must not be negative"
                )));
            }
            if item.quantity == 0 {
                return Err(DomainError::Validation(format!(
                    "item {index}: quantity must be greater than zero"
                )));
            }
        }

        let computed = self.labor_cost
            + self.material_cost
            + self
                .items
                .iter()
                .map(|item| item.unit_price * Decimal::from(item.quantity))
                .sum::<Decimal>();

        let total_amount = match self.total_amount {
            Some(supplied) if supplied != computed => {
                return Err(DomainError::Validation(format!(
                    "total_amount {supplied} does not match item/labor/material sum {computed}"
                )));
            }
            Some(supplied) => supplied,
            None => computed,
        };

        Ok(Quote {
            items: self.items,
            labor_cost: self.labor_cost,
            material_cost: self.material_cost,
            total_amount,
            estimated_days: self.estimated_days,
            notes: self.notes,
            submitted_at,
        })
    }
}
