//! Return aggregate: quantity budgets and processing rules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl ReturnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        }
    }

    /// In-flight requests hold a claim on the item's return budget.
    /// Completed returns already shrank the item quantity itself, so they
    /// no longer claim anything; counting them would double-book.
    pub fn counts_against_budget(&self) -> bool {
        matches!(self, Self::Pending | Self::Approved)
    }
}

impl fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReturnStatus {
    type Err = ReturnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "completed" => Ok(Self::Completed),
            other => Err(ReturnError::UnknownStatus(other.to_string())),
        }
    }
}

/// Units still eligible for return on an order item: the current ordered
/// quantity (already net of completed returns) less in-flight claims.
/// Rejected requests release their claim.
pub fn return_budget(ordered_qty: u32, already_claimed: u32) -> u32 {
    ordered_qty.saturating_sub(already_claimed)
}

/// Validates a new return request against the item's remaining budget.
pub fn validate_request(quantity: u32, ordered_qty: u32, already_claimed: u32) -> Result<(), ReturnError> {
    if quantity == 0 {
        return Err(ReturnError::ZeroQuantity);
    }
    let budget = return_budget(ordered_qty, already_claimed);
    if quantity > budget {
        return Err(ReturnError::ExceedsOrdered { requested: quantity, budget });
    }
    Ok(())
}

/// A processing decision on a pending return.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Rejected,
}

/// Only pending requests may be decided; a repeat of an already-applied
/// decision is an error rather than a silent overwrite.
pub fn decide(current: ReturnStatus, decision: Decision) -> Result<ReturnStatus, ReturnError> {
    if current != ReturnStatus::Pending {
        return Err(ReturnError::AlreadyProcessed(current));
    }
    Ok(match decision {
        // Approval immediately reconciles, so the stored state is completed.
        Decision::Approved => ReturnStatus::Completed,
        Decision::Rejected => ReturnStatus::Rejected,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnError {
    UnknownStatus(String),
    ZeroQuantity,
    ExceedsOrdered { requested: u32, budget: u32 },
    AlreadyProcessed(ReturnStatus),
}
impl std::error::Error for ReturnError {}
impl fmt::Display for ReturnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownStatus(s) => write!(f, "unknown return status '{s}'"),
            Self::ZeroQuantity => write!(f, "return quantity must be positive"),
            Self::ExceedsOrdered { requested, budget } => {
                write!(f, "return quantity {requested} exceeds the returnable quantity {budget}")
            }
            Self::AlreadyProcessed(s) => write!(f, "return already processed ({s})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_shrinks_with_prior_claims() {
        assert_eq!(return_budget(10, 0), 10);
        assert_eq!(return_budget(10, 4), 6);
        assert_eq!(return_budget(10, 10), 0);
        assert_eq!(return_budget(10, 12), 0);
    }

    #[test]
    fn request_within_budget_accepted() {
        assert!(validate_request(3, 10, 4).is_ok());
        assert!(validate_request(6, 10, 4).is_ok());
    }

    #[test]
    fn request_over_budget_rejected() {
        let err = validate_request(7, 10, 4).unwrap_err();
        assert_eq!(err, ReturnError::ExceedsOrdered { requested: 7, budget: 6 });
    }

    #[test]
    fn zero_quantity_rejected() {
        assert_eq!(validate_request(0, 10, 0).unwrap_err(), ReturnError::ZeroQuantity);
    }

    #[test]
    fn only_pending_requests_are_decidable() {
        assert_eq!(decide(ReturnStatus::Pending, Decision::Approved).unwrap(), ReturnStatus::Completed);
        assert_eq!(decide(ReturnStatus::Pending, Decision::Rejected).unwrap(), ReturnStatus::Rejected);
        assert!(decide(ReturnStatus::Completed, Decision::Approved).is_err());
        assert!(decide(ReturnStatus::Rejected, Decision::Rejected).is_err());
    }

    #[test]
    fn only_in_flight_requests_claim_budget() {
        assert!(ReturnStatus::Pending.counts_against_budget());
        assert!(ReturnStatus::Approved.counts_against_budget());
        assert!(!ReturnStatus::Completed.counts_against_budget());
        assert!(!ReturnStatus::Rejected.counts_against_budget());
    }
}
