//! Order aggregate: status state machine, invoice numbers, totals.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether an order in this status still holds reserved stock.
    /// Delivered orders consumed it; cancelled orders already put it back.
    /// Removing a pending or shipped order must restock first.
    pub fn holds_stock(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

/// Outcome of requesting a status change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Requested status equals the current one; nothing to do.
    Noop,
    /// Status advanced; stock must be restored when the target is cancelled.
    Changed { restock: bool },
}

/// Validates a status change against the order lifecycle:
/// pending -> shipped | cancelled, shipped -> delivered | cancelled,
/// delivered and cancelled are terminal. Re-applying the current status
/// is accepted as a no-op so retried updates stay idempotent.
pub fn transition(from: OrderStatus, to: OrderStatus) -> Result<Transition, OrderError> {
    use OrderStatus::*;
    if from == to {
        return Ok(Transition::Noop);
    }
    let allowed = matches!(
        (from, to),
        (Pending, Shipped) | (Pending, Cancelled) | (Shipped, Delivered) | (Shipped, Cancelled)
    );
    if !allowed {
        return Err(OrderError::InvalidTransition { from, to });
    }
    Ok(Transition::Changed { restock: to == Cancelled })
}

/// A priced order line. `unit_price` is the product's selling price
/// captured at order time; later catalog changes do not affect it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl OrderLine {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// The one authoritative total: item subtotals plus the delivery charge.
pub fn order_total(lines: &[OrderLine], delivery_charge: Decimal) -> Decimal {
    lines.iter().map(OrderLine::subtotal).sum::<Decimal>() + delivery_charge
}

/// Formats the unique order reference: `INV-YYYYMMDD-NNNN`, where NNNN
/// is the day's allocation counter.
pub fn invoice_number(day: NaiveDate, seq: u32) -> String {
    format!("INV-{}-{:04}", day.format("%Y%m%d"), seq)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    UnknownStatus(String),
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    EmptyOrder,
    ZeroQuantity,
}
impl std::error::Error for OrderError {}
impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownStatus(s) => write!(f, "unknown order status '{s}'"),
            Self::InvalidTransition { from, to } => {
                write!(f, "cannot move order from {from} to {to}")
            }
            Self::EmptyOrder => write!(f, "order has no items"),
            Self::ZeroQuantity => write!(f, "item quantity must be positive"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn line(qty: u32, price: &str) -> OrderLine {
        OrderLine { product_id: Uuid::new_v4(), quantity: qty, unit_price: dec(price) }
    }

    #[test]
    fn total_is_items_plus_delivery() {
        let lines = vec![line(2, "10.50"), line(1, "4.00")];
        assert_eq!(order_total(&lines, dec("80")), dec("105.00"));
    }

    #[test]
    fn total_of_empty_order_is_delivery_only() {
        assert_eq!(order_total(&[], dec("80")), dec("80"));
    }

    #[test]
    fn lifecycle_happy_path() {
        use OrderStatus::*;
        assert_eq!(transition(Pending, Shipped).unwrap(), Transition::Changed { restock: false });
        assert_eq!(transition(Shipped, Delivered).unwrap(), Transition::Changed { restock: false });
    }

    #[test]
    fn cancellation_requests_restock() {
        use OrderStatus::*;
        assert_eq!(transition(Pending, Cancelled).unwrap(), Transition::Changed { restock: true });
        assert_eq!(transition(Shipped, Cancelled).unwrap(), Transition::Changed { restock: true });
    }

    #[test]
    fn repeated_status_is_idempotent() {
        use OrderStatus::*;
        for s in [Pending, Shipped, Delivered, Cancelled] {
            assert_eq!(transition(s, s).unwrap(), Transition::Noop);
        }
    }

    #[test]
    fn terminal_states_reject_changes() {
        use OrderStatus::*;
        assert!(transition(Delivered, Cancelled).is_err());
        assert!(transition(Cancelled, Pending).is_err());
        assert!(transition(Delivered, Shipped).is_err());
    }

    #[test]
    fn regression_is_rejected() {
        use OrderStatus::*;
        assert!(transition(Shipped, Pending).is_err());
        // Skipping shipped is also not allowed.
        assert!(transition(Pending, Delivered).is_err());
    }

    #[test]
    fn reserved_stock_follows_the_lifecycle() {
        use OrderStatus::*;
        assert!(Pending.holds_stock());
        assert!(Shipped.holds_stock());
        assert!(!Delivered.holds_stock());
        assert!(!Cancelled.holds_stock());
    }

    #[test]
    fn invoice_number_format() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(invoice_number(day, 1), "INV-20250307-0001");
        assert_eq!(invoice_number(day, 42), "INV-20250307-0042");
    }

    #[test]
    fn status_round_trips_through_strings() {
        for s in ["pending", "shipped", "delivered", "cancelled"] {
            assert_eq!(s.parse::<OrderStatus>().unwrap().as_str(), s);
        }
        assert!("refunded".parse::<OrderStatus>().is_err());
    }
}
