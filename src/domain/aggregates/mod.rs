//! Aggregates module
pub mod order;
pub mod product;
pub mod returns;

pub use order::{invoice_number, order_total, transition, OrderError, OrderLine, OrderStatus, Transition};
pub use product::{Inventory, InventoryError, Pricing, PricingError};
pub use returns::{decide, return_budget, validate_request, Decision, ReturnError, ReturnStatus};
