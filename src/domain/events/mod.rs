//! Domain events published to the notification sink.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::{OrderStatus, ReturnStatus};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    OrderCreated {
        order_id: Uuid,
        invoice_number: String,
        user_id: Uuid,
        total: Decimal,
    },
    OrderStatusChanged {
        order_id: Uuid,
        invoice_number: String,
        from: OrderStatus,
        to: OrderStatus,
    },
    ReturnRequested {
        return_id: Uuid,
        order_item_id: Uuid,
        quantity: u32,
    },
    ReturnProcessed {
        return_id: Uuid,
        status: ReturnStatus,
    },
    BatchApplied {
        batch_id: Uuid,
        products: u32,
    },
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::OrderCreated { .. } => "bdm.orders.created",
            Self::OrderStatusChanged { .. } => "bdm.orders.status",
            Self::ReturnRequested { .. } => "bdm.returns.requested",
            Self::ReturnProcessed { .. } => "bdm.returns.processed",
            Self::BatchApplied { .. } => "bdm.catalog.batch_applied",
        }
    }
}
