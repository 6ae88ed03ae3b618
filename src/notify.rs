//! Notification sink: database rows for users/admins plus an optional
//! NATS fan-out. All of it is fire-and-forget; a failed notification is
//! logged and never fails the request that triggered it.

use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::events::DomainEvent;

#[derive(Clone)]
pub struct Notifier {
    db: PgPool,
    nats: Option<async_nats::Client>,
}

impl Notifier {
    pub fn new(db: PgPool, nats: Option<async_nats::Client>) -> Self {
        Self { db, nats }
    }

    /// Writes an in-app notification for a user.
    pub async fn notify_user(&self, user_id: Uuid, title: &str, message: &str) {
        let res = sqlx::query(
            "INSERT INTO notifications (id, user_id, title, message) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(title)
        .bind(message)
        .execute(&self.db)
        .await;
        if let Err(e) = res {
            tracing::warn!(%user_id, error = %e, "failed to write user notification");
        }
    }

    /// Writes an admin notification, optionally tied to an order.
    pub async fn notify_admin(&self, actor: Uuid, order_id: Option<Uuid>, title: &str, message: &str) {
        let res = sqlx::query(
            "INSERT INTO admin_notifications (id, user_id, order_id, title, message) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::now_v7())
        .bind(actor)
        .bind(order_id)
        .bind(title)
        .bind(message)
        .execute(&self.db)
        .await;
        if let Err(e) = res {
            tracing::warn!(error = %e, "failed to write admin notification");
        }
    }

    /// Publishes a domain event when a NATS connection is configured.
    pub async fn publish(&self, event: DomainEvent) {
        let Some(nats) = &self.nats else { return };
        let payload = match serde_json::to_vec(&event) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize domain event");
                return;
            }
        };
        if let Err(e) = nats.publish(event.subject().to_string(), payload.into()).await {
            tracing::warn!(subject = event.subject(), error = %e, "failed to publish event");
        }
    }
}
