//! Return requests and their reconciliation against order state.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::api::auth::{require_admin, CurrentUser};
use crate::api::{ok, Envelope};
use crate::domain::aggregates::{decide, validate_request, Decision, OrderStatus, ReturnStatus};
use crate::domain::events::DomainEvent;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

use super::orders::{OrderItemRow, OrderRow};

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ReturnRow {
    pub id: Uuid,
    pub order_item_id: Uuid,
    pub quantity: i32,
    pub reason: Option<String>,
    pub status: String,
    pub processed_on: Option<DateTime<Utc>>,
    pub processed_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ReturnRow {
    fn status(&self) -> ApiResult<ReturnStatus> {
        Ok(self.status.parse()?)
    }
}

/// Units of an item already claimed by in-flight return requests.
async fn claimed_quantity(conn: &mut PgConnection, order_item_id: Uuid) -> ApiResult<u32> {
    let (claimed,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(quantity), 0) FROM returns
         WHERE order_item_id = $1 AND status IN ('pending', 'approved')",
    )
    .bind(order_item_id)
    .fetch_one(conn)
    .await?;
    Ok(claimed.max(0) as u32)
}

#[derive(Debug, Deserialize)]
pub struct CreateReturnRequest {
    pub quantity: u32,
    pub reason: Option<String>,
}

/// Opens a return request against one order item. The order must be
/// delivered and belong to the caller; the quantity must fit the item's
/// remaining return budget.
pub async fn request_return(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(order_item_id): Path<Uuid>,
    Json(req): Json<CreateReturnRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<ReturnRow>>)> {
    let mut tx = state.db.begin().await?;
    let item = sqlx::query_as::<_, OrderItemRow>("SELECT * FROM order_items WHERE id = $1 FOR UPDATE")
        .bind(order_item_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ApiError::NotFound("Order item"))?;
    let order = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
        .bind(item.order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ApiError::NotFound("Order"))?;
    if !user.is_admin() && order.user_id != user.id {
        return Err(ApiError::Forbidden);
    }
    if order.status.parse::<OrderStatus>()? != OrderStatus::Delivered {
        return Err(ApiError::BadRequest("returns are only accepted for delivered orders".into()));
    }

    let claimed = claimed_quantity(&mut tx, order_item_id).await?;
    validate_request(req.quantity, item.quantity.max(0) as u32, claimed)?;

    let row = sqlx::query_as::<_, ReturnRow>(
        "INSERT INTO returns (id, order_item_id, quantity, reason)
         VALUES ($1, $2, $3, $4)
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(order_item_id)
    .bind(req.quantity as i32)
    .bind(&req.reason)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    state
        .notifier
        .notify_admin(
            user.id,
            Some(order.id),
            "Return Requested",
            &format!(
                "{} requested a return of {} unit(s) on order {}.",
                user.full_name, req.quantity, order.invoice_number
            ),
        )
        .await;
    state
        .notifier
        .publish(DomainEvent::ReturnRequested {
            return_id: row.id,
            order_item_id,
            quantity: req.quantity,
        })
        .await;

    Ok((StatusCode::CREATED, ok(row)))
}

#[derive(Debug, Deserialize)]
pub struct ProcessReturnRequest {
    pub decision: Decision,
    pub processed_by: Option<String>,
}

/// Decides a pending return. Approval reconciles atomically: the item
/// quantity shrinks, the product stock grows, the order total is
/// re-derived, and the request lands in `completed`.
pub async fn process_return(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(return_id): Path<Uuid>,
    Json(req): Json<ProcessReturnRequest>,
) -> ApiResult<Json<Envelope<ReturnRow>>> {
    require_admin(&user)?;
    let processed_by = req.processed_by.clone().unwrap_or_else(|| user.full_name.clone());

    let mut tx = state.db.begin().await?;
    let ret = sqlx::query_as::<_, ReturnRow>("SELECT * FROM returns WHERE id = $1 FOR UPDATE")
        .bind(return_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ApiError::NotFound("Return"))?;
    let next = decide(ret.status()?, req.decision)?;

    if req.decision == Decision::Approved {
        let item = sqlx::query_as::<_, OrderItemRow>(
            "SELECT * FROM order_items WHERE id = $1 FOR UPDATE",
        )
        .bind(ret.order_item_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ApiError::NotFound("Order item"))?;

        // Re-validate against claims other than this request.
        let claimed = claimed_quantity(&mut tx, ret.order_item_id).await?;
        let other_claims = claimed.saturating_sub(ret.quantity.max(0) as u32);
        validate_request(ret.quantity.max(0) as u32, item.quantity.max(0) as u32, other_claims)?;

        sqlx::query(
            "UPDATE order_items SET quantity = quantity - $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(item.id)
        .bind(ret.quantity)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "UPDATE products SET stock_quantity = stock_quantity + $2, out_of_stock = FALSE,
                                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(item.product_id)
        .bind(ret.quantity)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "UPDATE orders SET
                 total_amount = delivery_charge + COALESCE(
                     (SELECT SUM(quantity * unit_price) FROM order_items WHERE order_id = $1), 0),
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(item.order_id)
        .execute(&mut *tx)
        .await?;
    }

    let row = sqlx::query_as::<_, ReturnRow>(
        "UPDATE returns SET status = $2, processed_on = NOW(), processed_by = $3 WHERE id = $1 RETURNING *",
    )
    .bind(return_id)
    .bind(next.as_str())
    .bind(&processed_by)
    .fetch_one(&mut *tx)
    .await?;

    let (owner_id, invoice): (Uuid, String) = sqlx::query_as(
        "SELECT o.user_id, o.invoice_number FROM orders o
         JOIN order_items i ON i.order_id = o.id
         WHERE i.id = $1",
    )
    .bind(ret.order_item_id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    state
        .notifier
        .notify_user(
            owner_id,
            "Return Update",
            &format!("Your return on order {} has been {}", invoice, next),
        )
        .await;
    state
        .notifier
        .publish(DomainEvent::ReturnProcessed { return_id, status: next })
        .await;

    Ok(ok(row))
}

pub async fn list_returns(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Envelope<Vec<ReturnRow>>>> {
    let rows = if user.is_admin() {
        sqlx::query_as::<_, ReturnRow>("SELECT * FROM returns ORDER BY created_at DESC")
            .fetch_all(&state.db)
            .await?
    } else {
        sqlx::query_as::<_, ReturnRow>(
            "SELECT r.* FROM returns r
             JOIN order_items i ON i.id = r.order_item_id
             JOIN orders o ON o.id = i.order_id
             WHERE o.user_id = $1
             ORDER BY r.created_at DESC",
        )
        .bind(user.id)
        .fetch_all(&state.db)
        .await?
    };
    Ok(ok(rows))
}

pub async fn get_return(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Envelope<ReturnRow>>> {
    let row = sqlx::query_as::<_, ReturnRow>("SELECT * FROM returns WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::NotFound("Return"))?;
    if !user.is_admin() {
        let (owner_id,): (Uuid,) = sqlx::query_as(
            "SELECT o.user_id FROM orders o
             JOIN order_items i ON i.order_id = o.id
             WHERE i.id = $1",
        )
        .bind(row.order_item_id)
        .fetch_one(&state.db)
        .await?;
        if owner_id != user.id {
            return Err(ApiError::Forbidden);
        }
    }
    Ok(ok(row))
}
