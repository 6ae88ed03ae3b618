//! Order lifecycle: creation with atomic stock reconciliation, the status
//! state machine, and order item maintenance.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;
use validator::Validate;

use crate::api::auth::{require_admin, CurrentUser};
use crate::api::{ok, Envelope, ListParams, Paginated};
use crate::domain::aggregates::{
    invoice_number, order_total, transition, OrderError, OrderLine, OrderStatus, Transition,
};
use crate::domain::events::DomainEvent;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Fallback when the site info row is missing.
const DEFAULT_DELIVERY_CHARGE: Decimal = Decimal::from_parts(100, 0, 0, false, 0);

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub invoice_number: String,
    pub user_id: Uuid,
    pub status: String,
    pub total_amount: Decimal,
    pub delivery_charge: Decimal,
    pub shipping_address: String,
    pub order_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn status(&self) -> ApiResult<OrderStatus> {
        Ok(self.status.parse()?)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: OrderRow,
    pub items: Vec<OrderItemRow>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, max = 255))]
    pub shipping_address: String,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub quantity: u32,
}

async fn delivery_charge<'e, E: PgExecutor<'e>>(executor: E) -> ApiResult<Decimal> {
    let row: Option<(Decimal,)> = sqlx::query_as("SELECT delivery_charge FROM site_info LIMIT 1")
        .fetch_optional(executor)
        .await?;
    Ok(row.map(|r| r.0).unwrap_or(DEFAULT_DELIVERY_CHARGE))
}

/// Allocates the next invoice number for today. The counter row stays
/// locked until the surrounding transaction ends, so two orders can never
/// share a number.
async fn next_invoice_number(conn: &mut PgConnection) -> ApiResult<String> {
    let today = Utc::now().date_naive();
    let (seq,): (i32,) = sqlx::query_as(
        "INSERT INTO invoice_counters (day, counter) VALUES ($1, 1)
         ON CONFLICT (day) DO UPDATE SET counter = invoice_counters.counter + 1
         RETURNING counter",
    )
    .bind(today)
    .fetch_one(conn)
    .await?;
    Ok(invoice_number(today, seq as u32))
}

/// Products are always locked in ascending id order. Two concurrent
/// orders touching the same products in different request order would
/// otherwise deadlock and abort one of them.
fn lock_order(items: &[OrderItemRequest]) -> Vec<&OrderItemRequest> {
    let mut sorted: Vec<_> = items.iter().collect();
    sorted.sort_by_key(|i| i.product_id);
    sorted
}

/// Creates an order atomically: every product row is locked, stock is
/// checked and decremented, unit prices are snapshotted from the live
/// selling price, and the total is computed once from the priced lines.
pub async fn create_order(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateOrderRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<OrderView>>)> {
    req.validate()?;
    if req.items.is_empty() {
        return Err(OrderError::EmptyOrder.into());
    }

    let mut tx = state.db.begin().await?;
    let charge = delivery_charge(&mut *tx).await?;

    let mut lines = Vec::with_capacity(req.items.len());
    for item in lock_order(&req.items) {
        if item.quantity == 0 {
            return Err(OrderError::ZeroQuantity.into());
        }
        let product = sqlx::query_as::<_, super::products::ProductRow>(
            "SELECT * FROM products WHERE id = $1 AND is_active FOR UPDATE",
        )
        .bind(item.product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ApiError::NotFound("Product"))?;

        let inventory = crate::domain::aggregates::Inventory::new(product.stock_quantity.max(0) as u32);
        let remaining = inventory.reserve(item.quantity)?;
        let unit_price = product.pricing()?.selling_price();

        sqlx::query(
            "UPDATE products SET stock_quantity = $2, out_of_stock = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(product.id)
        .bind(remaining.quantity() as i32)
        .bind(remaining.is_out_of_stock())
        .execute(&mut *tx)
        .await?;

        lines.push(OrderLine { product_id: product.id, quantity: item.quantity, unit_price });
    }

    let invoice = next_invoice_number(&mut tx).await?;
    let total = order_total(&lines, charge);

    let order = sqlx::query_as::<_, OrderRow>(
        "INSERT INTO orders (id, invoice_number, user_id, status, total_amount, delivery_charge, shipping_address)
         VALUES ($1, $2, $3, 'pending', $4, $5, $6)
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&invoice)
    .bind(user.id)
    .bind(total)
    .bind(charge)
    .bind(&req.shipping_address)
    .fetch_one(&mut *tx)
    .await?;

    let mut items = Vec::with_capacity(lines.len());
    for line in &lines {
        let row = sqlx::query_as::<_, OrderItemRow>(
            "INSERT INTO order_items (id, order_id, product_id, quantity, unit_price)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(order.id)
        .bind(line.product_id)
        .bind(line.quantity as i32)
        .bind(line.unit_price)
        .fetch_one(&mut *tx)
        .await?;
        items.push(row);
    }
    tx.commit().await?;

    state
        .notifier
        .notify_admin(
            user.id,
            Some(order.id),
            "New Order Created",
            &format!("{} has created order {}.", user.full_name, order.invoice_number),
        )
        .await;
    state
        .notifier
        .publish(DomainEvent::OrderCreated {
            order_id: order.id,
            invoice_number: order.invoice_number.clone(),
            user_id: user.id,
            total,
        })
        .await;

    Ok((StatusCode::CREATED, ok(OrderView { order, items })))
}

async fn items_for_orders(state: &AppState, order_ids: &[Uuid]) -> ApiResult<Vec<OrderItemRow>> {
    let rows = sqlx::query_as::<_, OrderItemRow>(
        "SELECT * FROM order_items WHERE order_id = ANY($1) ORDER BY created_at",
    )
    .bind(order_ids)
    .fetch_all(&state.db)
    .await?;
    Ok(rows)
}

fn attach_items(orders: Vec<OrderRow>, mut items: Vec<OrderItemRow>) -> Vec<OrderView> {
    orders
        .into_iter()
        .map(|order| {
            let (mine, rest): (Vec<_>, Vec<_>) = items.drain(..).partition(|i| i.order_id == order.id);
            items = rest;
            OrderView { order, items: mine }
        })
        .collect()
}

/// Admins see every order; shop owners only their own.
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Envelope<Paginated<OrderView>>>> {
    let (page, limit, offset) = params.page_window();
    let (orders, total) = if user.is_admin() {
        let orders = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&state.db)
        .await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
            .fetch_one(&state.db)
            .await?;
        (orders, total.0)
    } else {
        let orders = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(user.id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&state.db)
        .await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user.id)
            .fetch_one(&state.db)
            .await?;
        (orders, total.0)
    };
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let items = items_for_orders(&state, &ids).await?;
    Ok(ok(Paginated { data: attach_items(orders, items), total, page }))
}

pub async fn pending_orders(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<serde_json::Value>> {
    let orders = if user.is_admin() {
        sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders WHERE status = 'pending' ORDER BY created_at DESC",
        )
        .fetch_all(&state.db)
        .await?
    } else {
        sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders WHERE status = 'pending' AND user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user.id)
        .fetch_all(&state.db)
        .await?
    };
    let total = orders.len();
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let items = items_for_orders(&state, &ids).await?;
    Ok(Json(serde_json::json!({
        "status": "success",
        "total": total,
        "data": attach_items(orders, items),
    })))
}

async fn load_order_checked(state: &AppState, user: &CurrentUser, id: Uuid) -> ApiResult<OrderRow> {
    let order = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::NotFound("Order"))?;
    if !user.is_admin() && order.user_id != user.id {
        return Err(ApiError::Forbidden);
    }
    Ok(order)
}

pub async fn get_order(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Envelope<OrderView>>> {
    let order = load_order_checked(&state, &user, id).await?;
    let items = items_for_orders(&state, &[order.id]).await?;
    Ok(ok(OrderView { order, items }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderRequest {
    pub status: OrderStatus,
}

/// Moves an order along its lifecycle. Re-applying the current status is
/// a no-op; cancellation restores stock in the same transaction.
pub async fn update_order_status(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateOrderRequest>,
) -> ApiResult<Json<Envelope<OrderView>>> {
    require_admin(&user)?;

    let mut tx = state.db.begin().await?;
    let order = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ApiError::NotFound("Order"))?;

    let from = order.status()?;
    let outcome = transition(from, req.status)?;

    let order = match outcome {
        Transition::Noop => {
            tx.commit().await?;
            order
        }
        Transition::Changed { restock } => {
            if restock {
                sqlx::query(
                    "UPDATE products p SET
                         stock_quantity = p.stock_quantity + i.quantity,
                         out_of_stock = FALSE,
                         updated_at = NOW()
                     FROM order_items i
                     WHERE i.order_id = $1 AND i.product_id = p.id AND i.quantity > 0",
                )
                .bind(id)
                .execute(&mut *tx)
                .await?;
            }
            let updated = sqlx::query_as::<_, OrderRow>(
                "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
            )
            .bind(id)
            .bind(req.status.as_str())
            .fetch_one(&mut *tx)
            .await?;
            tx.commit().await?;

            state
                .notifier
                .notify_user(
                    updated.user_id,
                    "Order Update",
                    &format!("Your order {} has been {}", updated.invoice_number, req.status),
                )
                .await;
            state
                .notifier
                .publish(DomainEvent::OrderStatusChanged {
                    order_id: updated.id,
                    invoice_number: updated.invoice_number.clone(),
                    from,
                    to: req.status,
                })
                .await;
            updated
        }
    };

    let items = items_for_orders(&state, &[order.id]).await?;
    Ok(ok(OrderView { order, items }))
}

/// Removes an order outright. Pending and shipped orders still hold
/// reserved stock, so it goes back to the products before the items
/// cascade away.
pub async fn delete_order(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_admin(&user)?;
    let mut tx = state.db.begin().await?;
    let order = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ApiError::NotFound("Order"))?;
    if order.status()?.holds_stock() {
        sqlx::query(
            "UPDATE products p SET
                 stock_quantity = p.stock_quantity + i.quantity,
                 out_of_stock = FALSE,
                 updated_at = NOW()
             FROM order_items i
             WHERE i.order_id = $1 AND i.product_id = p.id AND i.quantity > 0",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
    }
    sqlx::query("DELETE FROM orders WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- Order items ----

/// Re-derives the order header total from its items. Called inside the
/// same transaction as any item mutation, keeping exactly one
/// authoritative total.
async fn recompute_total(conn: &mut PgConnection, order_id: Uuid) -> ApiResult<()> {
    sqlx::query(
        "UPDATE orders SET
             total_amount = delivery_charge + COALESCE(
                 (SELECT SUM(quantity * unit_price) FROM order_items WHERE order_id = $1), 0),
             updated_at = NOW()
         WHERE id = $1",
    )
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn list_order_items(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Envelope<Vec<OrderItemRow>>>> {
    let rows = if user.is_admin() {
        sqlx::query_as::<_, OrderItemRow>("SELECT * FROM order_items ORDER BY created_at DESC")
            .fetch_all(&state.db)
            .await?
    } else {
        sqlx::query_as::<_, OrderItemRow>(
            "SELECT i.* FROM order_items i
             JOIN orders o ON o.id = i.order_id
             WHERE o.user_id = $1 ORDER BY i.created_at DESC",
        )
        .bind(user.id)
        .fetch_all(&state.db)
        .await?
    };
    Ok(ok(rows))
}

pub async fn get_order_item(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Envelope<OrderItemRow>>> {
    let row = sqlx::query_as::<_, OrderItemRow>("SELECT * FROM order_items WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::NotFound("Order item"))?;
    load_order_checked(&state, &user, row.order_id).await?;
    Ok(ok(row))
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderItemRequest {
    pub quantity: u32,
}

/// Changes an item quantity on a pending order. The stock delta is
/// reconciled against the product and the order total re-derived, all in
/// one transaction.
pub async fn update_order_item(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateOrderItemRequest>,
) -> ApiResult<Json<Envelope<OrderItemRow>>> {
    require_admin(&user)?;
    if req.quantity == 0 {
        return Err(OrderError::ZeroQuantity.into());
    }

    let mut tx = state.db.begin().await?;
    let item = sqlx::query_as::<_, OrderItemRow>("SELECT * FROM order_items WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ApiError::NotFound("Order item"))?;
    let order = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
        .bind(item.order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ApiError::NotFound("Order"))?;
    if order.status()? != OrderStatus::Pending {
        return Err(ApiError::BadRequest("only pending orders can be edited".into()));
    }

    let product = sqlx::query_as::<_, super::products::ProductRow>(
        "SELECT * FROM products WHERE id = $1 FOR UPDATE",
    )
    .bind(item.product_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(ApiError::NotFound("Product"))?;

    // Positive delta takes more stock, negative delta gives it back.
    let delta = req.quantity as i64 - item.quantity as i64;
    let inventory = crate::domain::aggregates::Inventory::new(product.stock_quantity.max(0) as u32);
    let remaining = if delta >= 0 {
        inventory.reserve(delta as u32)?
    } else {
        inventory.restock((-delta) as u32)
    };
    sqlx::query(
        "UPDATE products SET stock_quantity = $2, out_of_stock = $3, updated_at = NOW() WHERE id = $1",
    )
    .bind(product.id)
    .bind(remaining.quantity() as i32)
    .bind(remaining.is_out_of_stock())
    .execute(&mut *tx)
    .await?;

    let row = sqlx::query_as::<_, OrderItemRow>(
        "UPDATE order_items SET quantity = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(req.quantity as i32)
    .fetch_one(&mut *tx)
    .await?;
    recompute_total(&mut tx, item.order_id).await?;
    tx.commit().await?;
    Ok(ok(row))
}

/// Removes an item from a pending order, returning its stock and
/// re-deriving the total.
pub async fn delete_order_item(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_admin(&user)?;

    let mut tx = state.db.begin().await?;
    let item = sqlx::query_as::<_, OrderItemRow>("SELECT * FROM order_items WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ApiError::NotFound("Order item"))?;
    let order = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
        .bind(item.order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ApiError::NotFound("Order"))?;
    if order.status()? != OrderStatus::Pending {
        return Err(ApiError::BadRequest("only pending orders can be edited".into()));
    }

    if item.quantity > 0 {
        sqlx::query(
            "UPDATE products SET stock_quantity = stock_quantity + $2, out_of_stock = FALSE,
                                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(item.product_id)
        .bind(item.quantity)
        .execute(&mut *tx)
        .await?;
    }
    sqlx::query("DELETE FROM order_items WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    recompute_total(&mut tx, item.order_id).await?;
    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_delivery_charge_is_100() {
        assert_eq!(DEFAULT_DELIVERY_CHARGE, Decimal::from(100u32));
    }

    #[test]
    fn products_lock_in_ascending_id_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let items = vec![
            OrderItemRequest { product_id: hi, quantity: 1 },
            OrderItemRequest { product_id: lo, quantity: 2 },
        ];
        let sorted = lock_order(&items);
        assert_eq!(sorted[0].product_id, lo);
        assert_eq!(sorted[1].product_id, hi);
    }

    #[test]
    fn attach_items_groups_by_order() {
        let base = OrderRow {
            id: Uuid::new_v4(),
            invoice_number: "INV-20250101-0001".into(),
            user_id: Uuid::new_v4(),
            status: "pending".into(),
            total_amount: Decimal::ZERO,
            delivery_charge: Decimal::ZERO,
            shipping_address: "x".into(),
            order_date: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let other = OrderRow { id: Uuid::new_v4(), ..base.clone() };
        let item = |order_id| OrderItemRow {
            id: Uuid::new_v4(),
            order_id,
            product_id: Uuid::new_v4(),
            quantity: 1,
            unit_price: Decimal::ONE,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let items = vec![item(base.id), item(other.id), item(base.id)];
        let views = attach_items(vec![base.clone(), other.clone()], items);
        assert_eq!(views[0].items.len(), 2);
        assert_eq!(views[1].items.len(), 1);
        assert!(views[0].items.iter().all(|i| i.order_id == base.id));
    }
}
