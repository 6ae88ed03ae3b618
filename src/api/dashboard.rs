//! Dashboard aggregates over users, products and orders.

use axum::extract::State;
use axum::{Extension, Json};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::api::auth::{require_admin, CurrentUser};
use crate::api::{ok, Envelope};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct DashboardInfo {
    pub total_customers: i64,
    pub total_products: i64,
    pub total_orders: i64,
    pub total_pending_orders: i64,
    pub total_shipped_orders: i64,
    pub total_delivered_orders: i64,
    pub total_cancelled_orders: i64,
    pub total_sales: Decimal,
    pub total_delivery_cost: Decimal,
    pub top_selling_product: Option<TopProduct>,
    pub sales_by_month: Vec<MonthlySales>,
    pub profit_by_month: Vec<MonthlyProfit>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub product_name: String,
    pub total_quantity_sold: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct MonthlySales {
    pub month: String,
    pub total_sales: Decimal,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct MonthlyProfit {
    pub month: String,
    pub revenue: Decimal,
}

async fn count(state: &AppState, sql: &str) -> ApiResult<i64> {
    let (n,): (i64,) = sqlx::query_as(sql).fetch_one(&state.db).await?;
    Ok(n)
}

pub async fn dashboard_info(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Envelope<DashboardInfo>>> {
    require_admin(&user)?;

    let total_customers = count(&state, "SELECT COUNT(*) FROM users WHERE is_active").await?;
    let total_products = count(&state, "SELECT COUNT(*) FROM products WHERE is_active").await?;
    let total_orders = count(&state, "SELECT COUNT(*) FROM orders").await?;
    let total_pending_orders =
        count(&state, "SELECT COUNT(*) FROM orders WHERE status = 'pending'").await?;
    let total_shipped_orders =
        count(&state, "SELECT COUNT(*) FROM orders WHERE status = 'shipped'").await?;
    let total_delivered_orders =
        count(&state, "SELECT COUNT(*) FROM orders WHERE status = 'delivered'").await?;
    let total_cancelled_orders =
        count(&state, "SELECT COUNT(*) FROM orders WHERE status = 'cancelled'").await?;

    let (total_sales, total_delivery_cost): (Decimal, Decimal) = sqlx::query_as(
        "SELECT COALESCE(SUM(total_amount), 0), COALESCE(SUM(delivery_charge), 0)
         FROM orders WHERE status = 'delivered'",
    )
    .fetch_one(&state.db)
    .await?;

    // Top seller of the current calendar month, by delivered quantity.
    let top_selling_product = sqlx::query_as::<_, TopProduct>(
        "SELECT p.id AS product_id, p.name AS product_name, SUM(i.quantity)::BIGINT AS total_quantity_sold
         FROM order_items i
         JOIN orders o ON o.id = i.order_id
         JOIN products p ON p.id = i.product_id
         WHERE o.status = 'delivered'
           AND o.order_date >= date_trunc('month', NOW())
           AND o.order_date < date_trunc('month', NOW()) + INTERVAL '1 month'
         GROUP BY p.id, p.name
         ORDER BY total_quantity_sold DESC
         LIMIT 1",
    )
    .fetch_optional(&state.db)
    .await?;

    let sales_by_month = sqlx::query_as::<_, MonthlySales>(
        "SELECT to_char(date_trunc('month', order_date), 'FMMonth') AS month,
                COALESCE(SUM(total_amount), 0) AS total_sales
         FROM orders
         WHERE status = 'delivered'
         GROUP BY date_trunc('month', order_date)
         ORDER BY date_trunc('month', order_date)",
    )
    .fetch_all(&state.db)
    .await?;

    // Profit = (selling price - cost price) x quantity, on delivered
    // orders, against the current catalog prices.
    let profit_by_month = sqlx::query_as::<_, MonthlyProfit>(
        "SELECT to_char(date_trunc('month', o.order_date), 'FMMonth') AS month,
                COALESCE(SUM((p.mrp - p.mrp * p.discount_percent / 100 - p.cost_price) * i.quantity), 0) AS revenue
         FROM order_items i
         JOIN orders o ON o.id = i.order_id
         JOIN products p ON p.id = i.product_id
         WHERE o.status = 'delivered'
         GROUP BY date_trunc('month', o.order_date)
         ORDER BY date_trunc('month', o.order_date)",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(ok(DashboardInfo {
        total_customers,
        total_products,
        total_orders,
        total_pending_orders,
        total_shipped_orders,
        total_delivered_orders,
        total_cancelled_orders,
        total_sales,
        total_delivery_cost,
        top_selling_product,
        sales_by_month,
        profit_by_month,
    }))
}
