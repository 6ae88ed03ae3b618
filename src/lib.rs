//! BDM Commerce
//!
//! B2B ordering backend: shop-owner accounts, a product catalog, the
//! order/returns workflow, notifications, and dashboard analytics.
//!
//! ## Features
//! - Order creation with atomic stock reconciliation
//! - Snapshot pricing and a single authoritative order total
//! - Constrained order status lifecycle
//! - Partial returns validated against ordered quantities
//! - Staged catalog update batches (confirm/cancel)

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod notify;

use axum::middleware;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::notify::Notifier;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub notifier: Notifier,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy", "service": "bdm-commerce" }))
}

/// Builds the full application router. Everything under `/api/v1` except
/// the auth endpoints requires a bearer token.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/v1/profile", get(api::auth::get_profile).patch(api::auth::update_profile))
        .route("/api/v1/users", get(api::accounts::list_users))
        .route(
            "/api/v1/users/:id",
            get(api::accounts::get_user)
                .put(api::accounts::update_user)
                .delete(api::accounts::delete_user),
        )
        .route("/api/v1/users/:id/approve", patch(api::accounts::approve_user))
        .route("/api/v1/districts", get(api::accounts::list_districts))
        .route("/api/v1/areas", get(api::accounts::list_areas).post(api::accounts::create_area))
        .route("/api/v1/areas/:id", patch(api::accounts::update_area))
        .route(
            "/api/v1/addresses",
            get(api::accounts::list_addresses).post(api::accounts::create_address),
        )
        .route("/api/v1/addresses/:id", delete(api::accounts::delete_address))
        .route(
            "/api/v1/products",
            get(api::products::list_products).post(api::products::create_product),
        )
        .route("/api/v1/products/search", get(api::products::search_products))
        .route(
            "/api/v1/products/:id",
            get(api::products::get_product)
                .patch(api::products::update_product)
                .delete(api::products::delete_product),
        )
        .route("/api/v1/products/by_category/:id", get(api::products::products_by_category))
        .route("/api/v1/products/by_company/:id", get(api::products::products_by_company))
        .route(
            "/api/v1/companies",
            get(api::products::list_companies).post(api::products::create_company),
        )
        .route(
            "/api/v1/categories",
            get(api::products::list_categories).post(api::products::create_category),
        )
        .route("/api/v1/banners", get(api::products::list_banners).post(api::products::create_banner))
        .route("/api/v1/banners/:id", delete(api::products::delete_banner))
        .route("/api/v1/product_batches", post(api::products::create_batch))
        .route(
            "/api/v1/product_batches/:batch_id",
            get(api::products::get_batch).delete(api::products::cancel_batch),
        )
        .route("/api/v1/product_batches/:batch_id/confirm", post(api::products::confirm_batch))
        .route("/api/v1/orders", get(api::orders::list_orders).post(api::orders::create_order))
        .route("/api/v1/orders/pending", get(api::orders::pending_orders))
        .route(
            "/api/v1/orders/:id",
            get(api::orders::get_order)
                .patch(api::orders::update_order_status)
                .delete(api::orders::delete_order),
        )
        .route("/api/v1/order_items", get(api::orders::list_order_items))
        .route(
            "/api/v1/order_items/:id",
            get(api::orders::get_order_item)
                .patch(api::orders::update_order_item)
                .delete(api::orders::delete_order_item),
        )
        .route("/api/v1/returns", get(api::returns::list_returns))
        .route("/api/v1/returns/:id", get(api::returns::get_return))
        .route("/api/v1/returns/request/:order_item_id", post(api::returns::request_return))
        .route("/api/v1/returns/process/:return_id", patch(api::returns::process_return))
        .route("/api/v1/notifications", get(api::notifications::list_notifications))
        .route(
            "/api/v1/notifications/:id/read",
            patch(api::notifications::mark_notification_read),
        )
        .route("/api/v1/admin_notifications", get(api::notifications::list_admin_notifications))
        .route(
            "/api/v1/notices",
            get(api::notices::list_notices).post(api::notices::create_notice),
        )
        .route(
            "/api/v1/notices/:id",
            get(api::notices::get_notice)
                .patch(api::notices::update_notice)
                .delete(api::notices::delete_notice),
        )
        .route("/api/v1/dashboard_info", get(api::dashboard::dashboard_info))
        .route(
            "/api/v1/site_info",
            get(api::site::get_site_info).patch(api::site::update_site_info),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), api::auth::require_auth));

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/auth/signup", post(api::auth::signup))
        .route("/api/v1/auth/login", post(api::auth::login))
        .route("/api/v1/auth/admin_login", post(api::auth::admin_login))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
