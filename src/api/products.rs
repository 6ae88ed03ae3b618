//! Catalog: products, companies, categories, banners, and staged update
//! batches.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;
use validator::Validate;

use crate::api::auth::{require_admin, CurrentUser};
use crate::api::{ok, Envelope, ListParams, Paginated};
use crate::domain::aggregates::Pricing;
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::Sku;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub sku: String,
    pub company_id: Option<Uuid>,
    pub stock_quantity: i32,
    pub discount_percent: i32,
    pub cost_price: Decimal,
    pub mrp: Decimal,
    pub out_of_stock: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductRow {
    pub fn pricing(&self) -> ApiResult<Pricing> {
        Ok(Pricing::new(self.cost_price, self.mrp, self.discount_percent.max(0) as u32)?)
    }
}

/// API shape of a product; `selling_price` is derived, never stored.
#[derive(Debug, Serialize)]
pub struct ProductView {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub sku: String,
    pub company_id: Option<Uuid>,
    pub stock_quantity: i32,
    pub discount_percent: i32,
    pub cost_price: Decimal,
    pub mrp: Decimal,
    pub selling_price: Decimal,
    pub out_of_stock: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for ProductView {
    type Error = ApiError;

    fn try_from(row: ProductRow) -> ApiResult<Self> {
        let selling_price = row.pricing()?.selling_price();
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            sku: row.sku,
            company_id: row.company_id,
            stock_quantity: row.stock_quantity,
            discount_percent: row.discount_percent,
            cost_price: row.cost_price,
            mrp: row.mrp,
            selling_price,
            out_of_stock: row.out_of_stock,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn views(rows: Vec<ProductRow>) -> ApiResult<Vec<ProductView>> {
    rows.into_iter().map(ProductView::try_from).collect()
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct CompanyRow {
    pub id: Uuid,
    pub name: String,
    pub logo_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct CategoryRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct BannerRow {
    pub id: Uuid,
    pub image_url: String,
    pub position: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct BatchItemRow {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub product_id: Uuid,
    pub stock_delta: i32,
    pub mrp: Option<Decimal>,
    pub discount_percent: Option<i32>,
    pub created_at: DateTime<Utc>,
}

// ---- Products ----

pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Envelope<Paginated<ProductView>>>> {
    let (page, limit, offset) = params.page_window();
    let rows = sqlx::query_as::<_, ProductRow>(
        "SELECT * FROM products WHERE is_active ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db)
    .await?;
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE is_active")
        .fetch_one(&state.db)
        .await?;
    Ok(ok(Paginated { data: views(rows)?, total: total.0, page }))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Envelope<ProductView>>> {
    let row = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::NotFound("Product"))?;
    Ok(ok(ProductView::try_from(row)?))
}

pub async fn search_products(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Envelope<Vec<ProductView>>>> {
    let term = params.search.unwrap_or_default();
    let rows = sqlx::query_as::<_, ProductRow>(
        "SELECT * FROM products WHERE is_active AND name ILIKE '%' || $1 || '%' ORDER BY name LIMIT 100",
    )
    .bind(&term)
    .fetch_all(&state.db)
    .await?;
    Ok(ok(views(rows)?))
}

pub async fn products_by_category(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
) -> ApiResult<Json<Envelope<Vec<ProductView>>>> {
    let rows = sqlx::query_as::<_, ProductRow>(
        "SELECT p.* FROM products p
         JOIN product_categories pc ON pc.product_id = p.id
         WHERE pc.category_id = $1 AND p.is_active
         ORDER BY p.name",
    )
    .bind(category_id)
    .fetch_all(&state.db)
    .await?;
    Ok(ok(views(rows)?))
}

pub async fn products_by_company(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
) -> ApiResult<Json<Envelope<Vec<ProductView>>>> {
    let rows = sqlx::query_as::<_, ProductRow>(
        "SELECT * FROM products WHERE company_id = $1 AND is_active ORDER BY name",
    )
    .bind(company_id)
    .fetch_all(&state.db)
    .await?;
    Ok(ok(views(rows)?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    /// Normalized if given, generated otherwise.
    pub sku: Option<String>,
    pub company_id: Option<Uuid>,
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
    #[serde(default)]
    pub stock_quantity: u32,
    #[serde(default)]
    pub discount_percent: u32,
    pub cost_price: Decimal,
    pub mrp: Decimal,
}

pub async fn create_product(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateProductRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<ProductView>>)> {
    require_admin(&user)?;
    req.validate()?;
    // Rejects bad discount/price combinations before anything is written.
    Pricing::new(req.cost_price, req.mrp, req.discount_percent)?;
    let sku = match &req.sku {
        Some(raw) => Sku::new(raw.as_str())?,
        None => Sku::generate(),
    };

    let mut tx = state.db.begin().await?;
    let row = sqlx::query_as::<_, ProductRow>(
        "INSERT INTO products (id, name, description, sku, company_id, stock_quantity,
                               discount_percent, cost_price, mrp, out_of_stock)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $6 = 0)
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&req.name)
    .bind(&req.description)
    .bind(sku.as_str())
    .bind(req.company_id)
    .bind(req.stock_quantity as i32)
    .bind(req.discount_percent as i32)
    .bind(req.cost_price)
    .bind(req.mrp)
    .fetch_one(&mut *tx)
    .await?;
    for category_id in &req.category_ids {
        sqlx::query("INSERT INTO product_categories (product_id, category_id) VALUES ($1, $2)")
            .bind(row.id)
            .bind(category_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok((StatusCode::CREATED, ok(ProductView::try_from(row)?)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub company_id: Option<Uuid>,
    pub stock_quantity: Option<u32>,
    pub discount_percent: Option<u32>,
    pub cost_price: Option<Decimal>,
    pub mrp: Option<Decimal>,
    pub is_active: Option<bool>,
}

pub async fn update_product(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProductRequest>,
) -> ApiResult<Json<Envelope<ProductView>>> {
    require_admin(&user)?;
    let mut tx = state.db.begin().await?;
    let current = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ApiError::NotFound("Product"))?;

    let cost_price = req.cost_price.unwrap_or(current.cost_price);
    let mrp = req.mrp.unwrap_or(current.mrp);
    let discount = req.discount_percent.unwrap_or(current.discount_percent.max(0) as u32);
    Pricing::new(cost_price, mrp, discount)?;
    let stock = req.stock_quantity.map(|q| q as i32).unwrap_or(current.stock_quantity);

    let row = sqlx::query_as::<_, ProductRow>(
        "UPDATE products SET
             name = COALESCE($2, name),
             description = COALESCE($3, description),
             company_id = COALESCE($4, company_id),
             stock_quantity = $5,
             discount_percent = $6,
             cost_price = $7,
             mrp = $8,
             is_active = COALESCE($9, is_active),
             out_of_stock = ($5 = 0),
             updated_at = NOW()
         WHERE id = $1
         RETURNING *",
    )
    .bind(id)
    .bind(&req.name)
    .bind(&req.description)
    .bind(req.company_id)
    .bind(stock)
    .bind(discount as i32)
    .bind(cost_price)
    .bind(mrp)
    .bind(req.is_active)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(ok(ProductView::try_from(row)?))
}

/// Soft delete: products referenced by order items must stay resolvable.
pub async fn delete_product(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_admin(&user)?;
    let res = sqlx::query("UPDATE products SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("Product"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---- Companies ----

pub async fn list_companies(State(state): State<AppState>) -> ApiResult<Json<Envelope<Vec<CompanyRow>>>> {
    let rows = sqlx::query_as::<_, CompanyRow>("SELECT * FROM companies WHERE is_active ORDER BY name")
        .fetch_all(&state.db)
        .await?;
    Ok(ok(rows))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCompanyRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub logo_url: Option<String>,
}

pub async fn create_company(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateCompanyRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<CompanyRow>>)> {
    require_admin(&user)?;
    req.validate()?;
    let row = sqlx::query_as::<_, CompanyRow>(
        "INSERT INTO companies (id, name, logo_url) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&req.name)
    .bind(&req.logo_url)
    .fetch_one(&state.db)
    .await?;
    Ok((StatusCode::CREATED, ok(row)))
}

// ---- Categories ----

pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Envelope<Vec<CategoryRow>>>> {
    let rows = sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories ORDER BY name")
        .fetch_all(&state.db)
        .await?;
    Ok(ok(rows))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
}

pub async fn create_category(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateCategoryRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<CategoryRow>>)> {
    require_admin(&user)?;
    req.validate()?;
    let row = sqlx::query_as::<_, CategoryRow>(
        "INSERT INTO categories (id, name, description) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&req.name)
    .bind(&req.description)
    .fetch_one(&state.db)
    .await?;
    Ok((StatusCode::CREATED, ok(row)))
}

// ---- Banners ----

pub async fn list_banners(State(state): State<AppState>) -> ApiResult<Json<Envelope<Vec<BannerRow>>>> {
    let rows = sqlx::query_as::<_, BannerRow>(
        "SELECT * FROM banners WHERE is_active ORDER BY position, created_at",
    )
    .fetch_all(&state.db)
    .await?;
    Ok(ok(rows))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBannerRequest {
    #[validate(length(min = 1))]
    pub image_url: String,
    #[serde(default)]
    pub position: i32,
}

pub async fn create_banner(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateBannerRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<BannerRow>>)> {
    require_admin(&user)?;
    req.validate()?;
    let row = sqlx::query_as::<_, BannerRow>(
        "INSERT INTO banners (id, image_url, position) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&req.image_url)
    .bind(req.position)
    .fetch_one(&state.db)
    .await?;
    Ok((StatusCode::CREATED, ok(row)))
}

pub async fn delete_banner(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_admin(&user)?;
    let res = sqlx::query("DELETE FROM banners WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("Banner"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---- Staged update batches ----

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBatchRequest {
    #[validate(length(min = 1))]
    pub items: Vec<BatchItemRequest>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchItemRequest {
    pub product_id: Uuid,
    #[serde(default)]
    pub stock_delta: i32,
    pub mrp: Option<Decimal>,
    pub discount_percent: Option<u32>,
}

/// Stages a set of pending stock/price updates under a fresh batch id.
/// Nothing touches the live catalog until the batch is confirmed.
pub async fn create_batch(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateBatchRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<serde_json::Value>>)> {
    require_admin(&user)?;
    req.validate()?;
    let batch_id = Uuid::now_v7();
    let mut tx = state.db.begin().await?;
    for item in &req.items {
        if let Some(pct) = item.discount_percent {
            if pct > 100 {
                return Err(ApiError::BadRequest("discount percent must be 0-100".into()));
            }
        }
        sqlx::query(
            "INSERT INTO batch_items (id, batch_id, product_id, stock_delta, mrp, discount_percent)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::now_v7())
        .bind(batch_id)
        .bind(item.product_id)
        .bind(item.stock_delta)
        .bind(item.mrp)
        .bind(item.discount_percent.map(|p| p as i32))
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok((
        StatusCode::CREATED,
        ok(serde_json::json!({ "batch_id": batch_id, "items": req.items.len() })),
    ))
}

pub async fn get_batch(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(batch_id): Path<Uuid>,
) -> ApiResult<Json<Envelope<Vec<BatchItemRow>>>> {
    require_admin(&user)?;
    let rows = sqlx::query_as::<_, BatchItemRow>(
        "SELECT * FROM batch_items WHERE batch_id = $1 ORDER BY created_at",
    )
    .bind(batch_id)
    .fetch_all(&state.db)
    .await?;
    if rows.is_empty() {
        return Err(ApiError::NotFound("Batch"));
    }
    Ok(ok(rows))
}

async fn fetch_product_locked<'e, E>(executor: E, product_id: Uuid) -> ApiResult<ProductRow>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1 FOR UPDATE")
        .bind(product_id)
        .fetch_optional(executor)
        .await?
        .ok_or(ApiError::NotFound("Product"))
}

/// Applies every staged row to the live catalog in one transaction.
/// Any failing row (unknown product, stock going negative, broken price
/// invariant) aborts the whole batch.
pub async fn confirm_batch(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(batch_id): Path<Uuid>,
) -> ApiResult<Json<Envelope<serde_json::Value>>> {
    require_admin(&user)?;
    let mut tx = state.db.begin().await?;
    // Same canonical lock order as order creation: ascending product id.
    let items = sqlx::query_as::<_, BatchItemRow>(
        "SELECT * FROM batch_items WHERE batch_id = $1 ORDER BY product_id FOR UPDATE",
    )
    .bind(batch_id)
    .fetch_all(&mut *tx)
    .await?;
    if items.is_empty() {
        return Err(ApiError::NotFound("Batch"));
    }

    let mut applied = 0u32;
    for item in &items {
        let product = fetch_product_locked(&mut *tx, item.product_id).await?;
        let new_stock = product.stock_quantity + item.stock_delta;
        if new_stock < 0 {
            return Err(ApiError::BadRequest(format!(
                "batch would take product {} stock below zero",
                product.sku
            )));
        }
        let mrp = item.mrp.unwrap_or(product.mrp);
        let discount = item
            .discount_percent
            .unwrap_or(product.discount_percent)
            .max(0) as u32;
        Pricing::new(product.cost_price, mrp, discount)?;
        sqlx::query(
            "UPDATE products SET stock_quantity = $2, mrp = $3, discount_percent = $4,
                                 out_of_stock = ($2 = 0), updated_at = NOW()
             WHERE id = $1",
        )
        .bind(product.id)
        .bind(new_stock)
        .bind(mrp)
        .bind(discount as i32)
        .execute(&mut *tx)
        .await?;
        applied += 1;
    }
    sqlx::query("DELETE FROM batch_items WHERE batch_id = $1")
        .bind(batch_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    state
        .notifier
        .publish(DomainEvent::BatchApplied { batch_id, products: applied })
        .await;
    Ok(ok(serde_json::json!({ "batch_id": batch_id, "applied": applied })))
}

/// Cancels a staged batch without touching the catalog.
pub async fn cancel_batch(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(batch_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_admin(&user)?;
    let res = sqlx::query("DELETE FROM batch_items WHERE batch_id = $1")
        .bind(batch_id)
        .execute(&state.db)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("Batch"));
    }
    Ok(StatusCode::NO_CONTENT)
}
