//! Users, approval, districts, areas and addresses.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::api::auth::{hash_password, require_admin, CurrentUser};
use crate::api::{ok, Envelope, ListParams, Paginated};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub shop_name: Option<String>,
    pub shop_address: Option<String>,
    pub area_id: Option<Uuid>,
    pub is_approved: bool,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub date_joined: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DistrictRow {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct AreaRow {
    pub id: Uuid,
    pub name: String,
    pub district_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct AddressRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub area_id: Uuid,
    pub zip_code: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---- Users (admin) ----

pub async fn list_users(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Envelope<Paginated<UserRow>>>> {
    require_admin(&user)?;
    let (page, limit, offset) = params.page_window();
    let users = sqlx::query_as::<_, UserRow>(
        "SELECT * FROM users ORDER BY date_joined DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db)
    .await?;
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(&state.db)
        .await?;
    Ok(ok(Paginated { data: users, total: total.0, page }))
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Envelope<UserRow>>> {
    require_admin(&user)?;
    let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(ok(row))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub full_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub shop_name: Option<String>,
    pub shop_address: Option<String>,
    pub area_id: Option<Uuid>,
    pub is_approved: Option<bool>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
    #[validate(length(min = 8))]
    pub password: Option<String>,
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<Envelope<UserRow>>> {
    require_admin(&user)?;
    req.validate()?;
    let password_hash = match &req.password {
        Some(p) => Some(hash_password(p)?),
        None => None,
    };
    let row = sqlx::query_as::<_, UserRow>(
        "UPDATE users SET
             full_name = COALESCE($2, full_name),
             email = COALESCE($3, email),
             shop_name = COALESCE($4, shop_name),
             shop_address = COALESCE($5, shop_address),
             area_id = COALESCE($6, area_id),
             is_approved = COALESCE($7, is_approved),
             is_active = COALESCE($8, is_active),
             is_staff = COALESCE($9, is_staff),
             password_hash = COALESCE($10, password_hash),
             updated_at = NOW()
         WHERE id = $1
         RETURNING *",
    )
    .bind(id)
    .bind(&req.full_name)
    .bind(&req.email)
    .bind(&req.shop_name)
    .bind(&req.shop_address)
    .bind(req.area_id)
    .bind(req.is_approved)
    .bind(req.is_active)
    .bind(req.is_staff)
    .bind(&password_hash)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound("User"))?;
    Ok(ok(row))
}

pub async fn approve_user(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Envelope<UserRow>>> {
    require_admin(&user)?;
    let row = sqlx::query_as::<_, UserRow>(
        "UPDATE users SET is_approved = TRUE, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound("User"))?;
    state
        .notifier
        .notify_user(id, "Account approved", "Your account has been approved. You can now place orders.")
        .await;
    Ok(ok(row))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_admin(&user)?;
    let res = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("User"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---- Districts / Areas ----

pub async fn list_districts(State(state): State<AppState>) -> ApiResult<Json<Envelope<Vec<DistrictRow>>>> {
    let rows = sqlx::query_as::<_, DistrictRow>(
        "SELECT id, name, created_at FROM districts ORDER BY name",
    )
    .fetch_all(&state.db)
    .await?;
    Ok(ok(rows))
}

pub async fn list_areas(State(state): State<AppState>) -> ApiResult<Json<Envelope<Vec<AreaRow>>>> {
    let rows = sqlx::query_as::<_, AreaRow>(
        "SELECT id, name, district_id, is_active, created_at, updated_at
         FROM areas WHERE is_active ORDER BY name",
    )
    .fetch_all(&state.db)
    .await?;
    Ok(ok(rows))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAreaRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub district_id: Option<Uuid>,
}

pub async fn create_area(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateAreaRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<AreaRow>>)> {
    require_admin(&user)?;
    req.validate()?;
    let row = sqlx::query_as::<_, AreaRow>(
        "INSERT INTO areas (id, name, district_id) VALUES ($1, $2, $3)
         RETURNING id, name, district_id, is_active, created_at, updated_at",
    )
    .bind(Uuid::now_v7())
    .bind(&req.name)
    .bind(req.district_id)
    .fetch_one(&state.db)
    .await?;
    Ok((StatusCode::CREATED, ok(row)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateAreaRequest {
    pub name: Option<String>,
    pub district_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

pub async fn update_area(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAreaRequest>,
) -> ApiResult<Json<Envelope<AreaRow>>> {
    require_admin(&user)?;
    let row = sqlx::query_as::<_, AreaRow>(
        "UPDATE areas SET
             name = COALESCE($2, name),
             district_id = COALESCE($3, district_id),
             is_active = COALESCE($4, is_active),
             updated_at = NOW()
         WHERE id = $1
         RETURNING id, name, district_id, is_active, created_at, updated_at",
    )
    .bind(id)
    .bind(&req.name)
    .bind(req.district_id)
    .bind(req.is_active)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound("Area"))?;
    Ok(ok(row))
}

// ---- Addresses ----

pub async fn list_addresses(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Envelope<Vec<AddressRow>>>> {
    let rows = sqlx::query_as::<_, AddressRow>(
        "SELECT * FROM addresses WHERE user_id = $1 ORDER BY is_default DESC, created_at DESC",
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;
    Ok(ok(rows))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAddressRequest {
    #[validate(length(min = 1, max = 100))]
    pub full_name: String,
    #[validate(length(min = 6, max = 15))]
    pub phone: String,
    #[validate(length(min = 1, max = 255))]
    pub address: String,
    pub area_id: Uuid,
    #[validate(length(min = 1, max = 20))]
    pub zip_code: String,
    #[serde(default)]
    pub is_default: bool,
}

/// At most one default address per user: marking a new default clears the
/// previous one inside the same transaction.
pub async fn create_address(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateAddressRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<AddressRow>>)> {
    req.validate()?;
    let mut tx = state.db.begin().await?;
    if req.is_default {
        sqlx::query("UPDATE addresses SET is_default = FALSE WHERE user_id = $1 AND is_default")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;
    }
    let row = sqlx::query_as::<_, AddressRow>(
        "INSERT INTO addresses (id, user_id, full_name, phone, address, area_id, zip_code, is_default)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(user.id)
    .bind(&req.full_name)
    .bind(&req.phone)
    .bind(&req.address)
    .bind(req.area_id)
    .bind(&req.zip_code)
    .bind(req.is_default)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, ok(row)))
}

pub async fn delete_address(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let res = sqlx::query("DELETE FROM addresses WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user.id)
        .execute(&state.db)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("Address"));
    }
    Ok(StatusCode::NO_CONTENT)
}
