//! Notice board.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::api::auth::{require_admin, CurrentUser};
use crate::api::{ok, Envelope};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct NoticeRow {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn list_notices(State(state): State<AppState>) -> ApiResult<Json<Envelope<Vec<NoticeRow>>>> {
    let rows = sqlx::query_as::<_, NoticeRow>(
        "SELECT * FROM notices WHERE is_active ORDER BY created_at DESC",
    )
    .fetch_all(&state.db)
    .await?;
    Ok(ok(rows))
}

pub async fn get_notice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Envelope<NoticeRow>>> {
    let row = sqlx::query_as::<_, NoticeRow>("SELECT * FROM notices WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::NotFound("Notice"))?;
    Ok(ok(row))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateNoticeRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1))]
    pub message: String,
}

pub async fn create_notice(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateNoticeRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<NoticeRow>>)> {
    require_admin(&user)?;
    req.validate()?;
    let row = sqlx::query_as::<_, NoticeRow>(
        "INSERT INTO notices (id, title, message, created_by) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&req.title)
    .bind(&req.message)
    .bind(user.id)
    .fetch_one(&state.db)
    .await?;
    Ok((StatusCode::CREATED, ok(row)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateNoticeRequest {
    pub title: Option<String>,
    pub message: Option<String>,
    pub is_active: Option<bool>,
}

pub async fn update_notice(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateNoticeRequest>,
) -> ApiResult<Json<Envelope<NoticeRow>>> {
    require_admin(&user)?;
    let row = sqlx::query_as::<_, NoticeRow>(
        "UPDATE notices SET
             title = COALESCE($2, title),
             message = COALESCE($3, message),
             is_active = COALESCE($4, is_active),
             updated_at = NOW()
         WHERE id = $1
         RETURNING *",
    )
    .bind(id)
    .bind(&req.title)
    .bind(&req.message)
    .bind(req.is_active)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound("Notice"))?;
    Ok(ok(row))
}

pub async fn delete_notice(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_admin(&user)?;
    let res = sqlx::query("DELETE FROM notices WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("Notice"));
    }
    Ok(StatusCode::NO_CONTENT)
}
