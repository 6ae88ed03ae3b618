//! In-app notifications.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::api::auth::{require_admin, CurrentUser};
use crate::api::{ok, Envelope};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct NotificationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct AdminNotificationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_id: Option<Uuid>,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Envelope<Vec<NotificationRow>>>> {
    let rows = sqlx::query_as::<_, NotificationRow>(
        "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;
    Ok(ok(rows))
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Envelope<NotificationRow>>> {
    let row = sqlx::query_as::<_, NotificationRow>(
        "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2 RETURNING *",
    )
    .bind(id)
    .bind(user.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound("Notification"))?;
    Ok(ok(row))
}

pub async fn list_admin_notifications(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Envelope<Vec<AdminNotificationRow>>>> {
    require_admin(&user)?;
    let rows = sqlx::query_as::<_, AdminNotificationRow>(
        "SELECT * FROM admin_notifications ORDER BY created_at DESC",
    )
    .fetch_all(&state.db)
    .await?;
    Ok(ok(rows))
}
