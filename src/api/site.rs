//! Site info: the singleton configuration row the order engine reads the
//! delivery charge from.

use axum::extract::State;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::auth::{require_admin, CurrentUser};
use crate::api::{ok, Envelope};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct SiteInfoRow {
    pub id: Uuid,
    pub name: String,
    pub version: String,
    pub description: String,
    pub delivery_charge: Decimal,
    pub contact_email: String,
    pub contact_phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn get_site_info(State(state): State<AppState>) -> ApiResult<Json<Envelope<SiteInfoRow>>> {
    let row = sqlx::query_as::<_, SiteInfoRow>("SELECT * FROM site_info LIMIT 1")
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::NotFound("Site info"))?;
    Ok(ok(row))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSiteInfoRequest {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub delivery_charge: Option<Decimal>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
}

/// Creates the singleton row on first write, updates it afterwards.
pub async fn update_site_info(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<UpdateSiteInfoRequest>,
) -> ApiResult<Json<Envelope<SiteInfoRow>>> {
    require_admin(&user)?;
    if let Some(charge) = req.delivery_charge {
        if charge < Decimal::ZERO {
            return Err(ApiError::BadRequest("delivery charge must be non-negative".into()));
        }
    }
    let mut tx = state.db.begin().await?;
    let existing = sqlx::query_as::<_, SiteInfoRow>("SELECT * FROM site_info LIMIT 1 FOR UPDATE")
        .fetch_optional(&mut *tx)
        .await?;
    let row = match existing {
        Some(current) => {
            sqlx::query_as::<_, SiteInfoRow>(
                "UPDATE site_info SET
                     name = COALESCE($2, name),
                     version = COALESCE($3, version),
                     description = COALESCE($4, description),
                     delivery_charge = COALESCE($5, delivery_charge),
                     contact_email = COALESCE($6, contact_email),
                     contact_phone = COALESCE($7, contact_phone),
                     updated_at = NOW()
                 WHERE id = $1
                 RETURNING *",
            )
            .bind(current.id)
            .bind(&req.name)
            .bind(&req.version)
            .bind(&req.description)
            .bind(req.delivery_charge)
            .bind(&req.contact_email)
            .bind(&req.contact_phone)
            .fetch_one(&mut *tx)
            .await?
        }
        None => {
            sqlx::query_as::<_, SiteInfoRow>(
                "INSERT INTO site_info (id, name, version, description, delivery_charge, contact_email, contact_phone)
                 VALUES ($1,
                         COALESCE($2, 'BDM'),
                         COALESCE($3, '1.0'),
                         COALESCE($4, 'A platform for managing orders.'),
                         COALESCE($5, 80.0),
                         COALESCE($6, 'info@bdm.com'),
                         COALESCE($7, '1234567890'))
                 RETURNING *",
            )
            .bind(Uuid::now_v7())
            .bind(&req.name)
            .bind(&req.version)
            .bind(&req.description)
            .bind(req.delivery_charge)
            .bind(&req.contact_email)
            .bind(&req.contact_phone)
            .fetch_one(&mut *tx)
            .await?
        }
    };
    tx.commit().await?;
    Ok(ok(row))
}
