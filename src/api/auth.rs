//! Signup/login, profile, and the bearer-token middleware.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::api::ok;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

use super::accounts::UserRow;

/// Authenticated caller, attached to the request by [`require_auth`].
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct CurrentUser {
    pub id: Uuid,
    pub full_name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.is_staff || self.is_superuser
    }
}

/// Rejects non-admin callers.
pub fn require_admin(user: &CurrentUser) -> ApiResult<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Resolves the bearer token to a user and stores it in request
/// extensions. Tokens are opaque UUIDs held in `auth_tokens`.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .ok_or(ApiError::Unauthorized)?;

    let user = sqlx::query_as::<_, CurrentUser>(
        "SELECT u.id, u.full_name, u.is_staff, u.is_superuser
         FROM auth_tokens t JOIN users u ON u.id = t.user_id
         WHERE t.token = $1 AND u.is_active",
    )
    .bind(token)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::Unauthorized)?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hash failed: {e}")))
}

fn verify_password(password: &str, stored_hash: &str) -> ApiResult<()> {
    let parsed = PasswordHash::new(stored_hash).map_err(|_| ApiError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| ApiError::InvalidCredentials)
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 100))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 15))]
    pub phone: String,
    #[validate(length(min = 8))]
    pub password: String,
    pub shop_name: Option<String>,
    pub shop_address: Option<String>,
    pub area_id: Option<Uuid>,
}

/// New accounts start unapproved; an admin flips `is_approved` later.
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<(axum::http::StatusCode, Json<crate::api::Envelope<UserRow>>)> {
    req.validate()?;
    let password_hash = hash_password(&req.password)?;
    let user = sqlx::query_as::<_, UserRow>(
        "INSERT INTO users (id, full_name, email, phone, password_hash, shop_name, shop_address, area_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&req.full_name)
    .bind(&req.email)
    .bind(&req.phone)
    .bind(&password_hash)
    .bind(&req.shop_name)
    .bind(&req.shop_address)
    .bind(req.area_id)
    .fetch_one(&state.db)
    .await?;
    Ok((axum::http::StatusCode::CREATED, ok(user)))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub phone: String,
    pub password: String,
}

#[derive(Debug, sqlx::FromRow)]
struct LoginRow {
    id: Uuid,
    password_hash: String,
    is_staff: bool,
    is_superuser: bool,
}

async fn authenticate(state: &AppState, req: &LoginRequest) -> ApiResult<LoginRow> {
    // Phone is the login key; email works as a fallback.
    let row = sqlx::query_as::<_, LoginRow>(
        "SELECT id, password_hash, is_staff, is_superuser FROM users
         WHERE (phone = $1 OR email = $1) AND is_active",
    )
    .bind(&req.phone)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::InvalidCredentials)?;
    verify_password(&req.password, &row.password_hash)?;
    Ok(row)
}

async fn issue_token(state: &AppState, user_id: Uuid) -> ApiResult<Uuid> {
    let token = Uuid::new_v4();
    sqlx::query("INSERT INTO auth_tokens (token, user_id) VALUES ($1, $2)")
        .bind(token)
        .bind(user_id)
        .execute(&state.db)
        .await?;
    Ok(token)
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let row = authenticate(&state, &req).await?;
    let token = issue_token(&state, row.id).await?;
    let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
        .bind(row.id)
        .fetch_one(&state.db)
        .await?;
    Ok(Json(serde_json::json!({
        "status": "success",
        "access_token": token,
        "data": user,
    })))
}

/// Same as [`login`] but only staff and superusers get through.
pub async fn admin_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let row = authenticate(&state, &req).await?;
    if !(row.is_staff || row.is_superuser) {
        return Err(ApiError::Forbidden);
    }
    let token = issue_token(&state, row.id).await?;
    let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
        .bind(row.id)
        .fetch_one(&state.db)
        .await?;
    Ok(Json(serde_json::json!({
        "status": "success",
        "access_token": token,
        "data": user,
    })))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<crate::api::Envelope<UserRow>>> {
    let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
        .bind(user.id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(ok(row))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub full_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub shop_name: Option<String>,
    pub shop_address: Option<String>,
    pub area_id: Option<Uuid>,
    #[validate(length(min = 8))]
    pub password: Option<String>,
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<crate::api::Envelope<UserRow>>> {
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
             password_hash = COALESCE($7, password_hash),
             updated_at = NOW()
         WHERE id = $1
         RETURNING *",
    )
    .bind(user.id)
    .bind(&req.full_name)
    .bind(&req.email)
    .bind(&req.shop_name)
    .bind(&req.shop_address)
    .bind(req.area_id)
    .bind(&password_hash)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound("User"))?;
    Ok(ok(row))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert!(verify_password("wrong", &hash).is_err());
    }

    #[test]
    fn admin_flag_checks() {
        let shop_owner = CurrentUser {
            id: Uuid::new_v4(),
            full_name: "Shop".into(),
            is_staff: false,
            is_superuser: false,
        };
        assert!(require_admin(&shop_owner).is_err());
        let staff = CurrentUser { is_staff: true, ..shop_owner.clone() };
        assert!(require_admin(&staff).is_ok());
    }

    #[test]
    fn signup_validation() {
        let req = SignupRequest {
            full_name: "A".into(),
            email: "not-an-email".into(),
            phone: "0170000000".into(),
            password: "longenough".into(),
            shop_name: None,
            shop_address: None,
            area_id: None,
        };
        assert!(req.validate().is_err());
    }
}
