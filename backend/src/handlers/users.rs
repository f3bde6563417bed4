//! User profile and administration handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{PaginatedResponse, UserProfile};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::user::{SetRoleInput, UpdateProfileInput, UserFilter};
use crate::services::UserService;
use crate::AppState;

pub async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<UserProfile>> {
    let service = UserService::new(state.db.clone());
    Ok(Json(service.get(user.user_id).await?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<UpdateProfileInput>,
) -> AppResult<Json<UserProfile>> {
    let service = UserService::new(state.db.clone());
    Ok(Json(service.update_profile(user.user_id, input).await?))
}

/// List users (staff only)
pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<UserFilter>,
) -> AppResult<Json<PaginatedResponse<UserProfile>>> {
    user.require_staff()?;
    let service = UserService::new(state.db.clone());
    Ok(Json(service.list(filter).await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<UserProfile>> {
    if user.user_id != user_id {
        user.require_staff()?;
    }
    let service = UserService::new(state.db.clone());
    Ok(Json(service.get(user_id).await?))
}

pub async fn set_user_role(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(user_id): Path<Uuid>,
    Json(input): Json<SetRoleInput>,
) -> AppResult<Json<UserProfile>> {
    user.require_admin()?;
    let service = UserService::new(state.db.clone());
    Ok(Json(service.set_role(user_id, input).await?))
}

/// Deactivate an account (admin or the account holder)
pub async fn deactivate_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if user.user_id != user_id {
        user.require_admin()?;
    }
    let service = UserService::new(state.db.clone());
    service.deactivate(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
