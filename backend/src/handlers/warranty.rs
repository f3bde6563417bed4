//! Warranty and repair handlers

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::{Repair, Warranty};
use uuid::Uuid;

use super::optional_json;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::warranty::{
    ClaimInput, CreateRepairInput, RepairStatusInput, WarrantyCheck,
};
use crate::services::WarrantyService;
use crate::AppState;

pub async fn list_warranties(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<Warranty>>> {
    let service = WarrantyService::new(state.db.clone());
    Ok(Json(service.list(&user).await?))
}

pub async fn active_warranties(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<Warranty>>> {
    let service = WarrantyService::new(state.db.clone());
    Ok(Json(service.active(user.user_id).await?))
}

pub async fn get_warranty(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(warranty_id): Path<Uuid>,
) -> AppResult<Json<Warranty>> {
    let service = WarrantyService::new(state.db.clone());
    Ok(Json(service.get(&user, warranty_id).await?))
}

pub async fn check_warranty(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(warranty_id): Path<Uuid>,
) -> AppResult<Json<WarrantyCheck>> {
    let service = WarrantyService::new(state.db.clone());
    Ok(Json(service.check(&user, warranty_id).await?))
}

pub async fn claim_warranty(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(warranty_id): Path<Uuid>,
    body: Bytes,
) -> AppResult<Json<Warranty>> {
    let input: ClaimInput = optional_json(&body)?;
    let service = WarrantyService::new(state.db.clone());
    Ok(Json(service.claim(&user, warranty_id, input).await?))
}

pub async fn void_warranty(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(warranty_id): Path<Uuid>,
    body: Bytes,
) -> AppResult<Json<Warranty>> {
    user.require_manager()?;
    let input: ClaimInput = optional_json(&body)?;
    let service = WarrantyService::new(state.db.clone());
    Ok(Json(service.void(warranty_id, input).await?))
}

pub async fn create_repair(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateRepairInput>,
) -> AppResult<(StatusCode, Json<Repair>)> {
    let service = WarrantyService::new(state.db.clone());
    Ok((StatusCode::CREATED, Json(service.create_repair(&user, input).await?)))
}

pub async fn list_repairs(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<Repair>>> {
    let service = WarrantyService::new(state.db.clone());
    Ok(Json(service.list_repairs(&user).await?))
}

pub async fn get_repair(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(repair_id): Path<Uuid>,
) -> AppResult<Json<Repair>> {
    let service = WarrantyService::new(state.db.clone());
    Ok(Json(service.get_repair(&user, repair_id).await?))
}

pub async fn update_repair_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(repair_id): Path<Uuid>,
    Json(input): Json<RepairStatusInput>,
) -> AppResult<Json<Repair>> {
    user.require_manager()?;
    let service = WarrantyService::new(state.db.clone());
    Ok(Json(service.update_repair_status(repair_id, input).await?))
}
