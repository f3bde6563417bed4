//! Delivery zone, courier and delivery handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{Delivery, DeliveryProfile, DeliveryZone};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::delivery::{
    AssignInput, CourierStatusInput, CreateDeliveryInput, CreateProfileInput,
    DeliveryStatusInput, MineFilter, ZoneInput,
};
use crate::services::DeliveryService;
use crate::AppState;

// ----------------------------------------------------------------------
// Zones
// ----------------------------------------------------------------------

pub async fn list_zones(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> AppResult<Json<Vec<DeliveryZone>>> {
    let service = DeliveryService::new(state.db.clone());
    Ok(Json(service.list_zones().await?))
}

pub async fn get_zone(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(zone_id): Path<Uuid>,
) -> AppResult<Json<DeliveryZone>> {
    let service = DeliveryService::new(state.db.clone());
    Ok(Json(service.get_zone(zone_id).await?))
}

pub async fn create_zone(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<ZoneInput>,
) -> AppResult<(StatusCode, Json<DeliveryZone>)> {
    user.require_manager()?;
    let service = DeliveryService::new(state.db.clone());
    Ok((StatusCode::CREATED, Json(service.create_zone(input).await?)))
}

pub async fn update_zone(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(zone_id): Path<Uuid>,
    Json(input): Json<ZoneInput>,
) -> AppResult<Json<DeliveryZone>> {
    user.require_manager()?;
    let service = DeliveryService::new(state.db.clone());
    Ok(Json(service.update_zone(zone_id, input).await?))
}

pub async fn delete_zone(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(zone_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    user.require_manager()?;
    let service = DeliveryService::new(state.db.clone());
    service.delete_zone(zone_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ----------------------------------------------------------------------
// Courier profiles
// ----------------------------------------------------------------------

pub async fn create_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateProfileInput>,
) -> AppResult<(StatusCode, Json<DeliveryProfile>)> {
    user.require_manager()?;
    let service = DeliveryService::new(state.db.clone());
    Ok((StatusCode::CREATED, Json(service.create_profile(input).await?)))
}

pub async fn my_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<DeliveryProfile>> {
    let service = DeliveryService::new(state.db.clone());
    Ok(Json(service.my_profile(user.user_id).await?))
}

pub async fn available_profiles(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<DeliveryProfile>>> {
    user.require_manager()?;
    let service = DeliveryService::new(state.db.clone());
    Ok(Json(service.available_profiles().await?))
}

pub async fn set_profile_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(profile_id): Path<Uuid>,
    Json(input): Json<CourierStatusInput>,
) -> AppResult<Json<DeliveryProfile>> {
    let service = DeliveryService::new(state.db.clone());
    Ok(Json(service.set_profile_status(&user, profile_id, input).await?))
}

// ----------------------------------------------------------------------
// Deliveries
// ----------------------------------------------------------------------

pub async fn list_deliveries(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<Delivery>>> {
    let service = DeliveryService::new(state.db.clone());
    Ok(Json(service.list(&user).await?))
}

pub async fn create_delivery(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateDeliveryInput>,
) -> AppResult<(StatusCode, Json<Delivery>)> {
    user.require_manager()?;
    let service = DeliveryService::new(state.db.clone());
    Ok((StatusCode::CREATED, Json(service.create(input).await?)))
}

pub async fn get_delivery(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(delivery_id): Path<Uuid>,
) -> AppResult<Json<Delivery>> {
    let service = DeliveryService::new(state.db.clone());
    Ok(Json(service.get(&user, delivery_id).await?))
}

pub async fn assign_delivery(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(delivery_id): Path<Uuid>,
    Json(input): Json<AssignInput>,
) -> AppResult<Json<Delivery>> {
    user.require_manager()?;
    let service = DeliveryService::new(state.db.clone());
    Ok(Json(service.assign(delivery_id, input).await?))
}

/// Deliveries of the calling courier
pub async fn my_deliveries(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<MineFilter>,
) -> AppResult<Json<Vec<Delivery>>> {
    if !user.access().is_delivery() {
        user.require_manager()?;
    }
    let service = DeliveryService::new(state.db.clone());
    Ok(Json(service.mine(&user, filter).await?))
}

pub async fn update_delivery_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(delivery_id): Path<Uuid>,
    Json(input): Json<DeliveryStatusInput>,
) -> AppResult<Json<Delivery>> {
    let service = DeliveryService::new(state.db.clone());
    Ok(Json(service.update_status(&user, delivery_id, input).await?))
}
