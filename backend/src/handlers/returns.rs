//! Return request handlers

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::ProductReturn;
use uuid::Uuid;

use super::optional_json;
use super::orders::payment_service;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::returns::{
    ApproveInput, ApproveResponse, CreateReturnInput, NotesInput, ReturnFilter,
};
use crate::services::{ReturnNotifier, ReturnService};
use crate::AppState;

fn return_service(state: &AppState) -> ReturnService {
    ReturnService::new(
        state.db.clone(),
        payment_service(state),
        ReturnNotifier::new(state.db.clone(), state.mailer.clone()),
    )
}

pub async fn create_return(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateReturnInput>,
) -> AppResult<(StatusCode, Json<ProductReturn>)> {
    let ret = return_service(&state).create(&user, input).await?;
    Ok((StatusCode::CREATED, Json(ret)))
}

pub async fn list_returns(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<ReturnFilter>,
) -> AppResult<Json<Vec<ProductReturn>>> {
    Ok(Json(return_service(&state).list(&user, filter).await?))
}

pub async fn get_return(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(return_id): Path<Uuid>,
) -> AppResult<Json<ProductReturn>> {
    Ok(Json(return_service(&state).get(&user, return_id).await?))
}

pub async fn send_to_evaluation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(return_id): Path<Uuid>,
    body: Bytes,
) -> AppResult<Json<ProductReturn>> {
    user.require_manager()?;
    let input: NotesInput = optional_json(&body)?;
    Ok(Json(return_service(&state).send_to_evaluation(return_id, input).await?))
}

/// Approve and dispatch the refund
pub async fn approve_return(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(return_id): Path<Uuid>,
    body: Bytes,
) -> AppResult<Json<ApproveResponse>> {
    user.require_manager()?;
    let input: ApproveInput = optional_json(&body)?;
    Ok(Json(return_service(&state).approve(return_id, input).await?))
}

pub async fn reject_return(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(return_id): Path<Uuid>,
    Json(input): Json<NotesInput>,
) -> AppResult<Json<ProductReturn>> {
    user.require_manager()?;
    Ok(Json(return_service(&state).reject(return_id, input).await?))
}

pub async fn complete_return(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(return_id): Path<Uuid>,
) -> AppResult<Json<ProductReturn>> {
    user.require_manager()?;
    Ok(Json(return_service(&state).complete(return_id).await?))
}
