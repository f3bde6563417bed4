//! Wallet handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{Wallet, WalletStatistics, WalletTransaction};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::wallet::{
    DepositInput, TransactionFilter, WalletBalance, WalletMovement, WithdrawInput,
};
use crate::services::WalletService;
use crate::AppState;

pub async fn my_wallet(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Wallet>> {
    let service = WalletService::new(state.db.clone());
    Ok(Json(service.get_or_create(user.user_id).await?))
}

pub async fn my_balance(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<WalletBalance>> {
    let service = WalletService::new(state.db.clone());
    Ok(Json(service.balance(user.user_id).await?))
}

pub async fn list_wallets(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<Wallet>>> {
    let service = WalletService::new(state.db.clone());
    Ok(Json(service.list(&user).await?))
}

/// Credit a customer's wallet (manager or admin)
pub async fn deposit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<DepositInput>,
) -> AppResult<(StatusCode, Json<WalletMovement>)> {
    user.require_manager()?;
    let service = WalletService::new(state.db.clone());
    Ok((StatusCode::CREATED, Json(service.deposit(input).await?)))
}

pub async fn withdraw(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<WithdrawInput>,
) -> AppResult<(StatusCode, Json<WalletMovement>)> {
    let service = WalletService::new(state.db.clone());
    Ok((StatusCode::CREATED, Json(service.withdraw(user.user_id, input).await?)))
}

pub async fn my_transactions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<TransactionFilter>,
) -> AppResult<Json<Vec<WalletTransaction>>> {
    let service = WalletService::new(state.db.clone());
    let wallet = service.get_or_create(user.user_id).await?;
    Ok(Json(service.transactions(wallet.id, &filter).await?))
}

pub async fn wallet_transactions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(wallet_id): Path<Uuid>,
    Query(filter): Query<TransactionFilter>,
) -> AppResult<Json<Vec<WalletTransaction>>> {
    let service = WalletService::new(state.db.clone());
    let wallet = service.get(wallet_id).await?;
    user.require_owner_or_manager(wallet.user_id)?;
    Ok(Json(service.transactions(wallet.id, &filter).await?))
}

pub async fn my_statistics(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<WalletStatistics>> {
    let service = WalletService::new(state.db.clone());
    Ok(Json(service.statistics(user.user_id).await?))
}
